//! REST 请求的 bearer 认证
//!
//! 与 WebSocket 握手共用同一个身份校验器。

use axum::http::{header::AUTHORIZATION, HeaderMap};
use domain::Identity;

use crate::error::ApiError;
use crate::state::AppState;

/// 取出 `Authorization: Bearer <token>` 中的令牌
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))
}

/// 从 headers 中提取并校验调用者身份
pub async fn extract_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = bearer_token(headers)?;
    Ok(state.verifier.verify(token).await?)
}
