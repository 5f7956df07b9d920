use std::sync::Arc;

use domain::{DomainError, MatchGate};

use crate::error::ApplicationError;

/// 聊天资格查询
///
/// 只有互相喜欢的两个用户才应打开聊天窗口。
#[derive(Clone)]
pub struct ChatEligibilityService {
    match_gate: Arc<dyn MatchGate>,
}

impl ChatEligibilityService {
    pub fn new(match_gate: Arc<dyn MatchGate>) -> Self {
        Self { match_gate }
    }

    /// `viewer` 能否与 `other` 聊天
    pub async fn check(&self, viewer: &str, other: &str) -> Result<bool, ApplicationError> {
        if other.trim().is_empty() {
            return Err(DomainError::validation_error("username", "username cannot be empty").into());
        }
        if viewer == other {
            return Err(
                DomainError::validation_error("username", "cannot check chat eligibility with yourself")
                    .into(),
            );
        }

        let matched = self.match_gate.is_mutual_like(viewer, other).await?;
        tracing::debug!(viewer = %viewer, other = %other, matched, "chat eligibility checked");
        Ok(matched)
    }
}
