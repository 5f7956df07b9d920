use async_trait::async_trait;
use domain::{DomainError, DomainResult, Identity, MatchGate, UserDirectory};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

fn map_sqlx_err(err: sqlx::Error) -> DomainError {
    DomainError::storage(err.to_string())
}

#[derive(Debug, FromRow)]
struct UserRecord {
    username: String,
    email: String,
}

impl From<UserRecord> for Identity {
    fn from(value: UserRecord) -> Self {
        Identity::new(value.username, value.email)
    }
}

/// 基于 `"User"` 表的用户目录
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_identity(&self, username: &str) -> DomainResult<Option<Identity>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT username, email FROM "User" WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Identity::from))
    }
}

/// 基于 `"Match"` 表的配对关系查询
///
/// 每对用户只存一行，列顺序不固定，查询时两个方向都要匹配。
#[derive(Clone)]
pub struct PgMatchGate {
    pool: PgPool,
}

impl PgMatchGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchGate for PgMatchGate {
    async fn is_mutual_like(&self, user_a: &str, user_b: &str) -> DomainResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM "Match"
            WHERE (user1 = $1 AND user2 = $2) OR (user1 = $2 AND user2 = $1)
            LIMIT 1
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(row.is_some())
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
