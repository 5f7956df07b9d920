//! 内存实现
//!
//! 未配置数据库时（本地开发、测试）使用的用户目录与配对关系。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use domain::{DomainResult, Identity, MatchGate, UserDirectory};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, Identity>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, identity: Identity) {
        self.users
            .write()
            .await
            .insert(identity.username.clone(), identity);
    }

    pub async fn remove(&self, username: &str) -> bool {
        self.users.write().await.remove(username).is_some()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_identity(&self, username: &str) -> DomainResult<Option<Identity>> {
        Ok(self.users.read().await.get(username).cloned())
    }
}

/// 内存中的配对关系，键为有序的用户名对
#[derive(Default)]
pub struct InMemoryMatchGate {
    matches: RwLock<HashSet<(String, String)>>,
}

impl InMemoryMatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user_a: &str, user_b: &str) -> (String, String) {
        if user_a <= user_b {
            (user_a.to_string(), user_b.to_string())
        } else {
            (user_b.to_string(), user_a.to_string())
        }
    }

    pub async fn add_match(&self, user_a: &str, user_b: &str) {
        self.matches.write().await.insert(Self::key(user_a, user_b));
    }

    pub async fn remove_match(&self, user_a: &str, user_b: &str) -> bool {
        self.matches.write().await.remove(&Self::key(user_a, user_b))
    }
}

#[async_trait]
impl MatchGate for InMemoryMatchGate {
    async fn is_mutual_like(&self, user_a: &str, user_b: &str) -> DomainResult<bool> {
        Ok(self.matches.read().await.contains(&Self::key(user_a, user_b)))
    }
}
