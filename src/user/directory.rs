//! 用户记录、存储接口与 [`UserDirectory`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{AccountError, Error, Result, StorageError};

// ============================================================================
// 数据结构
// ============================================================================

/// 用户标识
///
/// 对核心而言是不透明的；内存实现使用自增数字。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// 创建用户标识
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// 用户记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// 唯一且不可变的标识
    pub id: UserId,

    /// 邮箱（唯一，按存储时的大小写比较）
    pub email: String,

    /// 是否激活
    pub is_active: bool,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 待创建的用户
#[derive(Debug, Clone)]
pub struct NewUser {
    /// 邮箱
    pub email: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// 存储接口
// ============================================================================

/// 用户存储接口
///
/// 实现者必须在存储层保证邮箱唯一：并发插入同一邮箱时，
/// 失败的一方返回 `StorageError::AlreadyExists`。
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 按邮箱查找
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// 按标识查找
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>>;

    /// 插入新用户，新用户默认激活
    async fn insert(&self, user: NewUser) -> Result<User>;
}

// ============================================================================
// 内存存储实现
// ============================================================================

#[derive(Debug, Default)]
struct UserTable {
    next_id: u64,
    by_id: HashMap<UserId, User>,
    by_email: HashMap<String, UserId>,
}

/// 内存用户存储
///
/// 适用于单实例部署或测试环境。
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    table: Arc<RwLock<UserTable>>,
}

impl InMemoryUserRepository {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前用户数量
    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.by_id.len()).unwrap_or(0)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 修改激活状态
    ///
    /// 这是宿主的管理操作，核心流程不会调用。
    pub fn set_active(&self, id: &UserId, active: bool) -> Result<()> {
        let mut table = self.table.write().map_err(|_| lock_poisoned())?;
        let user = table
            .by_id
            .get_mut(id)
            .ok_or_else(|| Error::Storage(StorageError::NotFound(format!("user {}", id))))?;
        user.is_active = active;
        Ok(())
    }

    /// 删除用户（模拟宿主侧删除账户）
    pub fn remove(&self, id: &UserId) -> Result<Option<User>> {
        let mut table = self.table.write().map_err(|_| lock_poisoned())?;
        let removed = table.by_id.remove(id);
        if let Some(user) = &removed {
            table.by_email.remove(&user.email);
        }
        Ok(removed)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let table = self.table.read().map_err(|_| lock_poisoned())?;
        Ok(table
            .by_email
            .get(email)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let table = self.table.read().map_err(|_| lock_poisoned())?;
        Ok(table.by_id.get(id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut table = self.table.write().map_err(|_| lock_poisoned())?;
        if table.by_email.contains_key(&user.email) {
            return Err(Error::conflict(format!("user {}", user.email)));
        }

        table.next_id += 1;
        let record = User {
            id: UserId::from(table.next_id),
            email: user.email,
            is_active: true,
            created_at: user.created_at,
        };
        table
            .by_email
            .insert(record.email.clone(), record.id.clone());
        table.by_id.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

fn lock_poisoned() -> Error {
    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
}

// ============================================================================
// UserDirectory
// ============================================================================

/// 用户目录
///
/// 按邮箱或标识解析身份，在允许注册时为未知邮箱创建用户。
#[derive(Clone)]
pub struct UserDirectory {
    repo: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    /// 创建用户目录
    pub fn new(repo: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// 按邮箱查找（与 [`find_or_create`](Self::find_or_create) 相同的规范化）
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.repo.find_by_email(normalize_email(email)).await
    }

    /// 按标识查找
    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        self.repo.find_by_id(id).await
    }

    /// 查找或创建用户
    ///
    /// # Errors
    ///
    /// - `AccountError::SignupDisabled`：用户不存在且 `allow_create` 为 false，不会创建任何记录
    /// - `AccountError::InvalidEmail`：邮箱为空或缺少 `@`
    ///
    /// 并发创建同一邮箱时，失败方重新读取已存在的用户。
    pub async fn find_or_create(&self, email: &str, allow_create: bool) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AccountError::InvalidEmail(email.to_string()).into());
        }

        if let Some(user) = self.repo.find_by_email(email).await? {
            return Ok(user);
        }

        if !allow_create {
            debug!("signup disabled, refusing to create user");
            return Err(AccountError::SignupDisabled.into());
        }

        let new_user = NewUser {
            email: email.to_string(),
            created_at: self.clock.now(),
        };

        match self.repo.insert(new_user).await {
            Ok(user) => {
                info!(user_id = %user.id, "created user on first login");
                Ok(user)
            }
            Err(e) if e.is_conflict() => {
                debug!("lost user creation race, re-fetching");
                self.repo.find_by_email(email).await?.ok_or(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// 目录中邮箱的统一形式：去掉首尾空白，大小写保持原样
fn normalize_email(email: &str) -> &str {
    email.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn directory() -> (UserDirectory, InMemoryUserRepository, ManualClock) {
        let repo = InMemoryUserRepository::new();
        let clock = ManualClock::default();
        let directory = UserDirectory::new(Arc::new(repo.clone()), Arc::new(clock.clone()));
        (directory, repo, clock)
    }

    #[tokio::test]
    async fn test_find_or_create_creates_active_user() {
        let (directory, repo, clock) = directory();

        let user = directory.find_or_create("a@x.com", true).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(user.is_active);
        assert_eq!(user.created_at, clock.now());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_find_or_create_returns_existing() {
        let (directory, repo, _) = directory();

        let first = directory.find_or_create("a@x.com", true).await.unwrap();
        let second = directory.find_or_create("a@x.com", false).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_signup_disabled_creates_nothing() {
        let (directory, repo, _) = directory();

        let err = directory.find_or_create("new@x.com", false).await.unwrap_err();
        assert!(matches!(err, Error::Account(AccountError::SignupDisabled)));
        assert!(repo.is_empty());
        assert!(directory.find_by_email("new@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_is_case_sensitive_as_stored() {
        let (directory, _, _) = directory();

        let lower = directory.find_or_create("a@x.com", true).await.unwrap();
        let upper = directory.find_or_create("A@x.com", true).await.unwrap();
        assert_ne!(lower.id, upper.id);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let (directory, _, _) = directory();

        for email in ["", "   ", "no-at-sign"] {
            let err = directory.find_or_create(email, true).await.unwrap_err();
            assert!(matches!(err, Error::Account(AccountError::InvalidEmail(_))));
        }
    }

    #[tokio::test]
    async fn test_insert_duplicate_is_conflict() {
        let repo = InMemoryUserRepository::new();
        let new_user = || NewUser {
            email: "a@x.com".to_string(),
            created_at: Utc::now(),
        };

        repo.insert(new_user()).await.unwrap();
        let err = repo.insert(new_user()).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_find_by_id_and_remove() {
        let (directory, repo, _) = directory();

        let user = directory.find_or_create("a@x.com", true).await.unwrap();
        assert!(directory.find_by_id(&user.id).await.unwrap().is_some());

        repo.remove(&user.id).unwrap();
        assert!(directory.find_by_id(&user.id).await.unwrap().is_none());
        assert!(directory.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_active() {
        let (directory, repo, _) = directory();

        let user = directory.find_or_create("a@x.com", true).await.unwrap();
        repo.set_active(&user.id, false).unwrap();

        let found = directory.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(!found.is_active);
        assert!(repo.set_active(&UserId::from("missing"), true).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_yields_one_user() {
        let (directory, repo, _) = directory();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let directory = directory.clone();
                tokio::spawn(async move { directory.find_or_create("race@x.com", true).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_and_create_share_normalization() {
        let (directory, _, _) = directory();
        let created = directory
            .find_or_create("  a@x.com\n", true)
            .await
            .unwrap();
        assert_eq!(created.email, "a@x.com");

        let found = directory.find_by_email(" a@x.com ").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
    }

    #[test]
    fn test_user_id_conversions() {
        assert_eq!(UserId::from(7u64).to_string(), "7");
        assert_eq!(UserId::from("abc").to_string(), "abc");
        assert_eq!(
            serde_json::to_string(&UserId::new("42")).unwrap(),
            "\"42\""
        );
    }
}
