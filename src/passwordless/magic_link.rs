//! Magic Link（魔法链接）实现
//!
//! 提供一次性、限时的登录 token。
//!
//! ## 工作流程
//!
//! 1. 用户输入邮箱请求登录
//! 2. 系统为用户签发安全的一次性 token 并持久化
//! 3. 应用层将 token 嵌入 URL 发送到用户邮箱
//! 4. 用户点击链接，系统兑换 token
//! 5. 兑换成功后 `used` 从 false 变为 true，且不可回退
//!
//! ## 有效性
//!
//! token 有效当且仅当 `used == false` 且 `now < expires_at`。
//! 同时已使用且已过期的 token 一律报告为 [`MagicLinkError::Used`]。
//!
//! ## 并发
//!
//! 兑换的最后一步是存储层的条件更新（`used = true where token = ? and used = false`），
//! 同一 token 的并发兑换恰好只有一个成功，其余得到 `Used`。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use std::sync::Arc;
//! use viv_auth::clock::SystemClock;
//! use viv_auth::passwordless::{InMemoryMagicTokenRepository, MagicTokenStore};
//! use viv_auth::user::UserId;
//!
//! let store = MagicTokenStore::new(
//!     Arc::new(InMemoryMagicTokenRepository::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let token = store.issue(&UserId::from("1"), 15).await.unwrap();
//! let user_id = store.redeem(&token.token).await.unwrap();
//! assert_eq!(user_id, UserId::from("1"));
//!
//! // 第二次兑换失败
//! assert!(store.redeem(&token.token).await.is_err());
//! # });
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Error, MagicLinkError, Result, StorageError};
use crate::random::generate_magic_token;
use crate::user::UserId;

// ============================================================================
// 数据结构
// ============================================================================

/// Magic link token 记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicToken {
    /// 随机 token（唯一，URL 安全）
    pub token: String,

    /// 所属用户
    pub user_id: UserId,

    /// 是否已兑换
    pub used: bool,

    /// 过期时间
    pub expires_at: DateTime<Utc>,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl MagicToken {
    /// 在给定时间点是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// 在给定时间点是否可兑换
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired_at(now)
    }
}

// ============================================================================
// 存储接口
// ============================================================================

/// Magic link token 存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如数据库）。
/// 时间戳一律以 UTC 存取，不允许在存储层丢失时区。
#[async_trait]
pub trait MagicTokenRepository: Send + Sync {
    /// 保存新 token
    ///
    /// token 已存在时返回 `StorageError::AlreadyExists`。
    async fn insert(&self, token: &MagicToken) -> Result<()>;

    /// 按 token 查找
    async fn find(&self, token: &str) -> Result<Option<MagicToken>>;

    /// 条件更新：仅当 `used == false` 时置为 true
    ///
    /// 返回本次调用是否完成了翻转。对同一 token 的并发调用至多一个返回 `true`。
    async fn mark_used(&self, token: &str) -> Result<bool>;
}

// ============================================================================
// 内存存储实现
// ============================================================================

/// 内存存储实现
///
/// 适用于单实例部署或测试环境。
#[derive(Debug, Clone, Default)]
pub struct InMemoryMagicTokenRepository {
    /// token -> 记录
    tokens: Arc<RwLock<HashMap<String, MagicToken>>>,
}

impl InMemoryMagicTokenRepository {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前存储的 token 数量
    pub fn len(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MagicTokenRepository for InMemoryMagicTokenRepository {
    async fn insert(&self, token: &MagicToken) -> Result<()> {
        let mut tokens = self.tokens.write().map_err(|_| lock_poisoned())?;
        if tokens.contains_key(&token.token) {
            return Err(Error::conflict("magic token"));
        }
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<MagicToken>> {
        let tokens = self.tokens.read().map_err(|_| lock_poisoned())?;
        Ok(tokens.get(token).cloned())
    }

    async fn mark_used(&self, token: &str) -> Result<bool> {
        let mut tokens = self.tokens.write().map_err(|_| lock_poisoned())?;
        match tokens.get_mut(token) {
            Some(record) if !record.used => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn lock_poisoned() -> Error {
    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
}

// ============================================================================
// MagicTokenStore
// ============================================================================

/// Magic link token 生命周期管理
///
/// 负责签发与兑换，不删除任何记录；过期记录的清理由宿主负责。
#[derive(Clone)]
pub struct MagicTokenStore {
    repo: Arc<dyn MagicTokenRepository>,
    clock: Arc<dyn Clock>,
}

impl MagicTokenStore {
    /// 使用指定存储创建
    pub fn new(repo: Arc<dyn MagicTokenRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// 为用户签发新 token
    ///
    /// `expires_at = now + ttl_minutes`。
    ///
    /// # Errors
    ///
    /// 随机 token 与已有记录碰撞时返回冲突错误（[`Error::is_conflict`]），
    /// 调用方应使用新的随机数重试。
    pub async fn issue(&self, user_id: &UserId, ttl_minutes: u32) -> Result<MagicToken> {
        let created_at = self.clock.now();
        let record = MagicToken {
            token: generate_magic_token()?,
            user_id: user_id.clone(),
            used: false,
            expires_at: created_at + Duration::minutes(i64::from(ttl_minutes)),
            created_at,
        };

        self.repo.insert(&record).await?;
        Ok(record)
    }

    /// 兑换 token，返回所属用户
    ///
    /// # Errors
    ///
    /// - [`MagicLinkError::Invalid`]：token 不存在
    /// - [`MagicLinkError::Used`]：已被兑换（包括并发兑换中落败的一方）
    /// - [`MagicLinkError::Expired`]：已过期
    pub async fn redeem(&self, token: &str) -> Result<UserId> {
        let record = match self.repo.find(token).await? {
            Some(record) => record,
            None => {
                debug!("magic token not found");
                return Err(MagicLinkError::Invalid.into());
            }
        };

        if record.used {
            debug!(user_id = %record.user_id, "magic token already used");
            return Err(MagicLinkError::Used.into());
        }

        if record.is_expired_at(self.clock.now()) {
            debug!(user_id = %record.user_id, "magic token expired");
            return Err(MagicLinkError::Expired.into());
        }

        if !self.repo.mark_used(token).await? {
            debug!(user_id = %record.user_id, "magic token redeemed concurrently");
            return Err(MagicLinkError::Used.into());
        }

        Ok(record.user_id)
    }

    /// 查看 token 记录，不改变状态
    pub async fn find(&self, token: &str) -> Result<Option<MagicToken>> {
        self.repo.find(token).await
    }
}
