//! 会话检查
//!
//! 每个受保护请求调用一次：
//!
//! ```text
//! 无凭证 ──────────────────────────────→ Unauthenticated
//! 有凭证 → 校验 ─ 无效 ─────────────────→ Unauthenticated
//!               └ 有效 → 查找用户 ─ 不存在 → Unauthenticated
//!                                └ 存在 ──→ Authenticated
//! ```
//!
//! 伪造与过期不作区分。

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ServiceAccount;
use crate::error::Result;
use crate::random::constant_time_compare_str;
use crate::security::cookie::{SESSION_COOKIE_NAME, cookie_value};
use crate::token::TokenCodec;
use crate::user::{User, UserDirectory, UserId};

/// 会话检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// 已登录
    Authenticated(User),
    /// 未登录
    Unauthenticated,
}

impl GateOutcome {
    /// 已登录的用户
    pub fn user(&self) -> Option<&User> {
        match self {
            GateOutcome::Authenticated(user) => Some(user),
            GateOutcome::Unauthenticated => None,
        }
    }

    /// 是否已登录
    pub fn is_authenticated(&self) -> bool {
        matches!(self, GateOutcome::Authenticated(_))
    }
}

/// 会话检查
#[derive(Clone)]
pub struct SessionGate {
    codec: Arc<TokenCodec>,
    users: UserDirectory,
    service_account: Option<ServiceAccount>,
}

impl SessionGate {
    /// 创建会话检查
    pub fn new(
        codec: Arc<TokenCodec>,
        users: UserDirectory,
        service_account: Option<ServiceAccount>,
    ) -> Self {
        Self {
            codec,
            users,
            service_account,
        }
    }

    /// 校验会话凭证与可选的 Bearer token
    ///
    /// 服务账号命中时直接解析为对应用户；Bearer 不匹配时继续校验会话凭证。
    ///
    /// # Errors
    ///
    /// 只有存储错误会返回 `Err`，凭证问题一律是 [`GateOutcome::Unauthenticated`]。
    pub async fn authenticate(
        &self,
        credential: Option<&str>,
        bearer: Option<&str>,
    ) -> Result<GateOutcome> {
        if let (Some(account), Some(presented)) = (&self.service_account, bearer) {
            if constant_time_compare_str(presented, account.token()) {
                info!(user_id = %account.user_id, "service account authenticated");
                return self.resolve(&account.user_id).await;
            }
            debug!("bearer token did not match service account");
        }

        let Some(credential) = credential.filter(|c| !c.is_empty()) else {
            return Ok(GateOutcome::Unauthenticated);
        };

        match self.codec.verify(credential) {
            Some(user_id) => self.resolve(&user_id).await,
            None => Ok(GateOutcome::Unauthenticated),
        }
    }

    /// 从原始请求头校验
    ///
    /// `cookie_header` 为 `Cookie` 头，`authorization_header` 为 `Authorization` 头。
    pub async fn authenticate_headers(
        &self,
        cookie_header: Option<&str>,
        authorization_header: Option<&str>,
    ) -> Result<GateOutcome> {
        let credential = cookie_header.and_then(|h| cookie_value(h, SESSION_COOKIE_NAME));
        let bearer = authorization_header.and_then(bearer_token);
        self.authenticate(credential, bearer).await
    }

    async fn resolve(&self, user_id: &UserId) -> Result<GateOutcome> {
        match self.users.find_by_id(user_id).await? {
            Some(user) => Ok(GateOutcome::Authenticated(user)),
            None => {
                debug!(user_id = %user_id, "credential refers to missing user");
                Ok(GateOutcome::Unauthenticated)
            }
        }
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("codec", &self.codec)
            .field("service_account", &self.service_account.is_some())
            .finish_non_exhaustive()
    }
}

/// 解析 `Authorization: Bearer <token>`
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
