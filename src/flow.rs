//! 登录流程
//!
//! 把用户目录、magic token 存储、会话编解码与通知发送串成完整的
//! 无密码登录过程：
//!
//! ```text
//! request_login(email) → 签发 token → 发送验证链接
//! complete_login(token) → 兑换 token →（检查激活）→ 签发会话凭证
//! logout() → 清除 cookie
//! ```
//!
//! 对调用方而言，已存在与新注册的邮箱得到完全相同的响应；
//! 通知发送失败只记录日志，不改变响应。

use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::config::{AuthConfig, parse_base_url};
use crate::error::{AccountError, ConfigError, Error, Result};
use crate::notify::{MagicLinkMessage, NotificationSender, sender_address};
use crate::passwordless::{MagicToken, MagicTokenStore};
use crate::security::cookie::{SecureCookie, clear_session_cookie, session_cookie};
use crate::token::TokenCodec;
use crate::user::{UserDirectory, UserId};

/// 验证链接路径
pub const VERIFY_PATH: &str = "/auth/verify";

/// 随机 token 碰撞时的最大签发次数
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// 登录成功后签发的会话凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    /// 已登录用户
    pub user_id: UserId,

    /// 签名后的凭证字符串
    pub token: String,

    /// 最长有效期（秒）
    pub max_age_seconds: u64,
}

impl SessionCredential {
    /// 转换为会话 cookie
    pub fn to_cookie(&self, secure: bool) -> SecureCookie {
        session_cookie(&self.token, self.max_age_seconds, secure)
    }
}

/// 无密码登录流程
#[derive(Clone)]
pub struct AuthenticationFlow {
    config: AuthConfig,
    codec: Arc<TokenCodec>,
    users: UserDirectory,
    tokens: MagicTokenStore,
    sender: Arc<dyn NotificationSender>,
    from_address: String,
}

impl AuthenticationFlow {
    /// 组装登录流程
    ///
    /// 发件地址在此时确定（配置 > `FROM_EMAIL` > 默认值）。
    pub fn new(
        config: AuthConfig,
        codec: Arc<TokenCodec>,
        users: UserDirectory,
        tokens: MagicTokenStore,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        let from_address = sender_address(config.from_email.as_deref(), &config.app_name);
        Self {
            config,
            codec,
            users,
            tokens,
            sender,
            from_address,
        }
    }

    /// 当前配置
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// 请求登录链接
    ///
    /// `request_base_url` 是当前请求的基础 URL，配置了 `app_url` 时被忽略。
    /// 基础 URL 在任何写入之前解析。
    ///
    /// # Errors
    ///
    /// - [`AccountError::SignupDisabled`]：邮箱未注册且关闭了自助注册
    /// - [`AccountError::InvalidEmail`]：邮箱格式不合法
    /// - [`ConfigError`]：没有可用的基础 URL，或其格式不合法
    /// - 存储错误原样传播
    pub async fn request_login(&self, email: &str, request_base_url: Option<&str>) -> Result<()> {
        let base = self.verification_base(request_base_url)?;

        let user = match self
            .users
            .find_or_create(email, self.config.allow_signup)
            .await
        {
            Ok(user) => user,
            Err(e @ Error::Account(AccountError::SignupDisabled)) => {
                info!("login requested for unknown email with signup disabled");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let token = self.issue_with_retry(&user.id).await?;
        let verification_url = verification_link(&base, &token.token)?;

        let message = MagicLinkMessage {
            to: user.email.clone(),
            from: self.from_address.clone(),
            verification_url: verification_url.to_string(),
            app_name: self.config.app_name.clone(),
            expires_in_minutes: self.config.token_expiry_minutes,
        };

        if self.sender.send(&message).await {
            info!(user_id = %user.id, "magic link sent");
        } else {
            error!(user_id = %user.id, "failed to send magic link");
        }

        Ok(())
    }

    /// 兑换登录链接并签发会话凭证
    ///
    /// 开启 `require_active` 时，兑换之后再检查账户状态；
    /// 账户未激活时 token 仍然被消耗。
    ///
    /// # Errors
    ///
    /// - [`crate::error::MagicLinkError`]：无效、过期或已使用
    /// - [`AccountError::Inactive`]：账户未激活或已不存在
    pub async fn complete_login(&self, token: &str) -> Result<SessionCredential> {
        let user_id = self.tokens.redeem(token).await?;

        if self.config.require_active {
            match self.users.find_by_id(&user_id).await? {
                Some(user) if user.is_active => {}
                _ => {
                    warn!(user_id = %user_id, "login rejected for inactive account");
                    return Err(AccountError::Inactive.into());
                }
            }
        }

        let credential = SessionCredential {
            token: self.codec.mint(&user_id)?,
            max_age_seconds: self.codec.max_age_seconds(),
            user_id,
        };
        info!(user_id = %credential.user_id, "session issued");
        Ok(credential)
    }

    /// 登出
    ///
    /// 服务端没有会话状态，只返回清除 cookie 的指令。
    /// 已签发的凭证在自然过期前仍然有效。
    pub fn logout(&self) -> SecureCookie {
        clear_session_cookie(self.config.cookie_secure)
    }

    /// 构造验证链接 `{base}/auth/verify?token=...`
    ///
    /// # Errors
    ///
    /// 既没有配置 `app_url` 也没有提供请求 URL，或 URL 不合法时返回配置错误。
    pub fn verification_url(&self, token: &str, request_base_url: Option<&str>) -> Result<Url> {
        let base = self.verification_base(request_base_url)?;
        verification_link(&base, token)
    }

    /// 选出验证链接的基础 URL：`app_url` 优先，其次是请求 URL
    fn verification_base(&self, request_base_url: Option<&str>) -> Result<Url> {
        match (self.config.app_url.as_deref(), request_base_url) {
            (Some(app_url), _) => parse_base_url("app_url", app_url),
            (None, Some(request)) => parse_base_url("request_base_url", request),
            (None, None) => Err(Error::Config(ConfigError::MissingRequired(
                "app_url".to_string(),
            ))),
        }
    }

    async fn issue_with_retry(&self, user_id: &UserId) -> Result<MagicToken> {
        let mut attempt = 1;
        loop {
            match self
                .tokens
                .issue(user_id, self.config.token_expiry_minutes)
                .await
            {
                Err(e) if e.is_conflict() && attempt < MAX_ISSUE_ATTEMPTS => {
                    warn!(attempt, "magic token collision, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// 在基础 URL 的路径之后追加 `auth/verify` 并带上 token
fn verification_link(base: &Url, token: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            Error::Config(ConfigError::InvalidValue {
                key: "app_url".to_string(),
                message: "cannot be used as a base".to_string(),
            })
        })?
        .pop_if_empty()
        .extend(VERIFY_PATH.trim_start_matches('/').split('/'));
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

impl std::fmt::Debug for AuthenticationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationFlow")
            .field("config", &self.config)
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}
