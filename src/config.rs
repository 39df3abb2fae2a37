//! 认证配置
//!
//! 包含所有可调参数（均有默认值）以及进程级的会话签名密钥。
//!
//! ## 示例
//!
//! ```rust
//! use viv_auth::config::{AuthConfig, SessionSecret};
//!
//! let config = AuthConfig::default()
//!     .with_app_name("Acme")
//!     .with_token_expiry_minutes(10)
//!     .with_allow_signup(false);
//! config.validate().unwrap();
//!
//! let secret = SessionSecret::new("a-very-long-session-secret-value").unwrap();
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::error::{ConfigError, Error, Result};
use crate::random::{SESSION_SECRET_BYTES, generate_random_hex};
use crate::user::UserId;

/// 会话密钥环境变量
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";

/// 发件地址环境变量
pub const FROM_EMAIL_ENV: &str = "FROM_EMAIL";

/// 外部提供的密钥最少字节数（128 bits）
pub const MIN_SECRET_BYTES: usize = 16;

/// 默认 magic link 有效期（分钟）
pub const DEFAULT_TOKEN_EXPIRY_MINUTES: u32 = 15;

/// 默认会话最长有效期（7 天）
pub const DEFAULT_SESSION_MAX_AGE_SECONDS: u64 = 604_800;

// ============================================================================
// 会话密钥
// ============================================================================

/// 进程级会话签名密钥
///
/// 启动时初始化一次，之后只读。没有外部配置时随机生成，
/// 重启后之前签发的所有会话凭证都将失效。
#[derive(Debug)]
pub struct SessionSecret {
    key: SecretString,
    ephemeral: bool,
}

impl SessionSecret {
    /// 使用外部提供的密钥
    ///
    /// 密钥至少需要 16 字节。
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: SESSION_SECRET_ENV.to_string(),
                message: format!("must be at least {} bytes", MIN_SECRET_BYTES),
            }));
        }
        Ok(Self {
            key: SecretString::from(secret),
            ephemeral: false,
        })
    }

    /// 随机生成临时密钥
    pub fn generate() -> Result<Self> {
        let key = generate_random_hex(SESSION_SECRET_BYTES)?;
        Ok(Self {
            key: SecretString::from(key),
            ephemeral: true,
        })
    }

    /// 从 `SESSION_SECRET` 读取，未设置时退回随机密钥并发出警告
    pub fn from_env() -> Result<Self> {
        match std::env::var(SESSION_SECRET_ENV) {
            Ok(value) if !value.is_empty() => Self::new(value),
            _ => {
                warn!(
                    "{} not set, using a random key; sessions won't survive restart",
                    SESSION_SECRET_ENV
                );
                Self::generate()
            }
        }
    }

    /// 是否为随机生成的临时密钥
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.key.expose_secret().as_bytes()
    }
}

// ============================================================================
// 服务账号
// ============================================================================

/// 服务间调用的静态 Bearer token
///
/// 命中时直接解析为指定的系统用户，跳过会话校验。
/// 必须显式配置，默认关闭。
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    token: Arc<SecretString>,
    /// 预先创建好的系统用户
    pub user_id: UserId,
}

impl ServiceAccount {
    /// 创建服务账号配置
    pub fn new(token: impl Into<String>, user_id: impl Into<UserId>) -> Result<Self> {
        let token = token.into();
        if token.len() < MIN_SECRET_BYTES {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: "service_account.token".to_string(),
                message: format!("must be at least {} bytes", MIN_SECRET_BYTES),
            }));
        }
        Ok(Self {
            token: Arc::new(SecretString::from(token)),
            user_id: user_id.into(),
        })
    }

    pub(crate) fn token(&self) -> &str {
        self.token.expose_secret()
    }
}

// ============================================================================
// 认证配置
// ============================================================================

/// 认证配置
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Magic link 有效期（分钟）
    pub token_expiry_minutes: u32,

    /// 会话凭证最长有效期（秒），同时作为 cookie 的 Max-Age
    pub session_max_age_seconds: u64,

    /// 未知邮箱是否自动注册
    pub allow_signup: bool,

    /// 兑换时是否要求账户处于激活状态
    pub require_active: bool,

    /// 应用名称，用于邮件主题和日志
    pub app_name: String,

    /// 应用的绝对基础 URL，设置后覆盖请求中的 base URL
    pub app_url: Option<String>,

    /// Cookie 是否带 Secure 属性
    pub cookie_secure: bool,

    /// 发件地址，未设置时读取 `FROM_EMAIL`
    pub from_email: Option<String>,

    /// 服务账号（默认关闭）
    pub service_account: Option<ServiceAccount>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_expiry_minutes: DEFAULT_TOKEN_EXPIRY_MINUTES,
            session_max_age_seconds: DEFAULT_SESSION_MAX_AGE_SECONDS,
            allow_signup: true,
            require_active: true,
            app_name: "App".to_string(),
            app_url: None,
            cookie_secure: false,
            from_email: None,
            service_account: None,
        }
    }
}

impl AuthConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 magic link 有效期（分钟）
    pub fn with_token_expiry_minutes(mut self, minutes: u32) -> Self {
        self.token_expiry_minutes = minutes;
        self
    }

    /// 设置会话最长有效期（秒）
    pub fn with_session_max_age_seconds(mut self, seconds: u64) -> Self {
        self.session_max_age_seconds = seconds;
        self
    }

    /// 设置是否允许自助注册
    pub fn with_allow_signup(mut self, allow: bool) -> Self {
        self.allow_signup = allow;
        self
    }

    /// 设置是否要求账户激活
    pub fn with_require_active(mut self, require: bool) -> Self {
        self.require_active = require;
        self
    }

    /// 设置应用名称
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// 设置应用基础 URL
    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = Some(url.into());
        self
    }

    /// 设置 cookie 的 Secure 属性
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// 设置发件地址
    pub fn with_from_email(mut self, from: impl Into<String>) -> Self {
        self.from_email = Some(from.into());
        self
    }

    /// 启用服务账号
    pub fn with_service_account(mut self, account: ServiceAccount) -> Self {
        self.service_account = Some(account);
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.token_expiry_minutes == 0 {
            return Err(invalid("token_expiry_minutes", "must be greater than zero"));
        }
        if self.session_max_age_seconds == 0 {
            return Err(invalid("session_max_age_seconds", "must be greater than zero"));
        }
        if i64::try_from(self.session_max_age_seconds).is_err() {
            return Err(invalid("session_max_age_seconds", "value is too large"));
        }
        if let Some(app_url) = &self.app_url {
            parse_base_url("app_url", app_url)?;
        }
        Ok(())
    }
}

/// 解析用于拼接验证链接的基础 URL
///
/// 只接受 http/https，且不能带查询串或片段。
pub(crate) fn parse_base_url(key: &str, value: &str) -> Result<Url> {
    let parsed = Url::parse(value).map_err(|e| invalid(key, &e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(key, "scheme must be http or https"));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid(key, "must not contain a query or fragment"));
    }
    Ok(parsed)
}

fn invalid(key: &str, message: &str) -> Error {
    Error::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    })
}
