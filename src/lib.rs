//! # viv-auth
//!
//! 无密码（magic link）认证核心。
//!
//! ## 功能特性
//!
//! - **Magic link**: 一次性、限时的登录链接，并发兑换只有一个成功
//! - **会话凭证**: 带签发时间的 HMAC-SHA256 签名凭证，服务端无状态
//! - **用户目录**: 按邮箱解析身份，可选自助注册
//! - **会话检查**: 每个请求返回 `Authenticated(User)` 或 `Unauthenticated`
//! - **边界映射**: 按路由类型决定重定向或 401 JSON
//! - **服务账号**: 可选的静态 Bearer token
//!
//! 存储与邮件投递通过 trait 由宿主接入，本库自带内存实现和开发模式发送器。
//!
//! ## 示例
//!
//! ```rust
//! use viv_auth::{Auth, AuthConfig, SessionSecret};
//!
//! let config = AuthConfig::default()
//!     .with_app_name("Acme")
//!     .with_app_url("https://acme.test");
//! let auth = Auth::in_memory(config, SessionSecret::generate().unwrap()).unwrap();
//!
//! let reply = auth.logout();
//! assert_eq!(reply.location.as_deref(), Some("/auth/login"));
//! ```
//!
//! ## 会话检查示例
//!
//! ```rust
//! use std::sync::Arc;
//! use viv_auth::clock::SystemClock;
//! use viv_auth::token::TokenCodec;
//! use viv_auth::{SessionSecret, UserId};
//!
//! let codec = TokenCodec::new(
//!     SessionSecret::new("a-very-long-session-secret-value").unwrap(),
//!     3600,
//!     Arc::new(SystemClock),
//! );
//! let token = codec.mint(&UserId::from(42u64)).unwrap();
//! assert_eq!(codec.verify(&token), Some(UserId::from(42u64)));
//! assert_eq!(codec.verify("forged"), None);
//! ```

pub mod auth;
pub mod boundary;
pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod gate;
pub mod notify;
pub mod passwordless;
pub mod random;
pub mod security;
pub mod token;
pub mod user;

pub use auth::Auth;
pub use error::{Error, Result};

// ============================================================================
// 配置相关导出
// ============================================================================

pub use config::{AuthConfig, ServiceAccount, SessionSecret};

// ============================================================================
// 流程与会话检查导出
// ============================================================================

pub use boundary::{Reply, RouteSurface};
pub use flow::{AuthenticationFlow, SessionCredential};
pub use gate::{GateOutcome, SessionGate};

// ============================================================================
// 存储与通知接口导出
// ============================================================================

pub use notify::{
    LogNotificationSender, MagicLinkMessage, MemoryNotificationSender, NotificationSender,
};
pub use passwordless::{
    InMemoryMagicTokenRepository, MagicToken, MagicTokenRepository, MagicTokenStore,
};
pub use token::TokenCodec;
pub use user::{InMemoryUserRepository, User, UserDirectory, UserId, UserRepository};
