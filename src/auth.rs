//! 组装入口
//!
//! [`Auth`] 持有一份配置和一个共享的 [`TokenCodec`]，
//! 由此构造 [`AuthenticationFlow`] 与 [`SessionGate`]，
//! 并提供直接返回 [`Reply`] 的请求处理方法。

use std::sync::Arc;
use tracing::info;

use crate::boundary::{Reply, RouteSurface};
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, SessionSecret};
use crate::error::Result;
use crate::flow::AuthenticationFlow;
use crate::gate::{GateOutcome, SessionGate};
use crate::notify::{LogNotificationSender, NotificationSender};
use crate::passwordless::{
    InMemoryMagicTokenRepository, MagicTokenRepository, MagicTokenStore,
};
use crate::token::TokenCodec;
use crate::user::{InMemoryUserRepository, User, UserDirectory, UserRepository};

/// 认证组件的组合根
#[derive(Clone, Debug)]
pub struct Auth {
    flow: AuthenticationFlow,
    gate: SessionGate,
    codec: Arc<TokenCodec>,
}

impl Auth {
    /// 校验配置并装配所有组件
    ///
    /// # Errors
    ///
    /// 配置不合法时返回 [`crate::error::ConfigError`]。
    pub fn new(
        config: AuthConfig,
        secret: SessionSecret,
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn MagicTokenRepository>,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let codec = Arc::new(TokenCodec::new(
            secret,
            config.session_max_age_seconds,
            clock.clone(),
        ));
        let directory = UserDirectory::new(users, clock.clone());
        let store = MagicTokenStore::new(tokens, clock);

        let gate = SessionGate::new(
            codec.clone(),
            directory.clone(),
            config.service_account.clone(),
        );

        info!(
            app = %config.app_name,
            signup = if config.allow_signup { "on" } else { "off" },
            service_account = config.service_account.is_some(),
            "auth initialized"
        );

        let flow = AuthenticationFlow::new(config, codec.clone(), directory, store, sender);

        Ok(Self { flow, gate, codec })
    }

    /// 使用内存存储、日志发送器和系统时钟
    pub fn in_memory(config: AuthConfig, secret: SessionSecret) -> Result<Self> {
        Self::new(
            config,
            secret,
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryMagicTokenRepository::new()),
            Arc::new(LogNotificationSender),
            Arc::new(SystemClock),
        )
    }

    /// 登录流程
    pub fn flow(&self) -> &AuthenticationFlow {
        &self.flow
    }

    /// 会话检查
    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    /// 会话编解码
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// 当前配置
    pub fn config(&self) -> &AuthConfig {
        self.flow.config()
    }

    /// 处理登录表单提交
    pub async fn login(&self, email: &str, request_base_url: Option<&str>) -> Reply {
        Reply::login_requested(&self.flow.request_login(email, request_base_url).await)
    }

    /// 处理验证链接
    pub async fn verify(&self, token: &str) -> Reply {
        Reply::verified(
            &self.flow.complete_login(token).await,
            self.config().cookie_secure,
        )
    }

    /// 处理登出
    pub fn logout(&self) -> Reply {
        Reply::logged_out(&self.flow.logout())
    }

    /// 受保护路由的前置检查
    ///
    /// 已登录时返回用户，否则返回按路由类型决定的响应。
    pub async fn require_user(
        &self,
        path: &str,
        cookie_header: Option<&str>,
        authorization_header: Option<&str>,
    ) -> std::result::Result<User, Reply> {
        match self
            .gate
            .authenticate_headers(cookie_header, authorization_header)
            .await
        {
            Ok(GateOutcome::Authenticated(user)) => Ok(user),
            Ok(GateOutcome::Unauthenticated) => {
                Err(Reply::unauthenticated(RouteSurface::classify(path)))
            }
            Err(e) => Err(Reply::internal(&e)),
        }
    }
}
