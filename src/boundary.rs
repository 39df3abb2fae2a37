//! HTTP 边界映射
//!
//! 把流程与会话检查的结果翻译成 HTTP 响应描述，不依赖具体 Web 框架。
//! 路由按声明的类型区分：
//!
//! - [`RouteSurface::Browser`]：未登录时重定向到登录页
//! - [`RouteSurface::Api`]：未登录时返回 401 JSON
//!
//! ## 示例
//!
//! ```rust
//! use http::StatusCode;
//! use viv_auth::boundary::{Reply, RouteSurface};
//!
//! let surface = RouteSurface::classify("/api/items");
//! let reply = Reply::unauthenticated(surface);
//! assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
//! ```

use http::{Response, StatusCode, header};
use serde_json::{Value, json};
use tracing::error;

use crate::error::{AccountError, Error, Result};
use crate::flow::SessionCredential;
use crate::security::cookie::SecureCookie;

/// 登录页路径
pub const LOGIN_PATH: &str = "/auth/login";

/// 登录成功后的跳转路径
pub const HOME_PATH: &str = "/";

/// API 路由前缀
pub const API_PREFIX: &str = "/api/";

/// 路由类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSurface {
    /// 面向浏览器的页面
    Browser,
    /// 程序调用的接口
    Api,
}

impl RouteSurface {
    /// 按路径判断路由类型
    pub fn classify(path: &str) -> Self {
        if path.starts_with(API_PREFIX) {
            RouteSurface::Api
        } else {
            RouteSurface::Browser
        }
    }
}

/// 框架无关的响应描述
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// 状态码
    pub status: StatusCode,
    /// 重定向目标
    pub location: Option<String>,
    /// `Set-Cookie` 头
    pub set_cookie: Option<String>,
    /// JSON 响应体
    pub body: Option<Value>,
}

impl Reply {
    fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            location: None,
            set_cookie: None,
            body: Some(body),
        }
    }

    fn redirect(to: &str) -> Self {
        Self {
            status: StatusCode::SEE_OTHER,
            location: Some(to.to_string()),
            set_cookie: None,
            body: None,
        }
    }

    fn with_cookie(mut self, cookie: &SecureCookie) -> Self {
        self.set_cookie = Some(cookie.to_header_value());
        self
    }

    /// 未登录
    pub fn unauthenticated(surface: RouteSurface) -> Self {
        match surface {
            RouteSurface::Browser => Self::redirect(LOGIN_PATH),
            RouteSurface::Api => Self::json(
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "Not authenticated" }),
            ),
        }
    }

    /// 登录请求的结果
    ///
    /// 新老用户以及通知发送失败都得到同一个响应。
    pub fn login_requested(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self::json(StatusCode::OK, json!({ "status": "check_email" })),
            Err(Error::Account(AccountError::SignupDisabled)) => Self::json(
                StatusCode::BAD_REQUEST,
                json!({ "error": "account_not_found" }),
            ),
            Err(Error::Account(AccountError::InvalidEmail(_))) => {
                Self::json(StatusCode::BAD_REQUEST, json!({ "error": "invalid_email" }))
            }
            Err(e) => Self::internal(e),
        }
    }

    /// 验证链接的结果
    pub fn verified(result: &Result<SessionCredential>, cookie_secure: bool) -> Self {
        match result {
            Ok(credential) => {
                Self::redirect(HOME_PATH).with_cookie(&credential.to_cookie(cookie_secure))
            }
            Err(Error::MagicLink(reason)) => Self::json(
                StatusCode::BAD_REQUEST,
                json!({ "error": reason.category() }),
            ),
            Err(Error::Account(AccountError::Inactive)) => {
                Self::json(StatusCode::FORBIDDEN, json!({ "error": "account_inactive" }))
            }
            Err(e) => Self::internal(e),
        }
    }

    /// 登出
    pub fn logged_out(clear_cookie: &SecureCookie) -> Self {
        Self::redirect(LOGIN_PATH).with_cookie(clear_cookie)
    }

    /// 内部错误，不向客户端暴露细节
    pub fn internal(error: &Error) -> Self {
        error!(error = %error, "authentication request failed");
        Self::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "internal_error" }),
        )
    }

    /// 转换为 `http::Response`
    pub fn to_response(&self) -> Result<Response<String>> {
        let mut builder = Response::builder().status(self.status);
        if let Some(location) = &self.location {
            builder = builder.header(header::LOCATION, location);
        }
        if let Some(cookie) = &self.set_cookie {
            builder = builder.header(header::SET_COOKIE, cookie);
        }

        let body = match &self.body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                body.to_string()
            }
            None => String::new(),
        };

        builder
            .body(body)
            .map_err(|e| Error::internal(format!("invalid response: {}", e)))
    }
}
