//! 会话 Cookie 传输
//!
//! 会话凭证通过单个名为 `viv_session` 的 Cookie 传递：
//!
//! - HttpOnly，防止脚本读取
//! - SameSite=Lax，允许从邮件中的链接顶级导航进入
//! - Max-Age 等于会话最长有效期
//! - 登出时以 Max-Age=0 清除
//!
//! 签名由 [`crate::token::TokenCodec`] 负责，本模块只处理 Cookie 属性与解析。
//!
//! ## 示例
//!
//! ```rust
//! use viv_auth::security::cookie::{SESSION_COOKIE_NAME, cookie_value, session_cookie};
//!
//! let cookie = session_cookie("signed-token", 604_800, false);
//! let header = cookie.to_header_value();
//! assert!(header.starts_with("viv_session=signed-token"));
//! assert!(header.contains("HttpOnly"));
//!
//! let request_header = "theme=dark; viv_session=signed-token";
//! assert_eq!(cookie_value(request_header, SESSION_COOKIE_NAME), Some("signed-token"));
//! ```

use std::time::Duration;

/// 会话 Cookie 名称
pub const SESSION_COOKIE_NAME: &str = "viv_session";

/// Set-Cookie 头的描述
///
/// SameSite 固定为 Lax。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureCookie {
    /// Cookie 名称
    pub name: String,
    /// Cookie 值
    pub value: String,
    /// HttpOnly 属性
    pub http_only: bool,
    /// Secure 属性（仅通过 HTTPS 发送）
    pub secure: bool,
    /// Max-Age 属性
    pub max_age: Option<Duration>,
    /// Expires 属性
    pub expires: Option<String>,
    /// Path 属性
    pub path: Option<String>,
}

impl SecureCookie {
    /// 创建新的 Cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            http_only: false,
            secure: false,
            max_age: None,
            expires: None,
            path: None,
        }
    }

    /// 设置 HttpOnly 属性
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// 设置 Secure 属性
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// 设置 Max-Age（秒）
    pub fn max_age_secs(mut self, secs: u64) -> Self {
        self.max_age = Some(Duration::from_secs(secs));
        self
    }

    /// 设置 Expires 属性（RFC 7231 格式）
    pub fn expires(mut self, expires: impl Into<String>) -> Self {
        self.expires = Some(expires.into());
        self
    }

    /// 设置 Path 属性
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 生成 Set-Cookie 头值
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if self.http_only {
            parts.push("HttpOnly".to_string());
        }

        if self.secure {
            parts.push("Secure".to_string());
        }

        parts.push("SameSite=Lax".to_string());

        if let Some(ref max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }

        if let Some(ref expires) = self.expires {
            parts.push(format!("Expires={}", expires));
        }

        if let Some(ref path) = self.path {
            parts.push(format!("Path={}", path));
        }

        parts.join("; ")
    }
}

/// 携带会话凭证的 Cookie
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> SecureCookie {
    SecureCookie::new(SESSION_COOKIE_NAME, token)
        .http_only(true)
        .secure(secure)
        .path("/")
        .max_age_secs(max_age_secs)
}

/// 清除会话凭证的 Cookie
pub fn clear_session_cookie(secure: bool) -> SecureCookie {
    SecureCookie::new(SESSION_COOKIE_NAME, "")
        .http_only(true)
        .secure(secure)
        .path("/")
        .max_age_secs(0)
        .expires("Thu, 01 Jan 1970 00:00:00 GMT")
}

/// 从请求的 `Cookie` 头中取出指定名称的值
///
/// 空值视为不存在。
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}
