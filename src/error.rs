//! 统一错误类型模块
//!
//! 提供 viv-auth 中所有操作的错误类型定义。
//!
//! 所有错误都是调用方可恢复的条件，不会导致进程终止。
//! Session 凭证校验失败不在此处表达：`SessionGate` 只返回
//! `Unauthenticated`，不区分伪造与过期。

use std::fmt;

/// viv-auth 的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// viv-auth 的错误类型
#[derive(Debug)]
pub enum Error {
    /// Session 凭证相关错误
    Token(TokenError),

    /// Magic link 兑换错误
    MagicLink(MagicLinkError),

    /// 账户状态错误
    Account(AccountError),

    /// 配置错误
    Config(ConfigError),

    /// 存储错误
    Storage(StorageError),

    /// 加密错误
    Crypto(CryptoError),

    /// 内部错误
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个唯一约束冲突错误
    pub fn conflict(item: impl Into<String>) -> Self {
        Error::Storage(StorageError::AlreadyExists(item.into()))
    }

    /// 是否为唯一约束冲突（并发写入竞争的失败方）
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Storage(StorageError::AlreadyExists(_)))
    }

    /// 如果是 magic link 兑换错误，返回具体原因
    pub fn magic_link_reason(&self) -> Option<MagicLinkError> {
        match self {
            Error::MagicLink(e) => Some(*e),
            _ => None,
        }
    }
}

/// Session 凭证编解码错误
///
/// 仅供内部诊断使用，对外一律视为未认证。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// 凭证已过期
    Expired,
    /// 凭证格式无效
    InvalidFormat(String),
    /// 签名无效
    InvalidSignature,
    /// 编码失败
    EncodingFailed(String),
    /// 解码失败
    DecodingFailed(String),
}

/// Magic link 兑换失败原因
///
/// 与 session 凭证不同，这些原因可以展示给用户。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicLinkError {
    /// token 不存在
    Invalid,
    /// token 已过期
    Expired,
    /// token 已被使用
    Used,
}

impl MagicLinkError {
    /// 面向用户的原因类别
    pub fn category(&self) -> &'static str {
        match self {
            MagicLinkError::Invalid => "invalid",
            MagicLinkError::Expired => "expired",
            MagicLinkError::Used => "used",
        }
    }
}

/// 账户相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// 账户已停用
    Inactive,
    /// 不允许自助注册
    SignupDisabled,
    /// 邮箱格式无效
    InvalidEmail(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必需的配置
    MissingRequired(String),
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 连接失败
    ConnectionFailed(String),
    /// 记录未找到
    NotFound(String),
    /// 记录已存在
    AlreadyExists(String),
    /// 操作失败
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Token(e) => write!(f, "Token error: {}", e),
            Error::MagicLink(e) => write!(f, "Magic link error: {}", e),
            Error::Account(e) => write!(f, "Account error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::InvalidFormat(msg) => write!(f, "invalid token format: {}", msg),
            TokenError::InvalidSignature => write!(f, "invalid token signature"),
            TokenError::EncodingFailed(msg) => write!(f, "token encoding failed: {}", msg),
            TokenError::DecodingFailed(msg) => write!(f, "token decoding failed: {}", msg),
        }
    }
}

impl fmt::Display for MagicLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MagicLinkError::Invalid => write!(f, "this link is invalid"),
            MagicLinkError::Expired => write!(f, "this link has expired"),
            MagicLinkError::Used => write!(f, "this link has already been used"),
        }
    }
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountError::Inactive => write!(f, "account is deactivated"),
            AccountError::SignupDisabled => write!(f, "account not found and signup is disabled"),
            AccountError::InvalidEmail(email) => write!(f, "invalid email address: {}", email),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => {
                write!(f, "missing required configuration: {}", key)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => write!(f, "storage connection failed: {}", msg),
            StorageError::NotFound(item) => write!(f, "not found: {}", item),
            StorageError::AlreadyExists(item) => write!(f, "already exists: {}", item),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Token(e) => Some(e),
            Error::MagicLink(e) => Some(e),
            Error::Account(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Storage(e) => Some(e),
            Error::Crypto(e) => Some(e),
            Error::Internal(_) => None,
        }
    }
}

impl std::error::Error for TokenError {}
impl std::error::Error for MagicLinkError {}
impl std::error::Error for AccountError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::Token(err)
    }
}

impl From<MagicLinkError> for Error {
    fn from(err: MagicLinkError) -> Self {
        Error::MagicLink(err)
    }
}

impl From<AccountError> for Error {
    fn from(err: AccountError) -> Self {
        Error::Account(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MagicLink(MagicLinkError::Used);
        assert_eq!(
            err.to_string(),
            "Magic link error: this link has already been used"
        );
    }

    #[test]
    fn test_conflict_detection() {
        let err = Error::conflict("user a@x.com");
        assert!(err.is_conflict());
        assert!(!Error::internal("boom").is_conflict());
    }

    #[test]
    fn test_magic_link_reason() {
        let err: Error = MagicLinkError::Expired.into();
        assert_eq!(err.magic_link_reason(), Some(MagicLinkError::Expired));
        assert_eq!(Error::internal("x").magic_link_reason(), None);
    }

    #[test]
    fn test_magic_link_categories() {
        assert_eq!(MagicLinkError::Invalid.category(), "invalid");
        assert_eq!(MagicLinkError::Expired.category(), "expired");
        assert_eq!(MagicLinkError::Used.category(), "used");
    }

    #[test]
    fn test_token_error_display() {
        let err = TokenError::Expired;
        assert_eq!(err.to_string(), "token has expired");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;
        let err: Error = AccountError::Inactive.into();
        assert!(err.source().is_some());
    }
}
