//! 无密码认证模块
//!
//! 提供 magic link token 的签发与一次性兑换。
//!
//! ## 设计原则
//!
//! 本模块只负责 token 的生成、存储接口和兑换逻辑，**不包含**邮件发送。
//! 发送通过 [`crate::notify::NotificationSender`] 由应用层接入。
//!
//! ## 安全考虑
//!
//! - Token 使用 32 字节密码学安全随机数，base64url 编码
//! - Token 兑换后永久失效（一次性使用），并发兑换只有一个成功
//! - 兑换失败原因（无效 / 过期 / 已使用）可以展示给用户

pub mod magic_link;

pub use magic_link::{
    InMemoryMagicTokenRepository, MagicToken, MagicTokenRepository, MagicTokenStore,
};
