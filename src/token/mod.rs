//! Token 模块
//!
//! 提供会话凭证的签发与校验。
//!
//! ## 子模块
//!
//! - **codec**: 带签发时间的 HMAC-SHA256 签名凭证，服务端无状态
//!
//! ## 安全考虑
//!
//! - 只接受当前密钥签出的凭证，不回退到旧密钥；更换密钥即作废所有已签发凭证
//! - 签名比较为常量时间
//! - 伪造与过期对调用方表现一致，均为 `None`
//! - 登出不会使凭证失效：被重放的旧凭证在自然过期前依然有效

pub mod codec;

pub use codec::{SessionClaims, TokenCodec};
