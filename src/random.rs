//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成 magic link token 和会话密钥。

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, Error, Result};

/// Magic link token 的随机字节数（256 bits）
pub const MAGIC_TOKEN_BYTES: usize = 32;

/// 临时会话密钥的随机字节数
pub const SESSION_SECRET_BYTES: usize = 32;

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use viv_auth::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定长度的十六进制随机字符串
///
/// 最终字符串长度为字节数的两倍。
pub fn generate_random_hex(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(hex_encode(&bytes))
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充）
///
/// # Example
///
/// ```rust
/// use viv_auth::random::generate_random_base64_url;
///
/// let token = generate_random_base64_url(32).unwrap();
/// assert!(!token.contains('+'));
/// assert!(!token.contains('/'));
/// ```
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成 magic link token
///
/// 32 字节随机数据，Base64 URL 编码后 43 个字符，可直接放入查询参数。
pub fn generate_magic_token() -> Result<String> {
    generate_random_base64_url(MAGIC_TOKEN_BYTES)
}

/// 将字节数组编码为十六进制字符串
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击
///
/// ```rust
/// use viv_auth::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"secret_token", b"secret_token"));
/// assert!(!constant_time_compare(b"secret_token", b"other_token!"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
