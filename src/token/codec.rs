//! 会话凭证编解码
//!
//! 会话凭证是自包含的签名字符串，服务端不存储任何状态。
//!
//! ## Token 格式
//!
//! 由三部分组成，使用 `.` 分隔，均为 base64url（无填充）：
//!
//! - payload：JSON `{"user_id": ...}`
//! - 时间戳：签发时间，8 字节大端 Unix 秒
//! - HMAC-SHA256 签名：覆盖前两部分的原始文本
//!
//! 当且仅当签名在当前密钥下校验通过、且 `now - issued_at <= max_age` 时凭证有效。
//! 签发时间晚于当前时间的凭证视为无效。
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use viv_auth::clock::SystemClock;
//! use viv_auth::config::SessionSecret;
//! use viv_auth::token::TokenCodec;
//! use viv_auth::user::UserId;
//!
//! let secret = SessionSecret::new("my-secret-key-at-least-32-bytes!").unwrap();
//! let codec = TokenCodec::new(secret, 604_800, Arc::new(SystemClock));
//!
//! let token = codec.mint(&UserId::from("42")).unwrap();
//! assert_eq!(codec.verify(&token), Some(UserId::from("42")));
//! assert_eq!(codec.verify("garbage"), None);
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::config::SessionSecret;
use crate::error::{CryptoError, Result, TokenError};
use crate::user::UserId;

type HmacSha256 = Hmac<Sha256>;

/// 分隔符
const SEPARATOR: char = '.';

/// 签名域，避免同一密钥签出的其他数据被当作会话凭证
const SIGNING_SALT: &[u8] = b"viv-auth.session";

/// 凭证中签名的数据
#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    user_id: UserId,
}

/// 解码后的会话凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// 用户标识
    pub user_id: UserId,

    /// 签发时间
    pub issued_at: DateTime<Utc>,
}

/// 会话凭证编解码器
///
/// 构造时注入密钥，之后只读，可在线程间共享。
pub struct TokenCodec {
    secret: SessionSecret,
    max_age_seconds: u64,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// 创建编解码器
    ///
    /// * `max_age_seconds` - [`verify`](Self::verify) 使用的最长有效期
    pub fn new(secret: SessionSecret, max_age_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret,
            max_age_seconds,
            clock,
        }
    }

    /// 默认最长有效期（秒）
    pub fn max_age_seconds(&self) -> u64 {
        self.max_age_seconds
    }

    /// 为用户签发会话凭证
    pub fn mint(&self, user_id: &UserId) -> Result<String> {
        let payload = serde_json::to_vec(&SessionPayload {
            user_id: user_id.clone(),
        })
        .map_err(|e| TokenError::EncodingFailed(e.to_string()))?;

        let issued_at = self.clock.now().timestamp();
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let timestamp_b64 = URL_SAFE_NO_PAD.encode(issued_at.to_be_bytes());

        let mut mac = self.mac()?;
        mac.update(payload_b64.as_bytes());
        mac.update(&[SEPARATOR as u8]);
        mac.update(timestamp_b64.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!(
            "{}{sep}{}{sep}{}",
            payload_b64,
            timestamp_b64,
            signature_b64,
            sep = SEPARATOR
        ))
    }

    /// 使用默认最长有效期校验凭证
    ///
    /// 签名错误、过期、格式错误一律返回 `None`，调用方无法区分。
    pub fn verify(&self, token: &str) -> Option<UserId> {
        self.verify_with_max_age(token, self.max_age_seconds)
    }

    /// 使用指定最长有效期校验凭证
    pub fn verify_with_max_age(&self, token: &str, max_age_seconds: u64) -> Option<UserId> {
        match self.decode(token, max_age_seconds) {
            Ok(claims) => Some(claims.user_id),
            Err(e) => {
                debug!(reason = %e, "session credential rejected");
                None
            }
        }
    }

    /// 解码并校验凭证，返回具体失败原因
    ///
    /// 仅用于诊断；失败原因不应展示给终端用户。
    pub fn decode(
        &self,
        token: &str,
        max_age_seconds: u64,
    ) -> std::result::Result<SessionClaims, TokenError> {
        let mut parts = token.split(SEPARATOR);
        let (payload_b64, timestamp_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(p), Some(t), Some(s), None) => (p, t, s),
                _ => return Err(TokenError::InvalidFormat("expected three segments".into())),
            };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::InvalidFormat("signature encoding".into()))?;

        // 先校验签名，再解析任何内容
        let mut mac = self.mac().map_err(|_| TokenError::InvalidSignature)?;
        mac.update(payload_b64.as_bytes());
        mac.update(&[SEPARATOR as u8]);
        mac.update(timestamp_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let timestamp_bytes: [u8; 8] = URL_SAFE_NO_PAD
            .decode(timestamp_b64)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| TokenError::InvalidFormat("timestamp".into()))?;
        let issued_at_secs = i64::from_be_bytes(timestamp_bytes);

        let age = self.clock.now().timestamp().saturating_sub(issued_at_secs);
        if age < 0 {
            return Err(TokenError::InvalidFormat("issued in the future".into()));
        }
        let max_age = i64::try_from(max_age_seconds).unwrap_or(i64::MAX);
        if age > max_age {
            return Err(TokenError::Expired);
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::InvalidFormat("payload encoding".into()))?;
        let payload: SessionPayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| TokenError::DecodingFailed(e.to_string()))?;

        let issued_at = DateTime::<Utc>::from_timestamp(issued_at_secs, 0)
            .ok_or_else(|| TokenError::InvalidFormat("timestamp out of range".into()))?;

        Ok(SessionClaims {
            user_id: payload.user_id,
            issued_at,
        })
    }

    fn mac(&self) -> std::result::Result<HmacSha256, CryptoError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        mac.update(SIGNING_SALT);
        Ok(mac)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("max_age_seconds", &self.max_age_seconds)
            .finish_non_exhaustive()
    }
}
