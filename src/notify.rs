//! 登录链接通知
//!
//! 核心只依赖 [`NotificationSender`] 的布尔结果，不关心投递方式。
//! 发送失败只会被记录，登录请求仍返回相同的"请查收邮件"响应。
//!
//! - [`LogNotificationSender`]：开发模式，把链接写入日志
//! - [`MemoryNotificationSender`]：记录发出的消息，用于测试

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::config::FROM_EMAIL_ENV;

/// 一封登录链接邮件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicLinkMessage {
    /// 收件人
    pub to: String,

    /// 发件人
    pub from: String,

    /// 验证链接
    pub verification_url: String,

    /// 应用名称
    pub app_name: String,

    /// 链接有效期（分钟）
    pub expires_in_minutes: u32,
}

impl MagicLinkMessage {
    /// 邮件主题
    pub fn subject(&self) -> String {
        format!("Sign in to {}", self.app_name)
    }

    /// 纯文本正文
    pub fn text_body(&self) -> String {
        format!(
            "Sign in to {app}\n\n\
             Click the link below to sign in:\n\
             {url}\n\n\
             This link expires in {minutes} minutes.",
            app = self.app_name,
            url = self.verification_url,
            minutes = self.expires_in_minutes,
        )
    }
}

/// 发件地址
///
/// 依次使用显式配置、`FROM_EMAIL` 环境变量，最后退回 `auth@{应用名}.app`。
pub fn sender_address(configured: Option<&str>, app_name: &str) -> String {
    if let Some(from) = configured.filter(|f| !f.is_empty()) {
        return from.to_string();
    }
    match std::env::var(FROM_EMAIL_ENV) {
        Ok(from) if !from.is_empty() => from,
        _ => {
            let slug: String = app_name
                .to_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            format!("auth@{}.app", slug)
        }
    }
}

/// 通知发送接口
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 发送登录链接，返回是否成功
    async fn send(&self, message: &MagicLinkMessage) -> bool;
}

/// 开发模式发送器
///
/// 不发送任何邮件，只把链接写入日志。
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(&self, message: &MagicLinkMessage) -> bool {
        info!(
            to = %message.to,
            url = %message.verification_url,
            "dev mode, magic link not emailed"
        );
        true
    }
}

/// 内存发送器
///
/// 记录所有消息；可切换为失败模式以模拟投递故障。
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationSender {
    sent: Arc<RwLock<Vec<MagicLinkMessage>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryNotificationSender {
    /// 创建发送器
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的发送都返回失败（消息仍会被记录）
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 已记录的消息
    pub fn messages(&self) -> Vec<MagicLinkMessage> {
        self.sent.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// 最后一条消息
    pub fn last(&self) -> Option<MagicLinkMessage> {
        self.sent.read().ok().and_then(|m| m.last().cloned())
    }
}

#[async_trait]
impl NotificationSender for MemoryNotificationSender {
    async fn send(&self, message: &MagicLinkMessage) -> bool {
        if let Ok(mut sent) = self.sent.write() {
            sent.push(message.clone());
        }
        !self.failing.load(Ordering::SeqCst)
    }
}
