//! 安全传输模块
//!
//! ## 子模块
//!
//! - **cookie**: 会话 Cookie 的属性、清除与解析

pub mod cookie;
