//! 用户身份模块
//!
//! 只维护认证所需的最小身份记录：邮箱、激活状态、创建时间。
//!
//! ## 设计原则
//!
//! 本模块不绑定任何存储引擎。宿主应用实现 [`UserRepository`]，
//! 把记录映射到自己的表结构；[`InMemoryUserRepository`] 用于单实例部署和测试。
//!
//! 核心代码从不删除用户，也不修改激活状态，停用账户属于宿主的管理操作。
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use std::sync::Arc;
//! use viv_auth::clock::SystemClock;
//! use viv_auth::user::{InMemoryUserRepository, UserDirectory};
//!
//! let directory = UserDirectory::new(
//!     Arc::new(InMemoryUserRepository::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let user = directory.find_or_create("a@x.com", true).await.unwrap();
//! assert!(user.is_active);
//!
//! let found = directory.find_by_id(&user.id).await.unwrap();
//! assert_eq!(found.unwrap().email, "a@x.com");
//! # });
//! ```

pub mod directory;

pub use directory::{InMemoryUserRepository, NewUser, User, UserDirectory, UserId, UserRepository};
