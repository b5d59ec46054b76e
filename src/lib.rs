//! IronVault - 托管钱包密钥管理核心
//!
//! 托管模式：用户通过普通登录认证，私钥由平台代管。
//! 本 crate 只覆盖密钥生命周期（生成、加密、分片、恢复、签名），
//! HTTP 路由、持久化 schema、前端均为外部协作方。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use error::WalletError;

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{network::NetworkProfile, wallet::WalletRecord},
        error::WalletError,
        service::wallet_service::WalletService,
    };
}
