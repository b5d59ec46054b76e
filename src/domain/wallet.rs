//! 钱包领域记录
//!
//! Wallet 与 EncryptedSecret 一次性共同创建；
//! 钱包记录任何字段都不存放明文秘密。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{domain::network::NetworkProfile, infrastructure::encryption::EncryptedSecret};

/// 钱包记录（每用户至多一个，创建时校验）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub user_id: Uuid,
    pub address: String,
    pub network: NetworkProfile,
    pub created_at: DateTime<Utc>,
    /// 主密钥加密后的助记词，替换式更新（重加密事件整体替换）
    pub secret: EncryptedSecret,
}

impl WalletRecord {
    pub fn new(
        user_id: Uuid,
        address: String,
        network: NetworkProfile,
        secret: EncryptedSecret,
    ) -> Self {
        Self {
            user_id,
            address,
            network,
            created_at: Utc::now(),
            secret,
        }
    }
}

/// 余额报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReport {
    pub address: String,
    pub network: NetworkProfile,
    /// 原生代币余额（wei）
    pub native: u128,
    pub tokens: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub symbol: String,
    pub contract: String,
    pub balance: u128,
    pub decimals: u32,
}
