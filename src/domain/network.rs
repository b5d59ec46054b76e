//! 网络档位
//!
//! 只有生产/测试两套档位。网络选择必须由调用方显式传入，
//! 地址格式不足以推断网络，任何接口都不允许隐式混用。

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    Mainnet,
    Testnet,
}

impl NetworkProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkProfile::Mainnet => "mainnet",
            NetworkProfile::Testnet => "testnet",
        }
    }
}

impl std::fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NetworkProfile {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(NetworkProfile::Mainnet),
            "testnet" => Ok(NetworkProfile::Testnet),
            other => Err(WalletError::Configuration(format!(
                "unknown network profile: {}",
                other
            ))),
        }
    }
}
