//! 配置管理模块
//! 支持从环境变量和配置文件加载配置
//!
//! 配置错误在进程启动时即失败（ConfigurationError），不进入请求处理。

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::WalletError, infrastructure::secret::EncryptionKey};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: NetworksConfig,
    pub kdf: KdfConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    pub logging: LoggingConfig,
}

/// 网络端点配置（生产/测试两套，严格区分，调用方必须显式选择）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworksConfig {
    pub mainnet: NetworkEndpoint,
    pub testnet: NetworkEndpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub rpc_url: String,
    pub chain_id: u64,
}

/// Argon2id 密钥派生配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfConfig {
    /// 内存开销（KiB）
    pub memory_kib: u32,
    /// 迭代次数
    pub iterations: u32,
    /// 并行度
    pub parallelism: u32,
    /// 派生超时（秒），超时返回可重试错误而非挂起
    pub timeout_secs: u64,
}

/// RPC 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// 同链代币交换聚合器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// 代币合约配置（余额查询用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub network: String,
    pub contract: String,
    pub decimals: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

impl Default for NetworksConfig {
    fn default() -> Self {
        Self {
            mainnet: NetworkEndpoint {
                rpc_url: std::env::var("MAINNET_RPC_URL")
                    .unwrap_or_else(|_| "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY".into()),
                chain_id: std::env::var("MAINNET_CHAIN_ID")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            },
            testnet: NetworkEndpoint {
                rpc_url: std::env::var("TESTNET_RPC_URL")
                    .unwrap_or_else(|_| "https://ethereum-sepolia-rpc.publicnode.com".into()),
                chain_id: std::env::var("TESTNET_CHAIN_ID")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(11155111),
            },
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: std::env::var("KDF_MEMORY_KIB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(65536), // 64 MiB
            iterations: std::env::var("KDF_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            parallelism: std::env::var("KDF_PARALLELISM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            timeout_secs: std::env::var("KDF_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: std::env::var("RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            connect_timeout_secs: std::env::var("RPC_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_retries: std::env::var("RPC_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_ms: std::env::var("RPC_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("SWAP_API_URL")
                .unwrap_or_else(|_| "https://api.1inch.dev/swap/v5.2".into()),
            api_key: std::env::var("SWAP_API_KEY").ok(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Config {
    /// 进程入口加载：先读 .env，再按 CONFIG_FILE 指向的 TOML 合并
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("CONFIG_FILE").ok();
        Self::from_env_and_file(path.as_deref().map(Path::new))
    }

    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            networks: NetworksConfig::default(),
            kdf: KdfConfig::default(),
            rpc: RpcConfig::default(),
            swap: SwapConfig::default(),
            tokens: Vec::new(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性，失败即启动失败
    pub fn validate(&self) -> Result<(), WalletError> {
        for (name, ep) in [
            ("mainnet", &self.networks.mainnet),
            ("testnet", &self.networks.testnet),
        ] {
            if !ep.rpc_url.starts_with("http://") && !ep.rpc_url.starts_with("https://") {
                return Err(WalletError::Configuration(format!(
                    "{} rpc_url must start with http:// or https://",
                    name
                )));
            }
        }

        if self.networks.mainnet.chain_id == self.networks.testnet.chain_id {
            return Err(WalletError::Configuration(
                "mainnet and testnet must not share a chain id".into(),
            ));
        }

        // Argon2 对 m_cost 的硬下限是 8*parallelism KiB
        if self.kdf.memory_kib < 8 * self.kdf.parallelism || self.kdf.iterations == 0 {
            return Err(WalletError::Configuration("kdf parameters too weak".into()));
        }
        if self.kdf.timeout_secs == 0 {
            return Err(WalletError::Configuration(
                "kdf timeout must be non-zero".into(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(WalletError::Configuration(format!(
                "LOG_LEVEL must be one of: {:?}",
                valid_levels
            )));
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            return Err(WalletError::Configuration(
                "LOG_FORMAT must be 'json' or 'text'".into(),
            ));
        }

        Ok(())
    }
}

/// 从环境变量获取平台主加密密钥
///
/// 支持两种格式：64字符hex 或恰好32字节原文。
/// 缺失或格式不符视为配置错误，进程不得以弱密钥降级启动。
pub fn load_master_key() -> Result<EncryptionKey, WalletError> {
    let key_str = std::env::var("VAULT_MASTER_KEY")
        .map_err(|_| WalletError::Configuration("VAULT_MASTER_KEY not set".into()))?;

    let bytes: Vec<u8> = if key_str.len() == 64 {
        hex::decode(&key_str)
            .map_err(|_| WalletError::Configuration("VAULT_MASTER_KEY is not valid hex".into()))?
    } else if key_str.len() == 32 {
        key_str.as_bytes().to_vec()
    } else {
        return Err(WalletError::Configuration(
            "VAULT_MASTER_KEY must be 64 hex chars or 32 raw bytes".into(),
        ));
    };

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(EncryptionKey::new(key))
}
