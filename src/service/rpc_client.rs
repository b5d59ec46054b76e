//! JSON-RPC 客户端
//! 支持余额查询、nonce查询、原始交易广播
//!
//! 每个网络一个句柄，启动时从配置构建，之后不可变。
//! 读操作（余额/nonce/gas price）幂等，网络错误时按退避自动重试；
//! 广播不在这里重试，由签名层决定是否刷新 nonce 后重签。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    config::{Config, RpcConfig},
    domain::network::NetworkProfile,
    error::WalletError,
    infrastructure::redact::truncate_payload,
};

/// ERC20 balanceOf(address) 函数选择器
const BALANCE_OF_SELECTOR: &str = "0x70a08231";

/// 退避上限
const MAX_BACKOFF_MS: u64 = 30_000;

/// 指数退避间隔：base * 2^(attempt-1)，封顶 MAX_BACKOFF_MS
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// 链上读写接口（可注入 mock 用于测试）
#[async_trait]
pub trait ChainRpc: Send + Sync {
    fn network(&self) -> NetworkProfile;

    fn chain_id(&self) -> u64;

    /// 获取地址的交易计数（pending nonce 基准）
    async fn transaction_count(&self, address: &str) -> Result<u64, WalletError>;

    async fn gas_price(&self) -> Result<u128, WalletError>;

    /// 原生代币余额（wei）
    async fn native_balance(&self, address: &str) -> Result<u128, WalletError>;

    /// ERC20 代币余额（最小单位）
    async fn token_balance(&self, address: &str, contract: &str) -> Result<u128, WalletError>;

    /// 广播已签名交易，返回交易哈希。不做内部重试。
    async fn broadcast(&self, signed_raw_tx: &str) -> Result<String, WalletError>;
}

/// 单网络 JSON-RPC 客户端
pub struct RpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    chain_id: u64,
    network: NetworkProfile,
    retry: RpcConfig,
}

impl RpcClient {
    pub fn new(
        network: NetworkProfile,
        rpc_url: String,
        chain_id: u64,
        retry: RpcConfig,
    ) -> Result<Self, WalletError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry.request_timeout_secs))
            .connect_timeout(Duration::from_secs(retry.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| WalletError::Configuration(format!("http client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            rpc_url,
            chain_id,
            network,
            retry,
        })
    }

    /// 单次 JSON-RPC 调用，返回 result 字段
    async fn call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| WalletError::NetworkUnavailable(format!("rpc request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::NetworkUnavailable(format!(
                "rpc request failed with status {}",
                status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            WalletError::NetworkUnavailable(format!("rpc response parse failed: {}", e))
        })?;

        // 检查 JSON-RPC 错误
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown rpc error");
            return Err(classify_rpc_error(message));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| WalletError::NetworkUnavailable("missing result field".into()))
    }

    /// 幂等读操作：网络错误按指数退避重试
    async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let mut last_error = WalletError::NetworkUnavailable("rpc retries exhausted".into());

        for attempt in 1..=self.retry.max_retries {
            match self.call(method, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    tracing::warn!(
                        method = method,
                        attempt = attempt,
                        network = %self.network,
                        error = %e,
                        "rpc read attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff_delay(self.retry.retry_delay_ms, attempt)).await;
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl ChainRpc for RpcClient {
    fn network(&self) -> NetworkProfile {
        self.network
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn transaction_count(&self, address: &str) -> Result<u64, WalletError> {
        let result = self
            .call_with_retry("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        parse_hex_u64(result.as_str().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128, WalletError> {
        let result = self.call_with_retry("eth_gasPrice", json!([])).await?;
        parse_hex_u128(result.as_str().unwrap_or_default())
    }

    async fn native_balance(&self, address: &str) -> Result<u128, WalletError> {
        let result = self
            .call_with_retry("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_hex_u128(result.as_str().unwrap_or_default())
    }

    async fn token_balance(&self, address: &str, contract: &str) -> Result<u128, WalletError> {
        // 编码参数：address 右对齐到32字节
        let address_param = format!("{:0>64}", address.trim_start_matches("0x"));
        let data = format!("{}{}", BALANCE_OF_SELECTOR, address_param);

        let result = self
            .call_with_retry(
                "eth_call",
                json!([{ "to": contract, "data": data }, "latest"]),
            )
            .await?;
        parse_hex_u128(result.as_str().unwrap_or_default())
    }

    async fn broadcast(&self, signed_raw_tx: &str) -> Result<String, WalletError> {
        if !signed_raw_tx.starts_with("0x") || signed_raw_tx.len() < 10 {
            return Err(WalletError::InvalidTransactionData(
                "raw transaction must be 0x-prefixed hex".into(),
            ));
        }

        let result = self
            .call("eth_sendRawTransaction", json!([signed_raw_tx]))
            .await?;

        let tx_hash = result
            .as_str()
            .ok_or_else(|| WalletError::NetworkUnavailable("missing result field".into()))?;

        if !tx_hash.starts_with("0x") || tx_hash.len() != 66 {
            return Err(WalletError::NetworkUnavailable(
                "malformed transaction hash in rpc response".into(),
            ));
        }

        Ok(tx_hash.to_string())
    }
}

/// 每网络一个不可变句柄，启动时构建后只读共享
#[derive(Clone)]
pub struct RpcHandles {
    pub mainnet: Arc<dyn ChainRpc>,
    pub testnet: Arc<dyn ChainRpc>,
}

impl RpcHandles {
    pub fn from_config(config: &Config) -> Result<Self, WalletError> {
        let mainnet = RpcClient::new(
            NetworkProfile::Mainnet,
            config.networks.mainnet.rpc_url.clone(),
            config.networks.mainnet.chain_id,
            config.rpc.clone(),
        )?;
        let testnet = RpcClient::new(
            NetworkProfile::Testnet,
            config.networks.testnet.rpc_url.clone(),
            config.networks.testnet.chain_id,
            config.rpc.clone(),
        )?;

        Ok(Self {
            mainnet: Arc::new(mainnet),
            testnet: Arc::new(testnet),
        })
    }

    pub fn get(&self, network: NetworkProfile) -> &Arc<dyn ChainRpc> {
        match network {
            NetworkProfile::Mainnet => &self.mainnet,
            NetworkProfile::Testnet => &self.testnet,
        }
    }
}

/// 按错误文本分类 RPC 错误
///
/// nonce 冲突类错误触发签名层刷新 nonce 重签；
/// 余额不足和其余语义错误不重试。
pub fn classify_rpc_error(message: &str) -> WalletError {
    let lower = message.to_lowercase();

    if lower.contains("nonce too low")
        || lower.contains("already known")
        || lower.contains("replacement transaction underpriced")
    {
        WalletError::NonceConflict
    } else if lower.contains("insufficient funds") {
        WalletError::InsufficientFunds
    } else {
        WalletError::InvalidTransactionData(truncate_payload(message))
    }
}

fn parse_hex_u64(hex_str: &str) -> Result<u64, WalletError> {
    u64::from_str_radix(hex_str.trim_start_matches("0x"), 16)
        .map_err(|_| WalletError::NetworkUnavailable("malformed quantity in rpc response".into()))
}

fn parse_hex_u128(hex_str: &str) -> Result<u128, WalletError> {
    u128::from_str_radix(hex_str.trim_start_matches("0x"), 16)
        .map_err(|_| WalletError::NetworkUnavailable("malformed quantity in rpc response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_nonce_conflicts() {
        for msg in [
            "nonce too low",
            "Nonce too low: next nonce 5, tx nonce 3",
            "already known",
            "replacement transaction underpriced",
        ] {
            assert!(matches!(
                classify_rpc_error(msg),
                WalletError::NonceConflict
            ));
        }
    }

    #[test]
    fn test_classify_insufficient_funds() {
        assert!(matches!(
            classify_rpc_error("insufficient funds for gas * price + value"),
            WalletError::InsufficientFunds
        ));
    }

    #[test]
    fn test_classify_other_errors_not_retryable() {
        let err = classify_rpc_error("execution reverted: ERC20: transfer to the zero address");
        assert!(matches!(err, WalletError::InvalidTransactionData(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_backoff_doubles_per_attempt_with_cap() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(1000, 4), Duration::from_millis(8000));
        // 上限封顶
        assert_eq!(backoff_delay(1000, 10), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(u64::MAX, 2), Duration::from_millis(30_000));
    }

    #[test]
    fn test_parse_hex_quantities() {
        assert_eq!(parse_hex_u64("0x1a").unwrap(), 26);
        assert_eq!(parse_hex_u128("0xde0b6b3a7640000").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert!(parse_hex_u64("not hex").is_err());
        assert!(parse_hex_u128("").is_err());
    }

    #[test]
    fn test_balance_of_call_data_layout() {
        let address = "0x9858effd232b4033e47d90003d41ec34ecaeda94";
        let address_param = format!("{:0>64}", address.trim_start_matches("0x"));
        let data = format!("{}{}", BALANCE_OF_SELECTOR, address_param);

        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x70a08231"));
        assert!(data.ends_with("9858effd232b4033e47d90003d41ec34ecaeda94"));
    }
}
