//! 同链代币交换聚合器集成
//!
//! 聚合器只负责给出交易数据（to/data/value），
//! 签名和广播仍走本地签名器，私钥绝不离开进程。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    config::{RpcConfig, SwapConfig},
    error::WalletError,
    infrastructure::redact::truncate_payload,
};

/// 默认滑点（百分比）
pub const DEFAULT_SLIPPAGE_PERCENT: f64 = 1.0;

/// 聚合器返回的待签交易数据
#[derive(Debug, Clone, Deserialize)]
pub struct SwapTxData {
    pub to: String,
    pub data: String,
    /// 原生代币数量（十进制 wei 字符串）
    pub value: String,
    pub gas: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    tx: SwapTxData,
}

/// 交换报价接口（可注入 mock 用于测试）
#[async_trait]
pub trait SwapApi: Send + Sync {
    async fn swap_tx(
        &self,
        chain_id: u64,
        from_token: &str,
        to_token: &str,
        amount: u128,
        from_address: &str,
        slippage: f64,
    ) -> Result<SwapTxData, WalletError>;
}

/// 聚合器 HTTP 客户端
pub struct AggregatorClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl AggregatorClient {
    pub fn new(config: &SwapConfig, rpc: &RpcConfig) -> Result<Self, WalletError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(rpc.request_timeout_secs))
            .connect_timeout(Duration::from_secs(rpc.connect_timeout_secs))
            .build()
            .map_err(|e| WalletError::Configuration(format!("http client build failed: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SwapApi for AggregatorClient {
    async fn swap_tx(
        &self,
        chain_id: u64,
        from_token: &str,
        to_token: &str,
        amount: u128,
        from_address: &str,
        slippage: f64,
    ) -> Result<SwapTxData, WalletError> {
        let url = format!("{}/{}/swap", self.api_url, chain_id);
        let amount_str = amount.to_string();
        let slippage_str = slippage.to_string();

        let mut request = self.client.get(&url).query(&[
            ("src", from_token),
            ("dst", to_token),
            ("amount", amount_str.as_str()),
            ("from", from_address),
            ("slippage", slippage_str.as_str()),
            ("disableEstimate", "true"),
        ]);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            WalletError::NetworkUnavailable(format!("swap api request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 4xx 是请求语义错误，不重试；5xx 视为网络问题
            if status.is_client_error() {
                return Err(WalletError::InvalidTransactionData(format!(
                    "swap api rejected request ({}): {}",
                    status,
                    truncate_payload(&body)
                )));
            }
            return Err(WalletError::NetworkUnavailable(format!(
                "swap api returned status {}",
                status
            )));
        }

        let data: SwapResponse = response.json().await.map_err(|e| {
            WalletError::NetworkUnavailable(format!("swap api response parse failed: {}", e))
        })?;

        Ok(data.tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_response_parsing() {
        let body = r#"{
            "toAmount": "995000",
            "tx": {
                "from": "0x1111111111111111111111111111111111111111",
                "to": "0x1inchrouter00000000000000000000000000000",
                "data": "0x12345678",
                "value": "1000000000000000000",
                "gas": 180000
            }
        }"#;

        let parsed: SwapResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.tx.value, "1000000000000000000");
        assert_eq!(parsed.tx.gas, Some(180000));
        assert!(parsed.tx.data.starts_with("0x"));
    }

    #[test]
    fn test_swap_response_without_gas() {
        let body = r#"{"tx": {"to": "0xabc", "data": "0x", "value": "0"}}"#;
        let parsed: SwapResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.tx.gas, None);
    }
}
