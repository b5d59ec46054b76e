//! 离线交易签名与广播
//!
//! 签名完全离线（EIP-155，显式 chain id），私钥只在调用期间存活。
//! 广播循环每次尝试都重新获取 nonce：nonce 冲突立即重签，
//! 网络错误按指数退避等待，语义错误（数据非法/余额不足）直接失败。

use ethers::{
    core::types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256},
    signers::{LocalWallet, Signer},
    utils::keccak256,
};

use crate::{
    config::RpcConfig,
    error::WalletError,
    infrastructure::{redact::mask_hex, secret::SecretBytes},
    service::rpc_client::{backoff_delay, ChainRpc},
};

/// ERC20 transfer(address,uint256) 函数选择器
const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// 原生转账 gas 上限
const GAS_LIMIT_NATIVE: u64 = 21_000;
/// 合约调用默认 gas 上限（未显式给出时）
const GAS_LIMIT_CONTRACT: u64 = 120_000;

/// 待签名交易
#[derive(Debug, Clone)]
pub struct TxPayload {
    /// 目标地址（原生转账为收款人，合约调用为合约地址）
    pub to: String,
    /// 原生代币数量（wei）
    pub value_wei: u128,
    /// 合约调用数据
    pub data: Option<Vec<u8>>,
    /// gas 上限，缺省按交易类型取默认值
    pub gas_limit: Option<u64>,
}

/// 签名结果
#[derive(Debug, Clone)]
pub struct SignedTx {
    /// RLP 编码的已签名交易（0x 前缀 hex）
    pub raw: String,
    /// 交易哈希（0x 前缀 hex）
    pub hash: String,
}

/// 构造 ERC20 transfer(address,uint256) 调用数据
pub fn erc20_transfer_data(recipient: &str, amount: u128) -> Result<Vec<u8>, WalletError> {
    let address: Address = recipient
        .parse()
        .map_err(|_| WalletError::InvalidAddress(mask_hex(recipient)))?;

    let mut data = Vec::with_capacity(4 + 32 + 32);
    data.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(address.as_bytes());

    let mut amount_be = [0u8; 32];
    U256::from(amount).to_big_endian(&mut amount_be);
    data.extend_from_slice(&amount_be);

    Ok(data)
}

/// 离线签名（EIP-155）
pub fn sign(
    payload: &TxPayload,
    key: &SecretBytes,
    chain_id: u64,
    nonce: u64,
    gas_price: u128,
) -> Result<SignedTx, WalletError> {
    let to: Address = payload
        .to
        .parse()
        .map_err(|_| WalletError::InvalidAddress(mask_hex(&payload.to)))?;

    let wallet = LocalWallet::from_bytes(key.as_slice())
        .map_err(|_| WalletError::KeyDerivationFailed)?
        .with_chain_id(chain_id);

    let gas_limit = payload.gas_limit.unwrap_or(if payload.data.is_some() {
        GAS_LIMIT_CONTRACT
    } else {
        GAS_LIMIT_NATIVE
    });

    let mut request = TransactionRequest::new()
        .to(to)
        .value(U256::from(payload.value_wei))
        .nonce(nonce)
        .gas(gas_limit)
        .gas_price(U256::from(gas_price))
        .chain_id(chain_id);

    if let Some(data) = &payload.data {
        request = request.data(Bytes::from(data.clone()));
    }

    let typed: TypedTransaction = request.into();
    let signature = wallet
        .sign_transaction_sync(&typed)
        .map_err(|_| WalletError::InvalidTransactionData("transaction signing failed".into()))?;

    let raw_bytes = typed.rlp_signed(&signature);
    let hash = keccak256(&raw_bytes);

    Ok(SignedTx {
        raw: format!("0x{}", hex::encode(&raw_bytes)),
        hash: format!("0x{}", hex::encode(hash)),
    })
}

/// 签名并广播，带 nonce 刷新重试
///
/// 每轮尝试都重新查询链上交易计数并用当前 gas price 重签，
/// 因此并发转账遇到的过期 nonce 能在下一轮自愈。
pub async fn sign_and_send(
    rpc: &dyn ChainRpc,
    payload: &TxPayload,
    key: &SecretBytes,
    retry: &RpcConfig,
) -> Result<String, WalletError> {
    let wallet = LocalWallet::from_bytes(key.as_slice())
        .map_err(|_| WalletError::KeyDerivationFailed)?;
    let from = format!("{:#x}", wallet.address());
    let chain_id = rpc.chain_id();

    for attempt in 1..=retry.max_retries {
        let nonce = rpc.transaction_count(&from).await?;
        let gas_price = rpc.gas_price().await?;
        let signed = sign(payload, key, chain_id, nonce, gas_price)?;

        match rpc.broadcast(&signed.raw).await {
            Ok(tx_hash) => {
                tracing::info!(
                    tx_hash = %tx_hash,
                    network = %rpc.network(),
                    nonce = nonce,
                    attempts = attempt,
                    "transaction broadcast successful"
                );
                return Ok(tx_hash);
            }
            Err(e) if e.is_nonce_conflict() && attempt < retry.max_retries => {
                // 立即重新获取 nonce 重签，不等待
                tracing::warn!(
                    attempt = attempt,
                    nonce = nonce,
                    network = %rpc.network(),
                    "stale nonce detected, refreshing and re-signing"
                );
            }
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                tracing::warn!(
                    attempt = attempt,
                    network = %rpc.network(),
                    error = %e,
                    "broadcast attempt failed, backing off"
                );
                tokio::time::sleep(backoff_delay(retry.retry_delay_ms, attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }

    Err(WalletError::NetworkUnavailable(format!(
        "broadcast failed after {} attempts",
        retry.max_retries
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SecretBytes {
        // 固定测试私钥（非生产密钥）
        SecretBytes::new(
            hex::decode("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
                .unwrap(),
        )
    }

    fn native_payload() -> TxPayload {
        TxPayload {
            to: "0x9858effd232b4033e47d90003d41ec34ecaeda94".to_string(),
            value_wei: 1_000_000_000_000_000_000,
            data: None,
            gas_limit: None,
        }
    }

    #[test]
    fn test_sign_is_deterministic() {
        let key = test_key();
        let payload = native_payload();

        let a = sign(&payload, &key, 1, 0, 20_000_000_000).unwrap();
        let b = sign(&payload, &key, 1, 0, 20_000_000_000).unwrap();

        assert_eq!(a.raw, b.raw);
        assert_eq!(a.hash, b.hash);
        assert!(a.raw.starts_with("0x"));
        assert_eq!(a.hash.len(), 66);
    }

    #[test]
    fn test_sign_binds_chain_id() {
        let key = test_key();
        let payload = native_payload();

        let mainnet = sign(&payload, &key, 1, 0, 20_000_000_000).unwrap();
        let testnet = sign(&payload, &key, 11155111, 0, 20_000_000_000).unwrap();

        // EIP-155：不同链的签名不可互相重放
        assert_ne!(mainnet.raw, testnet.raw);
    }

    #[test]
    fn test_sign_rejects_bad_address() {
        let key = test_key();
        let mut payload = native_payload();
        payload.to = "not-an-address".to_string();

        assert!(matches!(
            sign(&payload, &key, 1, 0, 1),
            Err(WalletError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_erc20_transfer_data_layout() {
        let data =
            erc20_transfer_data("0x9858effd232b4033e47d90003d41ec34ecaeda94", 1_000_000).unwrap();

        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &ERC20_TRANSFER_SELECTOR);
        // 地址参数：12字节零填充 + 20字节地址
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(
            hex::encode(&data[16..36]),
            "9858effd232b4033e47d90003d41ec34ecaeda94"
        );
        // 数量参数：32字节大端
        assert_eq!(u128::from_be_bytes(data[52..68].try_into().unwrap()), 1_000_000);
    }

    #[test]
    fn test_erc20_transfer_data_rejects_bad_recipient() {
        assert!(matches!(
            erc20_transfer_data("0x123", 1),
            Err(WalletError::InvalidAddress(_))
        ));
    }
}
