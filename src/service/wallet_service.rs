//! 钱包服务：对外操作入口
//!
//! 创建、转账、交换、查询余额、备份、恢复、密钥轮换、加密导出。
//! 所有操作显式指定网络环境；助记词和私钥只在单次调用内存活，
//! 用毕随 ZeroizeOnDrop 清零。

use std::sync::Arc;

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    config::{Config, KdfConfig, RpcConfig, TokenConfig},
    domain::{
        derivation::{self, DerivedAccount},
        mnemonic::{self, MnemonicPhrase},
        network::NetworkProfile,
        wallet::{BalanceReport, TokenBalance, WalletRecord},
    },
    error::WalletError,
    infrastructure::{
        encryption::{self, EncryptedSecret},
        kdf,
        secret::EncryptionKey,
        sharding::{self, Share},
    },
    repository::wallets::WalletStore,
    service::{
        rpc_client::RpcHandles,
        signer::{self, TxPayload},
        swap::{SwapApi, DEFAULT_SLIPPAGE_PERCENT},
    },
};

/// 默认分片参数：5片中任意3片可恢复
pub const DEFAULT_SHARE_TOTAL: u8 = 5;
pub const DEFAULT_SHARE_THRESHOLD: u8 = 3;

/// 创建结果
#[derive(Debug, Clone)]
pub struct WalletCreated {
    pub user_id: Uuid,
    pub address: String,
    pub network: NetworkProfile,
}

/// 恢复结果
#[derive(Debug, Clone)]
pub struct WalletRecovered {
    pub user_id: Uuid,
    pub address: String,
}

pub struct WalletService {
    store: Arc<dyn WalletStore>,
    rpc: RpcHandles,
    swap_api: Arc<dyn SwapApi>,
    master_key: EncryptionKey,
    kdf: KdfConfig,
    retry: RpcConfig,
    tokens: Vec<TokenConfig>,
}

impl WalletService {
    pub fn new(
        store: Arc<dyn WalletStore>,
        rpc: RpcHandles,
        swap_api: Arc<dyn SwapApi>,
        master_key: EncryptionKey,
        config: &Config,
    ) -> Self {
        Self {
            store,
            rpc,
            swap_api,
            master_key,
            kdf: config.kdf.clone(),
            retry: config.rpc.clone(),
            tokens: config.tokens.clone(),
        }
    }

    /// 创建钱包
    ///
    /// 生成助记词 → 派生地址 → 主密钥加密 → 与钱包记录一并落库。
    /// 同一用户重复创建返回 WalletAlreadyExists（存储层唯一性兜底）。
    pub async fn create_wallet(
        &self,
        user_id: Uuid,
        network: NetworkProfile,
    ) -> Result<WalletCreated, WalletError> {
        // 预检查只是快速失败路径，权威判定在 store.insert
        if self.store.get_by_user(user_id).await?.is_some() {
            return Err(WalletError::WalletAlreadyExists);
        }

        let phrase = mnemonic::generate_default()?;
        let account = derivation::derive_account(&phrase)?;
        let secret = encryption::encrypt(phrase.as_str().as_bytes(), &self.master_key)?;

        let record = WalletRecord::new(user_id, account.address.clone(), network, secret);
        self.store.insert(record).await?;

        tracing::info!(
            user_id = %user_id,
            address = %account.address,
            network = %network,
            "wallet created"
        );

        Ok(WalletCreated {
            user_id,
            address: account.address,
            network,
        })
    }

    /// 转账（原生代币或 ERC20）
    ///
    /// token 为 None 时转原生代币；Some(contract) 时构造
    /// transfer(address,uint256) 调用数据发给代币合约。
    pub async fn transfer(
        &self,
        user_id: Uuid,
        destination: &str,
        amount_wei: u128,
        token: Option<&str>,
    ) -> Result<String, WalletError> {
        if amount_wei == 0 {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }

        let record = self.require_wallet(user_id).await?;
        let account = self.open_account(&record)?;

        let payload = match token {
            None => TxPayload {
                to: destination.to_string(),
                value_wei: amount_wei,
                data: None,
                gas_limit: None,
            },
            Some(contract) => TxPayload {
                to: contract.to_string(),
                value_wei: 0,
                data: Some(signer::erc20_transfer_data(destination, amount_wei)?),
                gas_limit: None,
            },
        };

        let rpc = self.rpc.get(record.network);
        let tx_hash =
            signer::sign_and_send(rpc.as_ref(), &payload, &account.private_key, &self.retry)
                .await?;

        tracing::info!(
            user_id = %user_id,
            tx_hash = %tx_hash,
            network = %record.network,
            token = token.is_some(),
            "transfer submitted"
        );

        Ok(tx_hash)
    }

    /// 同链代币交换
    ///
    /// 聚合器给出交易数据，本地签名广播。
    pub async fn swap(
        &self,
        user_id: Uuid,
        from_token: &str,
        to_token: &str,
        amount: u128,
    ) -> Result<String, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".into(),
            ));
        }

        let record = self.require_wallet(user_id).await?;
        let rpc = self.rpc.get(record.network);

        let swap_tx = self
            .swap_api
            .swap_tx(
                rpc.chain_id(),
                from_token,
                to_token,
                amount,
                &record.address,
                DEFAULT_SLIPPAGE_PERCENT,
            )
            .await?;

        let value_wei = swap_tx.value.parse::<u128>().map_err(|_| {
            WalletError::InvalidTransactionData("aggregator returned malformed value".into())
        })?;
        let data = hex::decode(swap_tx.data.trim_start_matches("0x")).map_err(|_| {
            WalletError::InvalidTransactionData("aggregator returned malformed calldata".into())
        })?;

        let payload = TxPayload {
            to: swap_tx.to,
            value_wei,
            data: Some(data),
            gas_limit: swap_tx.gas,
        };

        let account = self.open_account(&record)?;
        let tx_hash =
            signer::sign_and_send(rpc.as_ref(), &payload, &account.private_key, &self.retry)
                .await?;

        tracing::info!(
            user_id = %user_id,
            tx_hash = %tx_hash,
            network = %record.network,
            "swap submitted"
        );

        Ok(tx_hash)
    }

    /// 查询余额（原生代币 + 配置内该网络的全部代币）
    pub async fn get_balance(&self, user_id: Uuid) -> Result<BalanceReport, WalletError> {
        let record = self.require_wallet(user_id).await?;
        let rpc = self.rpc.get(record.network);

        let native = rpc.native_balance(&record.address).await?;

        let mut tokens = Vec::new();
        for token in self
            .tokens
            .iter()
            .filter(|t| t.network.eq_ignore_ascii_case(record.network.as_str()))
        {
            let balance = rpc.token_balance(&record.address, &token.contract).await?;
            tokens.push(TokenBalance {
                symbol: token.symbol.clone(),
                contract: token.contract.clone(),
                balance,
                decimals: token.decimals,
            });
        }

        Ok(BalanceReport {
            address: record.address,
            network: record.network,
            native,
            tokens,
        })
    }

    /// 备份钱包：解密助记词并做门限分片（默认3/5）
    ///
    /// 分片只在返回值中存在，分发策略由调用方决定；
    /// 明文助记词在分片完成后立即清零。
    pub async fn backup_wallet(&self, user_id: Uuid) -> Result<Vec<Share>, WalletError> {
        self.backup_wallet_with(user_id, DEFAULT_SHARE_TOTAL, DEFAULT_SHARE_THRESHOLD)
            .await
    }

    pub async fn backup_wallet_with(
        &self,
        user_id: Uuid,
        total: u8,
        threshold: u8,
    ) -> Result<Vec<Share>, WalletError> {
        let record = self.require_wallet(user_id).await?;
        let plain = encryption::decrypt(&record.secret, &self.master_key)?;
        let shares = sharding::split(plain.as_slice(), total, threshold)?;

        tracing::info!(
            user_id = %user_id,
            total = total,
            threshold = threshold,
            "wallet backup shares generated"
        );

        Ok(shares)
    }

    /// 从分片恢复钱包
    ///
    /// 重建 → 助记词校验 → 派生地址定位钱包 → 新随机数重加密替换存储。
    /// 地址无对应钱包时返回 WalletNotFound。
    pub async fn recover_wallet(&self, shares: &[Share]) -> Result<WalletRecovered, WalletError> {
        let plain = sharding::reconstruct(shares)?;
        let phrase_str = Zeroizing::new(
            String::from_utf8(plain.as_slice().to_vec())
                .map_err(|_| WalletError::InvalidMnemonic)?,
        );
        let phrase = MnemonicPhrase::parse(&phrase_str)?;
        let account = derivation::derive_account(&phrase)?;

        let record = self
            .store
            .get_by_address(&account.address)
            .await?
            .ok_or(WalletError::WalletNotFound)?;

        let fresh = encryption::encrypt(phrase.as_str().as_bytes(), &self.master_key)?;
        self.store.replace_secret(record.user_id, fresh).await?;

        tracing::info!(
            user_id = %record.user_id,
            address = %account.address,
            "wallet recovered from shares"
        );

        Ok(WalletRecovered {
            user_id: record.user_id,
            address: account.address,
        })
    }

    /// 主密钥轮换（单钱包）
    ///
    /// 旧密钥解密 → 新密钥重加密 → 整体替换存储的加密秘密。
    /// 全量轮换由调用方遍历用户逐个执行。
    pub async fn rotate_master_key(
        &self,
        user_id: Uuid,
        old_key: &EncryptionKey,
        new_key: &EncryptionKey,
    ) -> Result<(), WalletError> {
        let record = self.require_wallet(user_id).await?;
        let plain = encryption::decrypt(&record.secret, old_key)?;
        let fresh = encryption::encrypt(plain.as_slice(), new_key)?;
        self.store.replace_secret(user_id, fresh).await?;

        tracing::info!(user_id = %user_id, "wallet secret re-encrypted under new master key");
        Ok(())
    }

    /// 导出用户口令加密的备份包
    ///
    /// Argon2id 从口令派生密钥（盐随包携带），包内是助记词密文。
    /// 用户持有包 + 口令即可在外部恢复，平台主密钥不参与解包。
    pub async fn export_encrypted(
        &self,
        user_id: Uuid,
        password: &str,
    ) -> Result<EncryptedSecret, WalletError> {
        let record = self.require_wallet(user_id).await?;
        let plain = encryption::decrypt(&record.secret, &self.master_key)?;

        let (derived_key, salt) =
            kdf::derive_key_async(password.to_string(), None, self.kdf.clone()).await?;

        let mut bundle = encryption::encrypt(plain.as_slice(), &derived_key)?;
        bundle.salt = Some(salt);

        tracing::info!(user_id = %user_id, "password-encrypted backup exported");
        Ok(bundle)
    }

    async fn require_wallet(&self, user_id: Uuid) -> Result<WalletRecord, WalletError> {
        self.store
            .get_by_user(user_id)
            .await?
            .ok_or(WalletError::WalletNotFound)
    }

    /// 解密存储的助记词并派生签名账户
    fn open_account(&self, record: &WalletRecord) -> Result<DerivedAccount, WalletError> {
        let plain = encryption::decrypt(&record.secret, &self.master_key)?;
        let phrase_str = Zeroizing::new(
            String::from_utf8(plain.as_slice().to_vec())
                .map_err(|_| WalletError::InvalidMnemonic)?,
        );
        let phrase = MnemonicPhrase::parse(&phrase_str)?;
        derivation::derive_account(&phrase)
    }
}
