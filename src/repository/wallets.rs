//! 钱包持久化边界
//!
//! 持久化本体（关系库/文档库）是外部协作方，这里只定义
//! 以用户身份为键的 create/read/replace 接口和一个内存实现。
//! 唯一性必须由存储层自身保证，不能只依赖服务层的预检查。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    domain::wallet::WalletRecord, error::WalletError,
    infrastructure::encryption::EncryptedSecret,
};

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// 插入钱包记录；同一用户已有记录时必须失败（WalletAlreadyExists）
    async fn insert(&self, record: WalletRecord) -> Result<(), WalletError>;

    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<WalletRecord>, WalletError>;

    async fn get_by_address(&self, address: &str) -> Result<Option<WalletRecord>, WalletError>;

    /// 整体替换加密秘密（重加密事件替换而非修补）
    async fn replace_secret(
        &self,
        user_id: Uuid,
        secret: EncryptedSecret,
    ) -> Result<(), WalletError>;
}

/// 内存实现（测试与嵌入场景）
#[derive(Default)]
pub struct MemoryWalletStore {
    inner: RwLock<HashMap<Uuid, WalletRecord>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn insert(&self, record: WalletRecord) -> Result<(), WalletError> {
        let mut map = self.inner.write().await;
        if map.contains_key(&record.user_id) {
            return Err(WalletError::WalletAlreadyExists);
        }
        map.insert(record.user_id, record);
        Ok(())
    }

    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<WalletRecord>, WalletError> {
        Ok(self.inner.read().await.get(&user_id).cloned())
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<WalletRecord>, WalletError> {
        let needle = address.to_lowercase();
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|w| w.address.to_lowercase() == needle)
            .cloned())
    }

    async fn replace_secret(
        &self,
        user_id: Uuid,
        secret: EncryptedSecret,
    ) -> Result<(), WalletError> {
        let mut map = self.inner.write().await;
        let record = map.get_mut(&user_id).ok_or(WalletError::WalletNotFound)?;
        record.secret = secret;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::network::NetworkProfile,
        infrastructure::{encryption, secret::EncryptionKey},
    };

    fn sample_record(user_id: Uuid) -> WalletRecord {
        let key = EncryptionKey::new([1u8; 32]);
        let secret = encryption::encrypt(b"phrase", &key).unwrap();
        WalletRecord::new(
            user_id,
            format!("0x{}", hex::encode([user_id.as_bytes()[0]; 20])),
            NetworkProfile::Testnet,
            secret,
        )
    }

    #[tokio::test]
    async fn test_insert_enforces_uniqueness() {
        let store = MemoryWalletStore::new();
        let user_id = Uuid::new_v4();

        store.insert(sample_record(user_id)).await.unwrap();
        let second = store.insert(sample_record(user_id)).await;
        assert!(matches!(second, Err(WalletError::WalletAlreadyExists)));
    }

    #[tokio::test]
    async fn test_lookup_by_address_is_case_insensitive() {
        let store = MemoryWalletStore::new();
        let user_id = Uuid::new_v4();
        let record = sample_record(user_id);
        let address_upper = record.address.to_uppercase().replace("0X", "0x");

        store.insert(record).await.unwrap();
        let found = store.get_by_address(&address_upper).await.unwrap();
        assert_eq!(found.unwrap().user_id, user_id);
    }

    #[tokio::test]
    async fn test_replace_secret_requires_wallet() {
        let store = MemoryWalletStore::new();
        let key = EncryptionKey::new([1u8; 32]);
        let secret = encryption::encrypt(b"phrase", &key).unwrap();

        let missing = store.replace_secret(Uuid::new_v4(), secret).await;
        assert!(matches!(missing, Err(WalletError::WalletNotFound)));
    }
}
