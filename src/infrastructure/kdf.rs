//! 密码派生密钥模块
//! 使用 Argon2id（内存硬）从用户密码派生加密密钥
//!
//! 同一密码 + 同一盐值必须派生出完全相同的密钥（用于后续验证）；
//! 未提供盐值时生成全新的 CSPRNG 盐值。
//! 派生是刻意昂贵的 CPU/内存操作，异步入口走阻塞线程池并带超时，
//! 绝不在请求处理线程上同步执行。

use std::time::Duration;

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::{
    config::KdfConfig,
    error::WalletError,
    infrastructure::secret::EncryptionKey,
};

/// 盐值长度（字节）
pub const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// 从密码派生加密密钥
///
/// # Arguments
/// * `password` - 用户密码
/// * `salt` - 盐值（如果为None，将生成随机盐值）
/// * `config` - Argon2id 参数
///
/// # Returns
/// 返回 (密钥, 盐值) 元组
pub fn derive_key_from_password(
    password: &str,
    salt: Option<&[u8]>,
    config: &KdfConfig,
) -> Result<(EncryptionKey, Vec<u8>), WalletError> {
    let salt_bytes = match salt {
        Some(s) => {
            if s.len() != SALT_LEN {
                return Err(WalletError::InvalidTransactionData(format!(
                    "salt must be {} bytes",
                    SALT_LEN
                )));
            }
            s.to_vec()
        }
        None => {
            let mut fresh = vec![0u8; SALT_LEN];
            rand::rngs::OsRng
                .try_fill_bytes(&mut fresh)
                .map_err(|_| WalletError::EntropySourceUnavailable)?;
            fresh
        }
    };

    let params = Params::new(
        config.memory_kib,
        config.iterations,
        config.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|_| WalletError::KeyDerivationFailed)?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), &salt_bytes, &mut key)
        .map_err(|_| WalletError::KeyDerivationFailed)?;

    Ok((EncryptionKey::new(key), salt_bytes))
}

/// 异步密钥派生（阻塞线程池 + 显式超时）
///
/// 超时返回可重试的 KeyDerivationTimeout，调用方不会被无限挂起。
pub async fn derive_key_async(
    password: String,
    salt: Option<Vec<u8>>,
    config: KdfConfig,
) -> Result<(EncryptionKey, Vec<u8>), WalletError> {
    let timeout = Duration::from_secs(config.timeout_secs);

    let task = tokio::task::spawn_blocking(move || {
        derive_key_from_password(&password, salt.as_deref(), &config)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.map_err(|_| WalletError::KeyDerivationFailed)?,
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "KDF exceeded timeout");
            Err(WalletError::KeyDerivationTimeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> KdfConfig {
        // 测试参数：保持确定性语义的最低开销
        KdfConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_same_password_same_salt_is_deterministic() {
        let cfg = fast_config();
        let salt = [7u8; SALT_LEN];

        let (k1, s1) = derive_key_from_password("hunter2", Some(&salt), &cfg).unwrap();
        let (k2, s2) = derive_key_from_password("hunter2", Some(&salt), &cfg).unwrap();

        assert_eq!(k1.as_slice(), k2.as_slice());
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_different_salt_different_key() {
        let cfg = fast_config();

        let (k1, _) = derive_key_from_password("hunter2", Some(&[1u8; SALT_LEN]), &cfg).unwrap();
        let (k2, _) = derive_key_from_password("hunter2", Some(&[2u8; SALT_LEN]), &cfg).unwrap();

        assert_ne!(k1.as_slice(), k2.as_slice());
    }

    #[test]
    fn test_missing_salt_generates_fresh_one() {
        let cfg = fast_config();

        let (_, s1) = derive_key_from_password("hunter2", None, &cfg).unwrap();
        let (_, s2) = derive_key_from_password("hunter2", None, &cfg).unwrap();

        assert_eq!(s1.len(), SALT_LEN);
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_wrong_salt_length_rejected() {
        let cfg = fast_config();
        assert!(derive_key_from_password("hunter2", Some(&[0u8; 8]), &cfg).is_err());
    }

    #[tokio::test]
    async fn test_async_derivation_matches_sync() {
        let cfg = fast_config();
        let salt = vec![9u8; SALT_LEN];

        let (sync_key, _) = derive_key_from_password("pw", Some(&salt), &cfg).unwrap();
        let (async_key, _) = derive_key_async("pw".into(), Some(salt), cfg).await.unwrap();

        assert_eq!(sync_key.as_slice(), async_key.as_slice());
    }
}
