//! AES-256-GCM 加密/解密模块
//! 用于敏感数据加密存储
//!
//! 认证加密：tag 校验失败一律返回 DecryptionFailed，
//! 绝不把损坏的明文交还给调用方。

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::WalletError,
    infrastructure::secret::{EncryptionKey, SecretBytes},
};

/// 密文标识算法常量
pub const ALGORITHM_AES_256_GCM: &str = "aes-256-gcm";

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// 加密后的秘密记录
///
/// 与 Wallet 共同创建、共同存在；盐值仅在密码派生密钥场景下出现。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub algorithm: String,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<Vec<u8>>,
}

/// 加密数据
///
/// # Arguments
/// * `plaintext` - 要加密的原始数据
/// * `key` - 32字节加密密钥
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<EncryptedSecret, WalletError> {
    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| WalletError::EncryptionFailed)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // aes-gcm 输出 ciphertext || tag，按存储模型拆开保存
    let mut sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| WalletError::EncryptionFailed)?;

    if sealed.len() < TAG_LEN {
        return Err(WalletError::EncryptionFailed);
    }
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(EncryptedSecret {
        algorithm: ALGORITHM_AES_256_GCM.to_string(),
        iv: nonce.to_vec(),
        tag,
        data: sealed,
        salt: None,
    })
}

/// 解密数据
///
/// 密文、IV、tag 任意一个字节被篡改都会在 tag 校验处失败。
pub fn decrypt(bundle: &EncryptedSecret, key: &EncryptionKey) -> Result<SecretBytes, WalletError> {
    if bundle.algorithm != ALGORITHM_AES_256_GCM {
        return Err(WalletError::DecryptionFailed);
    }
    if bundle.iv.len() != IV_LEN || bundle.tag.len() != TAG_LEN {
        return Err(WalletError::DecryptionFailed);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| WalletError::DecryptionFailed)?;

    let nonce = Nonce::from_slice(&bundle.iv);

    let mut sealed = Vec::with_capacity(bundle.data.len() + TAG_LEN);
    sealed.extend_from_slice(&bundle.data);
    sealed.extend_from_slice(&bundle.tag);

    let plaintext = cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| WalletError::DecryptionFailed)?;

    Ok(SecretBytes::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey::new(*b"01234567890123456789012345678901")
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let data = b"abandon ability able about above absent absorb abstract";

        let bundle = encrypt(data, &test_key()).unwrap();
        assert_eq!(bundle.algorithm, ALGORITHM_AES_256_GCM);
        assert_eq!(bundle.iv.len(), 12);
        assert_eq!(bundle.tag.len(), 16);
        assert_ne!(bundle.data.as_slice(), data.as_slice());

        let plaintext = decrypt(&bundle, &test_key()).unwrap();
        assert_eq!(plaintext.as_slice(), data);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let bundle = encrypt(b"seed material", &test_key()).unwrap();

        // 逐字节、逐比特翻转密文，每一种篡改都必须被拒绝
        for byte_idx in 0..bundle.data.len() {
            for bit in 0..8 {
                let mut tampered = bundle.clone();
                tampered.data[byte_idx] ^= 1 << bit;
                assert!(matches!(
                    decrypt(&tampered, &test_key()),
                    Err(WalletError::DecryptionFailed)
                ));
            }
        }
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let bundle = encrypt(b"seed material", &test_key()).unwrap();

        for byte_idx in 0..bundle.tag.len() {
            let mut tampered = bundle.clone();
            tampered.tag[byte_idx] ^= 0x01;
            assert!(matches!(
                decrypt(&tampered, &test_key()),
                Err(WalletError::DecryptionFailed)
            ));
        }
    }

    #[test]
    fn test_tampered_iv_rejected() {
        let bundle = encrypt(b"seed material", &test_key()).unwrap();

        let mut tampered = bundle.clone();
        tampered.iv[0] ^= 0x80;
        assert!(matches!(
            decrypt(&tampered, &test_key()),
            Err(WalletError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let bundle = encrypt(b"seed material", &test_key()).unwrap();
        let wrong = EncryptionKey::new([0x42; 32]);
        assert!(matches!(
            decrypt(&bundle, &wrong),
            Err(WalletError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_each_encryption_uses_fresh_iv() {
        let a = encrypt(b"same plaintext", &test_key()).unwrap();
        let b = encrypt(b"same plaintext", &test_key()).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }
}
