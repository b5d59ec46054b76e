//! 统一错误类型
//!
//! 按照错误分类处理：验证错误直接返回、密码学错误不降级、
//! 网络错误有界退避重试、余额不足立即上报、配置错误启动即失败。
//! 任何错误消息都不得携带助记词、私钥、密码或派生密钥。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    // ── 验证类（不重试）──
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid transaction data: {0}")]
    InvalidTransactionData(String),
    #[error("invalid share: {0}")]
    InvalidShare(String),

    // ── 密码学类（对当前操作致命，绝不降级）──
    #[error("secure entropy source unavailable")]
    EntropySourceUnavailable,
    #[error("invalid mnemonic: checksum validation failed")]
    InvalidMnemonic,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed: authentication tag rejected")]
    DecryptionFailed,
    #[error("key derivation failed")]
    KeyDerivationFailed,
    #[error("share reconstruction ambiguous: checksum mismatch or insufficient shares")]
    AmbiguousReconstruction,

    // ── 网络类（有界退避可重试）──
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("key derivation timed out")]
    KeyDerivationTimeout,

    // ── 业务类 ──
    #[error("insufficient funds for transaction")]
    InsufficientFunds,
    #[error("nonce conflict: stale account nonce")]
    NonceConflict,
    #[error("wallet already exists for user")]
    WalletAlreadyExists,
    #[error("wallet not found")]
    WalletNotFound,

    // ── 配置/存储类 ──
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl WalletError {
    /// 判断错误是否可安全重试
    ///
    /// 只有网络抖动和KDF超时可以重试；密码学失败、余额不足、
    /// 验证失败一律直接上报，避免掩盖真实故障。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::NetworkUnavailable(_) | WalletError::KeyDerivationTimeout
        )
    }

    /// nonce 冲突：不走普通退避，由签名器重新拉取 nonce 后立即重试
    pub fn is_nonce_conflict(&self) -> bool {
        matches!(self, WalletError::NonceConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WalletError::NetworkUnavailable("timeout".into()).is_retryable());
        assert!(WalletError::KeyDerivationTimeout.is_retryable());

        assert!(!WalletError::DecryptionFailed.is_retryable());
        assert!(!WalletError::InsufficientFunds.is_retryable());
        assert!(!WalletError::InvalidMnemonic.is_retryable());
        assert!(!WalletError::WalletAlreadyExists.is_retryable());
    }

    #[test]
    fn test_messages_carry_no_secret_fields() {
        // 密码学错误的 Display 输出是固定文案，不包含任何载荷
        assert_eq!(
            WalletError::DecryptionFailed.to_string(),
            "decryption failed: authentication tag rejected"
        );
        assert_eq!(
            WalletError::InvalidMnemonic.to_string(),
            "invalid mnemonic: checksum validation failed"
        );
    }
}
