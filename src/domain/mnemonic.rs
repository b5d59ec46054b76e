//! 助记词生成模块
//!
//! 熵只来自操作系统 CSPRNG。熵源不可用时直接失败
//! （EntropySourceUnavailable），绝不静默退回弱随机源。

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::WalletError;

/// 默认熵位数
pub const DEFAULT_ENTROPY_BITS: usize = 256;

/// BIP-39 支持的熵位数
const SUPPORTED_ENTROPY_BITS: [usize; 5] = [128, 160, 192, 224, 256];

/// 助记词短语（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MnemonicPhrase {
    phrase: String,
}

impl MnemonicPhrase {
    /// 解析并验证外部输入的助记词
    ///
    /// 校验和不通过时返回 InvalidMnemonic，不会用畸形输入继续派生。
    pub fn parse(phrase: &str) -> Result<Self, WalletError> {
        Mnemonic::parse_in(Language::English, phrase)
            .map_err(|_| WalletError::InvalidMnemonic)?;
        Ok(Self {
            phrase: phrase.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split_whitespace().count()
    }

    /// 生成 BIP-39 种子（空口令）
    pub(crate) fn to_seed(&self) -> Result<Zeroizing<[u8; 64]>, WalletError> {
        let mnemonic = Mnemonic::parse_in(Language::English, &self.phrase)
            .map_err(|_| WalletError::InvalidMnemonic)?;
        Ok(Zeroizing::new(mnemonic.to_seed("")))
    }
}

impl std::fmt::Debug for MnemonicPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MnemonicPhrase(words={})", self.word_count())
    }
}

/// 生成助记词
///
/// # Arguments
/// * `entropy_bits` - 熵位数（128/160/192/224/256）
pub fn generate(entropy_bits: usize) -> Result<MnemonicPhrase, WalletError> {
    if !SUPPORTED_ENTROPY_BITS.contains(&entropy_bits) {
        return Err(WalletError::InvalidTransactionData(format!(
            "unsupported entropy size: {} bits",
            entropy_bits
        )));
    }

    let mut entropy = Zeroizing::new(vec![0u8; entropy_bits / 8]);
    rand::rngs::OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|_| WalletError::EntropySourceUnavailable)?;

    let mnemonic =
        Mnemonic::from_entropy(&entropy).map_err(|_| WalletError::KeyDerivationFailed)?;

    Ok(MnemonicPhrase {
        phrase: mnemonic.to_string(),
    })
}

/// 使用默认熵位数生成助记词
pub fn generate_default() -> Result<MnemonicPhrase, WalletError> {
    generate(DEFAULT_ENTROPY_BITS)
}
