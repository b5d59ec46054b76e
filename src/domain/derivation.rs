//! 分层确定性密钥派生
//!
//! 纯函数：同一助记词 + 固定派生路径永远得到同一地址和私钥。
//! 派生路径是版本化常量，不接受用户输入，保证恢复流程可复现。

use coins_bip32::path::DerivationPath;

use crate::{
    domain::mnemonic::MnemonicPhrase,
    error::WalletError,
    infrastructure::secret::SecretBytes,
};

/// 固定派生路径（BIP-44 以太坊账户0）
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// 派生方案版本，路径变更时必须递增
pub const DERIVATION_SCHEME_VERSION: u32 = 1;

/// 派生结果
pub struct DerivedAccount {
    /// 地址（0x 前缀小写 hex）
    pub address: String,
    /// 公钥（未压缩，去掉 0x04 前缀后的 hex）
    pub public_key: String,
    /// 私钥（仅存在于内存，用毕即清零）
    pub private_key: SecretBytes,
}

impl std::fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 私钥绝不进入 Debug 输出
        f.debug_struct("DerivedAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// 从助记词派生账户
///
/// 助记词校验和在 MnemonicPhrase 构造时已验证；
/// 这里再经 BIP-39 种子 → BIP-32 派生 → Keccak-256 地址。
pub fn derive_account(phrase: &MnemonicPhrase) -> Result<DerivedAccount, WalletError> {
    use coins_bip32::prelude::*;
    use k256::ecdsa::SigningKey;
    use sha3::{Digest, Keccak256};

    let seed = phrase.to_seed()?;

    let derivation_path = DERIVATION_PATH
        .parse::<DerivationPath>()
        .map_err(|_| WalletError::KeyDerivationFailed)?;

    let master_key = XPriv::root_from_seed(seed.as_ref(), None)
        .map_err(|_| WalletError::KeyDerivationFailed)?;

    let derived_key = master_key
        .derive_path(&derivation_path)
        .map_err(|_| WalletError::KeyDerivationFailed)?;

    // XPriv 实现 AsRef<SigningKey>
    let signing_key: &SigningKey = derived_key.as_ref();
    let private_key_bytes = signing_key.to_bytes();

    let verifying_key = signing_key.verifying_key();
    let public_key_point = verifying_key.to_encoded_point(false); // 未压缩格式
    let public_key_slice = &public_key_point.as_bytes()[1..]; // 去掉 0x04 前缀

    // Keccak256 哈希取后20字节
    let hash = Keccak256::digest(public_key_slice);
    let address = format!("0x{}", hex::encode(&hash[12..]));

    Ok(DerivedAccount {
        address,
        public_key: hex::encode(public_key_slice),
        private_key: SecretBytes::new(private_key_bytes.to_vec()),
    })
}
