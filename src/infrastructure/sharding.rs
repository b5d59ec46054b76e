//! 门限秘密分片模块（Shamir Secret Sharing）
//!
//! 在 GF(256)（AES 不可约多项式）上做逐字节多项式分片：
//! T-of-N 门限，任意 T 份分片可逐字节精确还原原始秘密，
//! 少于 T 份在信息论意义上不泄露任何内容。
//!
//! 分片前会在秘密尾部附加 SHA-256 校验和，重建后以恒定时间比较校验；
//! 校验失败（分片被篡改或互不一致）返回 AmbiguousReconstruction，
//! 绝不把"看起来像"的错误秘密交还给调用方。

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{error::WalletError, infrastructure::secret::SecretBytes};

const CHECKSUM_LEN: usize = 32;

/// 单份分片
///
/// 短生命周期产物：按需生成交付备份/恢复流程，核心自身不长期保存。
/// 分发与存放策略（平台持有还是用户持有）是外部决策。
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// 分片编号（多项式求值点 x，1..=total，不允许为0）
    pub index: u8,
    /// 重建门限 T
    pub threshold: u8,
    /// 分片总数 N
    pub total: u8,
    data: Vec<u8>,
}

impl Share {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 文本编码：`index:threshold:total:hex`
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.index,
            self.threshold,
            self.total,
            hex::encode(&self.data)
        )
    }

    pub fn decode(s: &str) -> Result<Self, WalletError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(WalletError::InvalidShare(
                "expected format index:threshold:total:hex".into(),
            ));
        }
        let index: u8 = parts[0]
            .parse()
            .map_err(|_| WalletError::InvalidShare("invalid index".into()))?;
        let threshold: u8 = parts[1]
            .parse()
            .map_err(|_| WalletError::InvalidShare("invalid threshold".into()))?;
        let total: u8 = parts[2]
            .parse()
            .map_err(|_| WalletError::InvalidShare("invalid total".into()))?;
        let data =
            hex::decode(parts[3]).map_err(|_| WalletError::InvalidShare("invalid hex".into()))?;

        Ok(Self {
            index,
            threshold,
            total,
            data,
        })
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Share(index={}, threshold={}, total={}, len={})",
            self.index,
            self.threshold,
            self.total,
            self.data.len()
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GF(256) 运算
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn gf256_mul(a: u8, b: u8) -> u8 {
    let mut result: u16 = 0;
    let mut a = a as u16;
    let mut b = b as u16;

    for _ in 0..8 {
        if b & 1 != 0 {
            result ^= a;
        }
        let hi_bit = a & 0x80;
        a <<= 1;
        if hi_bit != 0 {
            a ^= 0x1B; // AES 不可约多项式
        }
        b >>= 1;
    }

    result as u8
}

fn gf256_inv(a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    // 费马小定理：a^(-1) = a^254
    let mut result = a;
    for _ in 0..6 {
        result = gf256_mul(result, result);
        result = gf256_mul(result, a);
    }
    gf256_mul(result, result)
}

/// Horner 法求多项式在 x 处的值，coeffs[0] 为常数项
fn poly_eval(coeffs: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &c in coeffs.iter().rev() {
        acc = gf256_mul(acc, x) ^ c;
    }
    acc
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 分片 / 重建
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 将秘密分为 N 份，门限 T
///
/// 每个字节独立生成一条 T-1 次随机多项式（系数来自 CSPRNG），
/// 常数项即秘密字节，在 x=1..=N 处求值得到分片。
pub fn split(secret: &[u8], total: u8, threshold: u8) -> Result<Vec<Share>, WalletError> {
    if secret.is_empty() {
        return Err(WalletError::InvalidShare("secret must not be empty".into()));
    }
    if threshold < 2 {
        return Err(WalletError::InvalidShare("threshold must be at least 2".into()));
    }
    if total < threshold {
        return Err(WalletError::InvalidShare(
            "total shares must be >= threshold".into(),
        ));
    }

    // 附加校验和，重建时据此判定分片一致性
    let mut payload = Zeroizing::new(secret.to_vec());
    let checksum = Sha256::digest(secret);
    payload.extend_from_slice(&checksum);

    // 每个载荷字节需要 T-1 个随机系数
    let coeff_count = (threshold as usize - 1) * payload.len();
    let mut random_coeffs = Zeroizing::new(vec![0u8; coeff_count]);
    rand::rngs::OsRng
        .try_fill_bytes(&mut random_coeffs)
        .map_err(|_| WalletError::EntropySourceUnavailable)?;

    let mut share_data: Vec<Vec<u8>> = (0..total)
        .map(|_| Vec::with_capacity(payload.len()))
        .collect();

    let mut coeffs = Zeroizing::new(vec![0u8; threshold as usize]);
    for (byte_idx, &byte) in payload.iter().enumerate() {
        coeffs[0] = byte;
        let offset = byte_idx * (threshold as usize - 1);
        coeffs[1..].copy_from_slice(&random_coeffs[offset..offset + threshold as usize - 1]);

        for (i, data) in share_data.iter_mut().enumerate() {
            data.push(poly_eval(&coeffs, (i + 1) as u8));
        }
    }

    Ok(share_data
        .into_iter()
        .enumerate()
        .map(|(i, data)| Share {
            index: (i + 1) as u8,
            threshold,
            total,
            data,
        })
        .collect())
}

/// 从至少 T 份分片重建秘密
///
/// 分片不足或校验和不匹配都会失败为 AmbiguousReconstruction；
/// 结构性问题（重复编号、元数据不一致、长度不一致）为 InvalidShare。
pub fn reconstruct(shares: &[Share]) -> Result<SecretBytes, WalletError> {
    let first = shares
        .first()
        .ok_or(WalletError::AmbiguousReconstruction)?;

    let threshold = first.threshold as usize;
    let payload_len = first.data.len();

    if payload_len <= CHECKSUM_LEN {
        return Err(WalletError::InvalidShare("share payload too short".into()));
    }

    for share in shares {
        if share.index == 0 {
            return Err(WalletError::InvalidShare("share index must be non-zero".into()));
        }
        if share.threshold != first.threshold || share.total != first.total {
            return Err(WalletError::InvalidShare(
                "shares disagree on threshold metadata".into(),
            ));
        }
        if share.data.len() != payload_len {
            return Err(WalletError::InvalidShare("shares have unequal length".into()));
        }
    }

    let mut seen = [false; 256];
    for share in shares {
        if seen[share.index as usize] {
            return Err(WalletError::InvalidShare("duplicate share index".into()));
        }
        seen[share.index as usize] = true;
    }

    if shares.len() < threshold {
        return Err(WalletError::AmbiguousReconstruction);
    }

    // 取前 T 份做 Lagrange 插值，在 x=0 处求值
    let points = &shares[..threshold];
    let mut payload = Zeroizing::new(vec![0u8; payload_len]);

    for byte_idx in 0..payload_len {
        let mut value = 0u8;
        for (i, share_i) in points.iter().enumerate() {
            let mut basis = 1u8;
            for (j, share_j) in points.iter().enumerate() {
                if i == j {
                    continue;
                }
                let numerator = share_j.index;
                let denominator = share_j.index ^ share_i.index;
                basis = gf256_mul(basis, gf256_mul(numerator, gf256_inv(denominator)));
            }
            value ^= gf256_mul(share_i.data[byte_idx], basis);
        }
        payload[byte_idx] = value;
    }

    let secret_len = payload_len - CHECKSUM_LEN;
    let expected = Sha256::digest(&payload[..secret_len]);

    let matches: bool = expected
        .as_slice()
        .ct_eq(&payload[secret_len..])
        .into();
    if !matches {
        return Err(WalletError::AmbiguousReconstruction);
    }

    Ok(SecretBytes::new(payload[..secret_len].to_vec()))
}
