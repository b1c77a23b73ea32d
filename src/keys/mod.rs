//! 签名身份的生成与加载。私钥只在进程内存中存在，落盘由调用方决定。

use std::fs;
use std::path::Path;

use rand::Rng;
use rand::distr::Alphanumeric;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::WalletConfig;

pub const MAX_SEED_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("私钥字符串为空")]
    Empty,
    #[error("私钥格式非法: {0}")]
    Malformed(String),
    #[error("读取密钥文件失败 {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("缺少付款钱包私钥，请配置 global.wallet.private_key / keypair_path 或环境变量 SYSPROG_PRIVATE_KEY")]
    MissingPayer,
    #[error("seed 长度 {len} 超过上限 32 字节")]
    SeedTooLong { len: usize },
    #[error("派生地址失败: {0}")]
    Derive(String),
}

/// 生成一个新的独立密钥对。
pub fn generate() -> Keypair {
    Keypair::new()
}

pub fn generate_many(count: usize) -> Vec<Keypair> {
    (0..count).map(|_| generate()).collect()
}

/// 随机生成可用于地址派生的 seed（字母数字）。
pub fn random_seed(len: usize) -> String {
    let len = len.clamp(1, MAX_SEED_LEN);
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// 由 base + seed + owner 计算派生地址，无需该地址的私钥。
pub fn derive_with_seed(base: &Pubkey, seed: &str, owner: &Pubkey) -> Result<Pubkey, KeyError> {
    if seed.len() > MAX_SEED_LEN {
        return Err(KeyError::SeedTooLong { len: seed.len() });
    }
    Pubkey::create_with_seed(base, seed, owner).map_err(|err| KeyError::Derive(err.to_string()))
}

/// 加载付款钱包：环境变量 > 配置私钥 > 密钥文件。
///
/// 环境变量已在配置加载阶段合并进 `wallet.private_key`。
pub fn load_payer(wallet: &WalletConfig) -> Result<Keypair, KeyError> {
    if let Some(raw) = wallet.private_key.as_deref() {
        return parse_keypair_string(raw);
    }
    if let Some(path) = wallet.keypair_path.as_deref() {
        return load_keypair_file(path);
    }
    Err(KeyError::MissingPayer)
}

pub fn load_keypair_file(path: &Path) -> Result<Keypair, KeyError> {
    let contents = Zeroizing::new(fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?);
    parse_keypair_string(&contents)
}

/// 支持 JSON 字节数组、逗号分隔字节以及 base58 三种格式。
pub fn parse_keypair_string(raw: &str) -> Result<Keypair, KeyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(KeyError::Empty);
    }

    let bytes: Zeroizing<Vec<u8>> = if trimmed.starts_with('[') {
        Zeroizing::new(
            serde_json::from_str(trimmed).map_err(|err| KeyError::Malformed(err.to_string()))?,
        )
    } else if trimmed.contains(',') {
        Zeroizing::new(
            trimmed
                .split(',')
                .map(|part| part.trim())
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<u8>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| KeyError::Malformed(err.to_string()))?,
        )
    } else {
        Zeroizing::new(
            bs58::decode(trimmed)
                .into_vec()
                .map_err(|err| KeyError::Malformed(err.to_string()))?,
        )
    };

    Keypair::try_from(bytes.as_slice()).map_err(|err| KeyError::Malformed(err.to_string()))
}

/// 以 solana-keygen 兼容的 JSON 字节数组格式导出。
pub fn keypair_to_json(keypair: &Keypair) -> Zeroizing<String> {
    let bytes = Zeroizing::new(keypair.to_bytes().to_vec());
    // Vec<u8> 序列化不会失败
    Zeroizing::new(serde_json::to_string(bytes.as_slice()).unwrap_or_default())
}
