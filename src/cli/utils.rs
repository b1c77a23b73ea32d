use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

use crate::keys;

/// 将 SOL 数量转换为 lamports。
pub fn decimal_sol_to_lamports(amount: &Decimal) -> Result<u64> {
    if amount <= &Decimal::ZERO {
        bail!("金额必须大于 0");
    }
    let scaled = amount
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .ok_or_else(|| anyhow!("金额超出可表示范围"))?;
    if !scaled.fract().is_zero() {
        bail!("金额最多支持 9 位小数");
    }
    scaled
        .to_u64()
        .ok_or_else(|| anyhow!("金额超过 u64 最大值"))
}

pub fn lamports_to_sol(lamports: u64) -> Decimal {
    (Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)).normalize()
}

pub fn parse_pubkey(label: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).map_err(|err| anyhow!("{label} 地址无效 {value}: {err}"))
}

pub fn parse_optional_pubkey(label: &str, value: Option<&str>) -> Result<Option<Pubkey>> {
    value.map(|value| parse_pubkey(label, value)).transpose()
}

/// 以 JSON 字节数组写出密钥对（与 solana-keygen 格式一致）。
pub fn write_keypair_file(path: &Path, keypair: &Keypair, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("密钥文件已存在: {}（使用 --force 覆盖）", path.display());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|err| anyhow!("创建目录失败 {}: {err}", parent.display()))?;
        }
    }
    let json = keys::keypair_to_json(keypair);
    fs::write(path, json.as_bytes())
        .map_err(|err| anyhow!("写入密钥文件失败 {}: {err}", path.display()))?;
    Ok(())
}
