use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use super::SysprogConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["sysprog.toml", "config/sysprog.toml"];
pub const CONFIG_FILE_NAME: &str = "sysprog.toml";

pub const ENV_RPC_URL: &str = "SYSPROG_RPC_URL";
pub const ENV_PRIVATE_KEY: &str = "SYSPROG_PRIVATE_KEY";

pub const CONFIG_TEMPLATE: &str = r#"# sysprog 配置模版

[global]
# RPC 节点地址，可被环境变量 SYSPROG_RPC_URL 覆盖
rpc_url = "http://127.0.0.1:8899"
# 交易确认级别：processed / confirmed / finalized
commitment = "confirmed"

[global.wallet]
# 付款钱包私钥（base58 或 JSON 字节数组），可被环境变量 SYSPROG_PRIVATE_KEY 覆盖
private_key = ""
# 或者使用 solana-keygen 生成的 JSON 密钥文件
# keypair_path = "~/.config/solana/id.json"

[global.transaction]
confirm_timeout_ms = 30000
poll_interval_ms = 500
skip_preflight = false
# max_retries = 3
compute_unit_price_micro_lamports = 0

[global.logging]
level = "info"
json = false

[global.metrics]
# prometheus_listen = "0.0.0.0:9898"
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("配置非法: {0}")]
    Invalid(String),
}

pub fn load_config(path: Option<PathBuf>) -> Result<SysprogConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::Invalid(format!(
                    "指定的配置文件不存在: {}",
                    p.display()
                )));
            }
            vec![p]
        }
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    let mut config = SysprogConfig::default();
    for candidate in candidate_paths {
        if let Some(loaded) = try_load_file(&candidate)? {
            config = loaded;
            break;
        }
    }

    apply_env_overrides(&mut config, |key| env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

fn try_load_file(path: &Path) -> Result<Option<SysprogConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: SysprogConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

pub(crate) fn apply_env_overrides<F>(config: &mut SysprogConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_RPC_URL).filter(|value| !value.trim().is_empty()) {
        config.global.rpc_url = url.trim().to_string();
    }
    if let Some(key) = lookup(ENV_PRIVATE_KEY).filter(|value| !value.trim().is_empty()) {
        config.global.wallet.private_key = Some(key.trim().to_string());
    }
}

pub(crate) fn validate(config: &SysprogConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.global.rpc_url)
        .map_err(|err| ConfigError::Invalid(format!("rpc_url 无法解析: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "rpc_url 仅支持 http/https，实际为 {}",
            url.scheme()
        )));
    }
    if config.global.transaction.confirm_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "transaction.confirm_timeout_ms 必须大于 0".into(),
        ));
    }
    Ok(())
}

/// 在目标目录写出配置模版，返回写入路径。
pub fn write_template(dir: Option<&Path>, force: bool) -> Result<PathBuf, ConfigError> {
    let base = dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let target = base.join(CONFIG_FILE_NAME);
    if target.exists() && !force {
        return Err(ConfigError::Invalid(format!(
            "{} 已存在，如需覆盖请使用 --force",
            target.display()
        )));
    }
    fs::create_dir_all(&base).map_err(|source| ConfigError::Io {
        path: base.clone(),
        source,
    })?;
    fs::write(&target, CONFIG_TEMPLATE).map_err(|source| ConfigError::Io {
        path: target.clone(),
        source,
    })?;
    Ok(target)
}
