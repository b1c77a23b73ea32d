use serde::Deserialize;
use serde::de::Deserializer;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;

pub(crate) fn default_rpc_url() -> String {
    "http://127.0.0.1:8899".to_string()
}

pub(crate) fn default_commitment() -> cfg::CommitmentSetting {
    cfg::CommitmentSetting::Confirmed
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_confirm_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    500
}

/// 空字符串视为未配置，避免模版里的 `""` 被当成有效值。
pub(crate) fn deserialize_optional_trimmed<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty()))
}

impl Default for cfg::SysprogConfig {
    fn default() -> Self {
        Self {
            global: cfg::GlobalConfig::default(),
        }
    }
}

impl Default for cfg::GlobalConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            commitment: default_commitment(),
            wallet: cfg::WalletConfig::default(),
            transaction: cfg::TransactionConfig::default(),
            logging: cfg::LoggingConfig::default(),
            metrics: cfg::MetricsConfig::default(),
        }
    }
}

impl Default for cfg::TransactionConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_ms: default_confirm_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            skip_preflight: false,
            max_retries: None,
            compute_unit_price_micro_lamports: 0,
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
        }
    }
}
