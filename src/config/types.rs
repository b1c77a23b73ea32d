use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use solana_commitment_config::CommitmentConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct SysprogConfig {
    #[serde(default)]
    pub global: GlobalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "super::default_commitment")]
    pub commitment: CommitmentSetting,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// 等待交易确认时要求达到的确认级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentSetting {
    Processed,
    Confirmed,
    Finalized,
}

impl CommitmentSetting {
    pub fn as_config(self) -> CommitmentConfig {
        match self {
            Self::Processed => CommitmentConfig::processed(),
            Self::Confirmed => CommitmentConfig::confirmed(),
            Self::Finalized => CommitmentConfig::finalized(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    #[serde(default, deserialize_with = "super::deserialize_optional_trimmed")]
    pub private_key: Option<String>,
    #[serde(default)]
    pub keypair_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    #[serde(default = "super::default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub skip_preflight: bool,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub compute_unit_price_micro_lamports: u64,
}

impl TransactionConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default, deserialize_with = "super::deserialize_optional_trimmed")]
    pub prometheus_listen: Option<String>,
}
