use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use solana_sdk::signature::Keypair;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::args::InitCmd;
use crate::config::{ConfigError, LoggingConfig, SysprogConfig, load_config, write_template};
use crate::keys;
use crate::rpc::{LedgerRpc, SolanaRpc};
use crate::txs::OrchestratorConfig;
use crate::workflow::WorkflowContext;

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    const QUIET_TARGETS: &[(&str, &str)] = &[
        ("hyper", "warn"),
        ("hyper_util::client::legacy", "warn"),
        ("reqwest", "info"),
        ("solana_rpc_client", "info"),
    ];
    for (module, level) in QUIET_TARGETS {
        if !config.level.contains(module) {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let base = fmt()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 加载主配置；用于 `sysprog --config` 的入口。
pub fn load_configuration(path: Option<PathBuf>) -> Result<SysprogConfig, ConfigError> {
    load_config(path)
}

pub fn init_configs(args: &InitCmd) -> Result<()> {
    let path = write_template(args.output.as_deref(), args.force)?;
    println!("已生成配置模版: {}", path.display());
    Ok(())
}

pub fn build_ledger(config: &SysprogConfig) -> Arc<SolanaRpc> {
    let global = &config.global;
    let rpc = SolanaRpc::from_url(&global.rpc_url, global.commitment)
        .with_send_options(&global.transaction);
    info!(
        target: "cli",
        rpc_url = %global.rpc_url,
        commitment = global.commitment.as_str(),
        "RPC 客户端已初始化"
    );
    Arc::new(rpc)
}

/// 需要付款钱包的命令使用的完整上下文。
pub fn build_workflow(config: &SysprogConfig) -> Result<WorkflowContext> {
    let payer = keys::load_payer(&config.global.wallet)?;
    let rpc: Arc<dyn LedgerRpc> = build_ledger(config);
    let orchestrator = OrchestratorConfig::from_global(&config.global);
    Ok(WorkflowContext::new(rpc, orchestrator, payer))
}

/// 未指定密钥文件时回退到付款钱包。
pub fn load_signer_or_payer(path: Option<&Path>, config: &SysprogConfig) -> Result<Keypair> {
    match path {
        Some(path) => Ok(keys::load_keypair_file(path)?),
        None => Ok(keys::load_payer(&config.global.wallet)?),
    }
}
