use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use once_cell::sync::OnceCell;

static EXPORTER: OnceCell<()> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

pub const TX_SUBMITTED: &str = "sysprog_tx_submitted_total";
pub const TX_RESULT: &str = "sysprog_tx_result_total";
pub const TX_CONFIRM_SECONDS: &str = "sysprog_tx_confirm_seconds";
pub const ACCOUNT_PROBE: &str = "sysprog_account_probe_total";

/// 确认耗时分桶，覆盖 processed 的亚秒级到 finalized 的数十秒。
const CONFIRM_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 30.0, 60.0];

/// 安装 Prometheus exporter；重复调用只生效一次。需在 tokio 运行时内调用。
pub fn try_init_prometheus(listen: &str) -> Result<()> {
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid prometheus listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .set_buckets_for_metric(
                    Matcher::Full(TX_CONFIRM_SECONDS.to_string()),
                    CONFIRM_BUCKETS,
                )
                .context("invalid confirmation histogram buckets")?
                .install()
                .context("failed to install prometheus exporter")?;
            describe_metrics();
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            Ok(())
        })
        .map(|_| ())
}

fn describe_metrics() {
    describe_counter!(TX_SUBMITTED, "Transactions accepted by the RPC node, by operation");
    describe_counter!(
        TX_RESULT,
        "Transaction outcomes by operation and result (confirmed, rejected, unknown, ...)"
    );
    describe_histogram!(
        TX_CONFIRM_SECONDS,
        Unit::Seconds,
        "Time from submission to the configured commitment level"
    );
    describe_counter!(ACCOUNT_PROBE, "Post-confirmation account reads by outcome");
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}
