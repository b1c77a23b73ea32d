//! 交易编排：获取时效锚点、组装、收集签名、提交并等待确认。

pub mod error;
pub mod orchestrator;

#[cfg(test)]
mod tests;

pub use error::TxError;
pub use orchestrator::{ConfirmedTransaction, OrchestratorConfig, TransactionOrchestrator};
