use std::sync::Arc;
use std::time::Duration;

use bincode::config::legacy;
use bincode::serde::encode_to_vec;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::transaction::Transaction;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{CommitmentSetting, GlobalConfig};
use crate::instructions::compute_budget::maybe_prepend_compute_unit_price;
use crate::instructions::{BuiltInstruction, decode, into_instructions};
use crate::monitoring::events;
use crate::rpc::{FreshnessAnchor, LedgerError, LedgerRpc, Rejection};

use super::error::TxError;

/// 单笔序列化交易的上限（IPv6 MTU 减去头部）。
pub const MAX_TRANSACTION_SIZE: usize = 1232;

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub commitment: CommitmentSetting,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
    pub compute_unit_price_micro_lamports: u64,
}

impl OrchestratorConfig {
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            commitment: global.commitment,
            confirm_timeout: global.transaction.confirm_timeout(),
            poll_interval: global.transaction.poll_interval(),
            compute_unit_price_micro_lamports: global
                .transaction
                .compute_unit_price_micro_lamports,
        }
    }
}

/// 已签名、尚未提交的交易及其时效锚点。原样重复提交是安全的，账本按签名去重。
#[derive(Clone, Debug)]
pub struct PreparedTransaction {
    pub transaction: Transaction,
    pub anchor: FreshnessAnchor,
}

/// 已达到目标确认级别的交易。
#[derive(Clone, Copy, Debug)]
pub struct ConfirmedTransaction {
    pub signature: Signature,
    pub slot: u64,
}

#[derive(Clone)]
pub struct TransactionOrchestrator {
    rpc: Arc<dyn LedgerRpc>,
    config: OrchestratorConfig,
}

impl TransactionOrchestrator {
    pub fn new(rpc: Arc<dyn LedgerRpc>, config: OrchestratorConfig) -> Self {
        Self { rpc, config }
    }

    /// 获取锚点 → 组装 → 签名 → 提交 → 等待确认。任何一步失败都直接返回，不做重试。
    pub async fn execute(
        &self,
        operation: &str,
        built: Vec<BuiltInstruction>,
        fee_payer: &dyn Signer,
        extra_signers: &[&dyn Signer],
    ) -> Result<ConfirmedTransaction, TxError> {
        let prepared = self
            .prepare(operation, built, fee_payer, extra_signers)
            .await
            .inspect_err(|err| report_failure(operation, err))?;
        self.submit(operation, &prepared).await
    }

    /// 组装并签名，不触达提交接口。缺少签名者或超出大小上限都在这里失败。
    pub async fn prepare(
        &self,
        operation: &str,
        built: Vec<BuiltInstruction>,
        fee_payer: &dyn Signer,
        extra_signers: &[&dyn Signer],
    ) -> Result<PreparedTransaction, TxError> {
        if built.is_empty() {
            return Err(TxError::EmptyInstructions);
        }
        ensure_signers_provided(&built, fee_payer, extra_signers)?;
        let mut instructions = into_instructions(built);
        maybe_prepend_compute_unit_price(
            &mut instructions,
            self.config.compute_unit_price_micro_lamports,
        );

        let anchor = self
            .rpc
            .query_latest_freshness_anchor()
            .await
            .map_err(TxError::Ledger)?;
        events::anchor_fetched(
            operation,
            &anchor.blockhash,
            anchor.last_valid_block_height,
        );

        let payer = fee_payer.pubkey();
        let message = Message::new_with_blockhash(&instructions, Some(&payer), &anchor.blockhash);
        let signers = collect_signers(&message, fee_payer, extra_signers)?;

        let mut transaction = Transaction::new_unsigned(message);
        transaction
            .try_sign(&signers, anchor.blockhash)
            .map_err(|err| TxError::Signing(err.to_string()))?;
        ensure_size(&transaction)?;

        debug!(
            target: "txs::orchestrator",
            operation,
            instructions = ?decode::summarize(&instructions),
            signers = signers.len(),
            "transaction assembled"
        );
        Ok(PreparedTransaction {
            transaction,
            anchor,
        })
    }

    /// 提交已签名交易并等待确认。同一笔交易可再次提交，已落账时返回原签名，不会重复执行。
    pub async fn submit(
        &self,
        operation: &str,
        prepared: &PreparedTransaction,
    ) -> Result<ConfirmedTransaction, TxError> {
        self.submit_and_confirm(operation, &prepared.transaction, &prepared.anchor)
            .await
            .inspect_err(|err| report_failure(operation, err))
    }

    async fn submit_and_confirm(
        &self,
        operation: &str,
        transaction: &Transaction,
        anchor: &FreshnessAnchor,
    ) -> Result<ConfirmedTransaction, TxError> {
        let started = Instant::now();
        let height = self
            .rpc
            .query_block_height()
            .await
            .map_err(TxError::Ledger)?;
        if anchor.is_expired_at(height) {
            return Err(TxError::AnchorExpired {
                last_valid_block_height: anchor.last_valid_block_height,
            });
        }

        let expected = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| TxError::Signing("transaction carries no signature".into()))?;
        let signature = match self.rpc.submit_transaction(transaction).await {
            Ok(signature) => signature,
            Err(LedgerError::Rejected(Rejection::AlreadyProcessed)) => {
                debug!(
                    target: "txs::orchestrator",
                    operation,
                    signature = %expected,
                    "transaction already processed, waiting on existing signature"
                );
                expected
            }
            Err(LedgerError::Rejected(Rejection::AnchorNotFound)) => {
                return Err(TxError::AnchorExpired {
                    last_valid_block_height: anchor.last_valid_block_height,
                });
            }
            Err(err) => return Err(TxError::Ledger(err)),
        };

        events::tx_submitted(
            operation,
            &signature,
            &decode::summarize(&transaction_instructions(transaction)),
            transaction.signatures.len(),
        );

        let slot = self.await_confirmation(&signature, anchor).await?;
        events::tx_confirmed(operation, &signature, slot, started.elapsed());
        Ok(ConfirmedTransaction { signature, slot })
    }

    /// 轮询签名状态直至达到目标确认级别。超时后结果未知，由调用方重新查询账户状态。
    async fn await_confirmation(
        &self,
        signature: &Signature,
        anchor: &FreshnessAnchor,
    ) -> Result<u64, TxError> {
        let started = Instant::now();
        let deadline = started + self.config.confirm_timeout;
        loop {
            match self.rpc.query_signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(rejection) = status.err {
                        return Err(TxError::Ledger(LedgerError::Rejected(rejection)));
                    }
                    if status.level.satisfies(self.config.commitment) {
                        return Ok(status.slot);
                    }
                }
                Ok(None) => match self.rpc.query_block_height().await {
                    Ok(height) if anchor.is_expired_at(height) => {
                        return Err(TxError::AnchorExpired {
                            last_valid_block_height: anchor.last_valid_block_height,
                        });
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(
                            target: "txs::orchestrator",
                            signature = %signature,
                            error = %err,
                            "block height query failed while waiting for confirmation"
                        );
                    }
                },
                Err(err) => {
                    warn!(
                        target: "txs::orchestrator",
                        signature = %signature,
                        error = %err,
                        "signature status query failed"
                    );
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TxError::ConfirmationUnknown {
                    signature: *signature,
                    waited: now - started,
                });
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }
}

/// 在请求锚点之前核对每条指令声明的签名者都已提供。
fn ensure_signers_provided(
    built: &[BuiltInstruction],
    fee_payer: &dyn Signer,
    extra_signers: &[&dyn Signer],
) -> Result<(), TxError> {
    let provided: Vec<Pubkey> = std::iter::once(fee_payer.pubkey())
        .chain(extra_signers.iter().map(|signer| signer.pubkey()))
        .collect();
    match built
        .iter()
        .flat_map(|ix| ix.signers.iter())
        .find(|key| !provided.contains(key))
    {
        Some(missing) => Err(TxError::MissingSigner(*missing)),
        None => Ok(()),
    }
}

/// 按消息要求的签名顺序挑选签名者；任何一个缺失都在提交前失败。
fn collect_signers<'a>(
    message: &Message,
    fee_payer: &'a dyn Signer,
    extra_signers: &[&'a dyn Signer],
) -> Result<Vec<&'a dyn Signer>, TxError> {
    let required = message.header.num_required_signatures as usize;
    let mut available: Vec<(Pubkey, &'a dyn Signer)> = Vec::with_capacity(1 + extra_signers.len());
    available.push((fee_payer.pubkey(), fee_payer));
    for signer in extra_signers {
        available.push((signer.pubkey(), *signer));
    }

    message
        .account_keys
        .iter()
        .take(required)
        .map(|key| {
            available
                .iter()
                .find(|(pubkey, _)| pubkey == key)
                .map(|(_, signer)| *signer)
                .ok_or(TxError::MissingSigner(*key))
        })
        .collect()
}

fn ensure_size(transaction: &Transaction) -> Result<(), TxError> {
    let bytes = encode_to_vec(transaction, legacy()).map_err(|err| TxError::Encode(err.to_string()))?;
    if bytes.len() > MAX_TRANSACTION_SIZE {
        return Err(TxError::TooLarge {
            size: bytes.len(),
            limit: MAX_TRANSACTION_SIZE,
        });
    }
    Ok(())
}

fn transaction_instructions(transaction: &Transaction) -> Vec<solana_sdk::instruction::Instruction> {
    let keys = &transaction.message.account_keys;
    transaction
        .message
        .instructions
        .iter()
        .map(|compiled| solana_sdk::instruction::Instruction {
            program_id: keys[compiled.program_id_index as usize],
            accounts: Vec::new(),
            data: compiled.data.clone(),
        })
        .collect()
}

fn report_failure(operation: &str, err: &TxError) {
    match err {
        TxError::ConfirmationUnknown { signature, waited } => {
            events::confirmation_unknown(operation, signature, *waited)
        }
        other => events::tx_failed(operation, other.kind(), &other.to_string()),
    }
}
