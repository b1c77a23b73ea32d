use std::time::Duration;

use metrics::{counter, histogram};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{info, warn};

use super::metrics::{
    ACCOUNT_PROBE, TX_CONFIRM_SECONDS, TX_RESULT, TX_SUBMITTED, prometheus_enabled,
};

pub fn rent_minimum(space: u64, lamports: u64) {
    info!(
        target: "monitoring::rent",
        event = "rent_minimum",
        space,
        lamports,
        "rent exemption minimum resolved"
    );
}

pub fn anchor_fetched(operation: &str, blockhash: &Hash, last_valid_block_height: u64) {
    info!(
        target: "monitoring::tx",
        event = "anchor",
        operation,
        blockhash = %blockhash,
        last_valid_block_height,
        "freshness anchor fetched"
    );
}

pub fn tx_submitted(operation: &str, signature: &Signature, instructions: &[String], signers: usize) {
    info!(
        target: "monitoring::tx",
        event = "submitted",
        operation,
        signature = %signature,
        instructions = ?instructions,
        signers,
        "transaction submitted"
    );

    if prometheus_enabled() {
        counter!(TX_SUBMITTED, "operation" => operation.to_string()).increment(1);
    }
}

pub fn tx_confirmed(operation: &str, signature: &Signature, slot: u64, elapsed: Duration) {
    info!(
        target: "monitoring::tx",
        event = "confirmed",
        operation,
        signature = %signature,
        slot,
        elapsed_ms = elapsed.as_millis() as u64,
        "transaction confirmed"
    );

    if prometheus_enabled() {
        counter!(
            TX_RESULT,
            "operation" => operation.to_string(),
            "result" => "confirmed"
        )
        .increment(1);
        histogram!(TX_CONFIRM_SECONDS, "operation" => operation.to_string())
            .record(elapsed.as_secs_f64());
    }
}

pub fn tx_failed(operation: &str, kind: &'static str, reason: &str) {
    warn!(
        target: "monitoring::tx",
        event = "failed",
        operation,
        kind,
        reason,
        "transaction failed"
    );

    if prometheus_enabled() {
        counter!(
            TX_RESULT,
            "operation" => operation.to_string(),
            "result" => kind
        )
        .increment(1);
    }
}

pub fn confirmation_unknown(operation: &str, signature: &Signature, waited: Duration) {
    warn!(
        target: "monitoring::tx",
        event = "confirmation_unknown",
        operation,
        signature = %signature,
        waited_ms = waited.as_millis() as u64,
        "confirmation wait elapsed, outcome unknown; re-query account state"
    );

    if prometheus_enabled() {
        counter!(
            TX_RESULT,
            "operation" => operation.to_string(),
            "result" => "unknown"
        )
        .increment(1);
    }
}

pub fn account_probe(address: &Pubkey, outcome: &'static str, mismatches: usize) {
    if outcome == "matches" {
        info!(
            target: "monitoring::account",
            event = "probe",
            address = %address,
            outcome,
            "account state verified"
        );
    } else {
        warn!(
            target: "monitoring::account",
            event = "probe",
            address = %address,
            outcome,
            mismatches,
            "account state differs from request"
        );
    }

    if prometheus_enabled() {
        counter!(ACCOUNT_PROBE, "outcome" => outcome).increment(1);
    }
}
