//! 内存账本：按 System Program 语义执行交易，供测试驱动完整流水线。

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_system_interface::instruction::SystemInstruction;
use solana_system_interface::program as system_program;

use crate::instructions::compute_budget::COMPUTE_BUDGET_PROGRAM_ID;
use crate::instructions::decode;
use crate::instructions::nonce::{self, NONCE_ACCOUNT_SPACE};
use crate::rent::MAX_PERMITTED_DATA_LENGTH;

use super::{
    AccountSnapshot, ConfirmationLevel, FreshnessAnchor, LedgerError, LedgerResult, LedgerRpc,
    Rejection, SignatureStatus,
};

pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
pub const ANCHOR_VALIDITY_BLOCKS: u64 = 150;

const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;
const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
const EXEMPTION_THRESHOLD_YEARS: u64 = 2;

const MISSING_SIGNATURE: &str = "missing required signature for instruction";
const ACCOUNT_ALREADY_IN_USE: &str = "custom program error: 0x0";
const RESULT_WITH_NEGATIVE_LAMPORTS: &str = "custom program error: 0x1";
const INVALID_ACCOUNT_DATA_LENGTH: &str = "custom program error: 0x3";
const ADDRESS_WITH_SEED_MISMATCH: &str = "custom program error: 0x5";
const INVALID_ACCOUNT_OWNER: &str = "invalid account owner";
const INVALID_NONCE_STATE: &str = "invalid account data for instruction";

struct State {
    accounts: HashMap<Pubkey, AccountSnapshot>,
    anchors: HashMap<Hash, u64>,
    processed: HashMap<Signature, u64>,
    block_height: u64,
    slot: u64,
    submissions: usize,
    fail_transport: bool,
    fail_account_reads: bool,
    withhold_status: bool,
    blocks_per_submit: u64,
    level: ConfirmationLevel,
}

pub struct FakeLedger {
    state: Mutex<State>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                accounts: HashMap::new(),
                anchors: HashMap::new(),
                processed: HashMap::new(),
                block_height: 1_000,
                slot: 2_000,
                submissions: 0,
                fail_transport: false,
                fail_account_reads: false,
                withhold_status: false,
                blocks_per_submit: 0,
                level: ConfirmationLevel::Finalized,
            }),
        }
    }

    pub fn rent_minimum(space: u64) -> u64 {
        (ACCOUNT_STORAGE_OVERHEAD + space) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
    }

    /// 直接给系统账户注资。
    pub fn fund(&self, address: &Pubkey, lamports: u64) {
        let mut state = self.state.lock();
        let entry = state
            .accounts
            .entry(*address)
            .or_insert_with(|| AccountSnapshot {
                lamports: 0,
                space: 0,
                owner: system_program::ID,
                executable: false,
                data: Vec::new(),
            });
        entry.lamports += lamports;
    }

    pub fn account(&self, address: &Pubkey) -> Option<AccountSnapshot> {
        self.state.lock().accounts.get(address).cloned()
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().accounts.len()
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    pub fn advance_blocks(&self, blocks: u64) {
        let mut state = self.state.lock();
        state.block_height += blocks;
        state.slot += blocks;
    }

    pub fn fail_transport(&self, enabled: bool) {
        self.state.lock().fail_transport = enabled;
    }

    /// 只让账户查询失败，交易提交与确认不受影响。
    pub fn fail_account_reads(&self, enabled: bool) {
        self.state.lock().fail_account_reads = enabled;
    }

    /// 交易照常落账，但状态查询始终返回空，模拟确认结果未知。
    pub fn withhold_status(&self, enabled: bool) {
        self.state.lock().withhold_status = enabled;
    }

    pub fn advance_blocks_on_submit(&self, blocks: u64) {
        self.state.lock().blocks_per_submit = blocks;
    }

    pub fn set_confirmation_level(&self, level: ConfirmationLevel) {
        self.state.lock().level = level;
    }

    fn execute(
        state: &State,
        transaction: &Transaction,
    ) -> Result<HashMap<Pubkey, AccountSnapshot>, Rejection> {
        let message = &transaction.message;
        let keys = &message.account_keys;
        let mut accounts = state.accounts.clone();

        let payer = keys
            .first()
            .ok_or_else(|| Rejection::Other("transaction has no fee payer".into()))?;
        let fee = LAMPORTS_PER_SIGNATURE * u64::from(message.header.num_required_signatures);
        match accounts.get_mut(payer) {
            Some(account) if account.lamports >= fee => account.lamports -= fee,
            _ => return Err(Rejection::InsufficientFunds),
        }

        for (index, compiled) in message.instructions.iter().enumerate() {
            let index = index as u8;
            let program_id = keys[compiled.program_id_index as usize];
            if program_id == COMPUTE_BUDGET_PROGRAM_ID {
                continue;
            }
            if program_id != system_program::ID {
                return Err(Rejection::Other(format!("unsupported program {program_id}")));
            }
            let metas: Vec<(Pubkey, bool)> = compiled
                .accounts
                .iter()
                .map(|&i| (keys[i as usize], message.is_signer(i as usize)))
                .collect();
            let Some(call) = decode::decode_data(&compiled.data) else {
                return Err(instruction_error(index, "invalid instruction data"));
            };
            apply(&mut accounts, index, &metas, call, &message.recent_blockhash)?;
        }

        for (account_index, key) in keys.iter().enumerate() {
            if let Some(account) = accounts.get(key) {
                if account.lamports > 0 && account.lamports < Self::rent_minimum(account.space) {
                    return Err(Rejection::InsufficientFundsForRent {
                        account_index: account_index as u8,
                    });
                }
            }
        }
        accounts.retain(|_, account| account.lamports > 0);
        Ok(accounts)
    }
}

fn instruction_error(index: u8, detail: &str) -> Rejection {
    Rejection::Instruction {
        index,
        detail: detail.to_string(),
    }
}

fn meta(metas: &[(Pubkey, bool)], index: u8, position: usize) -> Result<(Pubkey, bool), Rejection> {
    metas
        .get(position)
        .copied()
        .ok_or_else(|| instruction_error(index, "not enough account keys"))
}

fn signed(metas: &[(Pubkey, bool)], index: u8, position: usize) -> Result<Pubkey, Rejection> {
    let (key, is_signer) = meta(metas, index, position)?;
    if !is_signer {
        return Err(instruction_error(index, MISSING_SIGNATURE));
    }
    Ok(key)
}

fn empty_account() -> AccountSnapshot {
    AccountSnapshot {
        lamports: 0,
        space: 0,
        owner: system_program::ID,
        executable: false,
        data: Vec::new(),
    }
}

fn debit(
    accounts: &mut HashMap<Pubkey, AccountSnapshot>,
    index: u8,
    from: &Pubkey,
    lamports: u64,
) -> Result<(), Rejection> {
    let account = accounts
        .get_mut(from)
        .ok_or_else(|| instruction_error(index, RESULT_WITH_NEGATIVE_LAMPORTS))?;
    if account.lamports < lamports {
        return Err(instruction_error(index, RESULT_WITH_NEGATIVE_LAMPORTS));
    }
    account.lamports -= lamports;
    Ok(())
}

fn credit(accounts: &mut HashMap<Pubkey, AccountSnapshot>, to: &Pubkey, lamports: u64) {
    accounts.entry(*to).or_insert_with(empty_account).lamports += lamports;
}

fn is_in_use(account: Option<&AccountSnapshot>) -> bool {
    account.is_some_and(|a| a.lamports > 0 || a.space > 0 || a.owner != system_program::ID)
}

fn create(
    accounts: &mut HashMap<Pubkey, AccountSnapshot>,
    index: u8,
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
    space: u64,
    owner: Pubkey,
) -> Result<(), Rejection> {
    if is_in_use(accounts.get(to)) {
        return Err(instruction_error(index, ACCOUNT_ALREADY_IN_USE));
    }
    if space > MAX_PERMITTED_DATA_LENGTH {
        return Err(instruction_error(index, INVALID_ACCOUNT_DATA_LENGTH));
    }
    debit(accounts, index, from, lamports)?;
    accounts.insert(
        *to,
        AccountSnapshot {
            lamports,
            space,
            owner,
            executable: false,
            data: vec![0; space as usize],
        },
    );
    Ok(())
}

fn check_seed(
    index: u8,
    address: &Pubkey,
    base: &Pubkey,
    seed: &str,
    owner: &Pubkey,
) -> Result<(), Rejection> {
    match Pubkey::create_with_seed(base, seed, owner) {
        Ok(derived) if derived == *address => Ok(()),
        _ => Err(instruction_error(index, ADDRESS_WITH_SEED_MISMATCH)),
    }
}

fn allocate_and_assign(
    accounts: &mut HashMap<Pubkey, AccountSnapshot>,
    index: u8,
    address: &Pubkey,
    space: Option<u64>,
    owner: Option<Pubkey>,
) -> Result<(), Rejection> {
    let account = accounts.entry(*address).or_insert_with(empty_account);
    if account.owner != system_program::ID {
        return Err(instruction_error(index, INVALID_ACCOUNT_OWNER));
    }
    if let Some(space) = space {
        if account.space > 0 {
            return Err(instruction_error(index, ACCOUNT_ALREADY_IN_USE));
        }
        if space > MAX_PERMITTED_DATA_LENGTH {
            return Err(instruction_error(index, INVALID_ACCOUNT_DATA_LENGTH));
        }
        account.space = space;
        account.data = vec![0; space as usize];
    }
    if let Some(owner) = owner {
        account.owner = owner;
    }
    Ok(())
}

fn nonce_authority_check(
    accounts: &HashMap<Pubkey, AccountSnapshot>,
    index: u8,
    nonce_account: &Pubkey,
    authority: &Pubkey,
) -> Result<nonce::NonceData, Rejection> {
    let account = accounts
        .get(nonce_account)
        .ok_or_else(|| instruction_error(index, INVALID_NONCE_STATE))?;
    let data = nonce::parse_nonce_data(&account.data)
        .ok_or_else(|| instruction_error(index, INVALID_NONCE_STATE))?;
    if data.authority != *authority {
        return Err(instruction_error(index, MISSING_SIGNATURE));
    }
    Ok(data)
}

fn store_nonce(
    accounts: &mut HashMap<Pubkey, AccountSnapshot>,
    nonce_account: &Pubkey,
    data: &nonce::NonceData,
) {
    if let Some(account) = accounts.get_mut(nonce_account) {
        account.data = nonce::encode_nonce_data(data);
    }
}

fn apply(
    accounts: &mut HashMap<Pubkey, AccountSnapshot>,
    index: u8,
    metas: &[(Pubkey, bool)],
    call: SystemInstruction,
    recent_blockhash: &Hash,
) -> Result<(), Rejection> {
    match call {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => {
            let from = signed(metas, index, 0)?;
            let to = signed(metas, index, 1)?;
            create(accounts, index, &from, &to, lamports, space, owner)
        }
        SystemInstruction::CreateAccountWithSeed {
            base,
            seed,
            lamports,
            space,
            owner,
        } => {
            let from = signed(metas, index, 0)?;
            let (to, _) = meta(metas, index, 1)?;
            if !metas.iter().any(|(key, is_signer)| *key == base && *is_signer) {
                return Err(instruction_error(index, MISSING_SIGNATURE));
            }
            check_seed(index, &to, &base, &seed, &owner)?;
            create(accounts, index, &from, &to, lamports, space, owner)
        }
        SystemInstruction::Transfer { lamports } => {
            let from = signed(metas, index, 0)?;
            let (to, _) = meta(metas, index, 1)?;
            if accounts.get(&from).is_some_and(|a| !a.data.is_empty()) {
                return Err(instruction_error(index, INVALID_ACCOUNT_OWNER));
            }
            debit(accounts, index, &from, lamports)?;
            credit(accounts, &to, lamports);
            Ok(())
        }
        SystemInstruction::TransferWithSeed {
            lamports,
            from_seed,
            from_owner,
        } => {
            let (from, _) = meta(metas, index, 0)?;
            let base = signed(metas, index, 1)?;
            let (to, _) = meta(metas, index, 2)?;
            check_seed(index, &from, &base, &from_seed, &from_owner)?;
            debit(accounts, index, &from, lamports)?;
            credit(accounts, &to, lamports);
            Ok(())
        }
        SystemInstruction::Assign { owner } => {
            let account = signed(metas, index, 0)?;
            allocate_and_assign(accounts, index, &account, None, Some(owner))
        }
        SystemInstruction::AssignWithSeed { base, seed, owner } => {
            let (account, _) = meta(metas, index, 0)?;
            let signer = signed(metas, index, 1)?;
            if signer != base {
                return Err(instruction_error(index, MISSING_SIGNATURE));
            }
            check_seed(index, &account, &base, &seed, &owner)?;
            allocate_and_assign(accounts, index, &account, None, Some(owner))
        }
        SystemInstruction::Allocate { space } => {
            let account = signed(metas, index, 0)?;
            allocate_and_assign(accounts, index, &account, Some(space), None)
        }
        SystemInstruction::AllocateWithSeed {
            base,
            seed,
            space,
            owner,
        } => {
            let (account, _) = meta(metas, index, 0)?;
            let signer = signed(metas, index, 1)?;
            if signer != base {
                return Err(instruction_error(index, MISSING_SIGNATURE));
            }
            check_seed(index, &account, &base, &seed, &owner)?;
            allocate_and_assign(accounts, index, &account, Some(space), Some(owner))
        }
        SystemInstruction::InitializeNonceAccount(authority) => {
            let (nonce_account, _) = meta(metas, index, 0)?;
            let account = accounts
                .get_mut(&nonce_account)
                .ok_or_else(|| instruction_error(index, INVALID_NONCE_STATE))?;
            if account.space != NONCE_ACCOUNT_SPACE
                || account.owner != system_program::ID
                || nonce::parse_nonce_data(&account.data).is_some()
            {
                return Err(instruction_error(index, INVALID_NONCE_STATE));
            }
            account.data = nonce::encode_nonce_data(&nonce::NonceData {
                authority,
                durable_nonce: *recent_blockhash,
                lamports_per_signature: LAMPORTS_PER_SIGNATURE,
            });
            Ok(())
        }
        SystemInstruction::AdvanceNonceAccount => {
            let (nonce_account, _) = meta(metas, index, 0)?;
            let authority = signed(metas, index, 2)?;
            let mut data = nonce_authority_check(accounts, index, &nonce_account, &authority)?;
            data.durable_nonce = Hash::new_unique();
            store_nonce(accounts, &nonce_account, &data);
            Ok(())
        }
        SystemInstruction::WithdrawNonceAccount(lamports) => {
            let (nonce_account, _) = meta(metas, index, 0)?;
            let (to, _) = meta(metas, index, 1)?;
            let authority = signed(metas, index, 4)?;
            nonce_authority_check(accounts, index, &nonce_account, &authority)?;
            debit(accounts, index, &nonce_account, lamports)?;
            credit(accounts, &to, lamports);
            if accounts.get(&nonce_account).is_some_and(|a| a.lamports == 0) {
                accounts.remove(&nonce_account);
            }
            Ok(())
        }
        SystemInstruction::AuthorizeNonceAccount(new_authority) => {
            let (nonce_account, _) = meta(metas, index, 0)?;
            let authority = signed(metas, index, 1)?;
            let mut data = nonce_authority_check(accounts, index, &nonce_account, &authority)?;
            data.authority = new_authority;
            store_nonce(accounts, &nonce_account, &data);
            Ok(())
        }
        SystemInstruction::UpgradeNonceAccount => {
            let (nonce_account, _) = meta(metas, index, 0)?;
            let account = accounts
                .get(&nonce_account)
                .ok_or_else(|| instruction_error(index, INVALID_NONCE_STATE))?;
            if nonce::parse_nonce_data(&account.data).is_none() {
                return Err(instruction_error(index, INVALID_NONCE_STATE));
            }
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn query_minimum_persistent_balance(&self, space: usize) -> LedgerResult<u64> {
        if self.state.lock().fail_transport {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(Self::rent_minimum(space as u64))
    }

    async fn query_latest_freshness_anchor(&self) -> LedgerResult<FreshnessAnchor> {
        let mut state = self.state.lock();
        if state.fail_transport {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        let blockhash = Hash::new_unique();
        let last_valid_block_height = state.block_height + ANCHOR_VALIDITY_BLOCKS;
        state.anchors.insert(blockhash, last_valid_block_height);
        Ok(FreshnessAnchor {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn query_block_height(&self) -> LedgerResult<u64> {
        Ok(self.state.lock().block_height)
    }

    async fn query_balance(&self, address: &Pubkey) -> LedgerResult<u64> {
        Ok(self
            .state
            .lock()
            .accounts
            .get(address)
            .map(|account| account.lamports)
            .unwrap_or(0))
    }

    async fn query_account(&self, address: &Pubkey) -> LedgerResult<Option<AccountSnapshot>> {
        if self.state.lock().fail_account_reads {
            return Err(LedgerError::Transport("connection reset".into()));
        }
        Ok(self.account(address))
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let mut state = self.state.lock();
        if state.fail_transport {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        state.submissions += 1;

        if transaction.verify().is_err() {
            return Err(LedgerError::Rejected(Rejection::MissingSignature));
        }
        let signature = transaction.signatures[0];
        if state.processed.contains_key(&signature) {
            return Err(LedgerError::Rejected(Rejection::AlreadyProcessed));
        }
        let anchor_valid = state
            .anchors
            .get(&transaction.message.recent_blockhash)
            .is_some_and(|last_valid| state.block_height <= *last_valid);
        if !anchor_valid {
            return Err(LedgerError::Rejected(Rejection::AnchorNotFound));
        }

        let accounts = Self::execute(&state, transaction).map_err(LedgerError::Rejected)?;
        state.accounts = accounts;
        let slot = state.slot;
        state.processed.insert(signature, slot);
        state.slot += 1;
        let blocks = state.blocks_per_submit;
        state.block_height += blocks;
        Ok(signature)
    }

    async fn query_signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let state = self.state.lock();
        if state.withhold_status {
            return Ok(None);
        }
        Ok(state.processed.get(signature).map(|slot| SignatureStatus {
            slot: *slot,
            level: state.level,
            err: None,
        }))
    }
}
