//! 面向调用方的流水线：密钥 → 租金 → 指令 → 交易编排 → 校验。

mod error;

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_system_interface::program as system_program;
use tracing::{info, warn};

use crate::instructions::nonce::{self, NONCE_ACCOUNT_SPACE, NonceData};
use crate::instructions::{CreateAccountRequest, system};
use crate::keys;
use crate::rent;
use crate::rpc::LedgerRpc;
use crate::txs::{ConfirmedTransaction, OrchestratorConfig, TransactionOrchestrator};
use crate::verify::{self, ExpectedAccount, ProbeOutcome};

pub use error::{CreateAccountError, WorkflowError};

/// 新账户的注资方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Funding {
    /// 恰好为免租最低余额。
    #[default]
    RentExempt,
    /// 最低余额之上再追加指定 lamports。
    RentExemptPlus(u64),
    /// 固定金额；低于最低余额时由账本拒绝。
    Exact(u64),
}

impl Funding {
    pub fn resolve(self, minimum: u64) -> Result<u64, WorkflowError> {
        match self {
            Self::RentExempt => Ok(minimum),
            Self::RentExemptPlus(extra) => minimum.checked_add(extra).ok_or_else(|| {
                WorkflowError::Encoding(format!("注资金额溢出: {minimum} + {extra}"))
            }),
            Self::Exact(lamports) => {
                if lamports < minimum {
                    warn!(
                        target: "workflow",
                        lamports,
                        minimum,
                        "funding below rent exemption minimum, ledger will reject"
                    );
                }
                Ok(lamports)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CreateAccountPlan {
    pub space: u64,
    pub funding: Funding,
    pub owner: Pubkey,
}

impl Default for CreateAccountPlan {
    fn default() -> Self {
        Self {
            space: 0,
            funding: Funding::RentExempt,
            owner: system_program::ID,
        }
    }
}

/// 账户创建结果。`keypair` 只存在于内存，是否保存由调用方决定。
#[derive(Debug)]
pub struct CreateAccountReceipt {
    pub address: Pubkey,
    pub keypair: Option<Keypair>,
    pub lamports: u64,
    pub minimum_balance: u64,
    pub signature: Signature,
    pub slot: u64,
    /// `None` 表示交易已确认但随后的账户读取失败，状态未校验。
    pub probe: Option<ProbeOutcome>,
}

/// 非创建类操作的结果。
#[derive(Clone, Debug)]
pub struct OperationReceipt {
    pub address: Pubkey,
    pub signature: Signature,
    pub slot: u64,
    pub probe: Option<ProbeOutcome>,
}

impl OperationReceipt {
    fn new(address: Pubkey, confirmed: &ConfirmedTransaction) -> Self {
        Self {
            address,
            signature: confirmed.signature,
            slot: confirmed.slot,
            probe: None,
        }
    }
}

#[derive(Debug)]
pub struct NonceReceipt {
    pub address: Pubkey,
    pub keypair: Keypair,
    pub lamports: u64,
    pub signature: Signature,
    pub nonce: NonceData,
}

#[derive(Clone)]
pub struct WorkflowContext {
    rpc: Arc<dyn LedgerRpc>,
    orchestrator: TransactionOrchestrator,
    payer: Arc<Keypair>,
}

impl WorkflowContext {
    pub fn new(rpc: Arc<dyn LedgerRpc>, config: OrchestratorConfig, payer: Keypair) -> Self {
        let orchestrator = TransactionOrchestrator::new(rpc.clone(), config);
        Self {
            rpc,
            orchestrator,
            payer: Arc::new(payer),
        }
    }

    pub fn rpc(&self) -> &dyn LedgerRpc {
        self.rpc.as_ref()
    }

    pub fn payer(&self) -> &Keypair {
        &self.payer
    }

    pub fn payer_pubkey(&self) -> Pubkey {
        self.payer.pubkey()
    }
}

/// 生成新地址并创建账户。密钥生成与租金查询并发进行。
/// 失败时新密钥随 [`CreateAccountError`] 返回。
pub async fn create_account(
    ctx: &WorkflowContext,
    plan: CreateAccountPlan,
) -> Result<CreateAccountReceipt, CreateAccountError> {
    let (keypair, minimum) = tokio::join!(
        async { keys::generate() },
        rent::minimum_persistent_balance(ctx.rpc(), plan.space)
    );
    let minimum = match minimum {
        Ok(minimum) => minimum,
        Err(err) => return Err(CreateAccountError::new(keypair, err)),
    };
    match create_with_minimum(ctx, &keypair, plan, minimum).await {
        Ok(mut receipt) => {
            receipt.keypair = Some(keypair);
            Ok(receipt)
        }
        Err(err) => Err(CreateAccountError::new(keypair, err)),
    }
}

/// 使用调用方提供的密钥对创建账户。
pub async fn create_account_with_keypair(
    ctx: &WorkflowContext,
    new_account: &Keypair,
    plan: CreateAccountPlan,
) -> Result<CreateAccountReceipt, WorkflowError> {
    let minimum = rent::minimum_persistent_balance(ctx.rpc(), plan.space).await?;
    create_with_minimum(ctx, new_account, plan, minimum).await
}

async fn create_with_minimum(
    ctx: &WorkflowContext,
    new_account: &Keypair,
    plan: CreateAccountPlan,
    minimum: u64,
) -> Result<CreateAccountReceipt, WorkflowError> {
    let lamports = plan.funding.resolve(minimum)?;
    let address = new_account.pubkey();
    let request = CreateAccountRequest {
        space: plan.space,
        lamports,
        owner: plan.owner,
    };
    let built = vec![system::create_account(&ctx.payer_pubkey(), &address, &request)];
    let confirmed = ctx
        .orchestrator
        .execute("create_account", built, ctx.payer(), &[new_account])
        .await?;

    let probe = probe_confirmed(ctx, &address, &expected_for(&request)).await;
    info!(
        target: "workflow",
        address = %address,
        lamports,
        space = plan.space,
        owner = %plan.owner,
        signature = %confirmed.signature,
        outcome = outcome_label(probe.as_ref()),
        "account created"
    );
    Ok(CreateAccountReceipt {
        address,
        keypair: None,
        lamports,
        minimum_balance: minimum,
        signature: confirmed.signature,
        slot: confirmed.slot,
        probe,
    })
}

/// 交易确认后的账户读取。读取失败只记告警，不影响已确认的结果。
async fn probe_confirmed(
    ctx: &WorkflowContext,
    address: &Pubkey,
    expected: &ExpectedAccount,
) -> Option<ProbeOutcome> {
    match verify::probe(ctx.rpc(), address, expected).await {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            warn!(
                target: "workflow",
                address = %address,
                error = %err,
                "post-confirmation read failed, account state unverified"
            );
            None
        }
    }
}

fn outcome_label(probe: Option<&ProbeOutcome>) -> &'static str {
    probe.map_or("unverified", ProbeOutcome::label)
}

fn expected_for(request: &CreateAccountRequest) -> ExpectedAccount {
    ExpectedAccount {
        lamports: Some(request.lamports),
        space: request.space,
        owner: request.owner,
    }
}

pub async fn transfer(
    ctx: &WorkflowContext,
    to: &Pubkey,
    lamports: u64,
) -> Result<OperationReceipt, WorkflowError> {
    let built = vec![system::transfer(&ctx.payer_pubkey(), to, lamports)];
    let confirmed = ctx
        .orchestrator
        .execute("transfer", built, ctx.payer(), &[])
        .await?;
    Ok(OperationReceipt::new(*to, &confirmed))
}

/// 为已持有私钥的系统账户分配数据空间。
pub async fn allocate(
    ctx: &WorkflowContext,
    account: &Keypair,
    space: u64,
) -> Result<OperationReceipt, WorkflowError> {
    rent::checked_space(space)?;
    let address = account.pubkey();
    let built = vec![system::allocate(&address, space)];
    let confirmed = ctx
        .orchestrator
        .execute("allocate", built, ctx.payer(), &[account])
        .await?;
    let mut receipt = OperationReceipt::new(address, &confirmed);
    let expected = ExpectedAccount {
        lamports: None,
        space,
        owner: system_program::ID,
    };
    receipt.probe = probe_confirmed(ctx, &address, &expected).await;
    Ok(receipt)
}

pub async fn assign(
    ctx: &WorkflowContext,
    account: &Keypair,
    owner: &Pubkey,
) -> Result<OperationReceipt, WorkflowError> {
    let address = account.pubkey();
    let built = vec![system::assign(&address, owner)];
    let confirmed = ctx
        .orchestrator
        .execute("assign", built, ctx.payer(), &[account])
        .await?;
    Ok(OperationReceipt::new(address, &confirmed))
}

/// 以 `base + seed + owner` 派生地址创建账户，只需 base 签名。
pub async fn create_account_with_seed(
    ctx: &WorkflowContext,
    base: &Keypair,
    seed: &str,
    plan: CreateAccountPlan,
) -> Result<CreateAccountReceipt, WorkflowError> {
    let minimum = rent::minimum_persistent_balance(ctx.rpc(), plan.space).await?;
    let lamports = plan.funding.resolve(minimum)?;
    let request = CreateAccountRequest {
        space: plan.space,
        lamports,
        owner: plan.owner,
    };
    let (address, built) =
        system::create_account_with_seed(&ctx.payer_pubkey(), &base.pubkey(), seed, &request)?;
    let confirmed = ctx
        .orchestrator
        .execute("create_account_with_seed", vec![built], ctx.payer(), &[base])
        .await?;
    let probe = probe_confirmed(ctx, &address, &expected_for(&request)).await;
    info!(
        target: "workflow",
        address = %address,
        seed,
        lamports,
        signature = %confirmed.signature,
        outcome = outcome_label(probe.as_ref()),
        "seeded account created"
    );
    Ok(CreateAccountReceipt {
        address,
        keypair: None,
        lamports,
        minimum_balance: minimum,
        signature: confirmed.signature,
        slot: confirmed.slot,
        probe,
    })
}

pub async fn allocate_with_seed(
    ctx: &WorkflowContext,
    base: &Keypair,
    seed: &str,
    space: u64,
    owner: &Pubkey,
) -> Result<OperationReceipt, WorkflowError> {
    rent::checked_space(space)?;
    let (address, built) = system::allocate_with_seed(&base.pubkey(), seed, space, owner)?;
    let confirmed = ctx
        .orchestrator
        .execute("allocate_with_seed", vec![built], ctx.payer(), &[base])
        .await?;
    let mut receipt = OperationReceipt::new(address, &confirmed);
    let expected = ExpectedAccount {
        lamports: None,
        space,
        owner: *owner,
    };
    receipt.probe = probe_confirmed(ctx, &address, &expected).await;
    Ok(receipt)
}

pub async fn assign_with_seed(
    ctx: &WorkflowContext,
    base: &Keypair,
    seed: &str,
    owner: &Pubkey,
) -> Result<OperationReceipt, WorkflowError> {
    let (address, built) = system::assign_with_seed(&base.pubkey(), seed, owner)?;
    let confirmed = ctx
        .orchestrator
        .execute("assign_with_seed", vec![built], ctx.payer(), &[base])
        .await?;
    Ok(OperationReceipt::new(address, &confirmed))
}

/// 从派生地址转出；`from_owner` 为派生时使用的 owner。
pub async fn transfer_with_seed(
    ctx: &WorkflowContext,
    base: &Keypair,
    seed: &str,
    from_owner: &Pubkey,
    to: &Pubkey,
    lamports: u64,
) -> Result<OperationReceipt, WorkflowError> {
    let (_from, built) = system::transfer_with_seed(&base.pubkey(), seed, from_owner, to, lamports)?;
    let confirmed = ctx
        .orchestrator
        .execute("transfer_with_seed", vec![built], ctx.payer(), &[base])
        .await?;
    Ok(OperationReceipt::new(*to, &confirmed))
}

/// 创建并初始化 nonce 账户；`authority` 缺省为付款钱包。失败时新密钥随错误返回。
pub async fn create_nonce_account(
    ctx: &WorkflowContext,
    authority: Option<Pubkey>,
    funding: Funding,
) -> Result<NonceReceipt, CreateAccountError> {
    let (keypair, minimum) = tokio::join!(
        async { keys::generate() },
        rent::minimum_persistent_balance(ctx.rpc(), NONCE_ACCOUNT_SPACE)
    );
    let minimum = match minimum {
        Ok(minimum) => minimum,
        Err(err) => return Err(CreateAccountError::new(keypair, err)),
    };
    match initialize_nonce(ctx, &keypair, authority, funding, minimum).await {
        Ok((lamports, signature, nonce)) => Ok(NonceReceipt {
            address: keypair.pubkey(),
            keypair,
            lamports,
            signature,
            nonce,
        }),
        Err(err) => Err(CreateAccountError::new(keypair, err)),
    }
}

async fn initialize_nonce(
    ctx: &WorkflowContext,
    keypair: &Keypair,
    authority: Option<Pubkey>,
    funding: Funding,
    minimum: u64,
) -> Result<(u64, Signature, NonceData), WorkflowError> {
    let lamports = funding.resolve(minimum)?;
    let address = keypair.pubkey();
    let authority = authority.unwrap_or_else(|| ctx.payer_pubkey());
    let built = nonce::create_nonce_account(&ctx.payer_pubkey(), &address, &authority, lamports);
    let confirmed = ctx
        .orchestrator
        .execute("create_nonce_account", built, ctx.payer(), &[keypair])
        .await?;
    let data = fetch_nonce(ctx.rpc(), &address).await?;
    info!(
        target: "workflow",
        address = %address,
        authority = %authority,
        nonce = %data.durable_nonce,
        "nonce account created"
    );
    Ok((lamports, confirmed.signature, data))
}

pub async fn advance_nonce_account(
    ctx: &WorkflowContext,
    address: &Pubkey,
    authority: &Keypair,
) -> Result<(OperationReceipt, NonceData), WorkflowError> {
    let built = vec![nonce::advance_nonce_account(address, &authority.pubkey())];
    let confirmed = ctx
        .orchestrator
        .execute("advance_nonce_account", built, ctx.payer(), &[authority])
        .await?;
    let data = fetch_nonce(ctx.rpc(), address).await?;
    Ok((OperationReceipt::new(*address, &confirmed), data))
}

pub async fn withdraw_nonce_account(
    ctx: &WorkflowContext,
    address: &Pubkey,
    authority: &Keypair,
    to: &Pubkey,
    lamports: u64,
) -> Result<OperationReceipt, WorkflowError> {
    let built = vec![nonce::withdraw_nonce_account(
        address,
        &authority.pubkey(),
        to,
        lamports,
    )];
    let confirmed = ctx
        .orchestrator
        .execute("withdraw_nonce_account", built, ctx.payer(), &[authority])
        .await?;
    Ok(OperationReceipt::new(*address, &confirmed))
}

pub async fn authorize_nonce_account(
    ctx: &WorkflowContext,
    address: &Pubkey,
    authority: &Keypair,
    new_authority: &Pubkey,
) -> Result<OperationReceipt, WorkflowError> {
    let built = vec![nonce::authorize_nonce_account(
        address,
        &authority.pubkey(),
        new_authority,
    )];
    let confirmed = ctx
        .orchestrator
        .execute("authorize_nonce_account", built, ctx.payer(), &[authority])
        .await?;
    Ok(OperationReceipt::new(*address, &confirmed))
}

pub async fn upgrade_nonce_account(
    ctx: &WorkflowContext,
    address: &Pubkey,
) -> Result<OperationReceipt, WorkflowError> {
    let built = vec![nonce::upgrade_nonce_account(address)];
    let confirmed = ctx
        .orchestrator
        .execute("upgrade_nonce_account", built, ctx.payer(), &[])
        .await?;
    Ok(OperationReceipt::new(*address, &confirmed))
}

pub async fn fetch_nonce(rpc: &dyn LedgerRpc, address: &Pubkey) -> Result<NonceData, WorkflowError> {
    let snapshot = rpc
        .query_account(address)
        .await?
        .ok_or_else(|| WorkflowError::Remote(format!("nonce 账户 {address} 不存在")))?;
    if snapshot.owner != system_program::ID {
        return Err(WorkflowError::Remote(format!(
            "账户 {address} 不属于 System Program"
        )));
    }
    nonce::parse_nonce_data(&snapshot.data)
        .ok_or_else(|| WorkflowError::Remote(format!("账户 {address} 不是已初始化的 nonce 账户")))
}

/// 确认结果未知后的补查：直接读取账户当前状态判断交易是否已生效。
pub async fn reconcile(
    rpc: &dyn LedgerRpc,
    address: &Pubkey,
    expected: &ExpectedAccount,
) -> Result<ProbeOutcome, WorkflowError> {
    let outcome = verify::probe(rpc, address, expected).await?;
    info!(
        target: "workflow",
        address = %address,
        outcome = outcome.label(),
        "reconciled account state"
    );
    Ok(outcome)
}
