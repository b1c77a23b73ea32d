use std::path::Path;

use anyhow::{Result, anyhow, bail};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_system_interface::program as system_program;
use tracing::warn;

use crate::cli::args::{
    AccountCmd, BalanceCmd, Cli, Command, CreateAccountCmd, FundingArgs, KeygenCmd, NonceCmd,
    SeedCmd, VerifyCmd,
};
use crate::cli::context::{
    build_ledger, build_workflow, init_configs, init_tracing, load_configuration,
    load_signer_or_payer,
};
use crate::cli::utils::{
    decimal_sol_to_lamports, lamports_to_sol, parse_optional_pubkey, parse_pubkey,
    write_keypair_file,
};
use crate::config::SysprogConfig;
use crate::instructions::nonce::parse_nonce_data;
use crate::keys;
use crate::rent;
use crate::rpc::LedgerRpc;
use crate::verify::{ExpectedAccount, ProbeOutcome};
use crate::workflow::{
    self, CreateAccountError, CreateAccountPlan, CreateAccountReceipt, Funding, OperationReceipt,
    WorkflowError,
};

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.global.logging)?;

    if let Some(listen) = config.global.metrics.prometheus_listen.as_deref() {
        crate::monitoring::try_init_prometheus(listen).map_err(|err| anyhow!(err))?;
    }

    match cli.command {
        Command::Init(args) => init_configs(&args)?,
        Command::Keygen(args) => handle_keygen(&args)?,
        Command::Rent(args) => {
            let ledger = build_ledger(&config);
            let lamports = rent::minimum_persistent_balance(ledger.as_ref(), args.space).await?;
            println!(
                "空间 {} 字节的免租最低余额: {} lamports（{} SOL）",
                args.space,
                lamports,
                lamports_to_sol(lamports)
            );
        }
        Command::Balance(args) => handle_balance(&config, &args).await?,
        Command::Account(args) => handle_account(&config, &args).await?,
        Command::Verify(args) => handle_verify(&config, &args).await?,
        Command::CreateAccount(args) => handle_create_account(&config, &args).await?,
        Command::Transfer(args) => {
            let ctx = build_workflow(&config)?;
            let to = parse_pubkey("收款", &args.to)?;
            let lamports = decimal_sol_to_lamports(&args.amount)?;
            let receipt = report(workflow::transfer(&ctx, &to, lamports).await)?;
            print_operation("转账", &receipt);
        }
        Command::Allocate(args) => {
            let ctx = build_workflow(&config)?;
            let account = keys::load_keypair_file(&args.keypair)?;
            let receipt = report(workflow::allocate(&ctx, &account, args.space).await)?;
            print_operation("分配空间", &receipt);
        }
        Command::Assign(args) => {
            let ctx = build_workflow(&config)?;
            let account = keys::load_keypair_file(&args.keypair)?;
            let owner = parse_pubkey("owner", &args.owner)?;
            let receipt = report(workflow::assign(&ctx, &account, &owner).await)?;
            print_operation("转交所属程序", &receipt);
        }
        Command::Seed(cmd) => handle_seed(&config, cmd).await?,
        Command::Nonce(cmd) => handle_nonce(&config, cmd).await?,
    }

    Ok(())
}

fn handle_keygen(args: &KeygenCmd) -> Result<()> {
    if args.count == 0 {
        bail!("--count 必须大于 0");
    }
    if args.outfile.is_some() && args.count != 1 {
        bail!("--outfile 仅在 --count 1 时可用");
    }
    for keypair in keys::generate_many(args.count) {
        match args.outfile.as_deref() {
            Some(path) => {
                write_keypair_file(path, &keypair, args.force)?;
                println!("{}  已保存至 {}", keypair.pubkey(), path.display());
            }
            None => println!("{}", keypair.pubkey()),
        }
    }
    Ok(())
}

async fn handle_balance(config: &SysprogConfig, args: &BalanceCmd) -> Result<()> {
    let address = match args.address.as_deref() {
        Some(value) => parse_pubkey("查询", value)?,
        None => keys::load_payer(&config.global.wallet)?.pubkey(),
    };
    let ledger = build_ledger(config);
    let lamports = ledger.query_balance(&address).await?;
    println!("{address}: {} SOL（{lamports} lamports）", lamports_to_sol(lamports));
    Ok(())
}

async fn handle_account(config: &SysprogConfig, args: &AccountCmd) -> Result<()> {
    let address = parse_pubkey("查询", &args.address)?;
    let ledger = build_ledger(config);
    let Some(snapshot) = ledger.query_account(&address).await? else {
        println!("账户 {address} 不存在");
        return Ok(());
    };
    println!("地址:       {address}");
    println!(
        "余额:       {} SOL（{} lamports）",
        lamports_to_sol(snapshot.lamports),
        snapshot.lamports
    );
    println!("数据空间:   {} 字节", snapshot.space);
    println!("所属程序:   {}", snapshot.owner);
    println!("可执行:     {}", snapshot.executable);
    if snapshot.owner == system_program::ID {
        if let Some(nonce) = parse_nonce_data(&snapshot.data) {
            println!("nonce 授权: {}", nonce.authority);
            println!("nonce 值:   {}", nonce.durable_nonce);
        }
    }
    Ok(())
}

async fn handle_verify(config: &SysprogConfig, args: &VerifyCmd) -> Result<()> {
    let address = parse_pubkey("查询", &args.address)?;
    let expected = ExpectedAccount {
        lamports: args.lamports,
        space: args.space,
        owner: resolve_owner(args.owner.as_deref())?,
    };
    let ledger = build_ledger(config);
    let outcome = workflow::reconcile(ledger.as_ref(), &address, &expected).await?;
    print_probe(&outcome);
    if !outcome.is_match() {
        bail!("账户 {address} 与预期不符");
    }
    Ok(())
}

fn resolve_funding(args: &FundingArgs) -> Result<Funding> {
    if let Some(lamports) = args.lamports {
        return Ok(Funding::Exact(lamports));
    }
    match args.extra_sol.as_ref() {
        Some(extra) => Ok(Funding::RentExemptPlus(decimal_sol_to_lamports(extra)?)),
        None => Ok(Funding::RentExempt),
    }
}

fn resolve_owner(value: Option<&str>) -> Result<Pubkey> {
    Ok(parse_optional_pubkey("owner", value)?.unwrap_or(system_program::ID))
}

fn ensure_outfile_absent(path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        if path.exists() {
            bail!("密钥文件已存在: {}", path.display());
        }
    }
    Ok(())
}

async fn handle_create_account(config: &SysprogConfig, args: &CreateAccountCmd) -> Result<()> {
    ensure_outfile_absent(args.outfile.as_deref())?;
    let ctx = build_workflow(config)?;
    let plan = CreateAccountPlan {
        space: args.space,
        funding: resolve_funding(&args.funding)?,
        owner: resolve_owner(args.owner.as_deref())?,
    };

    let receipt = match (args.keypair.as_deref(), args.outfile.as_deref()) {
        (Some(path), _) => {
            let new_account = keys::load_keypair_file(path)?;
            report(workflow::create_account_with_keypair(&ctx, &new_account, plan).await)?
        }
        (None, Some(path)) => {
            // 提交前落盘。
            let new_account = keys::generate();
            write_keypair_file(path, &new_account, false)?;
            println!("新账户密钥对已保存至 {}", path.display());
            report_with_address(
                &new_account.pubkey(),
                workflow::create_account_with_keypair(&ctx, &new_account, plan).await,
            )?
        }
        (None, None) => {
            let receipt = report_generated(workflow::create_account(&ctx, plan).await, None)?;
            if receipt.keypair.is_some() {
                println!("新账户私钥未保存（如需后续签名请使用 --outfile）");
            }
            receipt
        }
    };
    print_creation(&receipt);
    Ok(())
}

async fn handle_seed(config: &SysprogConfig, cmd: SeedCmd) -> Result<()> {
    match cmd {
        SeedCmd::Address { base, seed, owner } => {
            let base = match base.as_deref() {
                Some(value) => parse_pubkey("base", value)?,
                None => keys::load_payer(&config.global.wallet)?.pubkey(),
            };
            let owner = resolve_owner(owner.as_deref())?;
            println!("{}", keys::derive_with_seed(&base, &seed, &owner)?);
        }
        SeedCmd::Create {
            seed,
            space,
            owner,
            funding,
        } => {
            let ctx = build_workflow(config)?;
            let seed = seed.unwrap_or_else(|| keys::random_seed(keys::MAX_SEED_LEN));
            let plan = CreateAccountPlan {
                space,
                funding: resolve_funding(&funding)?,
                owner: resolve_owner(owner.as_deref())?,
            };
            let receipt =
                report(workflow::create_account_with_seed(&ctx, ctx.payer(), &seed, plan).await)?;
            println!("seed:       {seed}");
            print_creation(&receipt);
        }
        SeedCmd::Allocate { seed, space, owner } => {
            let ctx = build_workflow(config)?;
            let owner = parse_pubkey("owner", &owner)?;
            let receipt = report(
                workflow::allocate_with_seed(&ctx, ctx.payer(), &seed, space, &owner).await,
            )?;
            print_operation("派生账户分配空间", &receipt);
        }
        SeedCmd::Assign { seed, owner } => {
            let ctx = build_workflow(config)?;
            let owner = parse_pubkey("owner", &owner)?;
            let receipt =
                report(workflow::assign_with_seed(&ctx, ctx.payer(), &seed, &owner).await)?;
            print_operation("派生账户转交所属程序", &receipt);
        }
        SeedCmd::Transfer {
            seed,
            from_owner,
            to,
            amount,
        } => {
            let ctx = build_workflow(config)?;
            let from_owner = resolve_owner(from_owner.as_deref())?;
            let to = parse_pubkey("收款", &to)?;
            let lamports = decimal_sol_to_lamports(&amount)?;
            let receipt = report(
                workflow::transfer_with_seed(&ctx, ctx.payer(), &seed, &from_owner, &to, lamports)
                    .await,
            )?;
            print_operation("派生账户转账", &receipt);
        }
    }
    Ok(())
}

async fn handle_nonce(config: &SysprogConfig, cmd: NonceCmd) -> Result<()> {
    match cmd {
        NonceCmd::Create { authority, outfile } => {
            ensure_outfile_absent(outfile.as_deref())?;
            let ctx = build_workflow(config)?;
            let authority = parse_optional_pubkey("authority", authority.as_deref())?;
            let receipt = report_generated(
                workflow::create_nonce_account(&ctx, authority, Funding::RentExempt).await,
                outfile.as_deref(),
            )?;
            println!("nonce 账户: {}", receipt.address);
            println!(
                "注资:       {} SOL（{} lamports）",
                lamports_to_sol(receipt.lamports),
                receipt.lamports
            );
            println!("授权地址:   {}", receipt.nonce.authority);
            println!("nonce 值:   {}", receipt.nonce.durable_nonce);
            println!("签名:       {}", receipt.signature);
            if let Some(path) = outfile.as_deref() {
                write_keypair_file(path, &receipt.keypair, false)?;
                println!("nonce 账户密钥对已保存至 {}", path.display());
            }
        }
        NonceCmd::Show { address } => {
            let address = parse_pubkey("nonce", &address)?;
            let ledger = build_ledger(config);
            let data = workflow::fetch_nonce(ledger.as_ref(), &address).await?;
            println!("授权地址: {}", data.authority);
            println!("nonce 值: {}", data.durable_nonce);
            println!("签名费:   {} lamports", data.lamports_per_signature);
        }
        NonceCmd::Advance {
            address,
            authority_keypair,
        } => {
            let ctx = build_workflow(config)?;
            let address = parse_pubkey("nonce", &address)?;
            let authority = load_authority(authority_keypair.as_deref(), config)?;
            let (receipt, data) =
                report(workflow::advance_nonce_account(&ctx, &address, &authority).await)?;
            print_operation("推进 nonce", &receipt);
            println!("新 nonce 值: {}", data.durable_nonce);
        }
        NonceCmd::Withdraw {
            address,
            to,
            amount,
            authority_keypair,
        } => {
            let ctx = build_workflow(config)?;
            let address = parse_pubkey("nonce", &address)?;
            let to = parse_pubkey("收款", &to)?;
            let lamports = decimal_sol_to_lamports(&amount)?;
            let authority = load_authority(authority_keypair.as_deref(), config)?;
            let receipt = report(
                workflow::withdraw_nonce_account(&ctx, &address, &authority, &to, lamports).await,
            )?;
            print_operation("提取 nonce 余额", &receipt);
        }
        NonceCmd::Authorize {
            address,
            new_authority,
            authority_keypair,
        } => {
            let ctx = build_workflow(config)?;
            let address = parse_pubkey("nonce", &address)?;
            let new_authority = parse_pubkey("新授权", &new_authority)?;
            let authority = load_authority(authority_keypair.as_deref(), config)?;
            let receipt = report(
                workflow::authorize_nonce_account(&ctx, &address, &authority, &new_authority)
                    .await,
            )?;
            print_operation("变更 nonce 授权", &receipt);
        }
        NonceCmd::Upgrade { address } => {
            let ctx = build_workflow(config)?;
            let address = parse_pubkey("nonce", &address)?;
            let receipt = report(workflow::upgrade_nonce_account(&ctx, &address).await)?;
            print_operation("升级 nonce", &receipt);
        }
    }
    Ok(())
}

fn load_authority(path: Option<&Path>, config: &SysprogConfig) -> Result<Keypair> {
    load_signer_or_payer(path, config)
}

/// 对结果未知或可重试的错误补充提示后再返回。
fn report<T>(result: Result<T, WorkflowError>) -> Result<T> {
    result.map_err(|err| {
        if err.is_ambiguous() {
            warn!(
                target: "cli",
                error = %err,
                "交易确认结果未知，请使用 `sysprog verify <地址>` 核对账户状态后再决定是否重试"
            );
        } else if err.is_transient() {
            warn!(target: "cli", error = %err, "临时性错误，可重新执行该命令");
        } else if let Some(rejection) = err.rejection() {
            let hint = if rejection.is_funds_failure() {
                "余额不足或注资低于免租最低余额"
            } else if rejection.is_signature_failure() {
                "缺少必需签名或签名无效"
            } else {
                "请求被账本拒绝"
            };
            warn!(target: "cli", rejection = %rejection, hint, "交易被拒绝");
        }
        anyhow!(err)
    })
}

/// 调用方持有私钥时的失败：补充打印新账户地址。
fn report_with_address<T>(address: &Pubkey, result: Result<T, WorkflowError>) -> Result<T> {
    if let Err(err) = &result {
        print_failed_address(address, err);
    }
    report(result)
}

/// 流水线生成私钥时的失败：打印地址，给出 `outfile` 时把私钥写入该文件。
fn report_generated<T>(
    result: Result<T, CreateAccountError>,
    outfile: Option<&Path>,
) -> Result<T> {
    let failure = match result {
        Ok(value) => return Ok(value),
        Err(failure) => failure,
    };
    print_failed_address(&failure.address, &failure.source);
    match outfile {
        Some(path) => {
            write_keypair_file(path, &failure.keypair, false)?;
            println!("新账户密钥对已保存至 {}", path.display());
        }
        None if failure.source.is_ambiguous() => {
            warn!(
                target: "cli",
                address = %failure.address,
                "新账户私钥未保存；若交易已落账，该账户将无法再由其自身签名"
            );
        }
        None => {}
    }
    report(Err(failure.source))
}

fn print_failed_address(address: &Pubkey, err: &WorkflowError) {
    println!("新账户:     {address}");
    if err.is_ambiguous() {
        println!("核对命令:   sysprog verify {address}");
    }
}

fn print_creation(receipt: &CreateAccountReceipt) {
    println!("新账户:     {}", receipt.address);
    println!(
        "注资:       {} SOL（{} lamports，免租最低 {}）",
        lamports_to_sol(receipt.lamports),
        receipt.lamports,
        receipt.minimum_balance
    );
    println!("签名:       {}", receipt.signature);
    println!("slot:       {}", receipt.slot);
    match receipt.probe.as_ref() {
        Some(probe) => print_probe(probe),
        None => println!(
            "校验:       账户读取失败，请稍后执行 sysprog verify {}",
            receipt.address
        ),
    }
}

fn print_operation(action: &str, receipt: &OperationReceipt) {
    println!("{action}完成: {}", receipt.address);
    println!("签名: {}", receipt.signature);
    println!("slot: {}", receipt.slot);
    if let Some(probe) = receipt.probe.as_ref() {
        print_probe(probe);
    }
}

fn print_probe(probe: &ProbeOutcome) {
    match probe {
        ProbeOutcome::Matches(_) => println!("校验:       账户状态与请求一致"),
        ProbeOutcome::Missing => println!("校验:       账户不存在"),
        ProbeOutcome::Mismatch { fields, .. } => {
            println!("校验:       账户状态与请求不一致");
            for field in fields {
                println!("  - {field}");
            }
        }
    }
}
