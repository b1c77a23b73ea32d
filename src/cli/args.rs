use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "sysprog", version, about = "Solana System Program 账户创建与管理工具")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 sysprog.toml 或 config/sysprog.toml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 初始化配置模版文件
    Init(InitCmd),
    /// 生成新的密钥对
    Keygen(KeygenCmd),
    /// 查询指定空间的免租最低余额
    Rent(RentCmd),
    /// 查询余额（默认付款钱包）
    Balance(BalanceCmd),
    /// 查询账户状态
    Account(AccountCmd),
    /// 核对账户是否符合预期（交易确认结果未知时使用）
    Verify(VerifyCmd),
    /// 生成新地址并创建账户
    #[command(name = "create-account")]
    CreateAccount(CreateAccountCmd),
    /// 从付款钱包转出 SOL
    Transfer(TransferCmd),
    /// 为自有系统账户分配数据空间
    Allocate(AllocateCmd),
    /// 将自有系统账户转交给其他程序
    Assign(AssignCmd),
    /// 派生地址（base + seed + owner）相关操作
    #[command(subcommand)]
    Seed(SeedCmd),
    /// 持久化 nonce 账户相关操作
    #[command(subcommand)]
    Nonce(NonceCmd),
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct KeygenCmd {
    #[arg(long, default_value_t = 1usize, help = "生成数量")]
    pub count: usize,
    #[arg(
        long,
        value_name = "FILE",
        help = "将密钥对以 JSON 数组写入文件（仅 count = 1 时可用）"
    )]
    pub outfile: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct RentCmd {
    #[arg(help = "账户数据空间（字节）")]
    pub space: u64,
}

#[derive(Args, Debug)]
pub struct BalanceCmd {
    #[arg(help = "账户地址，缺省为付款钱包")]
    pub address: Option<String>,
}

#[derive(Args, Debug)]
pub struct AccountCmd {
    #[arg(help = "账户地址")]
    pub address: String,
}

#[derive(Args, Debug)]
pub struct VerifyCmd {
    #[arg(help = "账户地址")]
    pub address: String,
    #[arg(long, default_value_t = 0u64, help = "期望的数据空间（字节）")]
    pub space: u64,
    #[arg(long, help = "期望的所属程序，缺省为 System Program")]
    pub owner: Option<String>,
    #[arg(long, help = "期望余额（lamports），缺省不校验")]
    pub lamports: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct FundingArgs {
    #[arg(
        long,
        value_name = "SOL",
        conflicts_with = "lamports",
        help = "在免租最低余额之上追加的 SOL"
    )]
    pub extra_sol: Option<Decimal>,
    #[arg(long, help = "固定注资 lamports（低于最低余额时账本会拒绝）")]
    pub lamports: Option<u64>,
}

#[derive(Args, Debug)]
pub struct CreateAccountCmd {
    #[arg(long, default_value_t = 0u64, help = "账户数据空间（字节）")]
    pub space: u64,
    #[arg(long, help = "所属程序，缺省为 System Program")]
    pub owner: Option<String>,
    #[command(flatten)]
    pub funding: FundingArgs,
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with = "outfile",
        help = "使用已有密钥文件作为新账户，缺省时随机生成"
    )]
    pub keypair: Option<PathBuf>,
    #[arg(long, value_name = "FILE", help = "保存随机生成的新账户密钥对")]
    pub outfile: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TransferCmd {
    #[arg(help = "收款地址")]
    pub to: String,
    #[arg(help = "转账数量（SOL，最多 9 位小数）")]
    pub amount: Decimal,
}

#[derive(Args, Debug)]
pub struct AllocateCmd {
    #[arg(long, value_name = "FILE", help = "待分配账户的密钥文件")]
    pub keypair: PathBuf,
    #[arg(long, help = "数据空间（字节）")]
    pub space: u64,
}

#[derive(Args, Debug)]
pub struct AssignCmd {
    #[arg(long, value_name = "FILE", help = "待转交账户的密钥文件")]
    pub keypair: PathBuf,
    #[arg(long, help = "新的所属程序")]
    pub owner: String,
}

#[derive(Subcommand, Debug)]
pub enum SeedCmd {
    /// 计算派生地址（不发送交易）
    Address {
        #[arg(long, help = "base 地址，缺省为付款钱包")]
        base: Option<String>,
        #[arg(long)]
        seed: String,
        #[arg(long, help = "所属程序，缺省为 System Program")]
        owner: Option<String>,
    },
    /// 以付款钱包为 base 创建派生账户
    Create {
        #[arg(long, help = "缺省时随机生成")]
        seed: Option<String>,
        #[arg(long, default_value_t = 0u64)]
        space: u64,
        #[arg(long, help = "所属程序，缺省为 System Program")]
        owner: Option<String>,
        #[command(flatten)]
        funding: FundingArgs,
    },
    /// 为派生账户分配空间并设置所属程序
    Allocate {
        #[arg(long)]
        seed: String,
        #[arg(long)]
        space: u64,
        #[arg(long)]
        owner: String,
    },
    /// 设置派生账户的所属程序
    Assign {
        #[arg(long)]
        seed: String,
        #[arg(long)]
        owner: String,
    },
    /// 从派生账户转出 SOL
    Transfer {
        #[arg(long)]
        seed: String,
        #[arg(long, help = "派生时使用的 owner，缺省为 System Program")]
        from_owner: Option<String>,
        #[arg(help = "收款地址")]
        to: String,
        #[arg(help = "转账数量（SOL）")]
        amount: Decimal,
    },
}

#[derive(Subcommand, Debug)]
pub enum NonceCmd {
    /// 创建并初始化 nonce 账户
    Create {
        #[arg(long, help = "nonce 授权地址，缺省为付款钱包")]
        authority: Option<String>,
        #[arg(long, value_name = "FILE", help = "保存 nonce 账户密钥对")]
        outfile: Option<PathBuf>,
    },
    /// 查看 nonce 账户当前值
    Show {
        address: String,
    },
    /// 推进 nonce 值
    Advance {
        address: String,
        #[arg(long, value_name = "FILE", help = "授权者密钥文件，缺省为付款钱包")]
        authority_keypair: Option<PathBuf>,
    },
    /// 从 nonce 账户提取 SOL
    Withdraw {
        address: String,
        to: String,
        #[arg(help = "提取数量（SOL）")]
        amount: Decimal,
        #[arg(long, value_name = "FILE", help = "授权者密钥文件，缺省为付款钱包")]
        authority_keypair: Option<PathBuf>,
    },
    /// 变更 nonce 授权地址
    Authorize {
        address: String,
        new_authority: String,
        #[arg(long, value_name = "FILE", help = "授权者密钥文件，缺省为付款钱包")]
        authority_keypair: Option<PathBuf>,
    },
    /// 将 legacy nonce 账户升级为当前版本
    Upgrade {
        address: String,
    },
}
