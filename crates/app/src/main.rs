use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Engine, EngineError, ErrorKind, ExpenseInput, SplitInput, SplitType};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;

mod settings;

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "splitledger")]
#[command(about = "Shared expense ledger: record expenses, settle and simplify debts")]
struct Cli {
    /// Settings file (defaults to `settings.toml` when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply, roll back or inspect the database schema.
    Migrate(Migrate),
    #[command(flatten)]
    Ledger(LedgerCommand),
}

#[derive(Args, Debug)]
struct Migrate {
    #[command(subcommand)]
    command: MigrateCommand,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum MigrateCommand {
    Up,
    Down,
    Fresh,
    Status,
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    User(User),
    Group(Group),
    Expense(Expense),
    /// Record a payment from one user to another.
    Settle(SettleArgs),
    /// Shorten debt chains, for one user or the whole ledger.
    Simplify(SimplifyArgs),
    /// Outstanding balances, optionally filtered by user or group.
    Balances(BalancesArgs),
    /// Settlements a user paid or received.
    Settlements(SettlementsArgs),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(NameArgs),
    List,
}

#[derive(Args, Debug)]
struct Group {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create(NameArgs),
    List,
    AddMember(AddMemberArgs),
    Members(GroupArgs),
}

#[derive(Args, Debug)]
struct NameArgs {
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct AddMemberArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    user: String,
}

#[derive(Args, Debug)]
struct GroupArgs {
    #[arg(long)]
    group: String,
}

#[derive(Args, Debug)]
struct Expense {
    #[command(subcommand)]
    command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    Add(ExpenseAddArgs),
    Show(ExpenseShowArgs),
}

#[derive(Args, Debug)]
struct ExpenseAddArgs {
    /// Explicit expense id; a UUID is generated when omitted.
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    group: String,
    #[arg(long)]
    paid_by: String,
    #[arg(long)]
    amount: f64,
    #[arg(long, value_parser = parse_split_type, default_value = "EQUAL")]
    split_type: SplitType,
    #[arg(long = "participant", required = true)]
    participants: Vec<String>,
    /// `user=value` pairs for EXACT and PERCENT splits.
    #[arg(long = "split", value_parser = parse_split)]
    splits: Vec<SplitInput>,
    #[arg(long, default_value = "")]
    description: String,
}

#[derive(Args, Debug)]
struct ExpenseShowArgs {
    #[arg(long)]
    id: String,
}

#[derive(Args, Debug)]
struct SettleArgs {
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long)]
    amount: f64,
}

#[derive(Args, Debug)]
struct SimplifyArgs {
    #[arg(long)]
    user: Option<String>,
}

#[derive(Args, Debug)]
struct BalancesArgs {
    #[arg(long, conflicts_with = "group")]
    user: Option<String>,
    #[arg(long)]
    group: Option<String>,
}

#[derive(Args, Debug)]
struct SettlementsArgs {
    #[arg(long)]
    user: String,
}

fn parse_split_type(raw: &str) -> Result<SplitType, String> {
    SplitType::try_from(raw.to_ascii_uppercase().as_str()).map_err(|err| err.to_string())
}

fn parse_split(raw: &str) -> Result<SplitInput, String> {
    let (user, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected user=value, got `{raw}`"))?;
    let user = user.trim();
    if user.is_empty() {
        return Err(format!("missing user in `{raw}`"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid value in `{raw}`: {err}"))?;
    Ok(SplitInput::new(user, value))
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(err: &(dyn Error + Send + Sync + 'static)) -> i32 {
    match err.downcast_ref::<EngineError>().map(EngineError::kind) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::StateConflict) => 3,
        Some(ErrorKind::Storage) | None => 1,
    }
}

/// Runs one schema command and reports which migrations are applied.
async fn migrate(db: &DatabaseConnection, command: MigrateCommand) -> CliResult<()> {
    match command {
        MigrateCommand::Up => Migrator::up(db, None).await?,
        MigrateCommand::Down => Migrator::down(db, None).await?,
        MigrateCommand::Fresh => Migrator::fresh(db).await?,
        MigrateCommand::Status => {}
    }

    let applied: Vec<String> = Migrator::get_applied_migrations(db)
        .await?
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    let pending: Vec<String> = Migrator::get_pending_migrations(db)
        .await?
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    print_json(&json!({ "applied": applied, "pending": pending }))
}

async fn run(db: DatabaseConnection, command: Command) -> CliResult<()> {
    match command {
        Command::Migrate(Migrate { command }) => migrate(&db, command).await,
        Command::Ledger(command) => {
            Migrator::up(&db, None).await?;
            let engine = Engine::builder().database(db).build().await?;
            run_ledger(&engine, command).await
        }
    }
}

async fn run_ledger(engine: &Engine, command: LedgerCommand) -> CliResult<()> {
    match command {
        LedgerCommand::User(User { command }) => match command {
            UserCommand::Create(args) => print_json(&engine.create_user(&args.name).await?),
            UserCommand::List => print_json(&engine.users().await?),
        },
        LedgerCommand::Group(Group { command }) => match command {
            GroupCommand::Create(args) => print_json(&engine.create_group(&args.name).await?),
            GroupCommand::List => print_json(&engine.groups().await?),
            GroupCommand::AddMember(args) => {
                engine.add_group_member(&args.group, &args.user).await?;
                print_json(&json!({ "group_id": args.group, "user_id": args.user }))
            }
            GroupCommand::Members(args) => print_json(&engine.group_members(&args.group).await?),
        },
        LedgerCommand::Expense(Expense { command }) => match command {
            ExpenseCommand::Add(args) => {
                let expense_id = engine
                    .create_expense(ExpenseInput {
                        expense_id: args.id.unwrap_or_default(),
                        group_id: args.group,
                        paid_by: args.paid_by,
                        total_amount: args.amount,
                        split_type: args.split_type,
                        participants: args.participants,
                        splits: args.splits,
                        description: args.description,
                    })
                    .await?;
                print_json(&json!({ "expense_id": expense_id }))
            }
            ExpenseCommand::Show(args) => print_json(&engine.expense(&args.id).await?),
        },
        LedgerCommand::Settle(args) => print_json(
            &engine
                .settle_balance(&args.from, &args.to, args.amount)
                .await?,
        ),
        LedgerCommand::Simplify(args) => {
            let transfers = match args.user.as_deref() {
                Some(user) => engine.simplify_user_balances(user).await?,
                None => engine.simplify_balances().await?,
            };
            print_json(&json!({ "transfers": transfers }))
        }
        LedgerCommand::Balances(args) => {
            let balances = match (args.user.as_deref(), args.group.as_deref()) {
                (Some(user), _) => engine.user_balances(user).await?,
                (None, Some(group)) => engine.group_balances(group).await?,
                (None, None) => engine.all_balances().await?,
            };
            print_json(&balances)
        }
        LedgerCommand::Settlements(args) => print_json(&engine.settlements_for_user(&args.user).await?),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match settings::Settings::new(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load settings: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitledger={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let db = match sea_orm::Database::connect(settings.database_url()).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!("failed to connect to database: {err}");
            eprintln!("failed to connect to database: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(db, cli.command).await {
        eprintln!("error: {err}");
        std::process::exit(exit_code(err.as_ref()));
    }
}
