use agentpay::application::engine::{Decision, RechargeAction, ValidationEngine};
use agentpay::config::EngineConfig;
use agentpay::domain::operation::{OperationData, RechargePriority};
use agentpay::domain::ports::{
    AccountStoreRef, LedgerStoreRef, OperationStoreRef, RechargeStoreRef,
};
use agentpay::error::{EngineError, Result as EngineResult};
use agentpay::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryLedgerStore, InMemoryOperationStore, InMemoryRechargeStore,
};
use agentpay::interfaces::csv::balance_writer::BalanceWriter;
use agentpay::interfaces::csv::journal_reader::{JournalAction, JournalReader, JournalRecord};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Journal CSV to replay (action, actor, reference, type, amount)
    journal: PathBuf,

    /// Engine configuration (accounts, operation types, queue thresholds)
    #[arg(long)]
    config: PathBuf,

    /// Print queue stats for this reviewer to stderr after the replay
    #[arg(long)]
    stats: Option<String>,
}

async fn apply(engine: &ValidationEngine, record: JournalRecord) -> EngineResult<()> {
    let actor = record.actor.as_str().into();
    match record.action {
        JournalAction::Submit => {
            let type_code = record
                .r#type
                .ok_or_else(|| EngineError::MissingField("type".to_string()))?;
            let amount = record
                .amount
                .ok_or_else(|| EngineError::MissingField("amount".to_string()))?;
            engine
                .create_operation(
                    actor,
                    &type_code,
                    &record.reference,
                    amount,
                    OperationData::new(),
                )
                .await?;
        }
        JournalAction::Assign => {
            let operation = engine.operation_by_reference(&record.reference).await?;
            engine.assign_operation(operation.id, actor).await?;
        }
        JournalAction::Release => {
            let operation = engine.operation_by_reference(&record.reference).await?;
            engine.release_operation(operation.id).await?;
        }
        JournalAction::Approve => {
            let operation = engine.operation_by_reference(&record.reference).await?;
            engine
                .decide_operation(operation.id, actor, Decision::Approve, None)
                .await?;
        }
        JournalAction::Reject => {
            let operation = engine.operation_by_reference(&record.reference).await?;
            engine
                .decide_operation(operation.id, actor, Decision::Reject, None)
                .await?;
        }
        JournalAction::RechargeRequest => {
            let amount = record
                .amount
                .ok_or_else(|| EngineError::MissingField("amount".to_string()))?;
            engine
                .create_recharge_request(
                    actor,
                    &record.reference,
                    amount,
                    RechargePriority::Normal,
                )
                .await?;
        }
        JournalAction::RechargeApprove => {
            let request = engine.recharge_by_reference(&record.reference).await?;
            engine
                .resolve_recharge(
                    request.id,
                    actor,
                    RechargeAction::Approve,
                    record.amount,
                    None,
                )
                .await?;
        }
        JournalAction::RechargeReject => {
            let request = engine.recharge_by_reference(&record.reference).await?;
            engine
                .resolve_recharge(request.id, actor, RechargeAction::Reject, None, None)
                .await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config_file = File::open(&cli.config).into_diagnostic()?;
    let config = EngineConfig::from_reader(config_file).into_diagnostic()?;

    let accounts: AccountStoreRef = Arc::new(InMemoryAccountStore::new());
    let ledger: LedgerStoreRef = Arc::new(InMemoryLedgerStore::new());
    let operations: OperationStoreRef = Arc::new(InMemoryOperationStore::new());
    let recharges: RechargeStoreRef = Arc::new(InMemoryRechargeStore::new());
    let engine = ValidationEngine::bootstrap(
        config,
        accounts,
        ledger.clone(),
        operations,
        recharges,
    )
    .await
    .into_diagnostic()?;

    let journal = File::open(&cli.journal).into_diagnostic()?;
    for record in JournalReader::new(journal).records() {
        match record {
            Ok(record) => {
                if let Err(e) = apply(&engine, record).await {
                    eprintln!("Error applying journal record: {e}");
                }
            }
            Err(e) => eprintln!("Error reading journal record: {e}"),
        }
    }

    if let Some(reviewer) = cli.stats {
        let stats = engine
            .queue_service()
            .stats(&reviewer.as_str().into())
            .await
            .into_diagnostic()?;
        let json = serde_json::to_string(&stats).into_diagnostic()?;
        eprintln!("{json}");
    }

    let all_accounts = engine.accounts().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer
        .write_balances(&all_accounts, &ledger)
        .await
        .into_diagnostic()?;

    Ok(())
}
