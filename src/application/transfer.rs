use crate::domain::account::LedgerEntry;
use crate::domain::ports::{AccountStoreRef, LedgerStoreRef, TransferInstruction};
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;

/// Applies a batch of ledger mutations as a single all-or-nothing unit.
///
/// The executor validates the batch shape (non-empty, non-zero amounts,
/// known accounts) and delegates the commit to the ledger store, whose
/// `append_batch` contract guarantees atomicity and per-account
/// serialization. A partial application is never observable: either every
/// instruction lands or the ledger is untouched.
pub struct TransferExecutor {
    accounts: AccountStoreRef,
    ledger: LedgerStoreRef,
}

impl TransferExecutor {
    pub fn new(accounts: AccountStoreRef, ledger: LedgerStoreRef) -> Self {
        Self { accounts, ledger }
    }

    /// Sum of signed amounts; zero for an internal transfer.
    pub fn net(batch: &[TransferInstruction]) -> Decimal {
        batch.iter().map(|instruction| instruction.amount).sum()
    }

    pub async fn execute(&self, batch: Vec<TransferInstruction>) -> Result<Vec<LedgerEntry>> {
        if batch.is_empty() {
            return Err(EngineError::Validation(
                "transfer batch is empty".to_string(),
            ));
        }
        for instruction in &batch {
            if instruction.amount.is_zero() {
                return Err(EngineError::Validation(format!(
                    "zero-amount transfer for account {}",
                    instruction.account_id
                )));
            }
            if self.accounts.get(&instruction.account_id).await?.is_none() {
                return Err(EngineError::NotFound {
                    entity: "account",
                    id: instruction.account_id.to_string(),
                });
            }
        }

        let net = Self::net(&batch);
        match self.ledger.append_batch(batch).await {
            Ok(entries) => {
                tracing::info!(entries = entries.len(), %net, "transfer batch committed");
                Ok(entries)
            }
            Err(err) => {
                tracing::warn!(error = %err, "transfer batch refused");
                Err(err)
            }
        }
    }
}
