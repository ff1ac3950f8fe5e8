use crate::domain::account::{Account, AccountId, EntryKind, LedgerEntry};
use crate::domain::operation::{Operation, RechargeRequest};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// One requested balance change inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferInstruction {
    pub account_id: AccountId,
    /// Signed: positive credits, negative debits. Never zero.
    pub amount: Decimal,
    pub kind: EntryKind,
    pub description: String,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: Account) -> Result<()>;
    async fn get(&self, id: &AccountId) -> Result<Option<Account>>;
    async fn all(&self) -> Result<Vec<Account>>;
}

/// Append-only ledger. `append_batch` is the only write path and must apply
/// the whole batch or nothing, serialized against every other batch touching
/// the same accounts.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append_batch(&self, batch: Vec<TransferInstruction>) -> Result<Vec<LedgerEntry>>;
    async fn entries_for(&self, account: &AccountId) -> Result<Vec<LedgerEntry>>;
    /// `balance_after` of the account's newest entry; zero with no entries.
    async fn balance_of(&self, account: &AccountId) -> Result<Decimal>;
}

#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Fails `Validation` if the reference is already taken.
    async fn insert(&self, operation: Operation) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Operation>>;
    async fn get_by_reference(&self, reference: &str) -> Result<Option<Operation>>;
    /// Compare-and-set claim: succeeds only if the operation is `Pending`
    /// with no validator, as a single conditional update. Losers of a
    /// concurrent race get `AlreadyAssigned`.
    async fn try_assign(
        &self,
        id: Uuid,
        reviewer: AccountId,
        at: DateTime<Utc>,
    ) -> Result<Operation>;
    async fn update(&self, operation: Operation) -> Result<()>;
    async fn list(&self) -> Result<Vec<Operation>>;
}

#[async_trait]
pub trait RechargeStore: Send + Sync {
    async fn insert(&self, request: RechargeRequest) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<RechargeRequest>>;
    async fn get_by_reference(&self, reference: &str) -> Result<Option<RechargeRequest>>;
    async fn update(&self, request: RechargeRequest) -> Result<()>;
    async fn list(&self) -> Result<Vec<RechargeRequest>>;
}

// Shared handles: the engine and the transfer executor both hold the
// account and ledger stores.
pub type AccountStoreRef = std::sync::Arc<dyn AccountStore + Send + Sync>;
pub type LedgerStoreRef = std::sync::Arc<dyn LedgerStore + Send + Sync>;
pub type OperationStoreRef = std::sync::Arc<dyn OperationStore + Send + Sync>;
pub type RechargeStoreRef = std::sync::Arc<dyn RechargeStore + Send + Sync>;
