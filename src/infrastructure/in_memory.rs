use crate::domain::account::{Account, AccountId, LedgerEntry};
use crate::domain::operation::{Operation, OperationStatus, RechargeRequest};
use crate::domain::ports::{
    AccountStore, LedgerStore, OperationStore, RechargeStore, TransferInstruction,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe in-memory account store.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(EngineError::Validation(format!(
                "account {} already exists",
                account.id
            )));
        }
        accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn get(&self, id: &AccountId) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        let mut all: Vec<Account> = accounts.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Append-only in-memory ledger.
///
/// `append_batch` holds the write lock for the whole read-check-append cycle,
/// so batches touching the same account are serialized and a failed batch
/// leaves no trace.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    entries: Arc<RwLock<HashMap<AccountId, Vec<LedgerEntry>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append_batch(&self, batch: Vec<TransferInstruction>) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.entries.write().await;

        // First pass: walk the batch against working balances without
        // touching the ledger. A batch may hit the same account twice.
        let mut working: HashMap<AccountId, Decimal> = HashMap::new();
        for instruction in &batch {
            let balance = match working.get(&instruction.account_id) {
                Some(balance) => *balance,
                None => entries
                    .get(&instruction.account_id)
                    .and_then(|chain| chain.last())
                    .map(|entry| entry.balance_after)
                    .unwrap_or(Decimal::ZERO),
            };
            let after = balance + instruction.amount;
            if after < Decimal::ZERO {
                return Err(EngineError::InsufficientBalance {
                    account: instruction.account_id.clone(),
                    balance,
                    requested: instruction.amount.abs(),
                });
            }
            working.insert(instruction.account_id.clone(), after);
        }

        // Second pass: append. Nothing here can fail.
        let now = Utc::now();
        let mut appended = Vec::with_capacity(batch.len());
        for instruction in batch {
            let chain = entries.entry(instruction.account_id.clone()).or_default();
            let before = chain
                .last()
                .map(|entry| entry.balance_after)
                .unwrap_or(Decimal::ZERO);
            let entry = LedgerEntry {
                id: Uuid::new_v4(),
                account_id: instruction.account_id,
                amount: instruction.amount,
                balance_before: before,
                balance_after: before + instruction.amount,
                kind: instruction.kind,
                description: instruction.description,
                metadata: instruction.metadata,
                created_at: now,
            };
            chain.push(entry.clone());
            appended.push(entry);
        }
        Ok(appended)
    }

    async fn entries_for(&self, account: &AccountId) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(account).cloned().unwrap_or_default())
    }

    async fn balance_of(&self, account: &AccountId) -> Result<Decimal> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(account)
            .and_then(|chain| chain.last())
            .map(|entry| entry.balance_after)
            .unwrap_or(Decimal::ZERO))
    }
}

/// Thread-safe in-memory operation store. `try_assign` performs the claim
/// check and the write under a single lock acquisition (compare-and-set).
#[derive(Default, Clone)]
pub struct InMemoryOperationStore {
    operations: Arc<RwLock<HashMap<Uuid, Operation>>>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn insert(&self, operation: Operation) -> Result<()> {
        let mut operations = self.operations.write().await;
        if operations
            .values()
            .any(|existing| existing.reference == operation.reference)
        {
            return Err(EngineError::Validation(format!(
                "reference '{}' is already taken",
                operation.reference
            )));
        }
        operations.insert(operation.id, operation);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Operation>> {
        let operations = self.operations.read().await;
        Ok(operations.get(&id).cloned())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Operation>> {
        let operations = self.operations.read().await;
        Ok(operations
            .values()
            .find(|operation| operation.reference == reference)
            .cloned())
    }

    async fn try_assign(
        &self,
        id: Uuid,
        reviewer: AccountId,
        at: DateTime<Utc>,
    ) -> Result<Operation> {
        let mut operations = self.operations.write().await;
        let operation = operations.get_mut(&id).ok_or_else(|| EngineError::NotFound {
            entity: "operation",
            id: id.to_string(),
        })?;

        if let Some(validator) = &operation.validator_id {
            return Err(EngineError::AlreadyAssigned {
                operation: id,
                validator: validator.clone(),
            });
        }
        if operation.status != OperationStatus::Pending {
            return Err(EngineError::InvalidTransition {
                operation: id,
                expected: OperationStatus::Pending,
                actual: operation.status,
            });
        }

        operation.status = OperationStatus::PendingValidation;
        operation.validator_id = Some(reviewer);
        operation.validated_at = Some(at);
        Ok(operation.clone())
    }

    async fn update(&self, operation: Operation) -> Result<()> {
        let mut operations = self.operations.write().await;
        if !operations.contains_key(&operation.id) {
            return Err(EngineError::NotFound {
                entity: "operation",
                id: operation.id.to_string(),
            });
        }
        operations.insert(operation.id, operation);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Operation>> {
        let operations = self.operations.read().await;
        let mut all: Vec<Operation> = operations.values().cloned().collect();
        all.sort_by_key(|operation| operation.created_at);
        Ok(all)
    }
}

/// Thread-safe in-memory recharge-request store.
#[derive(Default, Clone)]
pub struct InMemoryRechargeStore {
    requests: Arc<RwLock<HashMap<Uuid, RechargeRequest>>>,
}

impl InMemoryRechargeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RechargeStore for InMemoryRechargeStore {
    async fn insert(&self, request: RechargeRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        if requests
            .values()
            .any(|existing| existing.reference == request.reference)
        {
            return Err(EngineError::Validation(format!(
                "reference '{}' is already taken",
                request.reference
            )));
        }
        requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<RechargeRequest>> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id).cloned())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<RechargeRequest>> {
        let requests = self.requests.read().await;
        Ok(requests
            .values()
            .find(|request| request.reference == reference)
            .cloned())
    }

    async fn update(&self, request: RechargeRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        if !requests.contains_key(&request.id) {
            return Err(EngineError::NotFound {
                entity: "recharge request",
                id: request.id.to_string(),
            });
        }
        requests.insert(request.id, request);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RechargeRequest>> {
        let requests = self.requests.read().await;
        let mut all: Vec<RechargeRequest> = requests.values().cloned().collect();
        all.sort_by_key(|request| request.created_at);
        Ok(all)
    }
}
