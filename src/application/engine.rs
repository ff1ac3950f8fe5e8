use crate::application::queue::QueueService;
use crate::application::transfer::TransferExecutor;
use crate::config::{EngineConfig, QueueConfig};
use crate::domain::account::{Account, AccountId, Amount, EntryKind, LedgerEntry, Role};
use crate::domain::commission::CommissionRule;
use crate::domain::operation::{
    Operation, OperationData, OperationStatus, OperationType, RechargePriority, RechargeRequest,
    RechargeStatus,
};
use crate::domain::ports::{
    AccountStoreRef, LedgerStoreRef, OperationStoreRef, RechargeStoreRef, TransferInstruction,
};
use crate::error::{EngineError, Result};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RechargeAction {
    Approve,
    Reject,
}

/// The operation state machine and its collaborators.
///
/// Owns the stores, the transfer executor, and the operation-type
/// configuration. Assignment exclusivity is delegated to the store's
/// compare-and-set `try_assign`; decisions (approve/reject/release and
/// recharge resolution) serialize on an internal mutex so an operation can
/// never be decided twice.
pub struct ValidationEngine {
    accounts: AccountStoreRef,
    ledger: LedgerStoreRef,
    operations: OperationStoreRef,
    recharges: RechargeStoreRef,
    types: RwLock<HashMap<String, OperationType>>,
    queue_config: QueueConfig,
    executor: TransferExecutor,
    decision_lock: Mutex<()>,
}

impl ValidationEngine {
    /// Builds the engine from a validated configuration: seeds accounts and
    /// writes each opening balance as an `initial_credit` ledger entry.
    pub async fn bootstrap(
        config: EngineConfig,
        accounts: AccountStoreRef,
        ledger: LedgerStoreRef,
        operations: OperationStoreRef,
        recharges: RechargeStoreRef,
    ) -> Result<Self> {
        config.validate()?;
        let executor = TransferExecutor::new(accounts.clone(), ledger.clone());

        for seed in &config.accounts {
            accounts.insert(seed.account()).await?;
            if seed.opening_balance > Decimal::ZERO {
                executor
                    .execute(vec![TransferInstruction {
                        account_id: seed.id.clone(),
                        amount: seed.opening_balance,
                        kind: EntryKind::InitialCredit,
                        description: "opening balance".to_string(),
                        metadata: serde_json::Value::Null,
                    }])
                    .await?;
            }
        }

        let types = config
            .operation_types
            .into_iter()
            .map(|ty| (ty.code.clone(), ty))
            .collect();

        Ok(Self {
            accounts,
            ledger,
            operations,
            recharges,
            types: RwLock::new(types),
            queue_config: config.queue,
            executor,
            decision_lock: Mutex::new(()),
        })
    }

    pub fn queue_service(&self) -> QueueService {
        QueueService::new(self.operations.clone(), self.queue_config.clone())
    }

    async fn account(&self, id: &AccountId) -> Result<Account> {
        self.accounts
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "account",
                id: id.to_string(),
            })
    }

    async fn operation(&self, id: Uuid) -> Result<Operation> {
        self.operations
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "operation",
                id: id.to_string(),
            })
    }

    async fn reviewer(&self, id: &AccountId) -> Result<Account> {
        let account = self.account(id).await?;
        if account.role == Role::Agent {
            return Err(EngineError::Unauthorized(format!(
                "account {id} is not a reviewer"
            )));
        }
        Ok(account)
    }

    /// The chef of an agency, if one is configured.
    async fn chef_of(&self, agency_id: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .all()
            .await?
            .into_iter()
            .find(|account| account.role == Role::Chef && account.agency_id == agency_id))
    }

    // ---- operation lifecycle -------------------------------------------

    pub async fn create_operation(
        &self,
        initiator_id: AccountId,
        type_code: &str,
        reference: &str,
        amount: Decimal,
        data: OperationData,
    ) -> Result<Operation> {
        let types = self.types.read().await;
        let ty = types.get(type_code).ok_or_else(|| EngineError::NotFound {
            entity: "operation type",
            id: type_code.to_string(),
        })?;
        if !ty.is_active {
            return Err(EngineError::Validation(format!(
                "operation type {type_code} is inactive"
            )));
        }
        let amount = Amount::new(amount)?.value();
        ty.validate_amount(amount)?;
        ty.validate_data(&data)?;

        let initiator = self.account(&initiator_id).await?;
        let operation = Operation {
            id: Uuid::new_v4(),
            reference: reference.to_string(),
            operation_type: ty.code.clone(),
            amount,
            status: OperationStatus::Pending,
            initiator_id,
            validator_id: None,
            agency_id: initiator.agency_id,
            data,
            commission_amount: None,
            rejection_reason: None,
            created_at: Utc::now(),
            validated_at: None,
            completed_at: None,
        };
        self.operations.insert(operation.clone()).await?;
        tracing::info!(
            operation = %operation.id,
            reference = %operation.reference,
            amount = %operation.amount,
            "operation created"
        );
        Ok(operation)
    }

    /// Claims a pending operation for a reviewer. Concurrent claims are
    /// serialized by the store; exactly one caller wins, the rest get
    /// `AlreadyAssigned`.
    pub async fn assign_operation(&self, id: Uuid, reviewer_id: AccountId) -> Result<Operation> {
        self.reviewer(&reviewer_id).await?;
        let operation = self
            .operations
            .try_assign(id, reviewer_id.clone(), Utc::now())
            .await?;
        tracing::info!(operation = %id, reviewer = %reviewer_id, "operation assigned");
        Ok(operation)
    }

    /// Returns a claimed operation to the pending pool. No ledger effect.
    pub async fn release_operation(&self, id: Uuid) -> Result<Operation> {
        let _guard = self.decision_lock.lock().await;
        let mut operation = self.operation(id).await?;
        if operation.status != OperationStatus::PendingValidation {
            return Err(EngineError::InvalidTransition {
                operation: id,
                expected: OperationStatus::PendingValidation,
                actual: operation.status,
            });
        }
        operation.status = OperationStatus::Pending;
        operation.validator_id = None;
        operation.validated_at = None;
        self.operations.update(operation.clone()).await?;
        tracing::info!(operation = %id, "operation released");
        Ok(operation)
    }

    /// Approves or rejects a claimed operation.
    ///
    /// Approval re-reads the type's active commission rule, debits the
    /// initiator and credits the commission recipients in one atomic batch,
    /// then marks the operation completed. If the transfer fails the
    /// operation stays `pending_validation`, untouched. Rejection never
    /// moves money.
    pub async fn decide_operation(
        &self,
        id: Uuid,
        reviewer_id: AccountId,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Operation> {
        let _guard = self.decision_lock.lock().await;
        let reviewer = self.reviewer(&reviewer_id).await?;
        let mut operation = self.operation(id).await?;

        if operation.status != OperationStatus::PendingValidation {
            return Err(EngineError::InvalidTransition {
                operation: id,
                expected: OperationStatus::PendingValidation,
                actual: operation.status,
            });
        }
        let is_own = operation.validator_id.as_ref() == Some(&reviewer_id);
        if !is_own && reviewer.role != Role::Admin {
            return Err(EngineError::Unauthorized(format!(
                "operation {id} is assigned to another reviewer"
            )));
        }

        match decision {
            Decision::Reject => {
                operation.status = OperationStatus::Rejected;
                operation.rejection_reason = notes;
                self.operations.update(operation.clone()).await?;
                tracing::info!(operation = %id, reviewer = %reviewer_id, "operation rejected");
                Ok(operation)
            }
            Decision::Approve => {
                let types = self.types.read().await;
                let ty = types
                    .get(&operation.operation_type)
                    .ok_or_else(|| EngineError::NotFound {
                        entity: "operation type",
                        id: operation.operation_type.clone(),
                    })?;

                let mut commission = Decimal::ZERO;
                if ty.impacts_balance {
                    let mut batch = vec![TransferInstruction {
                        account_id: operation.initiator_id.clone(),
                        amount: -operation.amount,
                        kind: EntryKind::OperationDebit,
                        description: format!("operation {}", operation.reference),
                        metadata: json!({ "operation_id": operation.id }),
                    }];

                    if let Some(rule) = ty.active_rule() {
                        commission = rule.compute(operation.amount)?;
                        if commission > Decimal::ZERO {
                            let (agent_share, chef_share) = rule.split(commission);
                            let chef = if chef_share > Decimal::ZERO {
                                self.chef_of(&operation.agency_id).await?
                            } else {
                                None
                            };
                            match chef {
                                Some(chef) => {
                                    if agent_share > Decimal::ZERO {
                                        batch.push(commission_credit(
                                            &operation,
                                            operation.initiator_id.clone(),
                                            agent_share,
                                        ));
                                    }
                                    batch.push(commission_credit(
                                        &operation,
                                        chef.id,
                                        chef_share,
                                    ));
                                }
                                // No chef in the agency: the agent takes
                                // the full commission.
                                None => batch.push(commission_credit(
                                    &operation,
                                    operation.initiator_id.clone(),
                                    commission,
                                )),
                            }
                        }
                    }

                    self.executor.execute(batch).await?;
                    operation.commission_amount = Some(commission);
                }

                operation.status = OperationStatus::Completed;
                operation.completed_at = Some(Utc::now());
                self.operations.update(operation.clone()).await?;
                tracing::info!(
                    operation = %id,
                    reviewer = %reviewer_id,
                    %commission,
                    "operation approved"
                );
                Ok(operation)
            }
        }
    }

    /// Operator-invoked sweep: releases operations stuck in
    /// `pending_validation` longer than `max_age`. There is no automatic
    /// background timeout.
    pub async fn release_stale_operations(&self, max_age: Duration) -> Result<Vec<Operation>> {
        let _guard = self.decision_lock.lock().await;
        let cutoff = Utc::now() - max_age;
        let mut released = Vec::new();
        for mut operation in self.operations.list().await? {
            if operation.status == OperationStatus::PendingValidation
                && operation.validated_at.is_some_and(|at| at < cutoff)
            {
                tracing::warn!(
                    operation = %operation.id,
                    validator = ?operation.validator_id,
                    "releasing stale assignment"
                );
                operation.status = OperationStatus::Pending;
                operation.validator_id = None;
                operation.validated_at = None;
                self.operations.update(operation.clone()).await?;
                released.push(operation);
            }
        }
        Ok(released)
    }

    // ---- recharge lifecycle --------------------------------------------

    pub async fn create_recharge_request(
        &self,
        requester_id: AccountId,
        reference: &str,
        amount: Decimal,
        priority: RechargePriority,
    ) -> Result<RechargeRequest> {
        self.account(&requester_id).await?;
        let amount = Amount::new(amount)?.value();
        let request = RechargeRequest {
            id: Uuid::new_v4(),
            reference: reference.to_string(),
            requester_id,
            requested_amount: amount,
            approved_amount: None,
            priority,
            status: RechargeStatus::Open,
            assignee_id: None,
            notes: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.recharges.insert(request.clone()).await?;
        tracing::info!(request = %request.id, reference, %amount, "recharge requested");
        Ok(request)
    }

    pub async fn assign_recharge(&self, id: Uuid, reviewer_id: AccountId) -> Result<RechargeRequest> {
        self.reviewer(&reviewer_id).await?;
        let _guard = self.decision_lock.lock().await;
        let mut request = self.recharge(id).await?;
        if request.status != RechargeStatus::Open {
            return Err(EngineError::Validation(format!(
                "recharge request {id} is {}, not open",
                request.status
            )));
        }
        request.status = RechargeStatus::Assigned;
        request.assignee_id = Some(reviewer_id);
        self.recharges.update(request.clone()).await?;
        Ok(request)
    }

    /// Resolves a recharge ticket. Approval credits the requester's account
    /// with `approved_amount` (the requested amount by default) through the
    /// transfer executor.
    pub async fn resolve_recharge(
        &self,
        id: Uuid,
        reviewer_id: AccountId,
        action: RechargeAction,
        approved_amount: Option<Decimal>,
        notes: Option<String>,
    ) -> Result<RechargeRequest> {
        let reviewer = self.reviewer(&reviewer_id).await?;
        let _guard = self.decision_lock.lock().await;
        let mut request = self.recharge(id).await?;
        if !matches!(request.status, RechargeStatus::Open | RechargeStatus::Assigned) {
            return Err(EngineError::Validation(format!(
                "recharge request {id} is already {}",
                request.status
            )));
        }
        let is_own =
            request.assignee_id.is_none() || request.assignee_id.as_ref() == Some(&reviewer_id);
        if !is_own && reviewer.role != Role::Admin {
            return Err(EngineError::Unauthorized(format!(
                "recharge request {id} is assigned to another reviewer"
            )));
        }

        match action {
            RechargeAction::Approve => {
                let amount =
                    Amount::new(approved_amount.unwrap_or(request.requested_amount))?.value();
                self.executor
                    .execute(vec![TransferInstruction {
                        account_id: request.requester_id.clone(),
                        amount,
                        kind: EntryKind::Recharge,
                        description: format!("recharge {}", request.reference),
                        metadata: json!({ "recharge_id": request.id }),
                    }])
                    .await?;
                request.status = RechargeStatus::Approved;
                request.approved_amount = Some(amount);
                tracing::info!(request = %id, %amount, "recharge approved");
            }
            RechargeAction::Reject => {
                request.status = RechargeStatus::Rejected;
                tracing::info!(request = %id, "recharge rejected");
            }
        }
        request.notes = notes;
        request.resolved_at = Some(Utc::now());
        self.recharges.update(request.clone()).await?;
        Ok(request)
    }

    async fn recharge(&self, id: Uuid) -> Result<RechargeRequest> {
        self.recharges
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "recharge request",
                id: id.to_string(),
            })
    }

    // ---- commission payout and configuration ---------------------------

    /// Moves accrued commission out of a bucket account to a recipient: one
    /// debit, one credit, committed atomically. Admin only.
    pub async fn payout_commission(
        &self,
        actor_id: AccountId,
        bucket_id: AccountId,
        recipient_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Vec<LedgerEntry>> {
        let actor = self.account(&actor_id).await?;
        if actor.role != Role::Admin {
            return Err(EngineError::Unauthorized(format!(
                "account {actor_id} may not pay out commissions"
            )));
        }
        let amount = Amount::new(amount)?.value();
        self.executor
            .execute(vec![
                TransferInstruction {
                    account_id: bucket_id,
                    amount: -amount,
                    kind: EntryKind::Commission,
                    description: description.to_string(),
                    metadata: serde_json::Value::Null,
                },
                TransferInstruction {
                    account_id: recipient_id,
                    amount,
                    kind: EntryKind::Commission,
                    description: description.to_string(),
                    metadata: serde_json::Value::Null,
                },
            ])
            .await
    }

    /// Installs a commission rule on an operation type, replacing any
    /// previous rule. The rule is validated before it is stored.
    pub async fn create_commission_rule(
        &self,
        type_code: &str,
        rule: CommissionRule,
    ) -> Result<CommissionRule> {
        rule.validate()?;
        let mut types = self.types.write().await;
        let ty = types
            .get_mut(type_code)
            .ok_or_else(|| EngineError::NotFound {
                entity: "operation type",
                id: type_code.to_string(),
            })?;
        ty.commission_rule = Some(rule.clone());
        tracing::info!(type_code, rule = %rule.id, "commission rule installed");
        Ok(rule)
    }

    /// Soft-deactivates a type's commission rule; it stays on the type for
    /// audit reproducibility.
    pub async fn deactivate_commission_rule(&self, type_code: &str) -> Result<()> {
        let mut types = self.types.write().await;
        let ty = types
            .get_mut(type_code)
            .ok_or_else(|| EngineError::NotFound {
                entity: "operation type",
                id: type_code.to_string(),
            })?;
        if let Some(rule) = ty.commission_rule.as_mut() {
            rule.is_active = false;
        }
        Ok(())
    }

    // ---- read side -------------------------------------------------------

    pub async fn balance_of(&self, account: &AccountId) -> Result<Decimal> {
        self.ledger.balance_of(account).await
    }

    pub async fn entries_for(&self, account: &AccountId) -> Result<Vec<LedgerEntry>> {
        self.ledger.entries_for(account).await
    }

    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.accounts.all().await
    }

    pub async fn operation_by_reference(&self, reference: &str) -> Result<Operation> {
        self.operations
            .get_by_reference(reference)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "operation",
                id: reference.to_string(),
            })
    }

    pub async fn recharge_by_reference(&self, reference: &str) -> Result<RechargeRequest> {
        self.recharges
            .get_by_reference(reference)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "recharge request",
                id: reference.to_string(),
            })
    }
}

fn commission_credit(
    operation: &Operation,
    recipient: AccountId,
    amount: Decimal,
) -> TransferInstruction {
    TransferInstruction {
        account_id: recipient,
        amount,
        kind: EntryKind::Commission,
        description: format!("commission on operation {}", operation.reference),
        metadata: json!({ "operation_id": operation.id }),
    }
}
