#![allow(dead_code)]

use agentpay::application::engine::ValidationEngine;
use agentpay::config::{AccountSeed, EngineConfig, QueueConfig};
use agentpay::domain::account::{AccountId, Role};
use agentpay::domain::commission::{BoundsPolicy, CommissionRule, RuleKind, Tier};
use agentpay::domain::operation::OperationType;
use agentpay::domain::ports::{
    AccountStoreRef, LedgerStoreRef, OperationStoreRef, RechargeStoreRef,
};
use agentpay::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryLedgerStore, InMemoryOperationStore, InMemoryRechargeStore,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

fn seed(id: &str, role: Role, agency: &str, balance: Decimal) -> AccountSeed {
    AccountSeed {
        id: AccountId::new(id),
        name: format!("Account {id}"),
        role,
        agency_id: agency.to_string(),
        opening_balance: balance,
    }
}

pub fn tiered_rule(chef_share_rate: Decimal) -> CommissionRule {
    CommissionRule {
        id: Uuid::new_v4(),
        kind: RuleKind::Tiered {
            tiers: vec![
                Tier {
                    min_amount: dec!(0),
                    max_amount: Some(dec!(1000)),
                    fixed_amount: Some(dec!(50)),
                    percentage_rate: None,
                },
                Tier {
                    min_amount: dec!(1000),
                    max_amount: None,
                    fixed_amount: None,
                    percentage_rate: Some(dec!(0.02)),
                },
            ],
        },
        min_amount: None,
        max_amount: None,
        bounds_policy: BoundsPolicy::default(),
        chef_share_rate,
        is_active: true,
    }
}

fn operation_type(code: &str, impacts_balance: bool, rule: Option<CommissionRule>) -> OperationType {
    OperationType {
        code: code.to_string(),
        name: code.to_string(),
        impacts_balance,
        min_amount: None,
        max_amount: None,
        fields: Vec::new(),
        commission_rule: rule,
        is_active: true,
    }
}

pub fn config() -> EngineConfig {
    EngineConfig {
        accounts: vec![
            seed("A1", Role::Agent, "AG1", dec!(5000)),
            seed("A2", Role::Agent, "AG2", dec!(1000)),
            seed("C1", Role::Chef, "AG1", dec!(0)),
            seed("C2", Role::Chef, "AG2", dec!(0)),
            seed("ADMIN", Role::Admin, "HQ", dec!(0)),
            seed("POOL", Role::Admin, "HQ", dec!(500)),
        ],
        operation_types: vec![
            operation_type("transfer", true, Some(tiered_rule(dec!(0)))),
            operation_type("transfer_split", true, Some(tiered_rule(dec!(0.3)))),
            operation_type(
                "bill_pay",
                true,
                Some(CommissionRule {
                    id: Uuid::new_v4(),
                    kind: RuleKind::Percentage {
                        percentage_rate: dec!(0.025),
                    },
                    min_amount: None,
                    max_amount: None,
                    bounds_policy: BoundsPolicy::default(),
                    chef_share_rate: dec!(0),
                    is_active: true,
                }),
            ),
            operation_type("kyc_update", false, None),
        ],
        queue: QueueConfig::default(),
    }
}

pub struct TestContext {
    pub engine: ValidationEngine,
    pub ledger: LedgerStoreRef,
}

pub async fn context() -> TestContext {
    context_with(config()).await
}

pub async fn context_with(config: EngineConfig) -> TestContext {
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
    .expect("bootstrap failed");
    TestContext { engine, ledger }
}
