use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque account identifier. Accounts are seeded from configuration and
/// referenced by these ids everywhere else in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Chef,
    Admin,
}

/// An actor in the network. Carries no balance field: an account's balance
/// is the `balance_after` of its newest ledger entry, never a stored value.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub role: Role,
    pub agency_id: String,
}

/// A strictly positive monetary amount.
///
/// Wraps `rust_decimal::Decimal` so that operation and recharge amounts are
/// validated once at the boundary and trusted everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::Validation(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    InitialCredit,
    AdminCredit,
    AdminDebit,
    Recharge,
    Commission,
    OperationDebit,
}

/// One immutable balance change. Entries are append-only; for every account
/// the entries form a chain where each `balance_before` equals the previous
/// entry's `balance_after`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: AccountId,
    /// Signed: positive credits, negative debits.
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub kind: EntryKind,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether this entry is a valid successor of `prev` in the same
    /// account's chain.
    pub fn follows(&self, prev: &LedgerEntry) -> bool {
        self.account_id == prev.account_id && self.balance_before == prev.balance_after
    }
}
