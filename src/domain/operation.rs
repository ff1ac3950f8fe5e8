use crate::domain::account::AccountId;
use crate::domain::commission::CommissionRule;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    PendingValidation,
    Completed,
    Rejected,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::PendingValidation => "pending_validation",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Typed schema for an operation type's custom fields. Payloads are
/// validated against this before the state machine ever sees the operation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldKind {
    Text,
    Number,
    Select { options: Vec<String> },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Select(String),
}

pub type OperationData = BTreeMap<String, FieldValue>;

/// Configuration for one kind of money-movement operation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OperationType {
    pub code: String,
    pub name: String,
    /// Whether approving an operation of this type moves money.
    pub impacts_balance: bool,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    pub commission_rule: Option<CommissionRule>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl OperationType {
    /// The rule used at approval time, if any. Deactivated rules earn no
    /// commission but stay on the type for audit reproducibility.
    pub fn active_rule(&self) -> Option<&CommissionRule> {
        self.commission_rule.as_ref().filter(|rule| rule.is_active)
    }

    pub fn validate_amount(&self, amount: Decimal) -> Result<()> {
        if let Some(min) = self.min_amount
            && amount < min
        {
            return Err(EngineError::Validation(format!(
                "amount {amount} is below the {} minimum of {min}",
                self.code
            )));
        }
        if let Some(max) = self.max_amount
            && amount > max
        {
            return Err(EngineError::Validation(format!(
                "amount {amount} exceeds the {} maximum of {max}",
                self.code
            )));
        }
        Ok(())
    }

    /// Checks an operation payload against the field schema: every required
    /// field present, every present field of the declared kind, select
    /// values among the declared options, and no undeclared keys.
    pub fn validate_data(&self, data: &OperationData) -> Result<()> {
        for spec in &self.fields {
            match (data.get(&spec.key), &spec.kind) {
                (None, _) if spec.required => {
                    return Err(EngineError::MissingField(spec.key.clone()));
                }
                (None, _) => {}
                (Some(FieldValue::Text(_)), FieldKind::Text) => {}
                (Some(FieldValue::Number(_)), FieldKind::Number) => {}
                (Some(FieldValue::Select(value)), FieldKind::Select { options }) => {
                    if !options.contains(value) {
                        return Err(EngineError::Validation(format!(
                            "field '{}': '{value}' is not one of the allowed options",
                            spec.key
                        )));
                    }
                }
                (Some(_), _) => {
                    return Err(EngineError::Validation(format!(
                        "field '{}' has the wrong kind",
                        spec.key
                    )));
                }
            }
        }
        if let Some(unknown) = data.keys().find(|key| {
            !self.fields.iter().any(|spec| &spec.key == *key)
        }) {
            return Err(EngineError::Validation(format!(
                "field '{unknown}' is not declared by operation type {}",
                self.code
            )));
        }
        Ok(())
    }
}

/// A single money-movement request. Owned by the state machine for all
/// transitions; immutable once `Completed` or `Rejected`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Operation {
    pub id: Uuid,
    /// Caller-supplied, unique across all operations.
    pub reference: String,
    pub operation_type: String,
    pub amount: Decimal,
    pub status: OperationStatus,
    pub initiator_id: AccountId,
    pub validator_id: Option<AccountId>,
    pub agency_id: String,
    pub data: OperationData,
    pub commission_amount: Option<Decimal>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum RechargePriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum RechargeStatus {
    Open,
    Assigned,
    Approved,
    Rejected,
}

impl fmt::Display for RechargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A ticket requesting a balance increase. Approval credits the requester
/// through the transfer executor.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RechargeRequest {
    pub id: Uuid,
    pub reference: String,
    pub requester_id: AccountId,
    pub requested_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub priority: RechargePriority,
    pub status: RechargeStatus,
    pub assignee_id: Option<AccountId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transfer_type() -> OperationType {
        OperationType {
            code: "transfer".to_string(),
            name: "Money transfer".to_string(),
            impacts_balance: true,
            min_amount: Some(dec!(10)),
            max_amount: Some(dec!(100000)),
            fields: vec![
                FieldSpec {
                    key: "beneficiary".to_string(),
                    label: "Beneficiary".to_string(),
                    kind: FieldKind::Text,
                    required: true,
                },
                FieldSpec {
                    key: "channel".to_string(),
                    label: "Channel".to_string(),
                    kind: FieldKind::Select {
                        options: vec!["cash".to_string(), "bank".to_string()],
                    },
                    required: false,
                },
            ],
            commission_rule: None,
            is_active: true,
        }
    }

    #[test]
    fn test_amount_bounds() {
        let ty = transfer_type();
        assert!(ty.validate_amount(dec!(10)).is_ok());
        assert!(ty.validate_amount(dec!(5)).is_err());
        assert!(ty.validate_amount(dec!(200000)).is_err());
    }

    #[test]
    fn test_data_schema_required_field() {
        let ty = transfer_type();
        let data = OperationData::new();
        assert!(matches!(
            ty.validate_data(&data),
            Err(EngineError::MissingField(key)) if key == "beneficiary"
        ));
    }

    #[test]
    fn test_data_schema_kind_and_options() {
        let ty = transfer_type();
        let mut data = OperationData::new();
        data.insert(
            "beneficiary".to_string(),
            FieldValue::Number(dec!(42)),
        );
        assert!(ty.validate_data(&data).is_err());

        data.insert(
            "beneficiary".to_string(),
            FieldValue::Text("J. Doe".to_string()),
        );
        data.insert(
            "channel".to_string(),
            FieldValue::Select("carrier_pigeon".to_string()),
        );
        assert!(ty.validate_data(&data).is_err());

        data.insert(
            "channel".to_string(),
            FieldValue::Select("cash".to_string()),
        );
        ty.validate_data(&data).unwrap();
    }

    #[test]
    fn test_data_schema_rejects_undeclared_keys() {
        let ty = transfer_type();
        let mut data = OperationData::new();
        data.insert(
            "beneficiary".to_string(),
            FieldValue::Text("J. Doe".to_string()),
        );
        data.insert(
            "color".to_string(),
            FieldValue::Text("blue".to_string()),
        );
        assert!(ty.validate_data(&data).is_err());
    }
}
