use crate::domain::account::{Account, AccountId, Role};
use crate::domain::operation::OperationType;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;

/// An account plus its opening balance. The balance becomes an
/// `initial_credit` ledger entry at bootstrap, never a stored field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AccountSeed {
    pub id: AccountId,
    pub name: String,
    pub role: Role,
    pub agency_id: String,
    #[serde(default)]
    pub opening_balance: Decimal,
}

impl AccountSeed {
    pub fn account(&self) -> Account {
        Account {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
            agency_id: self.agency_id.clone(),
        }
    }
}

/// Thresholds for the validation queue's urgency counter.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct QueueConfig {
    pub urgent_amount: Decimal,
    pub urgent_age_hours: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            urgent_amount: Decimal::from(100_000),
            urgent_age_hours: 24,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct EngineConfig {
    pub accounts: Vec<AccountSeed>,
    pub operation_types: Vec<OperationType>,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl EngineConfig {
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration-level validation, run before the engine boots: unique
    /// ids and codes, non-negative opening balances, and every commission
    /// rule checked for overlaps and missing fields.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for seed in &self.accounts {
            if !ids.insert(&seed.id) {
                return Err(EngineError::Validation(format!(
                    "duplicate account id {}",
                    seed.id
                )));
            }
            if seed.opening_balance < Decimal::ZERO {
                return Err(EngineError::Validation(format!(
                    "account {} has a negative opening balance",
                    seed.id
                )));
            }
        }

        let mut codes = HashSet::new();
        for ty in &self.operation_types {
            if !codes.insert(&ty.code) {
                return Err(EngineError::Validation(format!(
                    "duplicate operation type code '{}'",
                    ty.code
                )));
            }
            if let Some(rule) = &ty.commission_rule {
                rule.validate()?;
            }
        }

        if self.queue.urgent_age_hours <= 0 {
            return Err(EngineError::Validation(
                "queue.urgent_age_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commission::RuleKind;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"{
        "accounts": [
            {"id": "A1", "name": "Agent One", "role": "agent", "agency_id": "AG1", "opening_balance": "5000"},
            {"id": "C1", "name": "Chef One", "role": "chef", "agency_id": "AG1"}
        ],
        "operation_types": [
            {
                "code": "transfer",
                "name": "Money transfer",
                "impacts_balance": true,
                "min_amount": "10",
                "max_amount": null,
                "commission_rule": {
                    "commission_type": "tiered",
                    "tiers": [
                        {"min_amount": "0", "max_amount": "1000", "fixed_amount": "50", "percentage_rate": null},
                        {"min_amount": "1000", "max_amount": null, "fixed_amount": null, "percentage_rate": "0.02"}
                    ],
                    "min_amount": null,
                    "max_amount": null,
                    "chef_share_rate": "0.3"
                }
            }
        ],
        "queue": {"urgent_amount": "50000", "urgent_age_hours": 12}
    }"#;

    #[test]
    fn test_parse_and_validate_sample() {
        let config = EngineConfig::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].opening_balance, dec!(5000));
        assert_eq!(config.accounts[1].opening_balance, dec!(0));
        assert_eq!(config.queue.urgent_amount, dec!(50000));

        let rule = config.operation_types[0].commission_rule.as_ref().unwrap();
        assert!(rule.is_active);
        match &rule.kind {
            RuleKind::Tiered { tiers } => {
                assert_eq!(tiers.len(), 2);
                assert_eq!(tiers[0].fixed_amount, Some(dec!(50)));
                assert_eq!(tiers[1].percentage_rate, Some(dec!(0.02)));
            }
            other => panic!("expected tiered rule, got {other:?}"),
        }
    }

    #[test]
    fn test_config_round_trip_preserves_tiers() {
        let config = EngineConfig::from_reader(SAMPLE.as_bytes()).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back = EngineConfig::from_reader(json.as_bytes()).unwrap();
        assert_eq!(back.operation_types, config.operation_types);
    }

    #[test]
    fn test_duplicate_account_id_rejected() {
        let mut config = EngineConfig::from_reader(SAMPLE.as_bytes()).unwrap();
        let duplicate = config.accounts[0].clone();
        config.accounts.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlapping_tiers_rejected_at_config_time() {
        let mut config = EngineConfig::from_reader(SAMPLE.as_bytes()).unwrap();
        let rule = config.operation_types[0].commission_rule.as_mut().unwrap();
        if let RuleKind::Tiered { tiers } = &mut rule.kind {
            tiers[0].max_amount = Some(dec!(2000));
        }
        assert!(matches!(
            config.validate(),
            Err(EngineError::OverlappingTiers(_))
        ));
    }
}
