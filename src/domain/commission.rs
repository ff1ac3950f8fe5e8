use crate::error::{EngineError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happens when an operation amount falls outside a rule's global
/// `min_amount`/`max_amount` bounds.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Out-of-range amounts earn zero commission.
    #[default]
    ZeroCommission,
    /// Out-of-range amounts fail the approval with `OutOfRange`.
    Reject,
}

/// One amount range `[min_amount, max_amount)` of a tiered rule, with either
/// a fixed commission or a percentage rate (exactly one of the two).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Tier {
    pub min_amount: Decimal,
    /// `None` means unbounded; only valid on the last tier.
    pub max_amount: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    pub percentage_rate: Option<Decimal>,
}

impl Tier {
    fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && self.max_amount.is_none_or(|max| amount < max)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "commission_type", rename_all = "snake_case")]
pub enum RuleKind {
    Fixed { fixed_amount: Decimal },
    Percentage { percentage_rate: Decimal },
    Tiered { tiers: Vec<Tier> },
}

/// Commission configuration for an operation type.
///
/// Rules are validated once at save time (`validate`) and are pure at compute
/// time. A rule referenced by historical operations is only ever
/// soft-deactivated via `is_active`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CommissionRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Global applicability bounds, regardless of kind.
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    #[serde(default)]
    pub bounds_policy: BoundsPolicy,
    /// Fraction of the commission credited to the agency's chef; the
    /// remainder goes to the initiating agent.
    #[serde(default)]
    pub chef_share_rate: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Round to the whole currency unit, half away from zero. The ledger carries
/// no sub-unit currency.
fn round_unit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

impl CommissionRule {
    /// Save-time validation. Compute never re-checks these.
    pub fn validate(&self) -> Result<()> {
        if self.chef_share_rate < Decimal::ZERO || self.chef_share_rate > Decimal::ONE {
            return Err(EngineError::Validation(format!(
                "chef_share_rate must be within [0, 1], got {}",
                self.chef_share_rate
            )));
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount)
            && min > max
        {
            return Err(EngineError::Validation(format!(
                "rule bounds are inverted: min {min} > max {max}"
            )));
        }

        match &self.kind {
            RuleKind::Fixed { fixed_amount } => {
                if *fixed_amount < Decimal::ZERO {
                    return Err(EngineError::Validation(
                        "fixed_amount must be non-negative".to_string(),
                    ));
                }
            }
            RuleKind::Percentage { percentage_rate } => {
                if *percentage_rate < Decimal::ZERO || *percentage_rate > Decimal::ONE {
                    return Err(EngineError::Validation(format!(
                        "percentage_rate must be within [0, 1], got {percentage_rate}"
                    )));
                }
            }
            RuleKind::Tiered { tiers } => {
                if tiers.is_empty() {
                    return Err(EngineError::MissingField(
                        "tiered rule requires at least one tier".to_string(),
                    ));
                }
                for (i, tier) in tiers.iter().enumerate() {
                    match (tier.fixed_amount, tier.percentage_rate) {
                        (None, None) => {
                            return Err(EngineError::MissingField(format!(
                                "tier {i} needs fixed_amount or percentage_rate"
                            )));
                        }
                        (Some(_), Some(_)) => {
                            return Err(EngineError::Validation(format!(
                                "tier {i} sets both fixed_amount and percentage_rate"
                            )));
                        }
                        _ => {}
                    }
                    if let Some(max) = tier.max_amount
                        && max <= tier.min_amount
                    {
                        return Err(EngineError::Validation(format!(
                            "tier {i} is empty: [{}, {max})",
                            tier.min_amount
                        )));
                    }
                }
                for (i, pair) in tiers.windows(2).enumerate() {
                    if pair[1].min_amount < pair[0].min_amount {
                        return Err(EngineError::Validation(format!(
                            "tiers must be sorted ascending by min_amount (tier {})",
                            i + 1
                        )));
                    }
                    match pair[0].max_amount {
                        Some(max) if max <= pair[1].min_amount => {}
                        Some(max) => {
                            return Err(EngineError::OverlappingTiers(format!(
                                "tier {i} ends at {max} but tier {} starts at {}",
                                i + 1,
                                pair[1].min_amount
                            )));
                        }
                        None => {
                            return Err(EngineError::OverlappingTiers(format!(
                                "tier {i} is unbounded but is not the last tier"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Pure commission computation: `(amount, rule) -> commission`.
    ///
    /// Deterministic and side-effect free; the engine re-reads the active
    /// rule at approval time and calls this with the operation amount.
    pub fn compute(&self, amount: Decimal) -> Result<Decimal> {
        let in_bounds = self.min_amount.is_none_or(|min| amount >= min)
            && self.max_amount.is_none_or(|max| amount <= max);
        if !in_bounds {
            return match self.bounds_policy {
                BoundsPolicy::ZeroCommission => Ok(Decimal::ZERO),
                BoundsPolicy::Reject => Err(EngineError::OutOfRange { amount }),
            };
        }

        match &self.kind {
            RuleKind::Fixed { fixed_amount } => Ok(*fixed_amount),
            RuleKind::Percentage { percentage_rate } => Ok(round_unit(amount * percentage_rate)),
            RuleKind::Tiered { tiers } => {
                let tier = tiers
                    .iter()
                    .find(|tier| tier.contains(amount))
                    .ok_or(EngineError::NoTierMatch { amount })?;
                match (tier.percentage_rate, tier.fixed_amount) {
                    (Some(rate), _) => Ok(round_unit(amount * rate)),
                    (None, Some(fixed)) => Ok(fixed),
                    // Unreachable for a validated rule.
                    (None, None) => Err(EngineError::NoTierMatch { amount }),
                }
            }
        }
    }

    /// Splits a computed commission into `(agent_share, chef_share)`.
    ///
    /// The chef share is rounded to the whole unit and the agent takes the
    /// remainder, so the two always sum to the full commission.
    pub fn split(&self, commission: Decimal) -> (Decimal, Decimal) {
        if self.chef_share_rate.is_zero() || commission.is_zero() {
            return (commission, Decimal::ZERO);
        }
        let chef = round_unit(commission * self.chef_share_rate).min(commission);
        (commission - chef, chef)
    }
}
