use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::Reconciliation;

/// Paid/unpaid split proposed by the reconciling role. Signed so that a bad
/// input reaches the validator instead of failing to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSplit {
    pub paid_units: i64,
    pub unpaid_units: i64,
}

impl UnitSplit {
    pub fn new(paid_units: i64, unpaid_units: i64) -> Self {
        Self { paid_units, unpaid_units }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationError {
    #[error("unit counts must not be negative (paid {paid_units}, unpaid {unpaid_units})")]
    NegativeUnits { paid_units: i64, unpaid_units: i64 },
    #[error(
        "paid {paid_units} + unpaid {unpaid_units} does not equal the request total of {total_units}"
    )]
    Mismatch { total_units: i64, paid_units: i64, unpaid_units: i64 },
}

/// Checks that a split partitions the request total exactly. Whether a
/// split is required at all is decided by the routing table.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReconciliationValidator;

impl ReconciliationValidator {
    pub fn validate(
        &self,
        total_units: i64,
        paid_units: i64,
        unpaid_units: i64,
    ) -> Result<Reconciliation, ReconciliationError> {
        if paid_units < 0 || unpaid_units < 0 {
            return Err(ReconciliationError::NegativeUnits { paid_units, unpaid_units });
        }

        match paid_units.checked_add(unpaid_units) {
            Some(sum) if sum == total_units => Ok(Reconciliation { paid_units, unpaid_units }),
            _ => Err(ReconciliationError::Mismatch { total_units, paid_units, unpaid_units }),
        }
    }

    pub fn validate_split(
        &self,
        total_units: i64,
        split: UnitSplit,
    ) -> Result<Reconciliation, ReconciliationError> {
        self.validate(total_units, split.paid_units, split.unpaid_units)
    }
}
