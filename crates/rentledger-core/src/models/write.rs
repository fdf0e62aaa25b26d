use rust_decimal::Decimal;
use thiserror::Error;
use time::Date;

use super::MachineStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("machine code must not be empty")]
    EmptyCode,
    #[error("machine code must be alphanumeric: {0}")]
    InvalidCode(String),
    #[error("unknown machine status: {0}")]
    UnknownStatus(String),
    #[error("daily rate must not be negative: {0}")]
    NegativeRate(Decimal),
}

/// A machine code ends up in filenames and query filters, so it is kept to
/// plain identifier characters.
fn is_safe_code(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMachine {
    pub code: String,
    pub name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub status: MachineStatus,
    pub location: Option<String>,
    pub daily_rate: Decimal,
    pub notes: Option<String>,
}

impl NewMachine {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        if !is_safe_code(&self.code) {
            return Err(ValidationError::InvalidCode(self.code.clone()));
        }
        if self.daily_rate < Decimal::ZERO {
            return Err(ValidationError::NegativeRate(self.daily_rate));
        }
        Ok(())
    }
}

/// Partial update for an existing machine; `code` is immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineUpdate {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub status: Option<MachineStatus>,
    pub location: Option<String>,
    pub daily_rate: Option<Decimal>,
    pub notes: Option<String>,
}

impl MachineUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(rate) = self.daily_rate {
            if rate < Decimal::ZERO {
                return Err(ValidationError::NegativeRate(rate));
            }
        }
        Ok(())
    }
}

/// A ledger line to record, before the store assigns its `seq`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerLine {
    pub date: Date,
    pub source: Option<String>,
    pub description: Option<String>,
    pub debit: Decimal,
    pub credit: Decimal,
}
