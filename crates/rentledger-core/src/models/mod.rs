use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub mod write;

use write::ValidationError;

/// Canonical machine status. Older forms wrote several overlapping spellings
/// (`activo`, `en_reparacion`); those are accepted on parse but never written.
#[derive(Debug, Clone, Copy, PartialEq, Hash, Eq)]
pub enum MachineStatus {
    Disponible,
    Rentada,
    Taller,
    Baja,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Disponible => "disponible",
            MachineStatus::Rentada => "rentada",
            MachineStatus::Taller => "taller",
            MachineStatus::Baja => "baja",
        }
    }
}

impl FromStr for MachineStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disponible" | "activo" => Ok(MachineStatus::Disponible),
            "rentada" => Ok(MachineStatus::Rentada),
            "taller" | "en_reparacion" => Ok(MachineStatus::Taller),
            "baja" => Ok(MachineStatus::Baja),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

impl Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rental machine as stored in the `machines` table.
///
/// Deletion is always soft: `deleted_at` is set and the row becomes
/// invisible to every read path.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineRecord {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub status: MachineStatus,
    pub location: Option<String>,
    pub daily_rate: Decimal,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// A client row from `crm_clients`. Read-only here; the CRM owns writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: OffsetDateTime,
}

/// One transaction row from a statement view, already scoped to a single
/// account. `seq` is the view's row id and breaks ties between lines that
/// share a date, so a statement over the same range is deterministic.
#[derive(Debug, Clone, PartialEq, Hash, Eq)]
pub struct LedgerLine {
    pub date: Date,
    pub seq: u64,
    pub source: Option<String>,
    pub description: Option<String>,
    pub debit: Decimal,
    pub credit: Decimal,
}

/// A ledger line with its running balance.
#[derive(Debug, Clone, PartialEq, Hash, Eq)]
pub struct StatementRow {
    pub line: LedgerLine,
    pub balance: Decimal,
}

/// A computed account statement: rows in `(date, seq)` order plus totals.
/// `net_balance` equals the last row's balance, or zero for an empty range.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub rows: Vec<StatementRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub net_balance: Decimal,
}

impl Statement {
    pub fn empty() -> Self {
        Statement {
            rows: Vec::new(),
            total_debit: Decimal::ZERO,
            total_credit: Decimal::ZERO,
            net_balance: Decimal::ZERO,
        }
    }
}
