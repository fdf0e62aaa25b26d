use time::Date;

use crate::models::{
    write::{MachineUpdate, NewMachine, ValidationError},
    ClientRecord, LedgerLine, MachineRecord,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),
    #[error("machine not found: {0}")]
    MachineNotFound(String),
    #[error("client not found: {0}")]
    ClientNotFound(i64),
    #[error("machine code already in use: {0}")]
    DuplicateCode(String),
    #[error("{0}")]
    Backend(String),
}

/// Gateway to the record store backing the application: machine CRUD,
/// client lookup, and the read-only statement views.
///
/// Statement lines are returned filtered to one account, restricted to the
/// inclusive `[from, to]` date range, and ordered by `(date, seq)`.
pub trait RecordStore: Send + Sync {
    fn create_machine(&self, machine: &NewMachine) -> Result<MachineRecord, StoreError>;
    fn get_machine(&self, code: &str) -> Result<MachineRecord, StoreError>;
    fn update_machine(&self, code: &str, update: &MachineUpdate) -> Result<MachineRecord, StoreError>;
    /// Soft delete: sets `deleted_at` and hides the row from all reads.
    fn delete_machine(&self, code: &str) -> Result<(), StoreError>;
    /// Live machines only, newest first.
    fn list_machines(&self) -> Result<Vec<MachineRecord>, StoreError>;

    fn get_client(&self, id: i64) -> Result<ClientRecord, StoreError>;
    fn list_clients(&self) -> Result<Vec<ClientRecord>, StoreError>;

    fn machine_statement_lines(&self, code: &str, from: Date, to: Date) -> Result<Vec<LedgerLine>, StoreError>;
    fn client_statement_lines(&self, client_id: i64, from: Date, to: Date) -> Result<Vec<LedgerLine>, StoreError>;
}
