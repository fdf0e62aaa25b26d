//! Core types and traits for RentLedger record stores.
//!
//! This crate defines the `RecordStore` trait and all associated types,
//! enabling pluggable store implementations in separate crates.

pub mod models;
pub mod store;

// Re-export key types at crate root for convenience
pub use models::{
    ClientRecord, LedgerLine, MachineRecord, MachineStatus, Statement, StatementRow,
};
pub use models::write::{MachineUpdate, NewLedgerLine, NewMachine, ValidationError};
pub use store::{RecordStore, StoreError};
