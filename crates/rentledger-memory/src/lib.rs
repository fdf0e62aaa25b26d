//! In-memory record store, used for tests and for running the server
//! without a configured database.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use time::{Date, OffsetDateTime};
use uuid::Uuid;

use rentledger_core::{
    models::write::{MachineUpdate, NewLedgerLine, NewMachine},
    ClientRecord, LedgerLine, MachineRecord, RecordStore, StoreError,
};

struct StoredMachine {
    rowid: u64,
    record: MachineRecord,
}

#[derive(Default)]
struct Inner {
    machines: BTreeMap<String, StoredMachine>,
    clients: BTreeMap<i64, ClientRecord>,
    machine_lines: BTreeMap<String, Vec<LedgerLine>>,
    client_lines: BTreeMap<i64, Vec<LedgerLine>>,
}

pub struct InMemoryStore {
    inner: RwLock<Inner>,
    sequence_counter: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            sequence_counter: AtomicU64::new(1),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Seed a client row. Clients are written by the CRM in production, so
    /// this is not part of the `RecordStore` trait.
    pub fn insert_client(&self, name: &str, email: Option<&str>, phone: Option<&str>) -> ClientRecord {
        let mut inner = self.inner.write().unwrap();
        let id = inner.clients.keys().next_back().copied().unwrap_or(0) + 1;
        let record = ClientRecord {
            id,
            name: name.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.clients.insert(id, record.clone());
        record
    }

    /// Seed a machine statement line, as the billing pipeline would.
    pub fn insert_machine_line(&self, code: &str, line: &NewLedgerLine) -> LedgerLine {
        let line = self.build_line(line);
        let mut inner = self.inner.write().unwrap();
        inner
            .machine_lines
            .entry(code.to_string())
            .or_default()
            .push(line.clone());
        line
    }

    /// Seed a client statement line, as the billing pipeline would.
    pub fn insert_client_line(&self, client_id: i64, line: &NewLedgerLine) -> LedgerLine {
        let line = self.build_line(line);
        let mut inner = self.inner.write().unwrap();
        inner
            .client_lines
            .entry(client_id)
            .or_default()
            .push(line.clone());
        line
    }

    fn build_line(&self, line: &NewLedgerLine) -> LedgerLine {
        LedgerLine {
            date: line.date,
            seq: self.next_sequence(),
            source: line.source.clone(),
            description: line.description.clone(),
            debit: line.debit,
            credit: line.credit,
        }
    }
}

fn lines_in_range(lines: Option<&Vec<LedgerLine>>, from: Date, to: Date) -> Vec<LedgerLine> {
    let mut result: Vec<LedgerLine> = lines
        .map(|all| {
            all.iter()
                .filter(|l| l.date >= from && l.date <= to)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    result.sort_by_key(|l| (l.date, l.seq));
    result
}

impl RecordStore for InMemoryStore {
    fn create_machine(&self, machine: &NewMachine) -> Result<MachineRecord, StoreError> {
        machine.validate()?;
        let mut inner = self.inner.write().unwrap();
        if let Some(existing) = inner.machines.get(&machine.code) {
            if existing.record.deleted_at.is_none() {
                return Err(StoreError::DuplicateCode(machine.code.clone()));
            }
        }
        let record = MachineRecord {
            id: Uuid::new_v4(),
            code: machine.code.clone(),
            name: machine.name.clone(),
            brand: machine.brand.clone(),
            model: machine.model.clone(),
            serial: machine.serial.clone(),
            status: machine.status,
            location: machine.location.clone(),
            daily_rate: machine.daily_rate,
            notes: machine.notes.clone(),
            created_at: OffsetDateTime::now_utc(),
            deleted_at: None,
        };
        let rowid = self.next_sequence();
        inner.machines.insert(
            machine.code.clone(),
            StoredMachine { rowid, record: record.clone() },
        );
        tracing::debug!(code = %record.code, "Machine created");
        Ok(record)
    }

    fn get_machine(&self, code: &str) -> Result<MachineRecord, StoreError> {
        let inner = self.inner.read().unwrap();
        inner
            .machines
            .get(code)
            .filter(|m| m.record.deleted_at.is_none())
            .map(|m| m.record.clone())
            .ok_or_else(|| StoreError::MachineNotFound(code.to_string()))
    }

    fn update_machine(&self, code: &str, update: &MachineUpdate) -> Result<MachineRecord, StoreError> {
        update.validate()?;
        let mut inner = self.inner.write().unwrap();
        let stored = inner
            .machines
            .get_mut(code)
            .filter(|m| m.record.deleted_at.is_none())
            .ok_or_else(|| StoreError::MachineNotFound(code.to_string()))?;

        let record = &mut stored.record;
        if let Some(ref name) = update.name {
            record.name = name.clone();
        }
        if let Some(ref brand) = update.brand {
            record.brand = Some(brand.clone());
        }
        if let Some(ref model) = update.model {
            record.model = Some(model.clone());
        }
        if let Some(ref serial) = update.serial {
            record.serial = Some(serial.clone());
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(ref location) = update.location {
            record.location = Some(location.clone());
        }
        if let Some(rate) = update.daily_rate {
            record.daily_rate = rate;
        }
        if let Some(ref notes) = update.notes {
            record.notes = Some(notes.clone());
        }
        tracing::debug!(code, "Machine updated");
        Ok(record.clone())
    }

    fn delete_machine(&self, code: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let stored = inner
            .machines
            .get_mut(code)
            .filter(|m| m.record.deleted_at.is_none())
            .ok_or_else(|| StoreError::MachineNotFound(code.to_string()))?;
        stored.record.deleted_at = Some(OffsetDateTime::now_utc());
        tracing::debug!(code, "Machine soft-deleted");
        Ok(())
    }

    fn list_machines(&self) -> Result<Vec<MachineRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut live: Vec<&StoredMachine> = inner
            .machines
            .values()
            .filter(|m| m.record.deleted_at.is_none())
            .collect();
        // created_at alone can tie within a second; rowid disambiguates
        live.sort_by(|a, b| {
            (b.record.created_at, b.rowid).cmp(&(a.record.created_at, a.rowid))
        });
        Ok(live.iter().map(|m| m.record.clone()).collect())
    }

    fn get_client(&self, id: i64) -> Result<ClientRecord, StoreError> {
        let inner = self.inner.read().unwrap();
        inner
            .clients
            .get(&id)
            .cloned()
            .ok_or(StoreError::ClientNotFound(id))
    }

    fn list_clients(&self) -> Result<Vec<ClientRecord>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut clients: Vec<ClientRecord> = inner.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    fn machine_statement_lines(&self, code: &str, from: Date, to: Date) -> Result<Vec<LedgerLine>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(lines_in_range(inner.machine_lines.get(code), from, to))
    }

    fn client_statement_lines(&self, client_id: i64, from: Date, to: Date) -> Result<Vec<LedgerLine>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(lines_in_range(inner.client_lines.get(&client_id), from, to))
    }
}
