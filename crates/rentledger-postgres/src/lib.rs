//! PostgreSQL record store.
//!
//! Reads statement lines from the hosted views (`v_machine_statement_lines_all`,
//! `v_client_statement_lines`); `init_schema` bootstraps backing tables and the
//! views themselves for development databases.

use std::{
    str::FromStr,
    sync::Mutex,
};

use postgres::{Client, NoTls};
use rust_decimal::Decimal;
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

use rentledger_core::{
    models::write::{MachineUpdate, NewMachine},
    ClientRecord, LedgerLine, MachineRecord, MachineStatus, RecordStore, StoreError,
};

pub struct PostgresStore {
    client: Mutex<Client>,
}

impl PostgresStore {
    pub fn new(connection_string: &str) -> Result<Self, StoreError> {
        let client = Client::connect(connection_string, NoTls)
            .map_err(|e| StoreError::Backend(format!("PostgreSQL connection failed: {}", e)))?;

        let store = Self {
            client: Mutex::new(client),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let mut client = self.client.lock().unwrap();
        client
            .batch_execute(
                "
            CREATE TABLE IF NOT EXISTS machines (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                brand TEXT,
                model TEXT,
                serial TEXT,
                status TEXT NOT NULL,
                location TEXT,
                daily_rate TEXT NOT NULL,
                notes TEXT,
                created_at BIGINT NOT NULL,
                deleted_at BIGINT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_machines_live_code
                ON machines(code) WHERE deleted_at IS NULL;

            CREATE TABLE IF NOT EXISTS crm_clients (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                created_at BIGINT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS machine_ledger (
                id BIGSERIAL PRIMARY KEY,
                machine_code TEXT NOT NULL,
                date TEXT NOT NULL,
                source TEXT,
                description TEXT,
                debit TEXT,
                credit TEXT
            );

            CREATE TABLE IF NOT EXISTS client_ledger (
                id BIGSERIAL PRIMARY KEY,
                client_id BIGINT NOT NULL,
                date TEXT NOT NULL,
                source TEXT,
                description TEXT,
                debit TEXT,
                credit TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_machine_ledger_code_date
                ON machine_ledger(machine_code, date);

            CREATE INDEX IF NOT EXISTS idx_client_ledger_client_date
                ON client_ledger(client_id, date);

            CREATE OR REPLACE VIEW v_machine_statement_lines_all AS
                SELECT id, machine_code, date, source, description, debit, credit
                FROM machine_ledger;

            CREATE OR REPLACE VIEW v_machine_statement_lines AS
                SELECT id, machine_code, date, source, description, debit, credit
                FROM machine_ledger
                WHERE source = 'renta';

            CREATE OR REPLACE VIEW v_client_statement_lines AS
                SELECT id, client_id, date, source, description, debit, credit
                FROM client_ledger;
            ",
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

fn date_to_str(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

fn str_to_date(s: &str) -> Result<Date, StoreError> {
    let bad = || StoreError::Backend(format!("invalid date in row: {}", s));
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return Err(bad());
    }
    let year = parts[0].parse::<i32>().map_err(|_| bad())?;
    let month = parts[1].parse::<u8>().map_err(|_| bad())?;
    let day = parts[2].parse::<u8>().map_err(|_| bad())?;
    let month = Month::try_from(month).map_err(|_| bad())?;
    Date::from_calendar_date(year, month, day).map_err(|_| bad())
}

fn timestamp_to_datetime(ts: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp(ts)
        .map_err(|e| StoreError::Backend(format!("invalid timestamp in row: {}", e)))
}

/// Amounts fall back to zero when unreadable, but a corrupt primary key is
/// surfaced rather than masked with a nil id.
fn parse_machine_id(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|_| StoreError::Backend(format!("invalid machine id in row: {}", s)))
}

fn row_to_machine(row: &postgres::Row) -> Result<MachineRecord, StoreError> {
    let id_str: String = row.get(0);
    let status_str: String = row.get(6);
    let rate_str: String = row.get(8);
    let created_ts: i64 = row.get(10);
    let deleted_ts: Option<i64> = row.get(11);

    Ok(MachineRecord {
        id: parse_machine_id(&id_str)?,
        code: row.get(1),
        name: row.get(2),
        brand: row.get(3),
        model: row.get(4),
        serial: row.get(5),
        status: MachineStatus::from_str(&status_str)?,
        location: row.get(7),
        daily_rate: Decimal::from_str(&rate_str).unwrap_or(Decimal::ZERO),
        notes: row.get(9),
        created_at: timestamp_to_datetime(created_ts)?,
        deleted_at: deleted_ts.map(timestamp_to_datetime).transpose()?,
    })
}

fn row_to_line(row: &postgres::Row) -> Result<LedgerLine, StoreError> {
    let seq: i64 = row.get(0);
    let date_str: String = row.get(1);
    let debit_str: String = row.get(4);
    let credit_str: String = row.get(5);

    Ok(LedgerLine {
        date: str_to_date(&date_str)?,
        seq: seq as u64,
        source: row.get(2),
        description: row.get(3),
        debit: Decimal::from_str(&debit_str).unwrap_or(Decimal::ZERO),
        credit: Decimal::from_str(&credit_str).unwrap_or(Decimal::ZERO),
    })
}

const MACHINE_COLUMNS: &str =
    "id, code, name, brand, model, serial, status, location, daily_rate, notes, created_at, deleted_at";

impl RecordStore for PostgresStore {
    fn create_machine(&self, machine: &NewMachine) -> Result<MachineRecord, StoreError> {
        machine.validate()?;
        let mut client = self.client.lock().unwrap();

        let taken = client
            .query_opt(
                "SELECT 1 FROM machines WHERE code = $1 AND deleted_at IS NULL",
                &[&machine.code],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if taken.is_some() {
            return Err(StoreError::DuplicateCode(machine.code.clone()));
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let rate_str = machine.daily_rate.to_string();
        let created_at = OffsetDateTime::now_utc();
        let created_ts = created_at.unix_timestamp();

        client
            .execute(
                "INSERT INTO machines
                    (id, code, name, brand, model, serial, status, location, daily_rate, notes, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &[
                    &id_str,
                    &machine.code,
                    &machine.name,
                    &machine.brand,
                    &machine.model,
                    &machine.serial,
                    &machine.status.as_str(),
                    &machine.location,
                    &rate_str,
                    &machine.notes,
                    &created_ts,
                ],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(code = %machine.code, "Machine created");
        Ok(MachineRecord {
            id,
            code: machine.code.clone(),
            name: machine.name.clone(),
            brand: machine.brand.clone(),
            model: machine.model.clone(),
            serial: machine.serial.clone(),
            status: machine.status,
            location: machine.location.clone(),
            daily_rate: machine.daily_rate,
            notes: machine.notes.clone(),
            created_at,
            deleted_at: None,
        })
    }

    fn get_machine(&self, code: &str) -> Result<MachineRecord, StoreError> {
        let mut client = self.client.lock().unwrap();
        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM machines WHERE code = $1 AND deleted_at IS NULL",
                    MACHINE_COLUMNS
                ),
                &[&code],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::MachineNotFound(code.to_string()))?;
        row_to_machine(&row)
    }

    fn update_machine(&self, code: &str, update: &MachineUpdate) -> Result<MachineRecord, StoreError> {
        update.validate()?;
        let mut client = self.client.lock().unwrap();

        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM machines WHERE code = $1 AND deleted_at IS NULL",
                    MACHINE_COLUMNS
                ),
                &[&code],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::MachineNotFound(code.to_string()))?;
        let mut record = row_to_machine(&row)?;

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

        let rate_str = record.daily_rate.to_string();
        client
            .execute(
                "UPDATE machines
                 SET name = $2, brand = $3, model = $4, serial = $5, status = $6,
                     location = $7, daily_rate = $8, notes = $9
                 WHERE code = $1 AND deleted_at IS NULL",
                &[
                    &code,
                    &record.name,
                    &record.brand,
                    &record.model,
                    &record.serial,
                    &record.status.as_str(),
                    &record.location,
                    &rate_str,
                    &record.notes,
                ],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(code, "Machine updated");
        Ok(record)
    }

    fn delete_machine(&self, code: &str) -> Result<(), StoreError> {
        let mut client = self.client.lock().unwrap();
        let deleted_ts = OffsetDateTime::now_utc().unix_timestamp();
        let affected = client
            .execute(
                "UPDATE machines SET deleted_at = $2 WHERE code = $1 AND deleted_at IS NULL",
                &[&code, &deleted_ts],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if affected == 0 {
            return Err(StoreError::MachineNotFound(code.to_string()));
        }
        tracing::debug!(code, "Machine soft-deleted");
        Ok(())
    }

    fn list_machines(&self) -> Result<Vec<MachineRecord>, StoreError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM machines WHERE deleted_at IS NULL
                     ORDER BY created_at DESC, code",
                    MACHINE_COLUMNS
                ),
                &[],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.iter().map(row_to_machine).collect()
    }

    fn get_client(&self, id: i64) -> Result<ClientRecord, StoreError> {
        let mut client = self.client.lock().unwrap();
        let row = client
            .query_opt(
                "SELECT id, name, email, phone, created_at FROM crm_clients WHERE id = $1",
                &[&id],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::ClientNotFound(id))?;
        let created_ts: i64 = row.get(4);
        Ok(ClientRecord {
            id: row.get(0),
            name: row.get(1),
            email: row.get(2),
            phone: row.get(3),
            created_at: timestamp_to_datetime(created_ts)?,
        })
    }

    fn list_clients(&self) -> Result<Vec<ClientRecord>, StoreError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                "SELECT id, name, email, phone, created_at FROM crm_clients ORDER BY name",
                &[],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.iter()
            .map(|row| {
                let created_ts: i64 = row.get(4);
                Ok(ClientRecord {
                    id: row.get(0),
                    name: row.get(1),
                    email: row.get(2),
                    phone: row.get(3),
                    created_at: timestamp_to_datetime(created_ts)?,
                })
            })
            .collect()
    }

    fn machine_statement_lines(&self, code: &str, from: Date, to: Date) -> Result<Vec<LedgerLine>, StoreError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                "SELECT id, date, source, description,
                        COALESCE(debit, '0'), COALESCE(credit, '0')
                 FROM v_machine_statement_lines_all
                 WHERE machine_code = $1 AND date >= $2 AND date <= $3
                 ORDER BY date, id",
                &[&code, &date_to_str(from), &date_to_str(to)],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.iter().map(row_to_line).collect()
    }

    fn client_statement_lines(&self, client_id: i64, from: Date, to: Date) -> Result<Vec<LedgerLine>, StoreError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                "SELECT id, date, source, description,
                        COALESCE(debit, '0'), COALESCE(credit, '0')
                 FROM v_client_statement_lines
                 WHERE client_id = $1 AND date >= $2 AND date <= $3
                 ORDER BY date, id",
                &[&client_id, &date_to_str(from), &date_to_str(to)],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.iter().map(row_to_line).collect()
    }
}
