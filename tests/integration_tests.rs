use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::{Date, Month};

use rentledger::export::{to_csv, CsvRecord, CsvValue};
use rentledger::statement::{build_statement, format_money};
use rentledger_core::{
    MachineStatus, MachineUpdate, NewLedgerLine, NewMachine, RecordStore, StoreError,
    ValidationError,
};
use rentledger_memory::InMemoryStore;

fn date(year: i32, month: u8, day: u8) -> Date {
    Date::from_calendar_date(year, Month::try_from(month).unwrap(), day).unwrap()
}

fn line(d: Date, debit: Decimal, credit: Decimal) -> NewLedgerLine {
    NewLedgerLine {
        date: d,
        source: None,
        description: None,
        debit,
        credit,
    }
}

fn excavator() -> NewMachine {
    NewMachine {
        code: "EXC01".to_string(),
        name: "Excavadora CAT 320".to_string(),
        brand: Some("Caterpillar".to_string()),
        model: Some("320".to_string()),
        serial: Some("CAT320-0001".to_string()),
        status: MachineStatus::Disponible,
        location: Some("Patio norte".to_string()),
        daily_rate: dec!(3500),
        notes: None,
    }
}

#[test]
fn test_statement_running_balance() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    store.insert_machine_line("EXC01", &line(date(2025, 8, 1), dec!(100), Decimal::ZERO));
    store.insert_machine_line("EXC01", &line(date(2025, 8, 5), Decimal::ZERO, dec!(40)));

    let lines = store
        .machine_statement_lines("EXC01", date(2025, 8, 1), date(2025, 8, 31))
        .unwrap();
    let stmt = build_statement(lines);

    assert_eq!(stmt.rows.len(), 2);
    assert_eq!(stmt.rows[0].balance, dec!(100));
    assert_eq!(stmt.rows[1].balance, dec!(60));
    assert_eq!(format_money(stmt.rows[0].balance), "100.00");
    assert_eq!(format_money(stmt.rows[1].balance), "60.00");
    assert_eq!(stmt.total_debit, dec!(100));
    assert_eq!(stmt.total_credit, dec!(40));
    assert_eq!(stmt.net_balance, dec!(60));
}

#[test]
fn test_empty_statement_is_all_zero() {
    let stmt = build_statement(Vec::new());
    assert!(stmt.rows.is_empty());
    assert_eq!(stmt.total_debit, Decimal::ZERO);
    assert_eq!(stmt.total_credit, Decimal::ZERO);
    assert_eq!(stmt.net_balance, Decimal::ZERO);
}

#[test]
fn test_last_balance_equals_net_balance() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    let amounts = [
        (dec!(3500), Decimal::ZERO),
        (Decimal::ZERO, dec!(1200.50)),
        (dec!(750.25), Decimal::ZERO),
        (Decimal::ZERO, dec!(4000)),
        (dec!(0.01), Decimal::ZERO),
    ];
    for (i, (debit, credit)) in amounts.iter().enumerate() {
        store.insert_machine_line("EXC01", &line(date(2025, 7, (i + 1) as u8), *debit, *credit));
    }

    let lines = store
        .machine_statement_lines("EXC01", date(2025, 7, 1), date(2025, 7, 31))
        .unwrap();
    let stmt = build_statement(lines);

    assert_eq!(stmt.rows.last().unwrap().balance, stmt.net_balance);
    assert_eq!(stmt.net_balance, stmt.total_debit - stmt.total_credit);
    assert_eq!(stmt.net_balance, dec!(-950.24));
}

#[test]
fn test_same_date_lines_keep_insertion_order() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    let d = date(2025, 8, 10);
    store.insert_machine_line(
        "EXC01",
        &NewLedgerLine {
            description: Some("renta semana 32".to_string()),
            ..line(d, dec!(500), Decimal::ZERO)
        },
    );
    store.insert_machine_line(
        "EXC01",
        &NewLedgerLine {
            description: Some("abono".to_string()),
            ..line(d, Decimal::ZERO, dec!(500))
        },
    );

    let lines = store.machine_statement_lines("EXC01", d, d).unwrap();
    let stmt = build_statement(lines);

    assert_eq!(stmt.rows[0].line.description.as_deref(), Some("renta semana 32"));
    assert_eq!(stmt.rows[0].balance, dec!(500));
    assert_eq!(stmt.rows[1].line.description.as_deref(), Some("abono"));
    assert_eq!(stmt.rows[1].balance, Decimal::ZERO);
    assert!(stmt.rows[0].line.seq < stmt.rows[1].line.seq);
}

#[test]
fn test_date_range_is_inclusive() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    store.insert_machine_line("EXC01", &line(date(2025, 7, 31), dec!(1), Decimal::ZERO));
    store.insert_machine_line("EXC01", &line(date(2025, 8, 1), dec!(2), Decimal::ZERO));
    store.insert_machine_line("EXC01", &line(date(2025, 8, 31), dec!(3), Decimal::ZERO));
    store.insert_machine_line("EXC01", &line(date(2025, 9, 1), dec!(4), Decimal::ZERO));

    let lines = store
        .machine_statement_lines("EXC01", date(2025, 8, 1), date(2025, 8, 31))
        .unwrap();
    let stmt = build_statement(lines);

    assert_eq!(stmt.rows.len(), 2);
    assert_eq!(stmt.total_debit, dec!(5));
}

#[test]
fn test_machine_crud_roundtrip() {
    let store = InMemoryStore::new();
    let created = store.create_machine(&excavator()).unwrap();
    assert_eq!(created.status, MachineStatus::Disponible);

    let fetched = store.get_machine("EXC01").unwrap();
    assert_eq!(fetched, created);

    let updated = store
        .update_machine(
            "EXC01",
            &MachineUpdate {
                status: Some(MachineStatus::Rentada),
                daily_rate: Some(dec!(3800)),
                ..MachineUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.status, MachineStatus::Rentada);
    assert_eq!(updated.daily_rate, dec!(3800));
    assert_eq!(updated.name, created.name);
}

#[test]
fn test_list_machines_newest_first() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    store
        .create_machine(&NewMachine {
            code: "GEN02".to_string(),
            name: "Generador 50kW".to_string(),
            ..excavator()
        })
        .unwrap();

    let listed = store.list_machines().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].code, "GEN02");
    assert_eq!(listed[1].code, "EXC01");
}

#[test]
fn test_empty_code_rejected_and_nothing_inserted() {
    let store = InMemoryStore::new();
    let result = store.create_machine(&NewMachine {
        code: "".to_string(),
        ..excavator()
    });

    match result {
        Err(StoreError::Invalid(ValidationError::EmptyCode)) => {}
        other => panic!("Expected EmptyCode validation error, got {:?}", other),
    }
    assert!(store.list_machines().unwrap().is_empty());
}

#[test]
fn test_negative_rate_rejected() {
    let store = InMemoryStore::new();
    let result = store.create_machine(&NewMachine {
        daily_rate: dec!(-1),
        ..excavator()
    });
    assert!(matches!(
        result,
        Err(StoreError::Invalid(ValidationError::NegativeRate(_)))
    ));
}

#[test]
fn test_duplicate_code_rejected() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    let result = store.create_machine(&excavator());
    assert!(matches!(result, Err(StoreError::DuplicateCode(_))));
}

#[test]
fn test_soft_delete_hides_machine() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    store.delete_machine("EXC01").unwrap();

    assert!(matches!(
        store.get_machine("EXC01"),
        Err(StoreError::MachineNotFound(_))
    ));
    assert!(store.list_machines().unwrap().is_empty());
    assert!(matches!(
        store.delete_machine("EXC01"),
        Err(StoreError::MachineNotFound(_))
    ));
}

#[test]
fn test_code_reusable_after_soft_delete() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    store.delete_machine("EXC01").unwrap();
    store.create_machine(&excavator()).unwrap();
    assert_eq!(store.list_machines().unwrap().len(), 1);
}

#[test]
fn test_legacy_status_spellings_parse() {
    assert_eq!(MachineStatus::from_str("activo").unwrap(), MachineStatus::Disponible);
    assert_eq!(MachineStatus::from_str("en_reparacion").unwrap(), MachineStatus::Taller);
    assert_eq!(MachineStatus::from_str("rentada").unwrap(), MachineStatus::Rentada);
    assert!(MachineStatus::from_str("prestada").is_err());
}

#[test]
fn test_client_statement() {
    let store = InMemoryStore::new();
    let client = store.insert_client("Constructora Rivera", Some("pagos@rivera.mx"), None);
    store.insert_client_line(client.id, &line(date(2025, 8, 3), dec!(7000), Decimal::ZERO));
    store.insert_client_line(client.id, &line(date(2025, 8, 20), Decimal::ZERO, dec!(7000)));

    assert_eq!(store.get_client(client.id).unwrap().name, "Constructora Rivera");
    assert!(matches!(store.get_client(999), Err(StoreError::ClientNotFound(999))));

    let lines = store
        .client_statement_lines(client.id, date(2025, 8, 1), date(2025, 8, 31))
        .unwrap();
    let stmt = build_statement(lines);
    assert_eq!(stmt.rows.len(), 2);
    assert_eq!(stmt.net_balance, Decimal::ZERO);
}

#[test]
fn test_csv_round_trip_preserves_values() {
    let records: Vec<CsvRecord> = vec![
        vec![
            ("code".to_string(), CsvValue::Text("EXC01".to_string())),
            ("description".to_string(), CsvValue::Text("renta, semana 32".to_string())),
            ("notes".to_string(), CsvValue::Text("cliente dijo \"urgente\"\nsegunda linea".to_string())),
        ],
        vec![
            ("code".to_string(), CsvValue::Text("GEN02".to_string())),
            ("description".to_string(), CsvValue::Null),
            ("notes".to_string(), CsvValue::Text("sin novedades".to_string())),
        ],
    ];

    let text = to_csv(&records).unwrap();
    let mut reader = csv::Reader::from_reader(text.as_bytes());

    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["code", "description", "notes"]);

    let parsed: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(parsed.len(), 2);
    assert_eq!(&parsed[0][1], "renta, semana 32");
    assert_eq!(&parsed[0][2], "cliente dijo \"urgente\"\nsegunda linea");
    assert_eq!(&parsed[1][1], "");
    assert_eq!(&parsed[1][2], "sin novedades");
}

#[test]
fn test_csv_statement_export_shape() {
    let store = InMemoryStore::new();
    store.create_machine(&excavator()).unwrap();
    store.insert_machine_line(
        "EXC01",
        &NewLedgerLine {
            source: Some("renta".to_string()),
            description: Some("semana 31".to_string()),
            ..line(date(2025, 8, 1), dec!(100), Decimal::ZERO)
        },
    );

    let lines = store
        .machine_statement_lines("EXC01", date(2025, 8, 1), date(2025, 8, 31))
        .unwrap();
    let stmt = build_statement(lines);
    let records: Vec<CsvRecord> = stmt
        .rows
        .iter()
        .map(|row| {
            vec![
                ("date".to_string(), CsvValue::Date(row.line.date)),
                ("debit".to_string(), CsvValue::Money(row.line.debit)),
                ("balance".to_string(), CsvValue::Money(row.balance)),
            ]
        })
        .collect();

    assert_eq!(to_csv(&records).unwrap(), "date,debit,balance\n2025-08-01,100.00,100.00\n");
}
