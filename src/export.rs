//! CSV serialization for statement exports.
//!
//! Records are uniform ordered field lists; the first record's field names
//! become the header row. Quoting follows RFC4180 (the `csv` crate's
//! default): a field is quoted only when it contains a comma, quote, or
//! newline, and embedded quotes are doubled.

use std::fmt::{self, Display};

use rust_decimal::Decimal;
use thiserror::Error;
use time::Date;

use crate::statement::format_money;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid UTF-8 in CSV output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A scalar cell value. `Null` serializes as the empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum CsvValue {
    Null,
    Int(i64),
    Money(Decimal),
    Text(String),
    Date(Date),
}

impl Display for CsvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvValue::Null => Ok(()),
            CsvValue::Int(i) => write!(f, "{}", i),
            CsvValue::Money(m) => f.write_str(&format_money(*m)),
            CsvValue::Text(s) => f.write_str(s),
            CsvValue::Date(d) => {
                write!(f, "{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
            }
        }
    }
}

/// One record: field name/value pairs in output order. All records in a
/// document are assumed to share the first record's field names.
pub type CsvRecord = Vec<(String, CsvValue)>;

/// Serialize records to a CSV string. An empty input produces an empty
/// string, not a header-only document.
pub fn to_csv(records: &[CsvRecord]) -> Result<String, ExportError> {
    let Some(first) = records.first() else {
        return Ok(String::new());
    };

    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(first.iter().map(|(name, _)| name.as_str()))?;
        for record in records {
            writer.write_record(record.iter().map(|(_, value)| value.to_string()))?;
        }
        writer.flush()?;
    }

    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn field(name: &str, value: CsvValue) -> (String, CsvValue) {
        (name.to_string(), value)
    }

    #[test]
    fn empty_input_produces_empty_string() {
        assert_eq!(to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn quotes_only_when_needed() {
        let records = vec![vec![
            field("a", CsvValue::Int(1)),
            field("b", CsvValue::Text("x,y".to_string())),
        ]];
        assert_eq!(to_csv(&records).unwrap(), "a,b\n1,\"x,y\"\n");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let records = vec![vec![field("v", CsvValue::Text("say \"hi\"".to_string()))]];
        assert_eq!(to_csv(&records).unwrap(), "v\n\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn null_serializes_as_empty_field() {
        let records = vec![vec![
            field("a", CsvValue::Null),
            field("b", CsvValue::Money(dec!(12.5))),
        ]];
        assert_eq!(to_csv(&records).unwrap(), "a,b\n,12.50\n");
    }
}
