use rust_decimal::Decimal;

use rentledger_core::{LedgerLine, Statement, StatementRow};

/// Fold ledger lines into a statement with per-line running balances.
///
/// Lines must already be filtered to a single account and date range and
/// ordered by `(date, seq)`; the store guarantees this. The fold is strictly
/// sequential, so same-date lines keep their input order.
pub fn build_statement(lines: Vec<LedgerLine>) -> Statement {
    let mut running = Decimal::ZERO;
    let mut total_debit = Decimal::ZERO;
    let mut total_credit = Decimal::ZERO;
    let mut rows = Vec::with_capacity(lines.len());

    for line in lines {
        running += line.debit - line.credit;
        total_debit += line.debit;
        total_credit += line.credit;
        rows.push(StatementRow {
            line,
            balance: running,
        });
    }

    Statement {
        rows,
        total_debit,
        total_credit,
        net_balance: total_debit - total_credit,
    }
}

/// Two-decimal money formatting, applied only at presentation time.
pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", value)
}
