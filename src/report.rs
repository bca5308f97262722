// 📄 History Export - CSV audit trail of recorded transactions
// Write-only: the ledger never reads this back.

use crate::ledger::Transaction;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write transactions as CSV (header + one row per transaction)
pub fn write_csv<W: Write>(writer: W, transactions: &[Transaction]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    for tx in transactions {
        wtr.serialize(tx)
            .with_context(|| format!("Failed to write transaction {}", tx.id))?;
    }

    // serialize() only emits the header alongside the first row
    if transactions.is_empty() {
        wtr.write_record(["id", "submitter", "amount", "category", "recorded_at"])?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn export_csv<P: AsRef<Path>>(path: P, transactions: &[Transaction]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file: {:?}", path))?;
    write_csv(file, transactions)?;
    tracing::info!(path = %path.display(), rows = transactions.len(), "history exported");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FundLedger;
    use crate::rates::RateTable;

    #[test]
    fn test_write_csv_rows() {
        let mut ledger = FundLedger::new(50_000_000.0, RateTable::embedded()).unwrap();
        ledger.record("L. Mehta", 1_000_000.0, "Road Construction").unwrap();
        ledger.record("L. Mehta", 800_000.0, "Water Supply").unwrap();

        let mut out = Vec::new();
        write_csv(&mut out, ledger.transactions()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "id,submitter,amount,category,recorded_at");
        assert!(lines[1].contains("L. Mehta,1000000.0,Road Construction"));
        assert!(lines[2].starts_with(&ledger.transactions()[1].id));
    }

    #[test]
    fn test_write_csv_empty_has_header() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,submitter,amount,category,recorded_at\n"
        );
    }

    #[test]
    fn test_export_csv_file() {
        let mut ledger = FundLedger::new(50_000_000.0, RateTable::embedded()).unwrap();
        ledger.record("M. Bose", 500_000.0, "Park Development").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        export_csv(&path, ledger.transactions()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Park Development"));
    }
}
