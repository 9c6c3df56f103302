use std::io::{self, Write};

use crate::result_store::{PromoRecord, PromoStatus};

const ORG_WIDTH: usize = 33;

/// Writes every stored promo as a table.
pub fn write_listing<W: Write>(out: &mut W, records: &[(&str, &PromoRecord)]) -> io::Result<()> {
    if records.is_empty() {
        writeln!(out, "No promos found yet. Run search first.")?;
        return Ok(());
    }
    writeln!(out, "\nFound {} fast track promos:\n", records.len())?;
    write_table(out, records)
}

/// Writes the result of an organization search.
pub fn write_company_matches<W: Write>(out: &mut W, query: &str, matches: &[(&str, &PromoRecord)]) -> io::Result<()> {
    if matches.is_empty() {
        writeln!(out, "No matches found for '{}'", query)?;
        return Ok(());
    }
    writeln!(out, "\nFound {} matches for '{}':\n", matches.len(), query)?;
    write_table(out, matches)
}

fn write_table<W: Write>(out: &mut W, rows: &[(&str, &PromoRecord)]) -> io::Result<()> {
    writeln!(out, "{:<8} {:<35} {:<12} {}", "Code", "Organization", "Status", "URL")?;
    writeln!(out, "{}", "-".repeat(95))?;
    for (code, record) in rows {
        writeln!(
            out,
            "{:<8} {:<35} {:<12} {}",
            code,
            truncate(&record.organization, ORG_WIDTH),
            status_label(record),
            record.url
        )?;
    }
    Ok(())
}

fn status_label(record: &PromoRecord) -> String {
    match (record.status, &record.expiration_date) {
        (PromoStatus::Expired, Some(date)) => format!("EXPIRED {}", date),
        (status, _) => status.to_string().to_uppercase(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
