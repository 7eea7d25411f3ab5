//! Lossless parse/serialize of the tracker CSV format.
//!
//! RFC-4180 style: `"`-quoted fields, `""` for an embedded quote, newlines
//! allowed inside quotes. Outside quotes `\r` is dropped, so `\r\n` and `\n`
//! both end a row. A leading byte-order mark is ignored on read and written on
//! request, since spreadsheet tools need it to detect UTF-8.

use crate::models::{TrackerRecord, CSV_HEADERS};

pub const BOM: char = '\u{feff}';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    /// First row of the file, verbatim.
    pub headers: Vec<String>,
    /// Data rows with at least one non-empty cell.
    pub rows: Vec<Vec<String>>,
    /// `rows` mapped positionally onto the canonical columns.
    pub records: Vec<TrackerRecord>,
}

pub fn parse(text: &str) -> CsvTable {
    let source = text.strip_prefix(BOM).unwrap_or(text);

    let mut all_rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut value = String::new();
    let mut in_quotes = false;
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    value.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                value.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut value)),
            '\n' => {
                row.push(std::mem::take(&mut value));
                all_rows.push(std::mem::take(&mut row));
            }
            '\r' => {}
            other => value.push(other),
        }
    }

    if !value.is_empty() || !row.is_empty() {
        row.push(value);
        all_rows.push(row);
    }

    let mut iter = all_rows.into_iter();
    let headers = iter.next().unwrap_or_default();
    let rows: Vec<Vec<String>> = iter
        .filter(|candidate| candidate.iter().any(|cell| !cell.is_empty()))
        .collect();
    let records = rows.iter().map(|r| TrackerRecord::from_cells(r)).collect();

    CsvTable {
        headers,
        rows,
        records,
    }
}

fn escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn column_index(header: &str) -> Option<usize> {
    CSV_HEADERS.iter().position(|column| *column == header)
}

/// Serialize `records` under `headers` (canonical headers when empty). Columns
/// outside the canonical set are written as empty cells.
pub fn serialize(records: &[TrackerRecord], headers: &[&str], include_bom: bool) -> String {
    let headers: &[&str] = if headers.is_empty() {
        &CSV_HEADERS
    } else {
        headers
    };
    let indices: Vec<Option<usize>> = headers.iter().map(|h| column_index(h)).collect();

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(headers.join(","));
    for record in records {
        let cells = record.cells();
        let line = indices
            .iter()
            .map(|index| index.map(|i| escape(cells[i])).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    let body = lines.join("\n");
    if include_bom {
        format!("{BOM}{body}")
    } else {
        body
    }
}

/// Header-only file used to initialize a new tracker.
pub fn template(include_bom: bool) -> String {
    serialize(&[], &CSV_HEADERS, include_bom)
}

/// Exact, ordered, case-sensitive match against the canonical header list.
pub fn is_header_match<S: AsRef<str>>(headers: &[S]) -> bool {
    headers.len() == CSV_HEADERS.len()
        && headers
            .iter()
            .zip(CSV_HEADERS.iter())
            .all(|(actual, expected)| actual.as_ref() == *expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(key: &str, notes: &str) -> TrackerRecord {
        TrackerRecord {
            job_key: key.into(),
            job_id: key.into(),
            company: "Acme, Inc.".into(),
            position: "Engineer \"II\"".into(),
            location: "Remote".into(),
            job_url: format!("https://jobs.example.com/{key}"),
            status: "Applied".into(),
            saved_at: "2024-01-01T00:00:00.000Z".into(),
            applied_at: "2024-01-02T00:00:00.000Z".into(),
            round1_pass: "1".into(),
            round2_pass: "0".into(),
            round3_pass: "0".into(),
            notes: notes.into(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-02T00:00:00.000Z".into(),
            ..Default::default()
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let records = vec![
            sample("1", "plain"),
            sample("2", "multi\nline, with \"quotes\""),
            sample("3", ""),
            sample("4", "carriage\r\nreturn"),
        ];
        let text = serialize(&records, &CSV_HEADERS, true);
        assert!(text.starts_with(BOM));

        let table = parse(&text);
        assert!(is_header_match(&table.headers));
        // Bare \r is dropped outside quotes only; quoted \r survives.
        assert_eq!(table.records, records);
    }

    #[test]
    fn crlf_and_lf_both_end_rows() {
        let text = "a,b\r\n1,2\n3,4\r\n";
        let table = parse(text);
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(
            table.rows,
            vec![vec!["1".to_string(), "2".to_string()], vec!["3".into(), "4".into()]]
        );
    }

    #[test]
    fn empty_rows_are_discarded() {
        let text = format!("{}\n,,,\n\nk1,id\n", CSV_HEADERS.join(","));
        let table = parse(&text);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.records[0].job_key, "k1");
        assert_eq!(table.records[0].job_id, "id");
        assert_eq!(table.records[0].notes, "");
    }

    #[test]
    fn header_match_is_exact() {
        assert!(is_header_match(&CSV_HEADERS));

        let mut swapped = CSV_HEADERS.to_vec();
        swapped.swap(1, 2);
        assert!(!is_header_match(&swapped));

        assert!(!is_header_match(&CSV_HEADERS[..17]));

        let mut superset = CSV_HEADERS.to_vec();
        superset.push("extra");
        assert!(!is_header_match(&superset));

        let upper: Vec<String> = CSV_HEADERS.iter().map(|h| h.to_uppercase()).collect();
        assert!(!is_header_match(&upper));

        let empty: [&str; 0] = [];
        assert!(!is_header_match(&empty));
    }

    #[test]
    fn template_is_header_only() {
        let text = template(true);
        let table = parse(&text);
        assert!(is_header_match(&table.headers));
        assert!(table.records.is_empty());
        assert_eq!(text.trim_start_matches(BOM), CSV_HEADERS.join(","));
    }

    #[test]
    fn unknown_columns_serialize_empty() {
        let text = serialize(&[sample("9", "n")], &["job_key", "bogus", "notes"], false);
        assert_eq!(text, "job_key,bogus,notes\n9,,n");
    }
}
