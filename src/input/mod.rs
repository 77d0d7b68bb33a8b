//! Input loading: file reads and the tabular reader.
//!
//! The tabular reader wraps the `csv` crate. It never fails outright: rows it can
//! read are returned in `data`, problems are returned in `errors`, so callers can
//! decide whether a problem is fatal.

mod row;

pub use row::RawRow;

use std::fmt;
use std::path::Path;

use crate::error::{BudgetError, FileKind, Result};

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// A problem found while tokenizing tabular text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-based line in the source text, when known.
    pub line: Option<u64>,
    pub message: String,
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<ParseIssue> for BudgetError {
    fn from(issue: ParseIssue) -> Self {
        BudgetError::parse(issue.to_string())
    }
}

/// Output of [`parse_table`].
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub data: Vec<RawRow>,
    pub errors: Vec<ParseIssue>,
}

/// Read a whole file, naming the logical file on failure.
pub fn read_input(path: &Path, kind: FileKind) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| BudgetError::io(kind, path.display().to_string(), e))
}

/// Pick the delimiter that occurs most often in the header line (comma on ties).
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let mut best = (b',', 0usize);
    for delimiter in CANDIDATE_DELIMITERS {
        let count = header.bytes().filter(|b| *b == delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}

/// Parse tabular text whose first line holds the headers.
///
/// Values are kept as strings. Rows with a field count different from the
/// header are kept (missing fields absent, extra fields dropped) and reported.
pub fn parse_table(text: &str) -> ParsedTable {
    let text = text.trim_start_matches('\u{feff}');
    let mut table = ParsedTable::default();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    match reader.headers() {
        Ok(headers) => table.headers = headers.iter().map(|h| h.trim().to_string()).collect(),
        Err(e) => {
            table.errors.push(ParseIssue {
                line: e.position().map(|p| p.line()),
                message: format!("unreadable header: {}", e),
            });
            return table;
        }
    }

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                table.errors.push(ParseIssue {
                    line: e.position().map(|p| p.line()),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let mut line = record.position().map(|p| p.line());
        let offset = record.position().map_or(0, |p| p.byte() as usize);
        if let Some((first, count)) = skipped_blank_lines(text, offset) {
            for blank in first..first + count as u64 {
                table.errors.push(ParseIssue {
                    line: Some(blank),
                    message: "blank line".to_string(),
                });
                table.data.push(RawRow::default());
            }
            line = Some(first + count as u64);
        }
        if record.len() != table.headers.len() {
            table.errors.push(ParseIssue {
                line,
                message: format!(
                    "expected {} fields but found {}",
                    table.headers.len(),
                    record.len()
                ),
            });
        }

        table.data.push(
            table
                .headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.as_str(), value))
                .collect(),
        );
    }

    tracing::debug!(
        "Parsed {} rows ({} issues) with {} columns",
        table.data.len(),
        table.errors.len(),
        table.headers.len()
    );
    table
}

/// Blank lines the csv reader skipped just before the record at `offset`.
///
/// Returns the 1-based line of the first blank line and how many there were.
fn skipped_blank_lines(text: &str, offset: usize) -> Option<(u64, usize)> {
    let bytes = text.as_bytes();
    let offset = offset.min(bytes.len());
    let at_line_start = offset == 0 || bytes[offset - 1] == b'\n';
    let newlines = bytes[offset..]
        .iter()
        .take_while(|b| matches!(b, b'\n' | b'\r'))
        .filter(|b| **b == b'\n')
        .count();
    let count = if at_line_start {
        newlines
    } else {
        newlines.saturating_sub(1)
    };
    if count == 0 {
        return None;
    }
    let mut first = bytes[..offset].iter().filter(|b| **b == b'\n').count() as u64 + 1;
    if !at_line_start {
        first += 1;
    }
    Some((first, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a\tb\tc\n"), b'\t');
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("a|b"), b'|');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn test_parse_table_keeps_values_as_strings() {
        let table = parse_table("budget_name,budget_amt,scope_type,scope_id\nOps,1000.00,project,p1\n");
        assert!(table.errors.is_empty());
        assert_eq!(table.headers, vec!["budget_name", "budget_amt", "scope_type", "scope_id"]);
        assert_eq!(table.data.len(), 1);
        assert_eq!(
            table.data[0].get("budget_amt"),
            Some(&serde_json::Value::String("1000.00".into()))
        );
    }

    #[test]
    fn test_parse_table_semicolons_and_quotes() {
        let table = parse_table("name;thresholds\nA;\"[{\"\"percentage\"\": 50}]\"\n");
        assert!(table.errors.is_empty());
        assert_eq!(
            table.data[0].text("thresholds").as_deref(),
            Some(r#"[{"percentage": 50}]"#)
        );
    }

    #[test]
    fn test_short_rows_are_kept_and_reported() {
        let table = parse_table("a,b,c\n1,2,3\n4,5\n");
        assert_eq!(table.data.len(), 2);
        assert_eq!(table.errors.len(), 1);
        assert_eq!(table.errors[0].line, Some(3));
        assert_eq!(table.data[1].text("b").as_deref(), Some("5"));
        assert_eq!(table.data[1].get("c"), None);
    }

    #[test]
    fn test_blank_lines_become_empty_rows() {
        let table = parse_table("a,b\n1,2\n\n3,4\n");
        assert_eq!(table.data.len(), 3);
        assert_eq!(table.data[1], RawRow::default());
        assert_eq!(table.data[2].text("a").as_deref(), Some("3"));
        assert_eq!(table.errors.len(), 1);
        assert_eq!(table.errors[0].line, Some(3));

        let crlf = parse_table("a,b\r\n\r\n\r\n1,2\r\n");
        assert_eq!(crlf.data.len(), 3);
        assert_eq!(crlf.errors[1].line, Some(3));
        assert_eq!(crlf.data[2].text("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_trailing_newline_adds_no_row() {
        let table = parse_table("a,b\n1,2\n");
        assert_eq!(table.data.len(), 1);
        assert!(table.errors.is_empty());
    }

    #[test]
    fn test_read_input_names_the_file_kind() {
        let err = read_input(Path::new("/definitely/not/here.csv"), FileKind::Budgets).unwrap_err();
        assert!(err.to_string().contains("budgets file"));
    }
}
