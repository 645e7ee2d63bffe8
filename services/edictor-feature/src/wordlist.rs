//! Tab-separated wordlist records exchanged with the editor.
//!
//! One record per line: `index, doculect, concept, tokens[, cogid][, alignment]`,
//! tokens and alignments space-separated.

use crate::types::Row;

/// Optional trailing columns present in a wordlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Columns {
    pub cognates: bool,
    pub alignments: bool,
}

impl Columns {
    pub const BASIC: Self = Self {
        cognates: false,
        alignments: false,
    };
    pub const COGNATES: Self = Self {
        cognates: true,
        alignments: false,
    };
    pub const ALIGNMENTS: Self = Self {
        cognates: false,
        alignments: true,
    };
}

fn split_tokens(field: &str) -> Vec<String> {
    field
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a wordlist.
///
/// Blank lines and records with fewer than four fields are skipped.
/// An empty cognate or alignment field reads as absent.
pub fn parse_wordlist(text: &str, columns: Columns) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 4 {
            skipped += 1;
            continue;
        }

        let mut row = Row {
            index: parts[0].to_string(),
            doculect: parts[1].to_string(),
            concept: parts[2].to_string(),
            tokens: split_tokens(parts[3]),
            cogid: None,
            alignment: None,
        };

        let mut cursor = 4;
        if columns.cognates {
            row.cogid = parts
                .get(cursor)
                .filter(|c| !c.is_empty())
                .map(|c| c.to_string());
            cursor += 1;
        }
        if columns.alignments {
            row.alignment = parts
                .get(cursor)
                .map(|a| split_tokens(a))
                .filter(|a| !a.is_empty());
        }
        rows.push(row);
    }

    if skipped > 0 {
        tracing::warn!(skipped, "skipped wordlist records with fewer than 4 fields");
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_records() {
        let text = "1\tGerman\thand\th a n t\n\n2\tEnglish\thand\th æ n d\n";
        let rows = parse_wordlist(text, Columns::BASIC);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Row::new("1", "German", "hand", &["h", "a", "n", "t"]));
        assert_eq!(rows[1].tokens, vec!["h", "æ", "n", "d"]);
    }

    #[test]
    fn test_short_records_are_skipped() {
        let rows = parse_wordlist("1\tGerman\thand\n2\tA\tB\tx\n", Columns::BASIC);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, "2");
    }

    #[test]
    fn test_empty_tokens_field() {
        let rows = parse_wordlist("1\tA\tx\t\n", Columns::BASIC);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].tokens.is_empty());
    }

    #[test]
    fn test_cognate_column() {
        let text = "1\tA\tx\tt a\t7\n2\tB\tx\td a\t\n3\tC\tx\tk a\n";
        let rows = parse_wordlist(text, Columns::COGNATES);
        assert_eq!(rows[0].cogid.as_deref(), Some("7"));
        assert_eq!(rows[1].cogid, None);
        assert_eq!(rows[2].cogid, None);
    }

    #[test]
    fn test_alignment_column() {
        let text = "1\tA\tx\tt a\tt a -\n2\tB\tx\td a n\n";
        let rows = parse_wordlist(text, Columns::ALIGNMENTS);
        assert_eq!(
            rows[0].alignment,
            Some(vec!["t".to_string(), "a".to_string(), "-".to_string()])
        );
        assert_eq!(rows[1].alignment, None);
    }

    #[test]
    fn test_crlf_and_double_spaces() {
        let rows = parse_wordlist("1\tA\tx\tt  a\r\n", Columns::BASIC);
        assert_eq!(rows[0].tokens, vec!["t", "a"]);
    }
}
