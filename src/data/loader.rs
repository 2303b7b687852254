// ============================================================
// Layer 4 — Record Loader
// ============================================================
// Loads training rows from disk.
//
// Two formats are accepted:
//   .jsonl / .json  one JSON object per line, e.g.
//                   {"text": "great match", "label": "sport"}
//                   {"text": "gig tonight", "label": ["music", "events"]}
//   .txt            one raw text per non-blank line (generation corpora)
//
// Label values may be strings, numbers, booleans or arrays of
// those; an array means several labels for the same row.
//
// Rows with a missing, null or blank text are dropped and
// counted. When a label field is configured, rows without any
// label are dropped too. Malformed JSON is an error. Files with
// any other extension are read as JSON lines, with a warning.

use anyhow::{Context, Result};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::record::TextRecord;
use crate::domain::traits::RecordSource;

/// Reads JSON-lines (or plain text) files into TextRecords.
pub struct JsonlLoader {
    path:        PathBuf,
    text_field:  String,
    label_field: Option<String>,
}

impl JsonlLoader {
    pub fn new(path: impl Into<PathBuf>, text_field: impl Into<String>) -> Self {
        Self {
            path:        path.into(),
            text_field:  text_field.into(),
            label_field: None,
        }
    }

    /// Also read labels from `field` and require at least one per row.
    pub fn with_labels(mut self, field: impl Into<String>) -> Self {
        self.label_field = Some(field.into());
        self
    }

    fn is_plain_text(&self) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some("txt")
    }

    fn parse_line(&self, line: &str, line_no: usize) -> Result<Option<TextRecord>> {
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid JSON", self.path.display(), line_no))?;

        let text = match value.get(&self.text_field).and_then(Value::as_str) {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => return Ok(None),
        };

        let labels = match &self.label_field {
            Some(field) => {
                let labels = extract_labels(value.get(field));
                if labels.is_empty() {
                    return Ok(None);
                }
                labels
            }
            None => Vec::new(),
        };

        Ok(Some(TextRecord::new(text, labels)))
    }
}

impl RecordSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<TextRecord>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;
        if !is_supported(&self.path) {
            tracing::warn!("'{}' is neither .jsonl nor .txt, reading it as JSON lines", self.path.display());
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;

        if self.is_plain_text() {
            for line in content.lines() {
                if line.trim().is_empty() {
                    skipped += 1;
                } else {
                    records.push(TextRecord::unlabelled(line.trim()));
                }
            }
        } else {
            for (idx, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match self.parse_line(line, idx + 1)? {
                    Some(record) => records.push(record),
                    None => skipped += 1,
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Dropped {} rows without usable '{}'{} from '{}'",
                skipped,
                self.text_field,
                self.label_field
                    .as_deref()
                    .map(|f| format!(" / '{f}'"))
                    .unwrap_or_default(),
                self.path.display()
            );
        }
        tracing::info!("Loaded {} records from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}

/// Flatten a JSON label value into label strings, keeping first occurrences only.
fn extract_labels(value: Option<&Value>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    collect_labels(value, &mut out);
    out
}

fn collect_labels(value: Option<&Value>, out: &mut Vec<String>) {
    let label = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b))   => b.to_string(),
        Some(Value::Array(items)) => {
            for item in items {
                collect_labels(Some(item), out);
            }
            return;
        }
        _ => return,
    };
    if !label.is_empty() && !out.contains(&label) {
        out.push(label);
    }
}

/// True when the path looks like something the loader can read.
pub fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("json") | Some("txt")
    )
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_loads_text_and_labels() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "rows.jsonl",
            "{\"text\": \"great match\", \"tag\": \"sport\"}\n\
             {\"text\": \"gig tonight\", \"tag\": [\"music\", \"events\", \"music\"]}\n",
        );
        let records = JsonlLoader::new(&path, "text").with_labels("tag").load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].labels, vec!["sport"]);
        assert_eq!(records[1].labels, vec!["music", "events"]);
    }

    #[test]
    fn test_drops_null_text_and_missing_labels() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "rows.jsonl",
            "{\"text\": null, \"tag\": \"a\"}\n\
             {\"text\": \"   \", \"tag\": \"a\"}\n\
             {\"text\": \"kept\", \"tag\": 1}\n\
             {\"text\": \"no label\"}\n\n",
        );
        let records = JsonlLoader::new(&path, "text").with_labels("tag").load_all().unwrap();
        assert_eq!(records, vec![TextRecord::new("kept", vec!["1".to_string()])]);
    }

    #[test]
    fn test_plain_text_corpus() {
        let dir     = tempfile::tempdir().unwrap();
        let path    = write_file(&dir, "corpus.txt", "first line\n\n  second line  \n");
        let records = JsonlLoader::new(&path, "text").load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "second line");
        assert!(!records[0].is_labelled());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "rows.jsonl", "{not json}\n");
        assert!(JsonlLoader::new(&path, "text").load_all().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = JsonlLoader::new("/definitely/not/here.jsonl", "text");
        assert!(loader.load_all().is_err());
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("a.jsonl")));
        assert!(is_supported(Path::new("a.txt")));
        assert!(!is_supported(Path::new("a.docx")));
    }

    #[test]
    fn test_unknown_extension_read_as_json_lines() {
        let dir     = tempfile::tempdir().unwrap();
        let path    = write_file(&dir, "rows.ndjson", "{\"text\": \"hello\"}\n");
        let records = JsonlLoader::new(&path, "text").load_all().unwrap();
        assert_eq!(records.len(), 1);
    }
}
