//! Append-only record sinks for the logging tools
//!
//! Every tool owns one sink. Sinks are shared between concurrent sessions,
//! so each implementation serializes its appends internally.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::StorageError;

/// One record: ordered (field, value) pairs
pub type Record = Vec<(&'static str, String)>;

/// Field layout of each sink, in column order
pub const LEAD_FIELDS: [&str; 4] = ["email", "name", "message", "timestamp"];
pub const DEMO_REQUEST_FIELDS: [&str; 4] = ["email", "name", "preferred_time", "timestamp"];
pub const PHONE_CONTACT_FIELDS: [&str; 4] = ["name", "phone", "notes", "timestamp"];
pub const FEEDBACK_FIELDS: [&str; 2] = ["question", "timestamp"];

/// Append-only storage for tool records
pub trait LogSink: Send + Sync {
    /// Append one record. A failed append leaves no partial record behind.
    fn append(&self, record: &Record) -> Result<(), StorageError>;
}

/// CSV file sink with a header row
///
/// The lock is held across open/write so records from concurrent sessions
/// are never interleaved, and each record is written with one `write_all`.
pub struct CsvSink {
    path: PathBuf,
    fields: &'static [&'static str],
    lock: Mutex<()>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, fields: &'static [&'static str]) -> Self {
        Self {
            path: path.into(),
            fields,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, record: &Record) -> Result<String, StorageError> {
        let mut row = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            let value = record
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| StorageError::MissingField {
                    sink: self.path.display().to_string(),
                    field: field.to_string(),
                })?;
            row.push(quote_field(value));
        }
        Ok(row.join(",") + "\n")
    }
}

impl LogSink for CsvSink {
    fn append(&self, record: &Record) -> Result<(), StorageError> {
        let line = self.encode(record)?;
        let io_err = |e: std::io::Error| StorageError::Io {
            path: self.path.display().to_string(),
            source: e,
        };

        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;

        let needs_header = file.metadata().map_err(io_err)?.len() == 0;
        let mut buf = String::new();
        if needs_header {
            buf.push_str(&self.fields.join(","));
            buf.push('\n');
        }
        buf.push_str(&line);

        file.write_all(buf.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        debug!(path = %self.path.display(), "Appended record");
        Ok(())
    }
}

/// Quote a CSV field when it contains a separator, quote or line break
pub(crate) fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// In-process sink, used by tests and dry runs
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn append(&self, record: &Record) -> Result<(), StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}

/// The four sinks, one per tool
#[derive(Clone)]
pub struct Sinks {
    pub leads: Arc<dyn LogSink>,
    pub demo_requests: Arc<dyn LogSink>,
    pub phone_contacts: Arc<dyn LogSink>,
    pub feedback: Arc<dyn LogSink>,
}

impl Sinks {
    /// CSV sinks under `dir`: leads.csv, demo_requests.csv, phone_contacts.csv, feedback.csv
    pub fn csv_in(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            leads: Arc::new(CsvSink::new(dir.join("leads.csv"), &LEAD_FIELDS)),
            demo_requests: Arc::new(CsvSink::new(
                dir.join("demo_requests.csv"),
                &DEMO_REQUEST_FIELDS,
            )),
            phone_contacts: Arc::new(CsvSink::new(
                dir.join("phone_contacts.csv"),
                &PHONE_CONTACT_FIELDS,
            )),
            feedback: Arc::new(CsvSink::new(dir.join("feedback.csv"), &FEEDBACK_FIELDS)),
        }
    }

    /// Fresh memory sinks, returned alongside the handles so callers can inspect them
    pub fn in_memory() -> (Self, MemorySinks) {
        let handles = MemorySinks {
            leads: Arc::new(MemorySink::new()),
            demo_requests: Arc::new(MemorySink::new()),
            phone_contacts: Arc::new(MemorySink::new()),
            feedback: Arc::new(MemorySink::new()),
        };
        let sinks = Self {
            leads: handles.leads.clone(),
            demo_requests: handles.demo_requests.clone(),
            phone_contacts: handles.phone_contacts.clone(),
            feedback: handles.feedback.clone(),
        };
        (sinks, handles)
    }
}

/// Typed handles onto the memory sinks behind a [`Sinks`]
#[derive(Clone)]
pub struct MemorySinks {
    pub leads: Arc<MemorySink>,
    pub demo_requests: Arc<MemorySink>,
    pub phone_contacts: Arc<MemorySink>,
    pub feedback: Arc<MemorySink>,
}

impl MemorySinks {
    pub fn total(&self) -> usize {
        self.leads.len()
            + self.demo_requests.len()
            + self.phone_contacts.len()
            + self.feedback.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback_record(question: &str) -> Record {
        vec![
            ("question", question.to_string()),
            ("timestamp", "2026-01-01T00:00:00Z".to_string()),
        ]
    }

    #[test]
    fn test_quote_field() {
        assert_eq!(quote_field("plain"), "plain");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_sink_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("feedback.csv"), &FEEDBACK_FIELDS);

        sink.append(&feedback_record("Dubai office?")).unwrap();
        sink.append(&feedback_record("Pricing, tiers?")).unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "question,timestamp");
        assert_eq!(lines[1], "Dubai office?,2026-01-01T00:00:00Z");
        assert_eq!(lines[2], "\"Pricing, tiers?\",2026-01-01T00:00:00Z");
    }

    #[test]
    fn test_csv_sink_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = Sinks::csv_in(dir.path().join("nested").join("logs"));
        sinks.feedback.append(&feedback_record("q")).unwrap();
        assert!(dir.path().join("nested/logs/feedback.csv").exists());
    }

    #[test]
    fn test_csv_sink_rejects_incomplete_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("leads.csv"), &LEAD_FIELDS);
        let err = sink
            .append(&vec![("email", "a@b.c".to_string())])
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingField { .. }));
        assert!(!sink.path().exists());
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CsvSink::new(dir.path().join("feedback.csv"), &FEEDBACK_FIELDS));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        sink.append(&feedback_record(&format!("question {}-{}", i, j)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1 + 8 * 25);
        assert!(lines[1..]
            .iter()
            .all(|l| l.starts_with("question ") && l.ends_with(",2026-01-01T00:00:00Z")));
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.append(&feedback_record("first")).unwrap();
        sink.append(&feedback_record("second")).unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][0].1, "second");
    }
}
