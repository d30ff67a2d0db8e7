//! Collections backend: the business system behind the provider tools.
//!
//! `CollectionsBackend` is the seam between tool handlers and whatever holds
//! receivables data. `LedgerBackend` is the shipped implementation: a YAML
//! ledger of customers and invoices loaded at startup, with outgoing email
//! and collection notes appended to JSON-lines files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::errors::{ProviderError, ToolError};

// ─── Domain Types ───────────────────────────────────────────────────────────

/// A customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Invoice lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
    Paid,
    Void,
}

/// One receivable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub customer_id: String,
    /// Remaining balance in minor currency units.
    pub balance_cents: i64,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
}

impl Invoice {
    /// Open with money still owed.
    pub fn is_outstanding(&self) -> bool {
        self.status == InvoiceStatus::Open && self.balance_cents > 0
    }
}

/// A dunning email as written to the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub message_id: String,
    pub customer_id: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// A free-text note attached to a customer's collection history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionNote {
    pub note_id: String,
    pub customer_id: String,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// On-disk ledger layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

// ─── Backend Trait ──────────────────────────────────────────────────────────

/// Receivables data and outbound actions used by the tool handlers.
#[async_trait]
pub trait CollectionsBackend: Send + Sync {
    /// All invoices, any status.
    async fn invoices(&self) -> Result<Vec<Invoice>, ToolError>;

    /// Look up a customer by id.
    async fn customer(&self, customer_id: &str) -> Result<Option<Customer>, ToolError>;

    /// Deliver an email. Returns once the message is durably queued.
    async fn send_email(&self, email: &OutgoingEmail) -> Result<(), ToolError>;

    /// Persist a collection note.
    async fn record_note(&self, note: &CollectionNote) -> Result<(), ToolError>;
}

// ─── LedgerBackend ──────────────────────────────────────────────────────────

/// File-backed implementation of [`CollectionsBackend`].
pub struct LedgerBackend {
    ledger: Ledger,
    outbox_path: PathBuf,
    notes_path: PathBuf,
    append_lock: Mutex<()>,
}

impl LedgerBackend {
    /// Wrap an in-memory ledger.
    pub fn new(ledger: Ledger, outbox_path: PathBuf, notes_path: PathBuf) -> Self {
        Self {
            ledger,
            outbox_path,
            notes_path,
            append_lock: Mutex::new(()),
        }
    }

    /// Load the ledger YAML at `ledger_path`.
    pub fn load(
        ledger_path: &Path,
        outbox_path: PathBuf,
        notes_path: PathBuf,
    ) -> Result<Self, ProviderError> {
        let load_err = |reason: String| ProviderError::LedgerLoad {
            path: ledger_path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(ledger_path).map_err(|e| load_err(e.to_string()))?;
        let ledger: Ledger = serde_yaml::from_str(&content).map_err(|e| load_err(e.to_string()))?;

        tracing::info!(
            path = %ledger_path.display(),
            customers = ledger.customers.len(),
            invoices = ledger.invoices.len(),
            "ledger loaded"
        );

        Ok(Self::new(ledger, outbox_path, notes_path))
    }

    async fn append_json_line<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), ToolError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.append_lock.lock().await;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl CollectionsBackend for LedgerBackend {
    async fn invoices(&self) -> Result<Vec<Invoice>, ToolError> {
        Ok(self.ledger.invoices.clone())
    }

    async fn customer(&self, customer_id: &str) -> Result<Option<Customer>, ToolError> {
        Ok(self
            .ledger
            .customers
            .iter()
            .find(|c| c.id == customer_id)
            .cloned())
    }

    async fn send_email(&self, email: &OutgoingEmail) -> Result<(), ToolError> {
        self.append_json_line(&self.outbox_path, email).await
    }

    async fn record_note(&self, note: &CollectionNote) -> Result<(), ToolError> {
        self.append_json_line(&self.notes_path, note).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LEDGER_YAML: &str = r#"
customers:
  - id: C001
    name: Acme Corp
    email: ap@acme.example
  - id: C002
    name: Globex
invoices:
  - invoice_id: INV-1
    customer_id: C001
    balance_cents: 120000
    due_date: 2026-07-01
    status: open
  - invoice_id: INV-2
    customer_id: C002
    balance_cents: 0
    due_date: 2026-07-15
    status: paid
"#;

    #[test]
    fn test_ledger_yaml_parses() {
        let ledger: Ledger = serde_yaml::from_str(LEDGER_YAML).unwrap();
        assert_eq!(ledger.customers.len(), 2);
        assert_eq!(ledger.customers[1].email, None);
        assert!(ledger.invoices[0].is_outstanding());
        assert!(!ledger.invoices[1].is_outstanding());
    }

    #[test]
    fn test_load_missing_ledger_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = LedgerBackend::load(
            &dir.path().join("missing.yaml"),
            dir.path().join("outbox.jsonl"),
            dir.path().join("notes.jsonl"),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ProviderError::LedgerLoad { .. }));
    }

    #[tokio::test]
    async fn test_customer_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.yaml");
        std::fs::write(&path, LEDGER_YAML).unwrap();
        let backend = LedgerBackend::load(
            &path,
            dir.path().join("outbox.jsonl"),
            dir.path().join("notes.jsonl"),
        )
        .unwrap();

        assert_eq!(backend.customer("C001").await.unwrap().unwrap().name, "Acme Corp");
        assert!(backend.customer("C999").await.unwrap().is_none());
        assert_eq!(backend.invoices().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_outbox_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = dir.path().join("out").join("outbox.jsonl");
        let backend = LedgerBackend::new(
            Ledger::default(),
            outbox.clone(),
            dir.path().join("notes.jsonl"),
        );

        for i in 0..2 {
            let email = OutgoingEmail {
                message_id: format!("m{i}"),
                customer_id: "C001".into(),
                to: "ap@acme.example".into(),
                subject: "Overdue".into(),
                body: "Please pay".into(),
                sent_at: Utc::now(),
            };
            backend.send_email(&email).await.unwrap();
        }

        let content = std::fs::read_to_string(&outbox).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: OutgoingEmail = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.message_id, "m0");
    }
}
