//! Shared fixtures for tests that run the real `collections-tools` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use collections_agent::mcp_client::ServerConfig;

pub const LEDGER_YAML: &str = r#"
customers:
  - id: C001
    name: Acme Corp
    email: ap@acme.example
  - id: C002
    name: Globex
  - id: C003
    name: Initech
    email: billing@initech.example
  - id: C004
    name: Umbrella
    email: finance@umbrella.example
invoices:
  - invoice_id: INV-100
    customer_id: C003
    balance_cents: 42000
    due_date: 2026-06-30
    status: open
  - invoice_id: INV-101
    customer_id: C001
    balance_cents: 120000
    due_date: 2026-07-01
    status: open
  - invoice_id: INV-102
    customer_id: C001
    balance_cents: 5500
    due_date: 2026-08-01
    status: open
  - invoice_id: INV-103
    customer_id: C002
    balance_cents: 9900
    due_date: 2026-07-15
    status: open
  - invoice_id: INV-104
    customer_id: C004
    balance_cents: 30000
    due_date: 2026-05-01
    status: paid
"#;

/// A temp directory holding a ledger and a provider config.
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ledger.yaml"), LEDGER_YAML).expect("write ledger");
        std::fs::write(
            dir.path().join("provider.yaml"),
            "ledger_path: ledger.yaml\noutbox_path: outbox.jsonl\nnotes_path: notes.jsonl\n",
        )
        .expect("write provider config");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Launch config for the provider binary built by cargo.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(
            env!("CARGO_BIN_EXE_collections-tools"),
            vec![
                "--config".to_string(),
                self.path().join("provider.yaml").display().to_string(),
            ],
        )
    }

    pub fn outbox(&self) -> PathBuf {
        self.path().join("outbox.jsonl")
    }

    pub fn outbox_lines(&self) -> usize {
        std::fs::read_to_string(self.outbox())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}

/// Whether a process with this pid still exists (Linux only; `true` elsewhere).
pub fn process_exists(pid: u32) -> bool {
    if cfg!(target_os = "linux") {
        Path::new(&format!("/proc/{pid}")).exists()
    } else {
        true
    }
}
