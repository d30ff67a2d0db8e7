//! Tracing setup for both binaries.
//!
//! The agent writes to a rotated log file in the platform data directory
//! (or to stderr when asked). The tool provider always logs to stderr,
//! because its stdout carries protocol traffic.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "collections_agent=info,warn";

/// Where log output goes.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Plain text on stderr.
    Stderr,
    /// `agent.log` in `dir`, rotating previous runs and keeping `keep` of them.
    File { dir: PathBuf, keep: u32 },
}

/// Platform data directory for the agent.
///
/// - macOS: `~/Library/Application Support/collections-agent/`
/// - Linux: `$XDG_DATA_HOME/collections-agent/` (fallback `~/.local/share/...`)
/// - Windows: `{FOLDERID_RoamingAppData}\collections-agent\`
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("collections-agent");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".collections-agent")
}

/// Install the global subscriber.
///
/// Returns the log file path when logging to a file. Installing twice is a
/// no-op for the second call.
pub fn init_tracing(target: LogTarget) -> std::io::Result<Option<PathBuf>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match target {
        LogTarget::Stderr => {
            let _ = fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true)
                .try_init();
            Ok(None)
        }
        LogTarget::File { dir, keep } => {
            std::fs::create_dir_all(&dir)?;
            let log_path = dir.join("agent.log");
            rotate_log_file(&log_path, keep);

            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;

            let _ = fmt::fmt()
                .with_env_filter(filter)
                .with_writer(FlushingWriter::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .try_init();

            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                log_file = %log_path.display(),
                pid = std::process::id(),
                "=== collections-agent starting ==="
            );
            Ok(Some(log_path))
        }
    }
}

/// Rotate log files: `agent.log` → `agent.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
pub fn rotate_log_file(base_path: &Path, keep: u32) {
    if keep == 0 {
        let _ = std::fs::remove_file(base_path);
        return;
    }

    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that flushes the log file after every write, so lines survive a crash.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("agent.log");
        std::fs::write(&base, "current").unwrap();
        std::fs::write(dir.path().join("agent.log.1"), "one").unwrap();
        std::fs::write(dir.path().join("agent.log.2"), "two").unwrap();

        rotate_log_file(&base, 2);

        assert!(!base.exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("agent.log.1")).unwrap(), "current");
        assert_eq!(std::fs::read_to_string(dir.path().join("agent.log.2")).unwrap(), "one");
        assert!(!dir.path().join("agent.log.3").exists());
    }

    #[test]
    fn test_rotate_with_no_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("agent.log");
        rotate_log_file(&base, 3);
        assert!(!base.exists());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"line\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");
    }

    #[test]
    fn test_data_dir_is_app_specific() {
        assert!(data_dir().to_string_lossy().contains("collections-agent"));
    }
}
