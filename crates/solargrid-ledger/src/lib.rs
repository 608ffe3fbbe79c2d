//! SolarGrid Ledger - durable append-only record of transfer attempts
//!
//! Every executed transfer attempt, success or failure, becomes exactly
//! one [`TransactionRecord`] appended here. The file format is JSON
//! lines: one record per line, so the log stays greppable and a partial
//! final write cannot corrupt earlier records.
//!
//! # Invariants
//!
//! 1. Append is the only write operation
//! 2. `append` returns only after the record is flushed and fsynced
//! 3. Reopening a ledger replays all previously appended records in order
//!
//! Deduplication is deliberately not done here; the agent decides what to
//! execute, the ledger just never forgets what was attempted.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use solargrid_types::TransactionRecord;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Errors that can occur in ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to open ledger file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append record: {0}")]
    Append(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

struct Inner {
    file: File,
    records: Vec<TransactionRecord>,
}

/// File-backed append-only transaction ledger
///
/// Cheap to clone; all clones share one file handle and record list, and
/// appends are serialized through an internal lock so a shared handle is
/// safe under the task model.
#[derive(Clone)]
pub struct TransactionLedger {
    path: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

impl TransactionLedger {
    /// Open (or create) the ledger at `path` and replay existing records.
    ///
    /// A torn trailing line from a crash mid-append is skipped and
    /// terminated with a newline, so everything before it is recovered and
    /// later appends land on their own lines.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|source| LedgerError::Open {
                path: path.clone(),
                source,
            })?;

        let mut records = Vec::new();
        let reader = BufReader::new(&file);
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(LedgerError::Append)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TransactionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(line = idx + 1, %err, "skipping unreadable ledger line");
                }
            }
        }

        // A crash mid-append can leave a torn tail with no trailing
        // newline. The next record must start on a fresh line, or it gets
        // glued to the fragment and is unreadable on the next replay.
        let len = file.metadata().map_err(LedgerError::Append)?.len();
        if len > 0 {
            file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                warn!(path = %path.display(), "terminating torn trailing line");
                file.write_all(b"\n")?;
                file.flush()?;
                file.sync_data()?;
            }
        }

        Ok(Self {
            path,
            inner: Arc::new(Mutex::new(Inner { file, records })),
        })
    }

    /// Append one record; durable before this returns.
    pub async fn append(&self, record: TransactionRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        inner.file.write_all(line.as_bytes())?;
        inner.file.flush()?;
        inner.file.sync_data()?;
        inner.records.push(record);
        Ok(())
    }

    /// All records, in append order
    pub async fn all(&self) -> Vec<TransactionRecord> {
        self.inner.lock().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use solargrid_types::WalletAddress;
    use std::io::Write as _;

    fn record(amount: u64, success: bool) -> TransactionRecord {
        TransactionRecord {
            agent_id: "house3".to_string(),
            sender: WalletAddress::new("0x5EFF96BE67aa638E17Fef1Aa682038E8B9F77CC6"),
            recipient: WalletAddress::new("0xE860ADA0513Cd6490684BC23e04B27E410DE84FC"),
            amount,
            tx_hash: Some(format!("0xhash{amount}")),
            success,
            error: if success {
                None
            } else {
                Some("reverted".to_string())
            },
            block_number: success.then_some(100 + amount),
            gas_used: success.then_some(51_000),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_then_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = TransactionLedger::open(dir.path().join("tx.log")).unwrap();

        ledger.append(record(1, true)).await.unwrap();
        ledger.append(record(2, false)).await.unwrap();
        ledger.append(record(3, true)).await.unwrap();

        let all = ledger.all().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].amount, 1);
        assert_eq!(all[1].amount, 2);
        assert!(!all[1].success);
        assert_eq!(all[2].amount, 3);
    }

    #[tokio::test]
    async fn reopen_replays_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");

        {
            let ledger = TransactionLedger::open(&path).unwrap();
            ledger.append(record(1, true)).await.unwrap();
            ledger.append(record(2, true)).await.unwrap();
        }

        let reopened = TransactionLedger::open(&path).unwrap();
        let all = reopened.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].amount, 1);
        assert_eq!(all[1].amount, 2);
    }

    #[tokio::test]
    async fn torn_trailing_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");

        {
            let ledger = TransactionLedger::open(&path).unwrap();
            ledger.append(record(1, true)).await.unwrap();
        }
        // Simulate a crash mid-append
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"agentId\":\"house3\",\"sen").unwrap();

        let reopened = TransactionLedger::open(&path).unwrap();
        assert_eq!(reopened.len().await, 1);

        // And the ledger keeps accepting appends afterwards
        reopened.append(record(2, true)).await.unwrap();
        assert_eq!(reopened.len().await, 2);
    }

    #[tokio::test]
    async fn append_after_torn_line_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");

        {
            let ledger = TransactionLedger::open(&path).unwrap();
            ledger.append(record(1, true)).await.unwrap();
        }
        // Crash mid-append: no trailing newline
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"agentId\":\"house3\",\"sen").unwrap();
        drop(file);

        {
            let reopened = TransactionLedger::open(&path).unwrap();
            assert_eq!(reopened.len().await, 1);
            reopened.append(record(2, true)).await.unwrap();
        }

        // The record appended after the torn tail must survive a restart
        let again = TransactionLedger::open(&path).unwrap();
        let all = again.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].amount, 1);
        assert_eq!(all[1].amount, 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = TransactionLedger::open(dir.path().join("tx.log")).unwrap();
        let clone = ledger.clone();

        ledger.append(record(1, true)).await.unwrap();
        assert_eq!(clone.len().await, 1);
    }
}
