//! Append-only balance history
//!
//! File format, one header then one row per run:
//!
//! ```text
//! timestamp,balance
//! 2026-01-04T10:15:00.000Z,0
//! 2026-01-04T10:17:42.311Z,0.001274
//! ```
//!
//! `balance` is the cumulative realized base-currency profit since the file
//! was created.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::common::errors::Result;

const HEADER: &str = "timestamp,balance";

/// One row of the ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub balance: Decimal,
}

impl LedgerEntry {
    fn to_row(self) -> String {
        format!(
            "{},{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.balance.normalize()
        )
    }

    fn parse(line: &str) -> Option<Self> {
        let (timestamp, balance) = line.trim().split_once(',')?;
        Some(Self {
            timestamp: DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc),
            balance: Decimal::from_str(balance.trim()).ok()?,
        })
    }
}

#[derive(Debug)]
struct LedgerState {
    last: LedgerEntry,
    entries: usize,
}

/// Ledger file plus the running cumulative balance.
///
/// Appends are serialized, so concurrent workers never interleave rows and
/// timestamps are strictly increasing.
#[derive(Debug)]
pub struct BalanceLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl BalanceLedger {
    /// Open a ledger, creating it with a zero entry when the file is absent
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if tokio::fs::try_exists(&path).await? {
            let history = read_history(&path).await?;
            match history.last() {
                Some(last) => LedgerState {
                    last: *last,
                    entries: history.len(),
                },
                None => {
                    let zero = LedgerEntry {
                        timestamp: Utc::now(),
                        balance: Decimal::ZERO,
                    };
                    append_row(&path, zero).await?;
                    LedgerState { last: zero, entries: 1 }
                }
            }
        } else {
            let zero = LedgerEntry {
                timestamp: Utc::now(),
                balance: Decimal::ZERO,
            };
            tokio::fs::write(&path, format!("{}\n{}\n", HEADER, zero.to_row())).await?;
            info!(path = %path.display(), "Created balance ledger");
            LedgerState { last: zero, entries: 1 }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cumulative balance of the last entry
    pub async fn baseline(&self) -> Decimal {
        self.state.lock().await.last.balance
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries
    }

    /// Add a realized diff and persist the new cumulative balance
    pub async fn append(&self, diff: Decimal) -> Result<LedgerEntry> {
        let mut state = self.state.lock().await;

        let mut timestamp = Utc::now();
        if timestamp <= state.last.timestamp {
            timestamp = state.last.timestamp + ChronoDuration::milliseconds(1);
        }
        let entry = LedgerEntry {
            timestamp,
            balance: state.last.balance + diff,
        };

        append_row(&self.path, entry).await?;
        state.last = entry;
        state.entries += 1;
        debug!(balance = %entry.balance, diff = %diff, "Ledger append");
        Ok(entry)
    }

    /// Every entry currently in the file
    pub async fn history(&self) -> Result<Vec<LedgerEntry>> {
        let _guard = self.state.lock().await;
        read_history(&self.path).await
    }
}

async fn read_history(path: &Path) -> Result<Vec<LedgerEntry>> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() || (index == 0 && line.trim() == HEADER) {
            continue;
        }
        match LedgerEntry::parse(line) {
            Some(entry) => entries.push(entry),
            None => warn!(path = %path.display(), line = index + 1, "Skipping malformed ledger row"),
        }
    }
    Ok(entries)
}

async fn append_row(path: &Path, entry: LedgerEntry) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", entry.to_row()).as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
