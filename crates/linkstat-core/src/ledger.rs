//! Crash-durable ledgers: completed results and in-flight requests.
//!
//! [`DurableStore`] owns three JSON documents:
//!
//! - the **completed ledger**, every [`LinkResult`] ever computed plus the last
//!   assigned sequence number, replayed into the volatile index at startup;
//! - the **pending link ledger** and **pending number ledger**, write-ahead
//!   markers for submissions and report requests that have been accepted but
//!   not finished.
//!
//! Each ledger sits behind its own async mutex, which owns the file path, so
//! no code path can touch a ledger file without holding its lock. Every
//! mutation rewrites the whole document through a temp file that is synced and
//! then renamed over the original, so a crash leaves either the old or the new
//! document on disk, never a truncated one.
//!
//! ## On-disk layout
//!
//! ```json
//! { "processed_data": [{ "links": { "a.com": "available" }, "links_num": 1 }], "lastNum": 1 }
//! [{ "data": { "links": ["a.com"] }, "hash": "<md5 hex>", "ticket": 1 }]
//! [{ "data": { "links_list": [1, 2] }, "hash": "<md5 hex>", "ticket": 1 }]
//! ```
//!
//! Pending entries are identified by an MD5 digest of the request's canonical
//! bytes, so identical requests share a digest. The `ticket` makes removal
//! unambiguous when duplicates coexist. Tickets only ever increase for the
//! lifetime of a store: the counter is seeded from the highest ticket on disk
//! at open and is not reset when entries are removed or drained, so a stale
//! [`PendingId`] can never match a newer entry. Files written without tickets
//! read back with ticket 0.

use crate::config::StorageConfig;
use crate::{Error, LinkRequest, LinkResult, NumberRequest, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Persisted form of the completed ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedLedger {
    #[serde(rename = "processed_data", default)]
    pub records: Vec<LinkResult>,
    #[serde(rename = "lastNum", default)]
    pub last_sequence_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingRecord<T> {
    data: T,
    hash: String,
    #[serde(default)]
    ticket: u64,
}

/// Handle to one pending-ledger entry, returned by enqueue and consumed by dequeue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingId {
    /// MD5 hex digest of the request's canonical bytes
    pub digest: String,
    /// Distinguishes entries with identical content
    pub ticket: u64,
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.digest, self.ticket)
    }
}

/// Lowercase hex MD5 of `bytes`
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnEmpty {
    Default,
    Fail,
}

/// The completed ledger and both pending ledgers
#[derive(Debug)]
pub struct DurableStore {
    completed: Mutex<PathBuf>,
    pending_links: PendingLedger<LinkRequest>,
    pending_numbers: PendingLedger<NumberRequest>,
}

impl DurableStore {
    /// Open the ledgers described by `config`, creating directories and seeding
    /// absent files with empty documents.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let completed = config.completed_path();
        let links = config.pending_links_path();
        let numbers = config.pending_numbers_path();

        for path in [&completed, &links, &numbers] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Storage(format!(
                        "Failed to create ledger directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        if !exists(&completed).await {
            write_ledger(&completed, &CompletedLedger::default()).await?;
        }
        if !exists(&links).await {
            write_ledger(&links, &Vec::<PendingRecord<LinkRequest>>::new()).await?;
        }
        if !exists(&numbers).await {
            write_ledger(&numbers, &Vec::<PendingRecord<NumberRequest>>::new()).await?;
        }

        info!(
            completed = %completed.display(),
            pending_links = %links.display(),
            pending_numbers = %numbers.display(),
            "ledgers opened"
        );

        Ok(Self {
            completed: Mutex::new(completed),
            pending_links: PendingLedger::open(links, "links").await,
            pending_numbers: PendingLedger::open(numbers, "numbers").await,
        })
    }

    /// Every completed result, in ledger order.
    ///
    /// An absent ledger reads as empty; a present but undecodable one is a
    /// [`Error::Storage`].
    pub async fn read_completed(&self) -> Result<Vec<LinkResult>> {
        let path = self.completed.lock().await;
        let ledger: CompletedLedger = read_ledger(&path, OnEmpty::Fail).await?;
        Ok(ledger.records)
    }

    /// The whole completed ledger: records plus the persisted counter
    pub async fn read_completed_ledger(&self) -> Result<CompletedLedger> {
        let path = self.completed.lock().await;
        read_ledger(&path, OnEmpty::Fail).await
    }

    /// The persisted last-assigned sequence number, 0 for an absent ledger
    pub async fn last_sequence_number(&self) -> Result<u64> {
        Ok(self.read_completed_ledger().await?.last_sequence_number)
    }

    /// Append one result to the completed ledger.
    ///
    /// The counter becomes `max(counter, result.number)`: background appends can
    /// land out of order and the counter must never move backwards.
    pub async fn append_completed(&self, result: &LinkResult) -> Result<()> {
        let path = self.completed.lock().await;
        let mut ledger: CompletedLedger = read_ledger(&path, OnEmpty::Fail).await?;
        ledger.records.push(result.clone());
        ledger.last_sequence_number = ledger.last_sequence_number.max(result.number);
        write_ledger(&path, &ledger).await?;
        debug!(number = result.number, "completed result persisted");
        Ok(())
    }

    /// Record an accepted link submission
    pub async fn enqueue_links(&self, request: &LinkRequest) -> Result<PendingId> {
        let digest = content_digest(&request.canonical_bytes());
        self.pending_links.enqueue(request, digest).await
    }

    /// Record an accepted report request
    pub async fn enqueue_numbers(&self, request: &NumberRequest) -> Result<PendingId> {
        let digest = content_digest(&request.canonical_bytes());
        self.pending_numbers.enqueue(request, digest).await
    }

    /// Remove the link entry matching `id`; [`Error::NotFound`] if it is gone
    pub async fn dequeue_links(&self, id: &PendingId) -> Result<()> {
        self.pending_links.dequeue(id).await
    }

    /// Remove the number entry matching `id`; [`Error::NotFound`] if it is gone
    pub async fn dequeue_numbers(&self, id: &PendingId) -> Result<()> {
        self.pending_numbers.dequeue(id).await
    }

    /// Number of entries currently in the (links, numbers) pending ledgers
    pub async fn pending_counts(&self) -> Result<(usize, usize)> {
        let links = self.pending_links.len().await?;
        let numbers = self.pending_numbers.len().await?;
        Ok((links, numbers))
    }

    /// Read and clear both pending ledgers while holding both locks.
    ///
    /// Both documents are decoded before either is cleared, so a corrupt
    /// ledger fails the drain without losing the other ledger's entries.
    pub async fn drain_pending(&self) -> Result<(Vec<LinkRequest>, Vec<NumberRequest>)> {
        // Lock order: links, then numbers. No other path holds both.
        let links_path = self.pending_links.path.lock().await;
        let numbers_path = self.pending_numbers.path.lock().await;

        let links: Vec<PendingRecord<LinkRequest>> =
            read_ledger(&links_path, OnEmpty::Default).await?;
        let numbers: Vec<PendingRecord<NumberRequest>> =
            read_ledger(&numbers_path, OnEmpty::Default).await?;

        if !links.is_empty() {
            write_ledger(&links_path, &Vec::<PendingRecord<LinkRequest>>::new()).await?;
        }
        if !numbers.is_empty() {
            write_ledger(&numbers_path, &Vec::<PendingRecord<NumberRequest>>::new()).await?;
        }

        info!(
            links = links.len(),
            numbers = numbers.len(),
            "pending ledgers drained"
        );

        Ok((
            links.into_iter().map(|r| r.data).collect(),
            numbers.into_iter().map(|r| r.data).collect(),
        ))
    }
}

#[derive(Debug)]
struct PendingLedger<T> {
    path: Mutex<PathBuf>,
    // Only read or advanced while `path` is locked.
    next_ticket: AtomicU64,
    kind: &'static str,
    _payload: PhantomData<fn() -> T>,
}

impl<T> PendingLedger<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    async fn open(path: PathBuf, kind: &'static str) -> Self {
        let highest = match read_ledger::<Vec<PendingRecord<T>>>(&path, OnEmpty::Default).await {
            Ok(records) => highest_ticket(&records),
            Err(e) => {
                warn!(kind, "pending ledger unreadable at open, tickets start at 1: {e}");
                0
            },
        };
        Self {
            path: Mutex::new(path),
            next_ticket: AtomicU64::new(highest + 1),
            kind,
            _payload: PhantomData,
        }
    }

    async fn enqueue(&self, payload: &T, digest: String) -> Result<PendingId> {
        let path = self.path.lock().await;
        let mut records: Vec<PendingRecord<T>> = read_ledger(&path, OnEmpty::Default).await?;
        // The file may have been edited behind our back; never reuse a ticket it holds.
        let ticket = self
            .next_ticket
            .load(Ordering::Relaxed)
            .max(highest_ticket(&records) + 1);
        records.push(PendingRecord {
            data: payload.clone(),
            hash: digest.clone(),
            ticket,
        });
        write_ledger(&path, &records).await?;
        self.next_ticket.store(ticket + 1, Ordering::Relaxed);

        let id = PendingId { digest, ticket };
        debug!(kind = self.kind, %id, "pending entry recorded");
        Ok(id)
    }

    async fn dequeue(&self, id: &PendingId) -> Result<()> {
        let path = self.path.lock().await;
        let mut records: Vec<PendingRecord<T>> = read_ledger(&path, OnEmpty::Default).await?;
        let position = records
            .iter()
            .position(|r| r.hash == id.digest && r.ticket == id.ticket)
            .ok_or_else(|| {
                Error::NotFound(format!("pending {} entry {id} does not exist", self.kind))
            })?;
        records.remove(position);
        write_ledger(&path, &records).await?;

        debug!(kind = self.kind, %id, "pending entry cleared");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let path = self.path.lock().await;
        let records: Vec<PendingRecord<T>> = read_ledger(&path, OnEmpty::Default).await?;
        Ok(records.len())
    }
}

fn highest_ticket<T>(records: &[PendingRecord<T>]) -> u64 {
    records.iter().map(|r| r.ticket).max().unwrap_or(0)
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn read_ledger<T>(path: &Path, on_empty: OnEmpty) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(Error::Storage(format!(
                "Failed to read ledger {}: {e}",
                path.display()
            )));
        },
    };

    if on_empty == OnEmpty::Default && bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        Error::Storage(format!("Failed to decode ledger {}: {e}", path.display()))
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("ledger"), ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_ledger<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let mut json = serde_json::to_vec_pretty(value).map_err(|e| {
        Error::Storage(format!("Failed to serialize ledger {}: {e}", path.display()))
    })?;
    json.push(b'\n');

    let tmp_path = temp_path(path);
    let mut file = fs::File::create(&tmp_path)
        .await
        .map_err(|e| Error::Storage(format!("Failed to create {}: {e}", tmp_path.display())))?;
    file.write_all(&json)
        .await
        .map_err(|e| Error::Storage(format!("Failed to write {}: {e}", tmp_path.display())))?;
    file.sync_all()
        .await
        .map_err(|e| Error::Storage(format!("Failed to sync {}: {e}", tmp_path.display())))?;
    drop(file);

    #[cfg(target_os = "windows")]
    if exists(path).await {
        fs::remove_file(path).await.map_err(|e| {
            Error::Storage(format!("Failed to remove existing {}: {e}", path.display()))
        })?;
    }

    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("Failed to commit {}: {e}", path.display())))?;
    Ok(())
}
