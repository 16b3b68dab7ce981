//! File-backed append-only state log.
//!
//! Each flush appends one JSON line `{seq, checksum, entries}` and fsyncs it.
//! On open the log is replayed into an in-memory index. A torn or corrupted
//! trailing batch is discarded; corruption anywhere else is an error.

use crate::core::fingerprint::{canonical_json, sha3_256};
use crate::core::{Error, Result};
use crate::state::store::{StateEntry, StateStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default number of superseded entries tolerated before compaction.
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 256;

/// One committed batch.
#[derive(Debug, Serialize, Deserialize)]
struct LogBatch {
    seq: u64,
    checksum: String,
    entries: Vec<Value>,
}

impl LogBatch {
    fn new(seq: u64, entries: Vec<Value>) -> Self {
        let checksum = batch_checksum(&entries);
        Self {
            seq,
            checksum,
            entries,
        }
    }

    fn verify(&self) -> bool {
        batch_checksum(&self.entries) == self.checksum
    }
}

fn batch_checksum(entries: &[Value]) -> String {
    let canonical = canonical_json(&Value::Array(entries.to_vec()));
    hex::encode(sha3_256(canonical.as_bytes()))
}

/// One keyed entry inside a batch.
#[derive(Debug, Serialize, Deserialize)]
struct LogRecord {
    key: String,
    entry: StateEntry,
}

/// Replay outcome.
#[derive(Debug, Default)]
struct Replayed {
    index: BTreeMap<String, StateEntry>,
    next_seq: u64,
    superseded: usize,
    committed_len: u64,
    needs_rewrite: bool,
}

/// Append-only log with an in-memory index.
#[derive(Debug)]
pub struct LogStore {
    path: PathBuf,
    index: BTreeMap<String, StateEntry>,
    pending: BTreeMap<String, StateEntry>,
    next_seq: u64,
    superseded: usize,
    compaction_threshold: usize,
    /// Byte length of the log up to the end of the last committed batch
    committed_len: u64,
}

impl LogStore {
    /// Open (or create) the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_threshold(path, DEFAULT_COMPACTION_THRESHOLD)
    }

    /// Open with an explicit compaction threshold.
    pub fn open_with_threshold(path: impl AsRef<Path>, compaction_threshold: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let replayed = Self::replay(&path)?;
        let mut store = Self {
            path,
            index: replayed.index,
            pending: BTreeMap::new(),
            next_seq: replayed.next_seq,
            superseded: replayed.superseded,
            compaction_threshold,
            committed_len: replayed.committed_len,
        };

        info!(
            path = %store.path.display(),
            keys = store.index.len(),
            next_seq = store.next_seq,
            "opened state log"
        );

        // Rewrite so later appends never follow a partial line.
        if replayed.needs_rewrite {
            store.compact()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Committed entries overwritten since the last compaction.
    pub fn superseded(&self) -> usize {
        self.superseded
    }

    fn replay(path: &Path) -> Result<Replayed> {
        let mut replayed = Replayed::default();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(replayed),
            Err(e) => return Err(e.into()),
        };

        // (line number, bytes, end offset, newline-terminated)
        let mut lines = Vec::new();
        let mut start = 0;
        for (line_no, chunk) in bytes.split(|b| *b == b'\n').enumerate() {
            let end = start + chunk.len();
            if !chunk.iter().all(u8::is_ascii_whitespace) {
                lines.push((line_no, chunk, end, end < bytes.len()));
            }
            start = end + 1;
        }
        let last = lines.len().saturating_sub(1);

        for (pos, (line_no, chunk, end, terminated)) in lines.into_iter().enumerate() {
            // from_slice also rejects a line cut inside a multi-byte character
            let batch = serde_json::from_slice::<LogBatch>(chunk)
                .ok()
                .filter(LogBatch::verify);
            let batch = match batch {
                Some(b) => b,
                None if pos == last => {
                    warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        "discarding torn trailing batch"
                    );
                    replayed.needs_rewrite = true;
                    break;
                }
                None => {
                    return Err(Error::StateCorrupted(format!(
                        "{}: batch on line {} is unreadable",
                        path.display(),
                        line_no + 1
                    )));
                }
            };

            for raw in batch.entries {
                match serde_json::from_value::<LogRecord>(raw) {
                    Ok(record) => {
                        if replayed.index.insert(record.key, record.entry).is_some() {
                            replayed.superseded += 1;
                        }
                    }
                    Err(e) => debug!(seq = batch.seq, error = %e, "ignoring unrecognised entry"),
                }
            }
            replayed.next_seq = replayed.next_seq.max(batch.seq + 1);
            if terminated {
                replayed.committed_len = (end + 1) as u64;
            } else {
                replayed.committed_len = end as u64;
                replayed.needs_rewrite = true;
            }
        }

        Ok(replayed)
    }

    /// Append one encoded batch after the last committed byte.
    ///
    /// On any write or sync error the file is cut back to its committed
    /// length, so a failed flush never leaves a partial line behind.
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.path)?;
        file.set_len(self.committed_len)?;
        file.seek(SeekFrom::Start(self.committed_len))?;

        if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            if let Err(undo) = file.set_len(self.committed_len) {
                warn!(
                    path = %self.path.display(),
                    error = %undo,
                    "could not cut back failed append"
                );
            }
            return Err(e.into());
        }

        self.committed_len += bytes.len() as u64;
        Ok(())
    }

    fn encode_batch<'a, I>(&self, records: I) -> Result<String>
    where
        I: IntoIterator<Item = (&'a String, &'a StateEntry)>,
    {
        let entries = records
            .into_iter()
            .map(|(key, entry)| {
                serde_json::to_value(LogRecord {
                    key: key.clone(),
                    entry: entry.clone(),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut line = serde_json::to_string(&LogBatch::new(self.next_seq, entries))?;
        line.push('\n');
        Ok(line)
    }

    /// Rewrite the log with only live entries, via a temporary file.
    pub fn compact(&mut self) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        let line = if self.index.is_empty() {
            String::new()
        } else {
            self.encode_batch(self.index.iter())?
        };

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(line.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        if !line.is_empty() {
            self.next_seq += 1;
        }
        self.committed_len = line.len() as u64;
        info!(
            path = %self.path.display(),
            keys = self.index.len(),
            dropped = self.superseded,
            "compacted state log"
        );
        self.superseded = 0;
        sync_parent(&self.path)
    }
}

/// Make a rename in the log's directory durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}

impl StateStore for LogStore {
    fn get(&self, key: &str) -> Option<&StateEntry> {
        self.pending.get(key).or_else(|| self.index.get(key))
    }

    fn put(&mut self, key: String, entry: StateEntry) {
        self.pending.insert(key, entry);
    }

    fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let line = self.encode_batch(self.pending.iter())?;
        self.append(line.as_bytes())?;

        let committed = self.pending.len();
        for (key, entry) in std::mem::take(&mut self.pending) {
            if self.index.insert(key, entry).is_some() {
                self.superseded += 1;
            }
        }
        debug!(seq = self.next_seq, entries = committed, "flushed state batch");
        self.next_seq += 1;

        // the batch is durable; a failed compaction only delays the rewrite
        if self.superseded > self.compaction_threshold {
            if let Err(e) = self.compact() {
                warn!(path = %self.path.display(), error = %e, "state log compaction failed");
            }
        }
        Ok(committed)
    }

    fn rollback(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            debug!(dropped, "rolled back staged entries");
        }
        dropped
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaSet;
    use serde_json::json;

    fn temp_log() -> PathBuf {
        std::env::temp_dir()
            .join(format!("consensus-guard-log-{}", uuid::Uuid::new_v4()))
            .join("state.jsonl")
    }

    #[test]
    fn test_flush_and_reopen() {
        let path = temp_log();
        {
            let mut store = LogStore::open(&path).unwrap();
            store.put("a".into(), StateEntry::Replay(json!({"x": 1})));
            store.put_persona_set(&PersonaSet::default_panel("ps-1", "b"));
            assert_eq!(store.pending(), 3);
            assert_eq!(store.flush().unwrap(), 3);
        }

        let store = LogStore::open(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.replay("a"), Some(&json!({"x": 1})));
        assert_eq!(store.latest_persona_set("b").unwrap().persona_set_id, "ps-1");
    }

    #[test]
    fn test_rollback_discards_staged() {
        let path = temp_log();
        let mut store = LogStore::open(&path).unwrap();
        store.put("a".into(), StateEntry::Pointer("x".into()));
        assert!(store.get("a").is_some());
        assert_eq!(store.rollback(), 1);
        assert!(store.get("a").is_none());
        assert_eq!(store.flush().unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_torn_tail_discarded() {
        let path = temp_log();
        {
            let mut store = LogStore::open(&path).unwrap();
            store.put("keep".into(), StateEntry::Pointer("1".into()));
            store.flush().unwrap();
            store.put("lost".into(), StateEntry::Pointer("2".into()));
            store.flush().unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        let truncated = &content[..content.len() - 10];
        fs::write(&path, truncated).unwrap();

        let mut store = LogStore::open(&path).unwrap();
        assert!(store.get("keep").is_some());
        assert!(store.get("lost").is_none());

        store.put("after".into(), StateEntry::Pointer("3".into()));
        store.flush().unwrap();
        let reopened = LogStore::open(&path).unwrap();
        assert!(reopened.get("after").is_some());
        assert!(reopened.get("keep").is_some());
    }

    #[test]
    fn test_tail_cut_inside_multibyte_char() {
        let path = temp_log();
        {
            let mut store = LogStore::open(&path).unwrap();
            store.put("keep".into(), StateEntry::Pointer("1".into()));
            store.flush().unwrap();
            store.put("lost".into(), StateEntry::Pointer("café-ééééé".into()));
            store.flush().unwrap();
        }

        let bytes = fs::read(&path).unwrap();
        let lead = bytes.iter().rposition(|b| *b == 0xC3).unwrap();
        fs::write(&path, &bytes[..=lead]).unwrap();

        let mut store = LogStore::open(&path).unwrap();
        assert!(store.get("keep").is_some());
        assert!(store.get("lost").is_none());

        store.put("after".into(), StateEntry::Pointer("3".into()));
        store.flush().unwrap();
        let reopened = LogStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get("after").is_some());
    }

    #[test]
    fn test_partial_append_is_overwritten() {
        let path = temp_log();
        let mut store = LogStore::open(&path).unwrap();
        store.put("a".into(), StateEntry::Pointer("1".into()));
        store.flush().unwrap();

        // leftover of an interrupted append
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\":3,\"checksum\":\"ab").unwrap();
        drop(file);

        store.put("b".into(), StateEntry::Pointer("2".into()));
        store.flush().unwrap();

        let reopened = LogStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("b"), Some(&StateEntry::Pointer("2".into())));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_unterminated_last_batch_is_kept() {
        let path = temp_log();
        {
            let mut store = LogStore::open(&path).unwrap();
            store.put("a".into(), StateEntry::Pointer("1".into()));
            store.flush().unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.trim_end()).unwrap();

        let mut store = LogStore::open(&path).unwrap();
        assert!(store.get("a").is_some());
        store.put("b".into(), StateEntry::Pointer("2".into()));
        store.flush().unwrap();

        let reopened = LogStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_bad_checksum_in_middle_is_corruption() {
        let path = temp_log();
        {
            let mut store = LogStore::open(&path).unwrap();
            store.put("a".into(), StateEntry::Pointer("1".into()));
            store.flush().unwrap();
            store.put("b".into(), StateEntry::Pointer("2".into()));
            store.flush().unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        let tampered = content.replacen("\"1\"", "\"9\"", 1);
        fs::write(&path, tampered).unwrap();

        let err = LogStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::StateCorrupted(_)));
    }

    #[test]
    fn test_unknown_kinds_and_fields_ignored() {
        let path = temp_log();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let entries = vec![
            json!({"key": "future", "entry": {"kind": "hologram", "value": 42}}),
            json!({"key": "p", "entry": {"kind": "pointer", "value": "ps-1"}, "ttl": 30}),
        ];
        let line = serde_json::to_string(&LogBatch::new(0, entries)).unwrap();
        fs::write(&path, format!("{}\n", line)).unwrap();

        let store = LogStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("p"), Some(&StateEntry::Pointer("ps-1".into())));
    }

    #[test]
    fn test_compaction_keeps_live_keys() {
        let path = temp_log();
        let mut store = LogStore::open_with_threshold(&path, 3).unwrap();
        for i in 0..6 {
            store.put("hot".into(), StateEntry::Pointer(i.to_string()));
            store.put(format!("cold-{}", i), StateEntry::Pointer("c".into()));
            store.flush().unwrap();
        }
        assert!(store.superseded() <= 3);

        let lines = fs::read_to_string(&path).unwrap().lines().count();
        assert!(lines < 6);

        let reopened = LogStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 7);
        assert_eq!(reopened.get("hot"), Some(&StateEntry::Pointer("5".into())));
    }
}
