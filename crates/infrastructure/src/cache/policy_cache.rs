//! In-memory policy cache with an optional gzip-compressed snapshot on disk.
//!
//! A single reader-writer lock over the map is plenty at the scale of a
//! per-host mail daemon (thousands of entries). No lock is ever held across
//! an await point; snapshots copy under the read lock and are processed
//! outside it.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, SystemTime};
use tlspol_application::ports::PolicyStore;
use tlspol_domain::{normalize_domain, PolicyEntry, TlspolError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default period between background snapshot saves.
pub const SAVE_PERIOD: Duration = Duration::from_secs(600);

pub struct PolicyCache {
    entries: RwLock<HashMap<String, PolicyEntry>>,
    dirty: AtomicBool,
    file_path: Option<PathBuf>,
    save_period: Duration,
    shutdown: CancellationToken,
    saver: Mutex<Option<JoinHandle<()>>>,
}

impl PolicyCache {
    /// Memory-only cache; nothing is persisted.
    pub fn in_memory() -> std::sync::Arc<Self> {
        Self::new(None, SAVE_PERIOD)
    }

    /// Cache persisted to `file_path`. Loads the previous snapshot (if any)
    /// and starts the periodic saver.
    pub fn persistent(file_path: PathBuf) -> std::sync::Arc<Self> {
        Self::new(Some(file_path), SAVE_PERIOD)
    }

    pub fn new(file_path: Option<PathBuf>, save_period: Duration) -> std::sync::Arc<Self> {
        let cache = std::sync::Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            file_path,
            save_period,
            shutdown: CancellationToken::new(),
            saver: Mutex::new(None),
        });

        if cache.file_path.is_some() {
            if let Err(err) = cache.load() {
                error!(error = %err, "Error loading persisted cache");
            }
            let saver_cache = std::sync::Arc::clone(&cache);
            let handle = tokio::spawn(async move { saver_cache.periodic_save().await });
            *cache.saver.lock().unwrap() = Some(handle);
        }

        cache
    }

    async fn periodic_save(&self) {
        let mut interval = tokio::time::interval(self.save_period);
        interval.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(err) = self.save_now() {
                        error!(error = %err, "Error saving cache");
                    }
                }
            }
        }
    }

    fn load(&self) -> Result<(), TlspolError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(TlspolError::Io(err.to_string())),
        };
        let decoder = GzDecoder::new(file);
        let stored: HashMap<String, PolicyEntry> =
            bincode::deserialize_from(decoder).map_err(|e| TlspolError::Io(e.to_string()))?;
        let count = stored.len();
        *self.entries.write().unwrap() = stored;
        self.dirty.store(false, Ordering::Release);
        info!(entries = count, "Loaded persisted cache");
        Ok(())
    }

    /// Serialise under the read lock, then write a temp file and rename it
    /// into place so readers of the snapshot never see a torn write.
    fn save_now(&self) -> Result<(), TlspolError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = (|| {
            let serialized = {
                let entries = self.entries.read().unwrap();
                bincode::serialize(&*entries).map_err(|e| TlspolError::Io(e.to_string()))?
            };
            let tmp_path = path.with_extension("tmp");
            let file =
                std::fs::File::create(&tmp_path).map_err(|e| TlspolError::Io(e.to_string()))?;
            let mut encoder = GzEncoder::new(file, Compression::fast());
            encoder
                .write_all(&serialized)
                .map_err(|e| TlspolError::Io(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| TlspolError::Io(e.to_string()))?;
            std::fs::rename(&tmp_path, path).map_err(|e| TlspolError::Io(e.to_string()))?;
            Ok(())
        })();
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        } else {
            debug!(path = %path.display(), "Cache snapshot saved");
        }
        result
    }
}

#[async_trait]
impl PolicyStore for PolicyCache {
    async fn get(&self, domain: &str) -> Option<PolicyEntry> {
        self.entries.read().unwrap().get(domain).cloned()
    }

    async fn set(&self, entry: PolicyEntry) {
        self.entries
            .write()
            .unwrap()
            .insert(entry.domain.clone(), entry);
        self.dirty.store(true, Ordering::Release);
    }

    async fn remove(&self, domain: &str) {
        if self.entries.write().unwrap().remove(domain).is_some() {
            self.dirty.store(true, Ordering::Release);
        }
    }

    async fn purge(&self) {
        self.entries.write().unwrap().clear();
        self.dirty.store(true, Ordering::Release);
    }

    async fn items(&self) -> Vec<PolicyEntry> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    async fn save(&self) -> Result<(), TlspolError> {
        self.save_now()
    }

    async fn tidy(&self) {
        let now = SystemTime::now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, entry| {
            if *key != normalize_domain(key) {
                return false;
            }
            // An old version doubled the report fragment into the policy
            // string; such entries are poison for Postfix.
            if entry.policy.contains("policy_type") {
                return false;
            }
            !(entry.is_aged_out(now) && entry.is_expired(now))
        });
        let removed = before - entries.len();
        if removed > 0 {
            self.dirty.store(true, Ordering::Release);
            info!(removed, remaining = entries.len(), "Tidied cache");
        }
    }

    async fn close(&self) {
        self.shutdown.cancel();
        let handle = self.saver.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Err(err) = self.save_now() {
            error!(error = %err, "Error during final cache save");
        }
    }
}
