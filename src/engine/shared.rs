//! State shared between the consumer, the watcher thread and the search thread.
//!
//! The open handle, the chunk index and the consumer's row cache form one unit
//! behind a single mutex. Everything the background loops only need to signal
//! lives in atomics so it can be read without that lock.

use super::events::{EngineEvent, EventSender};
use crate::config::{Column, EngineSettings, FileConf};
use crate::format::{FormatAdapter, RowData, RowFormat};
use crate::index::{Chunk, ChunkIndex, ChunkRowCache};
use crate::source::{read_span, FileIdentity, OpenedFile};
use crate::watch::WatchState;
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Sleep for `duration`, returning early once `flag` is cleared
pub(crate) fn sleep_while(flag: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while flag.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// Everything guarded by the main lock
#[derive(Debug, Default)]
pub(crate) struct SharedIndex {
    pub file: Option<File>,
    pub identity: Option<FileIdentity>,
    pub index: ChunkIndex,
    pub cache: ChunkRowCache,
}

impl SharedIndex {
    /// Decode the chunk holding `row` into `cache` through the shared handle.
    ///
    /// Returns the chunk and whether it is the provisional trailing row.
    pub fn load_row_chunk(
        &mut self,
        format: &FormatAdapter,
        row: u64,
        cache: &mut ChunkRowCache,
    ) -> Option<(Chunk, bool)> {
        let chunk = self.index.lookup_row_chunk(row)?;
        let provisional = self.index.is_provisional(&chunk);
        let file = self.file.as_mut()?;

        if let Err(e) = cache.load(format, file, chunk) {
            log::error!(
                "Failed to load rows {}..={}: {}",
                chunk.first_row(),
                chunk.last_row(),
                e
            );
            return None;
        }
        Some((chunk, provisional))
    }
}

pub(crate) struct EngineCore {
    pub path: PathBuf,
    pub settings: EngineSettings,
    /// Configuration as supplied, used to start over on `reconfigure`
    pub base_conf: FileConf,
    /// Working copy with derived columns
    pub conf: RwLock<FileConf>,
    pub format: RwLock<Arc<FormatAdapter>>,
    pub shared: Mutex<SharedIndex>,
    pub row_count: AtomicU64,
    /// Bumped whenever the index is reset, so a running search starts over
    pub generation: AtomicU64,
    pub watching: AtomicBool,
    pub searching: AtomicBool,
    /// Passes of the running search that reached the indexed row count
    pub search_passes: AtomicU64,
    pub following: AtomicBool,
    pub configured: AtomicBool,
    pub state: AtomicU8,
    pub current_search: Arc<AtomicU64>,
    pub events: EventSender,
}

impl EngineCore {
    pub fn new(
        conf: FileConf,
        settings: EngineSettings,
        current_search: Arc<AtomicU64>,
        events: EventSender,
    ) -> Self {
        let format = FormatAdapter::for_conf(&conf, &settings);
        Self {
            path: conf.file_path.clone(),
            settings,
            conf: RwLock::new(conf.clone()),
            base_conf: conf,
            format: RwLock::new(Arc::new(format)),
            shared: Mutex::new(SharedIndex::default()),
            row_count: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            watching: AtomicBool::new(false),
            searching: AtomicBool::new(false),
            search_passes: AtomicU64::new(0),
            following: AtomicBool::new(true),
            configured: AtomicBool::new(false),
            state: AtomicU8::new(WatchState::Closed as u8),
            current_search,
            events,
        }
    }

    /// Snapshot of the active format adapter. Never held across the main lock.
    pub fn format(&self) -> Arc<FormatAdapter> {
        Arc::clone(&self.format.read())
    }

    pub fn row_count(&self) -> u64 {
        self.row_count.load(Ordering::Acquire)
    }

    /// Rows that can no longer change, i.e. excluding a provisional trailing row
    pub fn complete_row_count(&self) -> u64 {
        self.shared.lock().index.complete_row_count()
    }

    /// Bytes of the file examined so far
    pub fn indexed_bytes(&self) -> u64 {
        self.shared.lock().index.scanned_to()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn columns(&self) -> Vec<Column> {
        self.conf.read().columns.clone()
    }

    pub fn column_count(&self) -> usize {
        self.conf.read().columns.len()
    }

    pub fn state(&self) -> WatchState {
        WatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: WatchState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Decode row `row`. The main lock is held only while the raw text is fetched;
    /// splitting it into fields happens outside.
    pub fn get_row(&self, row: u64) -> Option<RowData> {
        if row >= self.row_count() {
            return None;
        }

        let format = self.format();
        let raw = {
            let mut guard = self.shared.lock();
            let shared = &mut *guard;
            let mut cache = std::mem::take(&mut shared.cache);
            let loaded = shared.load_row_chunk(&format, row, &mut cache);
            let raw = cache.get(row).map(str::to_string);
            shared.cache = cache;

            loaded?;
            match raw {
                Some(raw) => raw,
                None => {
                    log::error!("Row {} missing from its decoded chunk", row);
                    return None;
                }
            }
        };

        match format.parse_row(&raw) {
            Ok(fields) => Some(fields),
            Err(e) => {
                log::error!("Row {} failed to decode: {}", row, e);
                None
            }
        }
    }

    /// Establish columns once. Reads a prefix of the file on a private handle, so
    /// the main lock is not involved.
    pub fn try_configure(&self) -> bool {
        if self.configured.load(Ordering::Acquire) {
            return true;
        }

        let initial = match File::open(&self.path) {
            Ok(mut file) => read_span(&mut file, 0, self.settings.configure_probe_bytes as u64)
                .unwrap_or_else(|e| {
                    log::warn!("Cannot read {} for configuration: {}", self.path.display(), e);
                    Vec::new()
                }),
            Err(_) => Vec::new(),
        };

        let mut conf = self.conf.read().clone();
        let mut format = FormatAdapter::for_conf(&conf, &self.settings);
        if !format.configure(&mut conf, &initial) {
            log::debug!("Columns for {} not established yet", self.path.display());
            return false;
        }

        log::debug!(
            "Configured {} as {} with {} columns",
            self.path.display(),
            format.format().name(),
            conf.columns.len()
        );
        *self.conf.write() = conf;
        *self.format.write() = Arc::new(format);
        self.configured.store(true, Ordering::Release);
        self.events.send(EngineEvent::Configured);
        true
    }

    /// Forget derived columns and go back to the supplied configuration
    pub fn reset_configuration(&self) {
        *self.conf.write() = self.base_conf.clone();
        *self.format.write() = Arc::new(FormatAdapter::for_conf(&self.base_conf, &self.settings));
        self.configured.store(false, Ordering::Release);
    }

    /// Drop every indexed row and install `opened` as the new handle
    pub fn reset_index(&self, opened: Option<OpenedFile>) {
        {
            let mut shared = self.shared.lock();
            shared.index.clear();
            shared.cache.clear();
            match opened {
                Some(opened) => {
                    shared.file = Some(opened.file);
                    shared.identity = opened.identity;
                }
                None => {
                    shared.file = None;
                    shared.identity = None;
                }
            }
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.publish_row_count(0);
    }

    /// Store a new row count and notify if it changed
    pub fn publish_row_count(&self, rows: u64) {
        if self.row_count.swap(rows, Ordering::AcqRel) != rows {
            self.events.send(EngineEvent::RowCountChanged(rows));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileFormat;
    use crate::engine::events::{channel, EngineEvents};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn core_for(file: &NamedTempFile, format: FileFormat) -> (EngineCore, EngineEvents) {
        let current = Arc::new(AtomicU64::new(0));
        let (tx, rx) = channel(Arc::clone(&current));
        let conf = FileConf::new(file.path(), format);
        (
            EngineCore::new(conf, EngineSettings::default(), current, tx),
            rx,
        )
    }

    #[test]
    fn test_sleep_while_returns_when_flag_cleared() {
        let flag = AtomicBool::new(false);
        let started = Instant::now();
        sleep_while(&flag, Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_configure_once_and_notify() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"level":"info","n":1}}"#).unwrap();
        file.flush().unwrap();

        let (core, mut events) = core_for(&file, FileFormat::Json);
        assert!(core.try_configure());
        assert!(core.try_configure());
        assert_eq!(core.column_count(), 2);
        assert_eq!(events.try_recv(), Some(EngineEvent::Configured));
        assert_eq!(events.try_recv(), None);

        core.reset_configuration();
        assert!(!core.configured.load(Ordering::Acquire));
        assert_eq!(core.column_count(), 0);
    }

    #[test]
    fn test_reset_index_notifies_and_bumps_generation() {
        let file = NamedTempFile::new().unwrap();
        let (core, mut events) = core_for(&file, FileFormat::Text);

        core.publish_row_count(3);
        core.publish_row_count(3);
        core.reset_index(None);

        assert_eq!(events.try_recv(), Some(EngineEvent::RowCountChanged(3)));
        assert_eq!(events.try_recv(), Some(EngineEvent::RowCountChanged(0)));
        assert_eq!(events.try_recv(), None);
        assert_eq!(core.generation(), 1);
        assert_eq!(core.get_row(0), None);
    }
}
