//! The per-file engine: lifecycle, random row access, following and search.
//!
//! A `LogEngine` owns one watcher thread and at most one search thread. Both run
//! blocking poll loops over the state in [`shared`], and report back only through
//! the [`EngineEvents`] receiver returned by [`LogEngine::open`]. `stop` and
//! `stop_search` clear a flag and join the thread, so once they return nothing
//! touches the index any more.

pub mod events;
pub(crate) mod shared;

pub use events::{EngineEvent, EngineEvents, SearchId};

use crate::config::{Column, EngineSettings, FileConf};
use crate::error::{Result, TailscanError};
use crate::format::RowData;
use crate::matcher::{Combinator, RowMatcher, SearchParam};
use crate::projection::RowSource;
use crate::source::OpenedFile;
use crate::watch::WatchState;
use shared::EngineCore;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct LogEngine {
    core: Arc<EngineCore>,
    watch_thread: Option<JoinHandle<()>>,
    search_thread: Option<JoinHandle<()>>,
    last_search: SearchId,
}

impl LogEngine {
    /// Create an engine for `conf.file_path`. Nothing is read until `start`.
    pub fn open(conf: FileConf, settings: EngineSettings) -> (Self, EngineEvents) {
        let current_search = Arc::new(AtomicU64::new(0));
        let (tx, rx) = events::channel(Arc::clone(&current_search));
        let core = EngineCore::new(conf, settings, current_search, tx);

        let engine = Self {
            core: Arc::new(core),
            watch_thread: None,
            search_thread: None,
            last_search: 0,
        };
        (engine, rx)
    }

    pub fn path(&self) -> &Path {
        &self.core.path
    }

    /// Configure columns if possible and start watching the file.
    ///
    /// A missing file is not an error: the watcher keeps trying to open it.
    pub fn start(&mut self) -> Result<()> {
        self.stop();
        self.core.try_configure();

        match OpenedFile::open(&self.core.path) {
            Ok(opened) => self.core.reset_index(Some(opened)),
            Err(e) => {
                log::warn!("Cannot open {} yet: {}", self.core.path.display(), e);
                self.core.reset_index(None);
            }
        }

        self.core.watching.store(true, Ordering::Release);
        let core = Arc::clone(&self.core);
        let handle = std::thread::Builder::new()
            .name("tailscan-watch".to_string())
            .spawn(move || crate::watch::keep_watching(&core))
            .map_err(|e| {
                self.core.watching.store(false, Ordering::Release);
                TailscanError::file_error("Failed to spawn watcher thread", e)
            })?;
        self.watch_thread = Some(handle);
        Ok(())
    }

    /// Stop the search and the watcher, waiting for both threads to exit
    pub fn stop(&mut self) {
        self.core.watching.store(false, Ordering::Release);
        if let Some(handle) = self.watch_thread.take() {
            if handle.join().is_err() {
                log::error!("Watcher thread panicked");
            }
        }
        self.stop_search();
    }

    /// Re-derive columns from scratch and re-index the whole file
    pub fn reconfigure(&mut self) -> Result<()> {
        self.stop();
        self.core.reset_configuration();
        self.start()
    }

    pub fn is_watching(&self) -> bool {
        self.core.watching.load(Ordering::Acquire)
    }

    pub fn is_configured(&self) -> bool {
        self.core.configured.load(Ordering::Acquire)
    }

    pub fn watch_state(&self) -> WatchState {
        self.core.state()
    }

    /// Fields of `row`, or `None` when the row is not indexed (yet)
    pub fn get_row(&self, row: u64) -> Option<(u64, RowData)> {
        self.core.get_row(row).map(|fields| (row, fields))
    }

    pub fn row_count(&self) -> u64 {
        self.core.row_count()
    }

    /// Row count without the provisional trailing row, if there is one
    pub fn complete_row_count(&self) -> u64 {
        self.core.complete_row_count()
    }

    /// Bytes of the file the index has examined. Equals the file size once
    /// everything present has been indexed.
    pub fn indexed_bytes(&self) -> u64 {
        self.core.indexed_bytes()
    }

    pub fn column_count(&self) -> usize {
        self.core.column_count()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.core.columns()
    }

    /// Working configuration, including derived columns
    pub fn conf(&self) -> FileConf {
        self.core.conf.read().clone()
    }

    /// Start a background search, replacing any running one.
    ///
    /// Matchers are compiled here, so a bad pattern is reported before any thread
    /// starts. Results arrive as `EngineEvent::RowsFound` carrying the returned id.
    pub fn start_search(
        &mut self,
        params: &[SearchParam],
        combinator: Combinator,
    ) -> Result<SearchId> {
        let matcher = RowMatcher::new(params, combinator, &self.core.columns())?;
        self.stop_search();

        self.last_search += 1;
        let search = self.last_search;
        self.core.current_search.store(search, Ordering::Release);
        self.core.search_passes.store(0, Ordering::Release);
        self.core.searching.store(true, Ordering::Release);

        let core = Arc::clone(&self.core);
        let handle = std::thread::Builder::new()
            .name(format!("tailscan-search-{}", search))
            .spawn(move || crate::search::run_search(&core, matcher, search))
            .map_err(|e| {
                self.core.searching.store(false, Ordering::Release);
                TailscanError::search(format!("Failed to spawn search thread: {}", e))
            })?;
        self.search_thread = Some(handle);
        Ok(search)
    }

    /// Cancel the running search and wait for its thread. Undelivered results of
    /// that search are discarded.
    pub fn stop_search(&mut self) {
        self.core.searching.store(false, Ordering::Release);
        if let Some(handle) = self.search_thread.take() {
            if handle.join().is_err() {
                log::error!("Search thread panicked");
            }
        }
        self.core.current_search.store(0, Ordering::Release);
    }

    pub fn is_searching(&self) -> bool {
        self.core.searching.load(Ordering::Acquire)
    }

    /// How many times the running search has caught up with the indexed rows.
    ///
    /// Every match found by a pass is sent before the pass is counted, so once this
    /// moves past a value read after indexing caught up, all results for the rows
    /// indexed at that point are in the event channel.
    pub fn completed_search_passes(&self) -> u64 {
        self.core.search_passes.load(Ordering::Acquire)
    }

    /// When off, growth is noticed but not indexed until following resumes
    pub fn set_following(&self, following: bool) {
        self.core.following.store(following, Ordering::Release);
    }

    pub fn is_following(&self) -> bool {
        self.core.following.load(Ordering::Acquire)
    }

    /// A cloneable read-only handle for projections and other views
    pub fn reader(&self) -> EngineReader {
        EngineReader {
            core: Arc::clone(&self.core),
        }
    }
}

impl Drop for LogEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shared read access to an engine's rows
#[derive(Clone)]
pub struct EngineReader {
    core: Arc<EngineCore>,
}

impl RowSource for EngineReader {
    fn get_row(&self, row: u64) -> Option<(u64, RowData)> {
        self.core.get_row(row).map(|fields| (row, fields))
    }

    fn row_count(&self) -> u64 {
        self.core.row_count()
    }

    fn column_count(&self) -> usize {
        self.core.column_count()
    }

    fn columns(&self) -> Vec<Column> {
        self.core.columns()
    }

    fn source_row(&self, row: u64) -> Option<u64> {
        (row < self.core.row_count()).then_some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileFormat;
    use crate::matcher::MatchKind;
    use std::time::Duration;

    fn fast_settings() -> EngineSettings {
        EngineSettings::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_search_resume_interval(Duration::from_millis(10))
            .with_search_flush_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_unstarted_engine_is_idle() {
        let conf = FileConf::new("/definitely/not/here.log", FileFormat::Text);
        let (engine, mut events) = LogEngine::open(conf, fast_settings());

        assert!(!engine.is_watching());
        assert!(!engine.is_searching());
        assert!(engine.is_following());
        assert_eq!(engine.watch_state(), WatchState::Closed);
        assert_eq!(engine.row_count(), 0);
        assert_eq!(engine.get_row(0), None);
        assert_eq!(events.try_recv(), None);
    }

    #[test]
    fn test_bad_search_is_rejected_before_spawning() {
        let conf = FileConf::new("/definitely/not/here.log", FileFormat::Text);
        let (mut engine, _events) = LogEngine::open(conf, fast_settings());

        let bad = SearchParam {
            kind: MatchKind::Range,
            pattern: "1 -> 2".to_string(),
            ..SearchParam::default()
        };
        assert!(engine.start_search(&[bad], Combinator::And).is_err());
        assert!(!engine.is_searching());
    }

    #[test]
    fn test_missing_file_keeps_watcher_opening() {
        let dir = tempfile::TempDir::new().unwrap();
        let conf = FileConf::new(dir.path().join("later.log"), FileFormat::Text);
        let (mut engine, _events) = LogEngine::open(conf, fast_settings());

        engine.start().unwrap();
        assert!(engine.is_watching());
        assert!(engine.is_configured());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.watch_state(), WatchState::Opening);

        engine.stop();
        assert!(!engine.is_watching());
        assert_eq!(engine.watch_state(), WatchState::Closed);
    }
}
