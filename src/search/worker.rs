use crate::engine::shared::{sleep_while, EngineCore};
use crate::engine::{EngineEvent, SearchId};
use crate::format::RowFormat;
use crate::index::ChunkRowCache;
use crate::matcher::RowMatcher;
use std::sync::atomic::Ordering;
use std::time::Instant;

/// Run one search until it is cancelled.
///
/// Rows are tested in ascending order. Matches are held in a batch that is sent
/// when the flush interval has passed and once more whenever the scan catches up
/// with the indexed rows. After catching up the thread sleeps and continues with
/// whatever rows were indexed meanwhile. If the index is reset (the file was
/// recreated) the scan starts over at row 0.
pub(crate) fn run_search(core: &EngineCore, matcher: RowMatcher, search: SearchId) {
    log::debug!("Search {} started on {}", search, core.path.display());

    let mut state = SearchState::new(core, matcher, search);
    while core.searching.load(Ordering::Acquire) {
        state.run_pass();
        sleep_while(&core.searching, core.settings.search_resume_interval);
    }

    log::debug!("Search {} stopped at row {}", search, state.row);
}

struct SearchState<'a> {
    core: &'a EngineCore,
    matcher: RowMatcher,
    search: SearchId,
    /// Next row to test
    row: u64,
    generation: u64,
    /// Private cache so the scan does not evict the consumer's chunk
    cache: ChunkRowCache,
    batch: Vec<u64>,
}

impl<'a> SearchState<'a> {
    fn new(core: &'a EngineCore, matcher: RowMatcher, search: SearchId) -> Self {
        Self {
            core,
            matcher,
            search,
            row: 0,
            generation: core.generation(),
            cache: ChunkRowCache::new(),
            batch: Vec::new(),
        }
    }

    fn searching(&self) -> bool {
        self.core.searching.load(Ordering::Acquire)
    }

    /// Start over at row 0 if the index was reset since this scan began.
    ///
    /// Rows matched before the reset belong to the old file and are dropped.
    fn restart_if_reset(&mut self, generation: u64) -> bool {
        if generation == self.generation {
            return false;
        }
        log::debug!("Search {} restarting after the index was reset", self.search);
        self.generation = generation;
        self.row = 0;
        self.cache.clear();
        self.batch.clear();
        true
    }

    /// Send the batch, or drop it and return true if the index was reset.
    ///
    /// The generation is checked under the index lock, so matches always reach the
    /// channel before the reset that would invalidate them.
    fn flush(&mut self) -> bool {
        if self.batch.is_empty() {
            return false;
        }
        let core = self.core;
        let _shared = core.shared.lock();
        if self.restart_if_reset(core.generation()) {
            return true;
        }
        core.events.send(EngineEvent::RowsFound {
            search: self.search,
            rows: std::mem::take(&mut self.batch),
        });
        false
    }

    /// Scan from `self.row` up to the currently indexed row count
    fn run_pass(&mut self) {
        self.restart_if_reset(self.core.generation());

        let format = self.core.format();
        let pass_start = self.row;
        let started = Instant::now();
        let mut last_flush = Instant::now();

        while self.row < self.core.row_count() && self.searching() {
            let loaded = {
                let mut shared = self.core.shared.lock();
                if self.core.generation() != self.generation {
                    None
                } else {
                    shared.load_row_chunk(&format, self.row, &mut self.cache)
                }
            };
            let Some((chunk, provisional)) = loaded else {
                break;
            };

            let chunk_start = self.row;
            let mut provisional_miss = false;
            for (current, raw) in self.cache.rows_from(self.row) {
                if !self.core.searching.load(Ordering::Relaxed) {
                    break;
                }
                let matched = match format.parse_row(raw) {
                    Ok(fields) => self.matcher.matches_row(&fields),
                    Err(e) => {
                        log::debug!("Search {} skips row {}: {}", self.search, current, e);
                        false
                    }
                };
                if matched {
                    self.batch.push(current);
                } else if provisional {
                    provisional_miss = true;
                    break;
                }
                self.row = current + 1;
            }

            if !self.batch.is_empty()
                && last_flush.elapsed() >= self.core.settings.search_flush_interval
            {
                if self.flush() {
                    continue;
                }
                last_flush = Instant::now();
            }

            if provisional_miss {
                // The row may still grow into a match; test it again next pass.
                self.row = chunk.first_row();
                break;
            }
            if self.row == chunk_start && self.searching() {
                log::error!(
                    "Search {} cannot read rows {}..={}, skipping them",
                    self.search,
                    chunk_start,
                    chunk.last_row()
                );
                self.row = chunk.last_row() + 1;
            }
        }

        if self.flush() || self.restart_if_reset(self.core.generation()) {
            // Interrupted by a reset; the next pass scans the new file from row 0.
            return;
        }
        self.core.search_passes.fetch_add(1, Ordering::AcqRel);
        if self.row > pass_start {
            log::debug!(
                "Search {} tested rows {}..{} in {:?}",
                self.search,
                pass_start,
                self.row,
                started.elapsed()
            );
        }
    }
}
