//! The watcher thread: poll the file, index growth, start over when it is replaced.

use super::{WatchOutcome, WatchState};
use crate::engine::shared::{sleep_while, EngineCore};
use crate::engine::EngineEvent;
use crate::format::RowFormat;
use crate::source::{probe_path, OpenedFile};
use std::fs::File;
use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::time::Instant;

/// Watch until the engine is stopped, reopening the path after every interruption
pub(crate) fn keep_watching(core: &EngineCore) {
    log::debug!("Watching {}", core.path.display());

    while core.watching.load(Ordering::Acquire) {
        let outcome = watch_file(core);
        if !outcome.reopens() {
            break;
        }

        log::warn!("Watch of {} interrupted: {:?}", core.path.display(), outcome);
        core.reset_index(None);
        core.events.send(EngineEvent::WatchInterrupted(outcome));
        core.set_state(WatchState::Opening);

        match reopen(core) {
            Some(opened) => core.reset_index(Some(opened)),
            None => break,
        }
    }

    core.set_state(WatchState::Closed);
    log::debug!("Stopped watching {}", core.path.display());
}

/// Retry opening the path every poll interval until it works or the engine stops
fn reopen(core: &EngineCore) -> Option<OpenedFile> {
    while core.watching.load(Ordering::Acquire) {
        match OpenedFile::open(&core.path) {
            Ok(opened) => {
                log::debug!("Reopened {} ({} bytes)", core.path.display(), opened.size);
                return Some(opened);
            }
            Err(e) => log::trace!("Still cannot open {}: {}", core.path.display(), e),
        }
        sleep_while(&core.watching, core.settings.poll_interval);
    }
    None
}

/// One pass over the currently open handle
fn watch_file(core: &EngineCore) -> WatchOutcome {
    if core.shared.lock().file.is_none() {
        return WatchOutcome::FileClosed;
    }
    core.set_state(WatchState::Tailing);

    while core.watching.load(Ordering::Acquire) {
        core.try_configure();

        let (size, identity) = match probe_path(&core.path) {
            Ok(probe) => probe,
            Err(e) if e.kind() == ErrorKind::NotFound => return WatchOutcome::FileNotFound,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", core.path.display(), e);
                return WatchOutcome::UnknownFailure;
            }
        };

        let must_load = {
            let shared = core.shared.lock();
            if shared.file.is_none() {
                return WatchOutcome::FileClosed;
            }
            if shared.identity.is_some() && identity.is_some() && shared.identity != identity {
                return WatchOutcome::Recreated;
            }

            let scanned = shared.index.scanned_to();
            if size < scanned {
                return WatchOutcome::Recreated;
            }

            // Until a first row is complete, growth is indexed even when not following
            size > scanned
                && (shared.index.last_parsed_pos() == 0 || core.following.load(Ordering::Acquire))
        };

        if must_load {
            core.set_state(WatchState::GrowthDetected);
            load_chunks(core, size);
            core.set_state(WatchState::Tailing);
        }

        sleep_while(&core.watching, core.settings.poll_interval);
    }

    WatchOutcome::NormalExit
}

/// Index everything up to `file_size`, one bounded growth step at a time.
///
/// Parsing runs on a private handle without the main lock; only merging the new
/// chunks into the index is locked.
fn load_chunks(core: &EngineCore, file_size: u64) {
    let started = Instant::now();
    let format = core.format();
    let mut parsed_chunks = 0;

    let mut file = match File::open(&core.path) {
        Ok(file) => file,
        Err(e) => {
            log::warn!("Cannot open {} for indexing: {}", core.path.display(), e);
            return;
        }
    };

    loop {
        let (from_pos, next_row, scanned_before) = {
            let shared = core.shared.lock();
            (
                shared.index.last_parsed_pos(),
                shared.index.complete_row_count(),
                shared.index.scanned_to(),
            )
        };

        let batch = match format.parse_chunks(&mut file, from_pos, next_row, file_size) {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("Indexing {} failed at byte {}: {}", core.path.display(), from_pos, e);
                return;
            }
        };
        let scanned_to = batch.scanned_to;
        parsed_chunks += batch.chunks.len();

        let rows = {
            let mut guard = core.shared.lock();
            let shared = &mut *guard;
            let old_pending = shared.index.pending().copied();
            if !shared.index.grow_by(batch) {
                return;
            }
            if let Some(old_pending) = old_pending {
                if shared.cache.holds(&old_pending) {
                    shared.cache.clear();
                }
            }
            shared.index.row_count()
        };
        core.publish_row_count(rows);

        if !core.watching.load(Ordering::Acquire)
            || scanned_to >= file_size
            || scanned_to <= scanned_before
        {
            break;
        }
    }

    log::debug!(
        "{} chunks of {} indexed in {:?}",
        parsed_chunks,
        core.path.display(),
        started.elapsed()
    );
}
