//! Watcher states and the reasons a watch pass ends.

/// What the watcher thread is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WatchState {
    /// No watcher thread is running
    #[default]
    Closed = 0,
    /// Waiting for the path to become openable again
    Opening = 1,
    /// Polling the file for changes
    Tailing = 2,
    /// Indexing newly appeared bytes
    GrowthDetected = 3,
}

impl WatchState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Opening,
            2 => Self::Tailing,
            3 => Self::GrowthDetected,
            _ => Self::Closed,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Tailing => "tailing",
            Self::GrowthDetected => "growth detected",
        }
    }
}

/// Why one watch pass over an open handle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The engine was stopped
    NormalExit,
    /// There was no open handle to watch
    FileClosed,
    /// The path disappeared
    FileNotFound,
    /// The path now refers to a different or shorter file
    Recreated,
    /// The handle could not be read or positioned
    UnknownFailure,
}

impl WatchOutcome {
    /// Whether the watcher reopens the path and starts over after this outcome
    pub fn reopens(&self) -> bool {
        !matches!(self, Self::NormalExit)
    }
}
