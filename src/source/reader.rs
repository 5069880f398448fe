//! Positioned reads and file identity.
//!
//! Every read seeks first: the same handle is shared by the watcher, the search
//! thread and consumer lookups, so no caller may rely on the current offset.

use bstr::ByteSlice;
use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Read up to `len` bytes starting at `start`. Returns fewer bytes when the input
/// ends early (for example after a truncation).
pub fn read_span<R: Read + Seek>(reader: &mut R, start: u64, len: u64) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(start))?;
    let mut bytes = Vec::with_capacity(len.min(64 * 1024 * 1024) as usize);
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Decode one row's bytes, dropping a trailing carriage return. Invalid UTF-8 is
/// replaced rather than rejected so a stray byte never drops a row.
pub fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    bytes.to_str_lossy().into_owned()
}

/// Which file a handle or path points at.
///
/// On Unix this is the device and inode pair, so a log replaced by rotation is
/// recognized even when the new file is already larger than the old one. Elsewhere
/// identity is unknown and only size shrinkage reveals a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn of(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// An opened file with the size and identity observed at open time
#[derive(Debug)]
pub struct OpenedFile {
    pub file: File,
    pub size: u64,
    pub identity: Option<FileIdentity>,
}

impl OpenedFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        Ok(Self {
            file,
            size: metadata.len(),
            identity: FileIdentity::of(&metadata),
        })
    }
}

/// Current size and identity of whatever sits at `path` right now
pub fn probe_path(path: &Path) -> io::Result<(u64, Option<FileIdentity>)> {
    let metadata = std::fs::metadata(path)?;
    Ok((metadata.len(), FileIdentity::of(&metadata)))
}
