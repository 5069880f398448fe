//! Access to the underlying log file: positioned reads, identity and validation.

pub mod reader;
pub mod validation;

pub use reader::{decode_line, probe_path, read_span, FileIdentity, OpenedFile};
pub use validation::validate_file_path;
