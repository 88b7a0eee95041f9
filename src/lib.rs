pub mod text;
pub mod lines;
pub mod crypto;
pub mod container;
pub mod sniff;
pub mod config;

pub use container::{decode, encode, read_header, Integrity, NoteError, NoteHeader, ParsedNote, FormatError};
pub use crypto::{CryptoError, SealingKey};
pub use sniff::{detect, detect_by_extension, detect_by_magic, FileFormat};
pub use text::{Bom, TextError};
pub use lines::LineIndex;
pub use config::Credentials;
