//! Classify a file as a MyNote container or plain text.
//!
//! Extension detection is authoritative for `.mynote` and `.txt`.  Magic
//! detection is the fallback, and it treats "not our magic" as a positive
//! plain-text result; only buffers shorter than the magic are `Unknown`.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::container::{MAGIC, MAGIC_LEN};

pub const MYNOTE_EXTENSION: &str = ".mynote";
pub const TEXT_EXTENSION: &str = ".txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Unknown,
    PlainText,
    MyNote,
}

impl FileFormat {
    /// Human-readable name for diagnostics; never parsed.
    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Unknown   => "unknown",
            FileFormat::PlainText => "plain-text",
            FileFormat::MyNote    => "mynote",
        }
    }
}

/// Case-insensitive suffix match on the whole path string.
pub fn detect_by_extension<P: AsRef<Path>>(path: P) -> FileFormat {
    let lower = path.as_ref().to_string_lossy().to_lowercase();
    if lower.ends_with(MYNOTE_EXTENSION) {
        FileFormat::MyNote
    } else if lower.ends_with(TEXT_EXTENSION) {
        FileFormat::PlainText
    } else {
        FileFormat::Unknown
    }
}

pub fn detect_by_magic(bytes: &[u8]) -> FileFormat {
    if bytes.len() < MAGIC_LEN {
        FileFormat::Unknown
    } else if bytes.starts_with(MAGIC) {
        FileFormat::MyNote
    } else {
        FileFormat::PlainText
    }
}

/// Extension first; `head` (the first bytes of the file, when available)
/// only when the extension is inconclusive.  Anything still unknown is
/// opened as plain text.
pub fn detect<P: AsRef<Path>>(path: P, head: Option<&[u8]>) -> FileFormat {
    match detect_by_extension(path) {
        FileFormat::Unknown => match head.map(detect_by_magic) {
            Some(FileFormat::MyNote) => FileFormat::MyNote,
            _                        => FileFormat::PlainText,
        },
        known => known,
    }
}

/// [`detect`] for a file on disk, reading at most [`MAGIC_LEN`] bytes and
/// only when the extension is inconclusive.  Unreadable files are plain text.
pub fn detect_file<P: AsRef<Path>>(path: P) -> FileFormat {
    let path = path.as_ref();
    if let known @ (FileFormat::MyNote | FileFormat::PlainText) = detect_by_extension(path) {
        return known;
    }
    match read_head(path) {
        Ok(head) => detect(path, Some(&head)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "format probe failed; assuming plain text");
            FileFormat::PlainText
        }
    }
}

fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(MAGIC_LEN);
    File::open(path)?.take(MAGIC_LEN as u64).read_to_end(&mut head)?;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!(detect_by_extension("test.mynote"), FileFormat::MyNote);
        assert_eq!(detect_by_extension("C:\\folder\\test.MYNOTE"), FileFormat::MyNote);
        assert_eq!(detect_by_extension("report.MyNote"), FileFormat::MyNote);
        assert_eq!(detect_by_extension("notes.txt"), FileFormat::PlainText);
        assert_eq!(detect_by_extension("/tmp/NOTES.TXT"), FileFormat::PlainText);
        assert_eq!(detect_by_extension("notes.doc"), FileFormat::Unknown);
        assert_eq!(detect_by_extension("test"), FileFormat::Unknown);
        assert_eq!(detect_by_extension(""), FileFormat::Unknown);
    }

    #[test]
    fn magic() {
        assert_eq!(detect_by_magic(b"MYNOTE01 and then some"), FileFormat::MyNote);
        assert_eq!(detect_by_magic(b"Hello, World!"), FileFormat::PlainText);
        assert_eq!(detect_by_magic(b"MYNOTE01"), FileFormat::MyNote);
        assert_eq!(detect_by_magic(b"12345678"), FileFormat::PlainText);
        assert_eq!(detect_by_magic(b"MYNOTE0"), FileFormat::Unknown);
        assert_eq!(detect_by_magic(b""), FileFormat::Unknown);
    }

    #[test]
    fn precedence() {
        assert_eq!(detect("a.txt", Some(b"MYNOTE01........")), FileFormat::PlainText);
        assert_eq!(detect("a.mynote", Some(b"plain text here")), FileFormat::MyNote);
        assert_eq!(detect("a.bin", Some(b"MYNOTE01........")), FileFormat::MyNote);
        assert_eq!(detect("a.bin", Some(b"abc")), FileFormat::PlainText);
        assert_eq!(detect("a.bin", None), FileFormat::PlainText);
    }
}
