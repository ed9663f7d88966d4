//! Magic-number checks run before any external tool is spawned.
//!
//! Tables follow <https://en.wikipedia.org/wiki/List_of_file_signatures>.

use crate::error::{AppError, Result};
use std::io::{ErrorKind, Read};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Input family accepted by one of the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// `.doc` (OLE2) and `.docx` (ZIP) documents
    Document,
    /// PNG, JPEG, BMP and PSD rasters
    Image,
    Pdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Confirmed,
    /// Only the generic ZIP local-file header matched.
    Promiscuous,
    NoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Leading bytes equal the pattern.
    Prefix,
    /// Leading bytes equal the pattern, accepted but logged for follow-up.
    Promiscuous,
}

struct Pattern {
    bytes: &'static [u8],
    rule: Rule,
}

const fn prefix(bytes: &'static [u8]) -> Pattern {
    Pattern {
        bytes,
        rule: Rule::Prefix,
    }
}

const DOCUMENT: &[Pattern] = &[
    // OLE2 compound document (legacy .doc)
    prefix(&[0xD0, 0xCF, 0x11, 0xE0]),
    // ZIP, empty archive
    prefix(&[0x50, 0x4B, 0x03, 0x04, 0x50, 0x4B, 0x05, 0x06]),
    // ZIP, spanned archive
    prefix(&[0x50, 0x4B, 0x07, 0x08]),
    // Office 2007 container
    prefix(&[0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x06, 0x00]),
    Pattern {
        bytes: &[0x50, 0x4B, 0x03, 0x04],
        rule: Rule::Promiscuous,
    },
];

const IMAGE: &[Pattern] = &[
    prefix(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
    prefix(&[0xFF, 0xD8, 0xFF]),
    prefix(&[0x42, 0x4D]),
    prefix(&[0x38, 0x42, 0x50, 0x53]),
];

// %PDF
const PDF: &[Pattern] = &[prefix(&[0x25, 0x50, 0x44, 0x46])];

impl Family {
    /// Number of leading bytes that must be readable before matching.
    pub fn prefix_len(self) -> usize {
        match self {
            Family::Document | Family::Image => 8,
            Family::Pdf => 4,
        }
    }

    fn patterns(self) -> &'static [Pattern] {
        match self {
            Family::Document => DOCUMENT,
            Family::Image => IMAGE,
            Family::Pdf => PDF,
        }
    }
}

/// Match an already-read prefix against the family's table, in table order.
pub fn classify(buf: &[u8], family: Family) -> Verdict {
    for pattern in family.patterns() {
        if buf.starts_with(pattern.bytes) {
            return match pattern.rule {
                Rule::Prefix => Verdict::Confirmed,
                Rule::Promiscuous => Verdict::Promiscuous,
            };
        }
    }
    Verdict::NoMatch
}

fn verdict_for(buf: &[u8], family: Family) -> Result<bool> {
    let needed = family.prefix_len();
    if buf.len() < needed {
        return Err(AppError::FileTooSmall {
            needed,
            got: buf.len(),
        });
    }

    let head = &buf[..needed];
    match classify(head, family) {
        Verdict::Confirmed => Ok(true),
        Verdict::Promiscuous => {
            warn!("Promiscuous {:?} signature accepted: {:02x?}", family, head);
            Ok(true)
        }
        Verdict::NoMatch => {
            debug!("No {:?} signature matched: {:02x?}", family, head);
            Ok(false)
        }
    }
}

/// Read up to the family's prefix length from `reader` and check it.
///
/// A source shorter than the prefix is [`AppError::FileTooSmall`], never
/// `Ok(false)`.
pub fn check<R: Read>(reader: &mut R, family: Family) -> Result<bool> {
    let mut buf = vec![0u8; family.prefix_len()];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    verdict_for(&buf[..filled], family)
}

/// Open `path`, read its prefix and check it. The handle is dropped before
/// returning.
pub async fn check_path(path: &Path, family: Family) -> Result<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; family.prefix_len()];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    verdict_for(&buf[..filled], family)
}

/// Like [`check_path`], but a mismatch becomes [`AppError::InvalidSignature`].
pub async fn require(path: &Path, family: Family) -> Result<()> {
    if check_path(path, family).await? {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}
