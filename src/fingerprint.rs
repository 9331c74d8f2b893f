//! Request fingerprints used as cache keys.
//!
//! A fingerprint summarises a change by its title, file count, aggregate
//! line deltas, and the first three file paths. Patch text, commits, and
//! everything else are ignored on purpose: two submissions that agree on
//! those five values share a cache entry.
//!
//! The canonical text hashed here is sorted-key JSON with `", "` and `": "`
//! separators and all non-ASCII escaped, so keys match those computed by
//! other services sharing the cache key format.

use std::fmt;
use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use sha2::{Digest, Sha256};

use crate::models::ChangeDescription;

/// Number of hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 16;

/// Number of leading file paths folded into the fingerprint.
const SAMPLE_FILES: usize = 3;

/// A 16-character lowercase hex cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fields that identify a change, declared in sorted key order.
#[derive(Serialize)]
struct CanonicalRecord<'a> {
    files: usize,
    sample_files: Vec<&'a str>,
    title: &'a str,
    total_additions: u64,
    total_deletions: u64,
}

/// Compute the fingerprint of a change description.
pub fn fingerprint(change: &ChangeDescription) -> Fingerprint {
    let record = CanonicalRecord {
        files: change.files.len(),
        sample_files: change.sample_paths(SAMPLE_FILES),
        title: &change.title,
        total_additions: change.total_additions(),
        total_deletions: change.total_deletions(),
    };

    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&record).as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);

    tracing::debug!(key = %digest, title = %change.title, "computed fingerprint");
    Fingerprint(digest)
}

fn canonical_json(record: &CanonicalRecord<'_>) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiJsonFormatter);
    // Strings and integers into a Vec<u8> cannot fail.
    record
        .serialize(&mut ser)
        .expect("canonical record serializes");
    // The formatter only emits ASCII.
    String::from_utf8_lossy(&buf).into_owned()
}

/// Emits JSON in the legacy key format: `", "` and `": "`
/// separators, with every character outside printable ASCII escaped as
/// `\uXXXX` (UTF-16 surrogate pairs above the BMP).
struct AsciiJsonFormatter;

impl Formatter for AsciiJsonFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if (' '..='~').contains(&c) {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}
