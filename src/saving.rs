use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::StoreError;

/// Encodes `value` as gzip-compressed JSON and atomically replaces `path`.
///
/// Encoding happens fully in memory first, so an encode failure never
/// touches the existing file.
pub fn save_gz_json<T: Serialize>(value: &T, path: &Path) -> Result<(), StoreError> {
    let json = serde_json::to_vec(value).map_err(StoreError::Encode)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    write_atomically(path, &compressed)
}

pub fn load_gz_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path)?;
    let reader = BufReader::new(GzDecoder::new(file));
    serde_json::from_reader(reader).map_err(|e| {
        if e.is_io() {
            StoreError::Io(e.into())
        } else {
            StoreError::Decode(e)
        }
    })
}

/// Pretty JSON, for the small index files (shares, users).
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(StoreError::Encode)?;
    write_atomically(path, &json)
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(StoreError::Decode)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
