//! Append-only journal of committed changes.
//!
//! Each commit is one batch: a big-endian `u32` byte length followed by a
//! `u32` change count and the encoded `(Key, Status)` pairs. A torn batch at
//! the end of the file (a crash mid-write) is dropped on open.

use bytes::{BufMut, BytesMut};
use commonware_codec::{ReadExt, Write as _};
use dond_execution::Status;
use dond_types::execution::Key;
use std::{
    fs::{File, OpenOptions},
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

pub type Changes = Vec<(Key, Status)>;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt journal batch at offset {offset}")]
    Corrupt {
        offset: usize,
        #[source]
        source: commonware_codec::Error,
    },
    #[error("journal batch at offset {offset} has trailing bytes")]
    TrailingBytes { offset: usize },
    #[error("journal batch too large: {0} bytes")]
    TooLarge(usize),
}

pub struct Journal {
    file: File,
    path: PathBuf,
}

fn encode_batch(changes: &[(Key, Status)]) -> BytesMut {
    let mut body = BytesMut::new();
    (changes.len() as u32).write(&mut body);
    for (key, status) in changes {
        key.write(&mut body);
        status.write(&mut body);
    }
    body
}

fn decode_batch(offset: usize, mut body: &[u8]) -> Result<Changes, JournalError> {
    let corrupt = |source| JournalError::Corrupt { offset, source };
    let count = u32::read(&mut body).map_err(corrupt)?;
    let mut changes = Vec::new();
    for _ in 0..count {
        let key = Key::read(&mut body).map_err(corrupt)?;
        let status = Status::read(&mut body).map_err(corrupt)?;
        changes.push((key, status));
    }
    if !body.is_empty() {
        return Err(JournalError::TrailingBytes { offset });
    }
    Ok(changes)
}

/// Decode every complete batch. Returns the batches and the length of the
/// prefix they cover.
fn decode_batches(raw: &[u8]) -> Result<(Vec<Changes>, usize), JournalError> {
    let mut batches = Vec::new();
    let mut offset = 0;
    while raw.len() - offset >= 4 {
        let mut len = [0u8; 4];
        len.copy_from_slice(&raw[offset..offset + 4]);
        let len = u32::from_be_bytes(len) as usize;
        let start = offset + 4;
        if raw.len() - start < len {
            break;
        }
        batches.push(decode_batch(offset, &raw[start..start + len])?);
        offset = start + len;
    }
    Ok((batches, offset))
}

impl Journal {
    /// Open (or create) the journal at `path` and read back its batches.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<Changes>), JournalError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;

        let (batches, valid) = decode_batches(&raw)?;
        if valid < raw.len() {
            warn!(
                path = %path.display(),
                dropped = raw.len() - valid,
                "dropping torn journal tail"
            );
            file.set_len(valid as u64)?;
        }
        info!(path = %path.display(), batches = batches.len(), "opened journal");
        Ok((Self { file, path }, batches))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one commit. Empty commits are skipped.
    pub fn append(&mut self, changes: &[(Key, Status)]) -> Result<(), JournalError> {
        if changes.is_empty() {
            return Ok(());
        }
        let body = encode_batch(changes);
        let len = u32::try_from(body.len()).map_err(|_| JournalError::TooLarge(body.len()))?;
        let mut batch = BytesMut::with_capacity(4 + body.len());
        batch.put_u32(len);
        batch.put_slice(&body);
        self.file.write_all(&batch)?;
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dond_types::{
        execution::Value,
        game::{GameSettings, PlayerProfile},
        Address,
    };
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "dond-journal-{name}-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    fn sample() -> Changes {
        let wallet = Address::new([3; 20]);
        vec![
            (
                Key::Profile(wallet),
                Status::Update(Value::Profile(PlayerProfile::new(wallet, 42))),
            ),
            (
                Key::Settings,
                Status::Update(Value::Settings(GameSettings::default())),
            ),
            (Key::ActiveGame(wallet), Status::Delete),
        ]
    }

    #[test]
    fn test_append_and_replay() {
        let path = temp_path("replay");
        {
            let (mut journal, batches) = Journal::open(&path).unwrap();
            assert!(batches.is_empty());
            journal.append(&sample()).unwrap();
            journal.append(&[]).unwrap();
            journal.append(&sample()[..1]).unwrap();
        }

        let (journal, batches) = Journal::open(&path).unwrap();
        assert_eq!(journal.path(), path.as_path());
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], sample());
        assert_eq!(batches[1], sample()[..1].to_vec());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_torn_tail_is_dropped() {
        let path = temp_path("torn");
        {
            let (mut journal, _) = Journal::open(&path).unwrap();
            journal.append(&sample()).unwrap();
        }
        let intact = fs::metadata(&path).unwrap().len();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0, 0, 0, 40, 1, 2, 3]).unwrap();
        }

        let (_, batches) = Journal::open(&path).unwrap();
        assert_eq!(batches, vec![sample()]);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_batch_is_an_error() {
        let path = temp_path("corrupt");
        fs::write(&path, [0, 0, 0, 5, 0, 0, 0, 1, 99]).unwrap();
        assert!(matches!(
            Journal::open(&path),
            Err(JournalError::Corrupt { offset: 0, .. })
        ));
        let _ = fs::remove_file(&path);
    }
}
