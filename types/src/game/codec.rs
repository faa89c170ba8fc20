use bytes::{Buf, BufMut};
use commonware_codec::{Error, ReadExt, Write};
use uuid::Uuid;

/// Encoded size of a [Uuid].
pub const UUID_SIZE: usize = 16;

/// Helper to write a string as length-prefixed UTF-8 bytes.
pub fn write_string(s: &str, writer: &mut impl BufMut) {
    let bytes = s.as_bytes();
    (bytes.len() as u32).write(writer);
    writer.put_slice(bytes);
}

/// Helper to read a string from length-prefixed UTF-8 bytes.
pub fn read_string(reader: &mut impl Buf, max_len: usize) -> Result<String, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("String", "too long"));
    }
    if reader.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
}

pub fn string_encode_size(s: &str) -> usize {
    4 + s.len()
}

pub fn write_uuid(id: &Uuid, writer: &mut impl BufMut) {
    writer.put_slice(id.as_bytes());
}

pub fn read_uuid(reader: &mut impl Buf) -> Result<Uuid, Error> {
    if reader.remaining() < UUID_SIZE {
        return Err(Error::EndOfBuffer);
    }
    let mut bytes = [0u8; UUID_SIZE];
    reader.copy_to_slice(&mut bytes);
    Ok(Uuid::from_bytes(bytes))
}

pub fn write_optional_uuid(id: &Option<Uuid>, writer: &mut impl BufMut) {
    match id {
        Some(id) => {
            true.write(writer);
            write_uuid(id, writer);
        }
        None => false.write(writer),
    }
}

pub fn read_optional_uuid(reader: &mut impl Buf) -> Result<Option<Uuid>, Error> {
    if bool::read(reader)? {
        Ok(Some(read_uuid(reader)?))
    } else {
        Ok(None)
    }
}

pub fn optional_uuid_encode_size(id: &Option<Uuid>) -> usize {
    1 + id.map_or(0, |_| UUID_SIZE)
}

pub fn write_uuids(ids: &[Uuid], writer: &mut impl BufMut) {
    (ids.len() as u32).write(writer);
    for id in ids {
        write_uuid(id, writer);
    }
}

pub fn read_uuids(reader: &mut impl Buf, max_len: usize) -> Result<Vec<Uuid>, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("Uuids", "too many"));
    }
    (0..len).map(|_| read_uuid(reader)).collect()
}

pub fn uuids_encode_size(ids: &[Uuid]) -> usize {
    4 + ids.len() * UUID_SIZE
}

pub fn write_digest(digest: &[u8; 32], writer: &mut impl BufMut) {
    writer.put_slice(digest);
}

pub fn read_digest(reader: &mut impl Buf) -> Result<[u8; 32], Error> {
    if reader.remaining() < 32 {
        return Err(Error::EndOfBuffer);
    }
    let mut digest = [0u8; 32];
    reader.copy_to_slice(&mut digest);
    Ok(digest)
}
