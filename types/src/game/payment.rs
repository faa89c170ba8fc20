use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    optional_uuid_encode_size, read_optional_uuid, read_string, string_encode_size,
    write_optional_uuid, write_string, MAX_TEXT_LENGTH, TX_HASH_LENGTH,
};
use crate::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PaymentStatus {
    Pending = 0,
    Confirmed = 1,
    Failed = 2,
}

impl Write for PaymentStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for PaymentStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Confirmed),
            2 => Ok(Self::Failed),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for PaymentStatus {
    const SIZE: usize = 1;
}

/// Normalize a transaction hash (`0x` + 64 hex, any case) to lowercase.
pub fn normalize_tx_hash(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))?;
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex.to_ascii_lowercase()))
}

/// Entry-fee transfer awaiting on-chain confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGamePayment {
    pub tx_hash: String,
    pub wallet: Address,
    /// Entry fee in cents owed when the payment was registered.
    pub amount: u64,
    pub status: PaymentStatus,
    /// Failure reason reported by the verifier.
    pub reason: String,
    /// Game created from this payment, once consumed.
    pub game_id: Option<Uuid>,
    pub created_at_ms: u64,
    pub settled_at_ms: Option<u64>,
}

impl PendingGamePayment {
    pub fn is_consumed(&self) -> bool {
        self.game_id.is_some()
    }
}

impl Write for PendingGamePayment {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.tx_hash, writer);
        self.wallet.write(writer);
        self.amount.write(writer);
        self.status.write(writer);
        write_string(&self.reason, writer);
        write_optional_uuid(&self.game_id, writer);
        self.created_at_ms.write(writer);
        self.settled_at_ms.write(writer);
    }
}

impl Read for PendingGamePayment {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            tx_hash: read_string(reader, TX_HASH_LENGTH)?,
            wallet: Address::read(reader)?,
            amount: u64::read(reader)?,
            status: PaymentStatus::read(reader)?,
            reason: read_string(reader, MAX_TEXT_LENGTH)?,
            game_id: read_optional_uuid(reader)?,
            created_at_ms: u64::read(reader)?,
            settled_at_ms: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for PendingGamePayment {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.tx_hash)
            + Address::SIZE
            + self.amount.encode_size()
            + self.status.encode_size()
            + string_encode_size(&self.reason)
            + optional_uuid_encode_size(&self.game_id)
            + self.created_at_ms.encode_size()
            + self.settled_at_ms.encode_size()
    }
}
