use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    read_string, read_uuid, string_encode_size, write_string, write_uuid, MAX_TEXT_LENGTH,
    UUID_SIZE,
};
use crate::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PayoutStatus {
    Pending = 0,
    Paid = 1,
    Rejected = 2,
}

impl Write for PayoutStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for PayoutStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Paid),
            2 => Ok(Self::Rejected),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for PayoutStatus {
    const SIZE: usize = 1;
}

/// Which payout table a record lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PayoutKind {
    Scatter = 0,
    NftSale = 1,
    Manual = 2,
}

impl Write for PayoutKind {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for PayoutKind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Scatter),
            1 => Ok(Self::NftSale),
            2 => Ok(Self::Manual),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for PayoutKind {
    const SIZE: usize = 1;
}

/// Entry in the admin payout queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRef {
    pub kind: PayoutKind,
    pub id: Uuid,
}

impl Write for PayoutRef {
    fn write(&self, writer: &mut impl BufMut) {
        self.kind.write(writer);
        write_uuid(&self.id, writer);
    }
}

impl Read for PayoutRef {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            kind: PayoutKind::read(reader)?,
            id: read_uuid(reader)?,
        })
    }
}

impl FixedSize for PayoutRef {
    const SIZE: usize = PayoutKind::SIZE + UUID_SIZE;
}

/// Bonus owed after a streak of top-prize games.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScatterWin {
    pub id: Uuid,
    pub wallet: Address,
    pub amount: u64,
    pub streak: u8,
    /// Game that completed the streak.
    pub game_id: Uuid,
    pub status: PayoutStatus,
    pub created_at_ms: u64,
    pub resolved_at_ms: Option<u64>,
}

impl Write for ScatterWin {
    fn write(&self, writer: &mut impl BufMut) {
        write_uuid(&self.id, writer);
        self.wallet.write(writer);
        self.amount.write(writer);
        self.streak.write(writer);
        write_uuid(&self.game_id, writer);
        self.status.write(writer);
        self.created_at_ms.write(writer);
        self.resolved_at_ms.write(writer);
    }
}

impl Read for ScatterWin {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: read_uuid(reader)?,
            wallet: Address::read(reader)?,
            amount: u64::read(reader)?,
            streak: u8::read(reader)?,
            game_id: read_uuid(reader)?,
            status: PayoutStatus::read(reader)?,
            created_at_ms: u64::read(reader)?,
            resolved_at_ms: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for ScatterWin {
    fn encode_size(&self) -> usize {
        UUID_SIZE
            + Address::SIZE
            + self.amount.encode_size()
            + self.streak.encode_size()
            + UUID_SIZE
            + self.status.encode_size()
            + self.created_at_ms.encode_size()
            + self.resolved_at_ms.encode_size()
    }
}

/// Request to sell an earned trophy NFT back for BTC.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftSaleRequest {
    pub id: Uuid,
    pub wallet: Address,
    pub level: u8,
    pub btc_price_sats: u64,
    pub status: PayoutStatus,
    pub created_at_ms: u64,
    pub resolved_at_ms: Option<u64>,
}

impl Write for NftSaleRequest {
    fn write(&self, writer: &mut impl BufMut) {
        write_uuid(&self.id, writer);
        self.wallet.write(writer);
        self.level.write(writer);
        self.btc_price_sats.write(writer);
        self.status.write(writer);
        self.created_at_ms.write(writer);
        self.resolved_at_ms.write(writer);
    }
}

impl Read for NftSaleRequest {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: read_uuid(reader)?,
            wallet: Address::read(reader)?,
            level: u8::read(reader)?,
            btc_price_sats: u64::read(reader)?,
            status: PayoutStatus::read(reader)?,
            created_at_ms: u64::read(reader)?,
            resolved_at_ms: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for NftSaleRequest {
    fn encode_size(&self) -> usize {
        UUID_SIZE
            + Address::SIZE
            + self.level.encode_size()
            + self.btc_price_sats.encode_size()
            + self.status.encode_size()
            + self.created_at_ms.encode_size()
            + self.resolved_at_ms.encode_size()
    }
}

/// Payout created by an admin or by a closing leaderboard period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPayout {
    pub id: Uuid,
    pub wallet: Address,
    pub amount: u64,
    pub reason: String,
    pub status: PayoutStatus,
    pub created_at_ms: u64,
    pub resolved_at_ms: Option<u64>,
}

impl Write for ManualPayout {
    fn write(&self, writer: &mut impl BufMut) {
        write_uuid(&self.id, writer);
        self.wallet.write(writer);
        self.amount.write(writer);
        write_string(&self.reason, writer);
        self.status.write(writer);
        self.created_at_ms.write(writer);
        self.resolved_at_ms.write(writer);
    }
}

impl Read for ManualPayout {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: read_uuid(reader)?,
            wallet: Address::read(reader)?,
            amount: u64::read(reader)?,
            reason: read_string(reader, MAX_TEXT_LENGTH)?,
            status: PayoutStatus::read(reader)?,
            created_at_ms: u64::read(reader)?,
            resolved_at_ms: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for ManualPayout {
    fn encode_size(&self) -> usize {
        UUID_SIZE
            + Address::SIZE
            + self.amount.encode_size()
            + string_encode_size(&self.reason)
            + self.status.encode_size()
            + self.created_at_ms.encode_size()
            + self.resolved_at_ms.encode_size()
    }
}
