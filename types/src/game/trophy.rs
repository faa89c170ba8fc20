use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};

use super::{read_string, string_encode_size, tier_by_number, write_string, MAX_TEXT_LENGTH};
use crate::Address;

/// Satoshis in one bitcoin.
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Catalog entry for the NFT minted when a tier is completed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trophy {
    pub level: u8,
    pub god: String,
    pub image_url: String,
    /// Buy-back price offered for the NFT, in satoshis.
    pub btc_price_sats: u64,
}

impl Trophy {
    /// Catalog entry used until an admin uploads artwork and pricing.
    pub fn placeholder(level: u8) -> Option<Self> {
        let tier = tier_by_number(level)?;
        Some(Self {
            level,
            god: tier.god.to_string(),
            image_url: String::new(),
            btc_price_sats: (level as u64 + 1) * SATS_PER_BTC / 100,
        })
    }
}

impl Write for Trophy {
    fn write(&self, writer: &mut impl BufMut) {
        self.level.write(writer);
        write_string(&self.god, writer);
        write_string(&self.image_url, writer);
        self.btc_price_sats.write(writer);
    }
}

impl Read for Trophy {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            level: u8::read(reader)?,
            god: read_string(reader, MAX_TEXT_LENGTH)?,
            image_url: read_string(reader, MAX_TEXT_LENGTH)?,
            btc_price_sats: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Trophy {
    fn encode_size(&self) -> usize {
        self.level.encode_size()
            + string_encode_size(&self.god)
            + string_encode_size(&self.image_url)
            + self.btc_price_sats.encode_size()
    }
}

/// A trophy earned by a wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTrophy {
    pub wallet: Address,
    pub level: u8,
    pub earned_at_ms: u64,
    pub sale_pending: bool,
    pub sold: bool,
}

impl Write for PlayerTrophy {
    fn write(&self, writer: &mut impl BufMut) {
        self.wallet.write(writer);
        self.level.write(writer);
        self.earned_at_ms.write(writer);
        self.sale_pending.write(writer);
        self.sold.write(writer);
    }
}

impl Read for PlayerTrophy {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            wallet: Address::read(reader)?,
            level: u8::read(reader)?,
            earned_at_ms: u64::read(reader)?,
            sale_pending: bool::read(reader)?,
            sold: bool::read(reader)?,
        })
    }
}

impl FixedSize for PlayerTrophy {
    const SIZE: usize = Address::SIZE + u8::SIZE + u64::SIZE + bool::SIZE + bool::SIZE;
}
