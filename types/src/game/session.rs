use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    read_digest, read_string, read_uuid, string_encode_size, write_digest, write_string,
    write_uuid, CASE_COUNT, ROUND_COUNT, ROUND_SCHEDULE, TX_HASH_LENGTH, UUID_SIZE,
};
use crate::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GameStatus {
    Active = 0,
    DealAccepted = 1,
    Completed = 2,
}

impl Write for GameStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for GameStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Active),
            1 => Ok(Self::DealAccepted),
            2 => Ok(Self::Completed),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for GameStatus {
    const SIZE: usize = 1;
}

/// How the player answered a banker offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OfferResponse {
    Pending = 0,
    Accepted = 1,
    Refused = 2,
}

impl Write for OfferResponse {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for OfferResponse {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Accepted),
            2 => Ok(Self::Refused),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for OfferResponse {
    const SIZE: usize = 1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankerOffer {
    /// Zero-based round the offer closed.
    pub round: u8,
    pub amount: u64,
    pub response: OfferResponse,
}

impl Write for BankerOffer {
    fn write(&self, writer: &mut impl BufMut) {
        self.round.write(writer);
        self.amount.write(writer);
        self.response.write(writer);
    }
}

impl Read for BankerOffer {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            round: u8::read(reader)?,
            amount: u64::read(reader)?,
            response: OfferResponse::read(reader)?,
        })
    }
}

impl FixedSize for BankerOffer {
    const SIZE: usize = u8::SIZE + u64::SIZE + OfferResponse::SIZE;
}

/// Final decision once every banker offer was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FinalChoice {
    Keep = 0,
    Swap = 1,
}

impl Write for FinalChoice {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for FinalChoice {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Keep),
            1 => Ok(Self::Swap),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for FinalChoice {
    const SIZE: usize = 1;
}

/// A single Deal or No Deal game.
///
/// Case numbers are 1-based. `cases[n - 1]` holds the value inside case `n`;
/// the layout and `server_seed` stay private until the game ends, while
/// `commitment` (the SHA-256 of the seed) is published at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub wallet: Address,
    pub player_case: u8,
    pub cases: Vec<u64>,
    pub opened_cases: Vec<u8>,
    pub offers: Vec<BankerOffer>,
    /// Zero-based index into the round schedule.
    pub round: u8,
    pub refusals: u8,
    pub final_choice: Option<FinalChoice>,
    pub final_winnings: Option<u64>,
    pub status: GameStatus,
    pub server_seed: [u8; 32],
    pub commitment: [u8; 32],
    pub payment_tx: String,
    pub created_at_ms: u64,
    pub finished_at_ms: Option<u64>,
}

impl Game {
    pub fn is_finished(&self) -> bool {
        self.status != GameStatus::Active
    }

    pub fn is_opened(&self, case_number: u8) -> bool {
        self.opened_cases.contains(&case_number)
    }

    /// Value inside a case, if the case number is on the board.
    pub fn case_value(&self, case_number: u8) -> Option<u64> {
        let index = (case_number as usize).checked_sub(1)?;
        self.cases.get(index).copied()
    }

    pub fn player_case_value(&self) -> Option<u64> {
        self.case_value(self.player_case)
    }

    pub fn pending_offer(&self) -> Option<&BankerOffer> {
        self.offers
            .last()
            .filter(|offer| offer.response == OfferResponse::Pending)
    }

    /// Cases still closed, excluding the player's.
    pub fn closed_cases(&self) -> Vec<u8> {
        (1..=CASE_COUNT as u8)
            .filter(|n| *n != self.player_case && !self.is_opened(*n))
            .collect()
    }

    /// Values still in play, including the player's case.
    pub fn remaining_values(&self) -> Vec<u64> {
        (1..=CASE_COUNT as u8)
            .filter(|n| !self.is_opened(*n))
            .filter_map(|n| self.case_value(n))
            .collect()
    }

    /// Cases opened so far in the current round.
    pub fn opened_this_round(&self) -> usize {
        let before: usize = ROUND_SCHEDULE
            .iter()
            .take(self.round as usize)
            .map(|n| *n as usize)
            .sum();
        self.opened_cases.len().saturating_sub(before)
    }

    /// Cases left to open before the banker calls this round.
    pub fn cases_left_in_round(&self) -> u8 {
        match ROUND_SCHEDULE.get(self.round as usize) {
            Some(quota) if self.pending_offer().is_none() => {
                quota.saturating_sub(self.opened_this_round() as u8)
            }
            _ => 0,
        }
    }

    /// Every banker offer was refused and only the swap-or-keep choice remains.
    pub fn awaiting_final_decision(&self) -> bool {
        self.status == GameStatus::Active && self.round as usize >= ROUND_COUNT
    }
}

impl Write for Game {
    fn write(&self, writer: &mut impl BufMut) {
        write_uuid(&self.id, writer);
        self.wallet.write(writer);
        self.player_case.write(writer);
        self.cases.write(writer);
        self.opened_cases.write(writer);
        self.offers.write(writer);
        self.round.write(writer);
        self.refusals.write(writer);
        self.final_choice.write(writer);
        self.final_winnings.write(writer);
        self.status.write(writer);
        write_digest(&self.server_seed, writer);
        write_digest(&self.commitment, writer);
        write_string(&self.payment_tx, writer);
        self.created_at_ms.write(writer);
        self.finished_at_ms.write(writer);
    }
}

impl Read for Game {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: read_uuid(reader)?,
            wallet: Address::read(reader)?,
            player_case: u8::read(reader)?,
            cases: Vec::<u64>::read_range(reader, 0..=CASE_COUNT)?,
            opened_cases: Vec::<u8>::read_range(reader, 0..=CASE_COUNT)?,
            offers: Vec::<BankerOffer>::read_range(reader, 0..=ROUND_COUNT)?,
            round: u8::read(reader)?,
            refusals: u8::read(reader)?,
            final_choice: Option::<FinalChoice>::read(reader)?,
            final_winnings: Option::<u64>::read(reader)?,
            status: GameStatus::read(reader)?,
            server_seed: read_digest(reader)?,
            commitment: read_digest(reader)?,
            payment_tx: read_string(reader, TX_HASH_LENGTH)?,
            created_at_ms: u64::read(reader)?,
            finished_at_ms: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for Game {
    fn encode_size(&self) -> usize {
        UUID_SIZE
            + Address::SIZE
            + self.player_case.encode_size()
            + self.cases.encode_size()
            + self.opened_cases.encode_size()
            + self.offers.encode_size()
            + self.round.encode_size()
            + self.refusals.encode_size()
            + self.final_choice.encode_size()
            + self.final_winnings.encode_size()
            + self.status.encode_size()
            + 32
            + 32
            + string_encode_size(&self.payment_tx)
            + self.created_at_ms.encode_size()
            + self.finished_at_ms.encode_size()
    }
}
