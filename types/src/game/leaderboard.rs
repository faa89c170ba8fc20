use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    read_uuids, uuids_encode_size, write_uuids, BPS_DENOMINATOR, LEADERBOARD_SIZE,
    PERIOD_PAYOUT_BPS,
};
use crate::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub wallet: Address,
    /// Winnings in cents accumulated during the period.
    pub winnings: u64,
    pub rank: u32,
}

impl Write for LeaderboardEntry {
    fn write(&self, writer: &mut impl BufMut) {
        self.wallet.write(writer);
        self.winnings.write(writer);
        self.rank.write(writer);
    }
}

impl Read for LeaderboardEntry {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            wallet: Address::read(reader)?,
            winnings: u64::read(reader)?,
            rank: u32::read(reader)?,
        })
    }
}

impl FixedSize for LeaderboardEntry {
    const SIZE: usize = Address::SIZE + u64::SIZE + u32::SIZE;
}

/// Top wallets of a period, sorted by winnings (descending).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standings {
    pub entries: Vec<LeaderboardEntry>,
}

impl Standings {
    /// Record a wallet's new period total.
    pub fn update(&mut self, wallet: Address, winnings: u64) {
        // Remove the wallet's previous entry
        if let Some(idx) = self.entries.iter().position(|e| e.wallet == wallet) {
            self.entries.remove(idx);
        }

        // Skip if the board is full and this total does not beat the last entry
        if self.entries.len() >= LEADERBOARD_SIZE {
            if let Some(last) = self.entries.last() {
                if winnings <= last.winnings {
                    return;
                }
            }
        }

        // Ties keep earlier entrants ahead
        let insert_pos = self
            .entries
            .iter()
            .position(|e| winnings > e.winnings)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            insert_pos,
            LeaderboardEntry {
                wallet,
                winnings,
                rank: 0,
            },
        );

        self.entries.truncate(LEADERBOARD_SIZE);
        self.rerank();
    }

    /// Drop a wallet from the board.
    pub fn remove(&mut self, wallet: &Address) {
        self.entries.retain(|e| &e.wallet != wallet);
        self.rerank();
    }

    fn rerank(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
        }
    }

    pub fn get(&self, wallet: &Address) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| &e.wallet == wallet)
    }
}

impl Write for Standings {
    fn write(&self, writer: &mut impl BufMut) {
        self.entries.write(writer);
    }
}

impl Read for Standings {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            entries: Vec::<LeaderboardEntry>::read_range(reader, 0..=LEADERBOARD_SIZE)?,
        })
    }
}

impl EncodeSize for Standings {
    fn encode_size(&self) -> usize {
        self.entries.encode_size()
    }
}

/// A 30-day leaderboard window.
///
/// Once `frozen` is set the period never changes again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardPeriod {
    pub id: u64,
    pub start_ms: u64,
    pub end_ms: u64,
    pub paused_at_ms: Option<u64>,
    pub total_paused_ms: u64,
    pub frozen: bool,
    pub closed_at_ms: Option<u64>,
    /// Prize pool in cents, split across the top three when the period closes.
    pub prize_pool: u64,
    pub standings: Standings,
    /// Manual payouts created for the winners at close.
    pub payouts: Vec<Uuid>,
}

impl LeaderboardPeriod {
    pub fn new(id: u64, start_ms: u64, duration_ms: u64, prize_pool: u64) -> Self {
        Self {
            id,
            start_ms,
            end_ms: start_ms.saturating_add(duration_ms),
            paused_at_ms: None,
            total_paused_ms: 0,
            frozen: false,
            closed_at_ms: None,
            prize_pool,
            standings: Standings::default(),
            payouts: Vec::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at_ms.is_some()
    }

    /// Accepting winnings: neither paused nor frozen.
    pub fn is_open(&self) -> bool {
        !self.frozen && !self.is_paused()
    }

    /// Payout amounts for the podium, in rank order.
    pub fn podium_payouts(&self) -> Vec<(Address, u64)> {
        self.standings
            .entries
            .iter()
            .zip(PERIOD_PAYOUT_BPS.iter())
            .map(|(entry, bps)| {
                let amount = self.prize_pool as u128 * *bps as u128 / BPS_DENOMINATOR as u128;
                (entry.wallet, amount as u64)
            })
            .filter(|(_, amount)| *amount > 0)
            .collect()
    }
}

impl Write for LeaderboardPeriod {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.start_ms.write(writer);
        self.end_ms.write(writer);
        self.paused_at_ms.write(writer);
        self.total_paused_ms.write(writer);
        self.frozen.write(writer);
        self.closed_at_ms.write(writer);
        self.prize_pool.write(writer);
        self.standings.write(writer);
        write_uuids(&self.payouts, writer);
    }
}

impl Read for LeaderboardPeriod {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            start_ms: u64::read(reader)?,
            end_ms: u64::read(reader)?,
            paused_at_ms: Option::<u64>::read(reader)?,
            total_paused_ms: u64::read(reader)?,
            frozen: bool::read(reader)?,
            closed_at_ms: Option::<u64>::read(reader)?,
            prize_pool: u64::read(reader)?,
            standings: Standings::read(reader)?,
            payouts: read_uuids(reader, PERIOD_PAYOUT_BPS.len())?,
        })
    }
}

impl EncodeSize for LeaderboardPeriod {
    fn encode_size(&self) -> usize {
        self.id.encode_size()
            + self.start_ms.encode_size()
            + self.end_ms.encode_size()
            + self.paused_at_ms.encode_size()
            + self.total_paused_ms.encode_size()
            + self.frozen.encode_size()
            + self.closed_at_ms.encode_size()
            + self.prize_pool.encode_size()
            + self.standings.encode_size()
            + uuids_encode_size(&self.payouts)
    }
}
