use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};
use serde::{Deserialize, Serialize};

use super::{
    completed_level_from_xp, read_string, string_encode_size, write_string, MAX_MERGED_WALLETS,
    MAX_TEXT_LENGTH,
};
use crate::Address;

/// Per-wallet rewards profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub wallet: Address,
    pub total_xp: u64,
    /// Highest completed tier, kept in sync with `total_xp`.
    pub completed_level: Option<u8>,
    /// God of the highest completed tier (empty until a tier is completed).
    pub god_name: String,
    pub total_winnings: u64,
    pub best_winnings: u64,
    pub games_played: u32,
    /// Consecutive games ending on the top prize.
    pub scatter_streak: u8,
    pub continue_past_level_nine: bool,
    /// Wallets folded into this profile by an admin merge.
    pub merged_wallets: Vec<Address>,
    pub created_at_ms: u64,
}

impl PlayerProfile {
    pub fn new(wallet: Address, now_ms: u64) -> Self {
        Self {
            wallet,
            created_at_ms: now_ms,
            ..Default::default()
        }
    }

    /// Set XP and refresh the derived completed level and god name.
    pub fn set_xp(&mut self, xp: u64) {
        self.total_xp = xp;
        let completed = completed_level_from_xp(xp);
        self.completed_level = completed.map(|tier| tier.number);
        self.god_name = completed.map(|tier| tier.god.to_string()).unwrap_or_default();
    }
}

impl Write for PlayerProfile {
    fn write(&self, writer: &mut impl BufMut) {
        self.wallet.write(writer);
        self.total_xp.write(writer);
        self.completed_level.write(writer);
        write_string(&self.god_name, writer);
        self.total_winnings.write(writer);
        self.best_winnings.write(writer);
        self.games_played.write(writer);
        self.scatter_streak.write(writer);
        self.continue_past_level_nine.write(writer);
        self.merged_wallets.write(writer);
        self.created_at_ms.write(writer);
    }
}

impl Read for PlayerProfile {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            wallet: Address::read(reader)?,
            total_xp: u64::read(reader)?,
            completed_level: Option::<u8>::read(reader)?,
            god_name: read_string(reader, MAX_TEXT_LENGTH)?,
            total_winnings: u64::read(reader)?,
            best_winnings: u64::read(reader)?,
            games_played: u32::read(reader)?,
            scatter_streak: u8::read(reader)?,
            continue_past_level_nine: bool::read(reader)?,
            merged_wallets: Vec::<Address>::read_range(reader, 0..=MAX_MERGED_WALLETS)?,
            created_at_ms: u64::read(reader)?,
        })
    }
}

impl EncodeSize for PlayerProfile {
    fn encode_size(&self) -> usize {
        Address::SIZE
            + self.total_xp.encode_size()
            + self.completed_level.encode_size()
            + string_encode_size(&self.god_name)
            + self.total_winnings.encode_size()
            + self.best_winnings.encode_size()
            + self.games_played.encode_size()
            + self.scatter_streak.encode_size()
            + self.continue_past_level_nine.encode_size()
            + self.merged_wallets.encode_size()
            + self.created_at_ms.encode_size()
    }
}
