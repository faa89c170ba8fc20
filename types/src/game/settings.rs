use bytes::{Buf, BufMut};
use commonware_codec::{Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};

use crate::Address;

/// Operator-tunable game settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Entry fee in cents of the payment token.
    pub entry_fee: u64,
    /// Wallet receiving entry fees.
    pub treasury: Address,
    /// Consecutive top-prize games needed for a scatter bonus (0 disables it).
    pub scatter_trigger: u8,
    /// Scatter bonus in cents.
    pub scatter_bonus: u64,
    /// Prize pool in cents for each new leaderboard period.
    pub leaderboard_pool: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            entry_fee: 1_000,
            treasury: Address::default(),
            scatter_trigger: 3,
            scatter_bonus: 1_000_000,
            leaderboard_pool: 500_000,
        }
    }
}

impl Write for GameSettings {
    fn write(&self, writer: &mut impl BufMut) {
        self.entry_fee.write(writer);
        self.treasury.write(writer);
        self.scatter_trigger.write(writer);
        self.scatter_bonus.write(writer);
        self.leaderboard_pool.write(writer);
    }
}

impl Read for GameSettings {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            entry_fee: u64::read(reader)?,
            treasury: Address::read(reader)?,
            scatter_trigger: u8::read(reader)?,
            scatter_bonus: u64::read(reader)?,
            leaderboard_pool: u64::read(reader)?,
        })
    }
}

impl FixedSize for GameSettings {
    const SIZE: usize = u64::SIZE + Address::SIZE + u8::SIZE + u64::SIZE + u64::SIZE;
}
