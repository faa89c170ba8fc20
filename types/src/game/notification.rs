use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};

use super::{read_string, string_encode_size, write_string, MAX_TEXT_LENGTH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NotificationKind {
    GameResult = 0,
    TrophyUnlocked = 1,
    ScatterWon = 2,
    PayoutResolved = 3,
    LeaderboardPayout = 4,
    LevelSet = 5,
    ProfilesMerged = 6,
}

impl Write for NotificationKind {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for NotificationKind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::GameResult),
            1 => Ok(Self::TrophyUnlocked),
            2 => Ok(Self::ScatterWon),
            3 => Ok(Self::PayoutResolved),
            4 => Ok(Self::LeaderboardPayout),
            5 => Ok(Self::LevelSet),
            6 => Ok(Self::ProfilesMerged),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for NotificationKind {
    const SIZE: usize = 1;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub created_at_ms: u64,
}

impl Write for Notification {
    fn write(&self, writer: &mut impl BufMut) {
        self.kind.write(writer);
        write_string(&self.message, writer);
        self.created_at_ms.write(writer);
    }
}

impl Read for Notification {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            kind: NotificationKind::read(reader)?,
            message: read_string(reader, MAX_TEXT_LENGTH)?,
            created_at_ms: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Notification {
    fn encode_size(&self) -> usize {
        self.kind.encode_size()
            + string_encode_size(&self.message)
            + self.created_at_ms.encode_size()
    }
}
