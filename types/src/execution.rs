use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{
    read_string, read_uuid, read_uuids, string_encode_size, uuids_encode_size, write_string,
    write_uuid, write_uuids, Game, GameSettings, GameStatus, LeaderboardEntry, LeaderboardPeriod,
    ManualPayout, NftSaleRequest, Notification, PaymentStatus, PayoutKind, PayoutRef,
    PayoutStatus, PendingGamePayment, PlayerProfile, PlayerTrophy, ScatterWin, Trophy,
    LEVEL_COUNT, MAX_INDEX_LENGTH, MAX_NOTIFICATIONS, TX_HASH_LENGTH, UUID_SIZE,
};
use crate::Address;

/// Every state-changing action. Authorization (wallet ownership, admin key)
/// happens before an instruction is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    CreateGame {
        wallet: Address,
        player_case: u8,
        payment_tx: String,
    },
    OpenCase {
        wallet: Address,
        game_id: Uuid,
        case_number: u8,
    },
    AcceptDeal {
        wallet: Address,
        game_id: Uuid,
        offer: u64,
    },
    RefuseDeal {
        wallet: Address,
        game_id: Uuid,
    },
    FinalDecision {
        wallet: Address,
        game_id: Uuid,
        swap: bool,
    },
    RegisterPayment {
        wallet: Address,
        tx_hash: String,
    },
    SettlePayment {
        tx_hash: String,
        confirmed: bool,
        reason: String,
    },
    SetContinuePastNine {
        wallet: Address,
        enabled: bool,
    },
    RequestNftSale {
        wallet: Address,
        level: u8,
    },

    // Admin
    SetPlayerLevel {
        wallet: Address,
        level: u8,
    },
    MergeProfiles {
        primary: Address,
        duplicates: Vec<Address>,
    },
    CheckLeaderboardPeriod,
    PauseLeaderboardPeriod,
    ResumeLeaderboardPeriod,
    UpsertTrophy(Trophy),
    CreateManualPayout {
        wallet: Address,
        amount: u64,
        reason: String,
    },
    ResolvePayout {
        kind: PayoutKind,
        id: Uuid,
        approve: bool,
    },
    UpdateSettings(GameSettings),
}

#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Debug)]
pub enum Key {
    Profile(Address),
    Game(Uuid),
    ActiveGame(Address),
    Trophy(u8),
    PlayerTrophies(Address),
    LeaderboardCursor,
    LeaderboardPeriod(u64),
    PeriodWinnings(u64, Address),
    ScatterWin(Uuid),
    WalletScatterWins(Address),
    NftSaleRequest(Uuid),
    ManualPayout(Uuid),
    PendingPayouts,
    Payment(String),
    Settings,
    Notifications(Address),
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Profile(wallet) => {
                0u8.write(writer);
                wallet.write(writer);
            }
            Self::Game(id) => {
                1u8.write(writer);
                write_uuid(id, writer);
            }
            Self::ActiveGame(wallet) => {
                2u8.write(writer);
                wallet.write(writer);
            }
            Self::Trophy(level) => {
                3u8.write(writer);
                level.write(writer);
            }
            Self::PlayerTrophies(wallet) => {
                4u8.write(writer);
                wallet.write(writer);
            }
            Self::LeaderboardCursor => 5u8.write(writer),
            Self::LeaderboardPeriod(id) => {
                6u8.write(writer);
                id.write(writer);
            }
            Self::PeriodWinnings(id, wallet) => {
                7u8.write(writer);
                id.write(writer);
                wallet.write(writer);
            }
            Self::ScatterWin(id) => {
                8u8.write(writer);
                write_uuid(id, writer);
            }
            Self::WalletScatterWins(wallet) => {
                9u8.write(writer);
                wallet.write(writer);
            }
            Self::NftSaleRequest(id) => {
                10u8.write(writer);
                write_uuid(id, writer);
            }
            Self::ManualPayout(id) => {
                11u8.write(writer);
                write_uuid(id, writer);
            }
            Self::PendingPayouts => 12u8.write(writer),
            Self::Payment(tx_hash) => {
                13u8.write(writer);
                write_string(tx_hash, writer);
            }
            Self::Settings => 14u8.write(writer),
            Self::Notifications(wallet) => {
                15u8.write(writer);
                wallet.write(writer);
            }
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match u8::read(reader)? {
            0 => Self::Profile(Address::read(reader)?),
            1 => Self::Game(read_uuid(reader)?),
            2 => Self::ActiveGame(Address::read(reader)?),
            3 => Self::Trophy(u8::read(reader)?),
            4 => Self::PlayerTrophies(Address::read(reader)?),
            5 => Self::LeaderboardCursor,
            6 => Self::LeaderboardPeriod(u64::read(reader)?),
            7 => Self::PeriodWinnings(u64::read(reader)?, Address::read(reader)?),
            8 => Self::ScatterWin(read_uuid(reader)?),
            9 => Self::WalletScatterWins(Address::read(reader)?),
            10 => Self::NftSaleRequest(read_uuid(reader)?),
            11 => Self::ManualPayout(read_uuid(reader)?),
            12 => Self::PendingPayouts,
            13 => Self::Payment(read_string(reader, TX_HASH_LENGTH)?),
            14 => Self::Settings,
            15 => Self::Notifications(Address::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Profile(_)
                | Self::ActiveGame(_)
                | Self::PlayerTrophies(_)
                | Self::WalletScatterWins(_)
                | Self::Notifications(_) => Address::SIZE,
                Self::Game(_)
                | Self::ScatterWin(_)
                | Self::NftSaleRequest(_)
                | Self::ManualPayout(_) => UUID_SIZE,
                Self::Trophy(_) => u8::SIZE,
                Self::LeaderboardPeriod(_) => u64::SIZE,
                Self::PeriodWinnings(_, _) => u64::SIZE + Address::SIZE,
                Self::Payment(tx_hash) => string_encode_size(tx_hash),
                Self::LeaderboardCursor | Self::PendingPayouts | Self::Settings => 0,
            }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    Profile(PlayerProfile),
    Game(Game),
    ActiveGame(Uuid),
    Trophy(Trophy),
    PlayerTrophies(Vec<PlayerTrophy>),
    /// Id of the current leaderboard period.
    LeaderboardCursor(u64),
    LeaderboardPeriod(LeaderboardPeriod),
    PeriodWinnings(u64),
    ScatterWin(ScatterWin),
    ScatterWinIds(Vec<Uuid>),
    NftSaleRequest(NftSaleRequest),
    ManualPayout(ManualPayout),
    PendingPayouts(Vec<PayoutRef>),
    Payment(PendingGamePayment),
    Settings(GameSettings),
    Notifications(Vec<Notification>),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Profile(profile) => {
                0u8.write(writer);
                profile.write(writer);
            }
            Self::Game(game) => {
                1u8.write(writer);
                game.write(writer);
            }
            Self::ActiveGame(id) => {
                2u8.write(writer);
                write_uuid(id, writer);
            }
            Self::Trophy(trophy) => {
                3u8.write(writer);
                trophy.write(writer);
            }
            Self::PlayerTrophies(trophies) => {
                4u8.write(writer);
                trophies.write(writer);
            }
            Self::LeaderboardCursor(id) => {
                5u8.write(writer);
                id.write(writer);
            }
            Self::LeaderboardPeriod(period) => {
                6u8.write(writer);
                period.write(writer);
            }
            Self::PeriodWinnings(amount) => {
                7u8.write(writer);
                amount.write(writer);
            }
            Self::ScatterWin(win) => {
                8u8.write(writer);
                win.write(writer);
            }
            Self::ScatterWinIds(ids) => {
                9u8.write(writer);
                write_uuids(ids, writer);
            }
            Self::NftSaleRequest(request) => {
                10u8.write(writer);
                request.write(writer);
            }
            Self::ManualPayout(payout) => {
                11u8.write(writer);
                payout.write(writer);
            }
            Self::PendingPayouts(queue) => {
                12u8.write(writer);
                queue.write(writer);
            }
            Self::Payment(payment) => {
                13u8.write(writer);
                payment.write(writer);
            }
            Self::Settings(settings) => {
                14u8.write(writer);
                settings.write(writer);
            }
            Self::Notifications(notifications) => {
                15u8.write(writer);
                notifications.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = match u8::read(reader)? {
            0 => Self::Profile(PlayerProfile::read(reader)?),
            1 => Self::Game(Game::read(reader)?),
            2 => Self::ActiveGame(read_uuid(reader)?),
            3 => Self::Trophy(Trophy::read(reader)?),
            4 => Self::PlayerTrophies(Vec::<PlayerTrophy>::read_range(reader, 0..=LEVEL_COUNT)?),
            5 => Self::LeaderboardCursor(u64::read(reader)?),
            6 => Self::LeaderboardPeriod(LeaderboardPeriod::read(reader)?),
            7 => Self::PeriodWinnings(u64::read(reader)?),
            8 => Self::ScatterWin(ScatterWin::read(reader)?),
            9 => Self::ScatterWinIds(read_uuids(reader, MAX_INDEX_LENGTH)?),
            10 => Self::NftSaleRequest(NftSaleRequest::read(reader)?),
            11 => Self::ManualPayout(ManualPayout::read(reader)?),
            12 => Self::PendingPayouts(Vec::<PayoutRef>::read_range(
                reader,
                0..=MAX_INDEX_LENGTH,
            )?),
            13 => Self::Payment(PendingGamePayment::read(reader)?),
            14 => Self::Settings(GameSettings::read(reader)?),
            15 => Self::Notifications(Vec::<Notification>::read_range(
                reader,
                0..=MAX_NOTIFICATIONS,
            )?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(value)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Profile(profile) => profile.encode_size(),
                Self::Game(game) => game.encode_size(),
                Self::ActiveGame(_) => UUID_SIZE,
                Self::Trophy(trophy) => trophy.encode_size(),
                Self::PlayerTrophies(trophies) => trophies.encode_size(),
                Self::LeaderboardCursor(id) => id.encode_size(),
                Self::LeaderboardPeriod(period) => period.encode_size(),
                Self::PeriodWinnings(amount) => amount.encode_size(),
                Self::ScatterWin(win) => win.encode_size(),
                Self::ScatterWinIds(ids) => uuids_encode_size(ids),
                Self::NftSaleRequest(request) => request.encode_size(),
                Self::ManualPayout(payout) => payout.encode_size(),
                Self::PendingPayouts(queue) => queue.encode_size(),
                Self::Payment(payment) => payment.encode_size(),
                Self::Settings(settings) => settings.encode_size(),
                Self::Notifications(notifications) => notifications.encode_size(),
            }
    }
}

/// Outcome of applying an instruction, streamed to subscribers as JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    GameCreated {
        game_id: Uuid,
        wallet: Address,
        player_case: u8,
        /// Hex SHA-256 of the server seed.
        commitment: String,
    },
    CaseOpened {
        game_id: Uuid,
        wallet: Address,
        case_number: u8,
        value: u64,
        round: u8,
        cases_left_in_round: u8,
    },
    BankerOffer {
        game_id: Uuid,
        wallet: Address,
        round: u8,
        amount: u64,
    },
    DealAccepted {
        game_id: Uuid,
        wallet: Address,
        amount: u64,
    },
    DealRefused {
        game_id: Uuid,
        wallet: Address,
        round: u8,
        refusals: u8,
    },
    AwaitingFinalDecision {
        game_id: Uuid,
        wallet: Address,
        remaining_case: u8,
    },
    GameCompleted {
        game_id: Uuid,
        wallet: Address,
        status: GameStatus,
        final_winnings: u64,
        player_case_value: u64,
        /// Hex server seed, revealed now that the game is over.
        server_seed: String,
    },
    XpAwarded {
        wallet: Address,
        game_id: Uuid,
        amount: u64,
        total_xp: u64,
        level: u8,
        completed_level: Option<u8>,
    },
    TrophyUnlocked {
        wallet: Address,
        level: u8,
        god: String,
    },
    ScatterTriggered {
        wallet: Address,
        scatter_id: Uuid,
        amount: u64,
        streak: u8,
    },
    PaymentRecorded {
        wallet: Address,
        tx_hash: String,
        status: PaymentStatus,
    },
    ContinuePastNineSet {
        wallet: Address,
        enabled: bool,
    },
    LevelSet {
        wallet: Address,
        level: u8,
        total_xp: u64,
    },
    ProfilesMerged {
        primary: Address,
        merged: Vec<Address>,
        total_xp: u64,
    },
    PeriodOpened {
        period_id: u64,
        start_ms: u64,
        end_ms: u64,
    },
    PeriodClosed {
        period_id: u64,
        standings: Vec<LeaderboardEntry>,
    },
    PeriodPaused {
        period_id: u64,
        paused_at_ms: u64,
    },
    PeriodResumed {
        period_id: u64,
        end_ms: u64,
    },
    TrophyUpdated {
        level: u8,
    },
    PayoutCreated {
        kind: PayoutKind,
        id: Uuid,
        wallet: Address,
        /// Satoshis for [PayoutKind::NftSale] (the trophy's BTC price), cents
        /// for every other kind.
        amount: u64,
    },
    PayoutResolved {
        kind: PayoutKind,
        id: Uuid,
        wallet: Address,
        status: PayoutStatus,
    },
    SettingsUpdated {
        settings: GameSettings,
    },
    Error {
        wallet: Option<Address>,
        game_id: Option<Uuid>,
        error_code: u8,
        message: String,
    },
}

impl Event {
    /// Wallet the event concerns, if any. Events without one are public.
    pub fn wallet(&self) -> Option<&Address> {
        match self {
            Self::GameCreated { wallet, .. }
            | Self::CaseOpened { wallet, .. }
            | Self::BankerOffer { wallet, .. }
            | Self::DealAccepted { wallet, .. }
            | Self::DealRefused { wallet, .. }
            | Self::AwaitingFinalDecision { wallet, .. }
            | Self::GameCompleted { wallet, .. }
            | Self::XpAwarded { wallet, .. }
            | Self::TrophyUnlocked { wallet, .. }
            | Self::ScatterTriggered { wallet, .. }
            | Self::PaymentRecorded { wallet, .. }
            | Self::ContinuePastNineSet { wallet, .. }
            | Self::LevelSet { wallet, .. }
            | Self::PayoutCreated { wallet, .. }
            | Self::PayoutResolved { wallet, .. } => Some(wallet),
            Self::ProfilesMerged { primary, .. } => Some(primary),
            Self::Error { wallet, .. } => wallet.as_ref(),
            Self::PeriodOpened { .. }
            | Self::PeriodClosed { .. }
            | Self::PeriodPaused { .. }
            | Self::PeriodResumed { .. }
            | Self::TrophyUpdated { .. }
            | Self::SettingsUpdated { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};

    #[test]
    fn test_key_codec() {
        let wallet = Address::new([4; 20]);
        let keys = [
            Key::Profile(wallet),
            Key::Game(Uuid::from_u128(1)),
            Key::PeriodWinnings(3, wallet),
            Key::Payment(format!("0x{}", "01".repeat(32))),
            Key::LeaderboardCursor,
        ];
        for key in keys {
            let encoded = key.encode();
            assert_eq!(encoded.len(), key.encode_size());
            assert_eq!(Key::decode(encoded).unwrap(), key);
        }
    }

    #[test]
    fn test_value_codec() {
        let values = [
            Value::ActiveGame(Uuid::from_u128(9)),
            Value::ScatterWinIds(vec![Uuid::from_u128(1), Uuid::from_u128(2)]),
            Value::Settings(GameSettings::default()),
            Value::PendingPayouts(vec![PayoutRef {
                kind: PayoutKind::NftSale,
                id: Uuid::from_u128(5),
            }]),
        ];
        for value in values {
            let encoded = value.encode();
            assert_eq!(encoded.len(), value.encode_size());
            assert_eq!(Value::decode(encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_unknown_tags_rejected() {
        assert!(matches!(
            Key::decode(&[200u8][..]),
            Err(Error::InvalidEnum(200))
        ));
        assert!(matches!(
            Value::decode(&[99u8][..]),
            Err(Error::InvalidEnum(99))
        ));
    }

    #[test]
    fn test_event_json() {
        let wallet = Address::new([1; 20]);
        let event = Event::BankerOffer {
            game_id: Uuid::from_u128(2),
            wallet,
            round: 0,
            amount: 12_345,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "banker_offer");
        assert_eq!(json["amount"], 12_345);
        assert_eq!(json["wallet"], wallet.to_string());
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.wallet(), Some(&wallet));

        let public = Event::TrophyUpdated { level: 3 };
        assert!(public.wallet().is_none());
    }
}
