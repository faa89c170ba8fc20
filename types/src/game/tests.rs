use super::*;
use crate::Address;
use commonware_codec::{DecodeExt, Encode, EncodeSize, ReadExt};
use uuid::Uuid;

fn wallet(byte: u8) -> Address {
    Address::new([byte; 20])
}

fn sample_game() -> Game {
    Game {
        id: Uuid::from_u128(7),
        wallet: wallet(1),
        player_case: 13,
        cases: CASE_VALUES.to_vec(),
        opened_cases: vec![1, 2, 3],
        offers: vec![],
        round: 0,
        refusals: 0,
        final_choice: None,
        final_winnings: None,
        status: GameStatus::Active,
        server_seed: [9; 32],
        commitment: [8; 32],
        payment_tx: format!("0x{}", "ab".repeat(32)),
        created_at_ms: 1_000,
        finished_at_ms: None,
    }
}

#[test]
fn test_case_values() {
    assert_eq!(CASE_VALUES.len(), CASE_COUNT);
    assert!(CASE_VALUES.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(CASE_VALUES[0], 1);
    assert_eq!(TOP_PRIZE, 1_000_000 * CENTS_PER_DOLLAR);

    // Two cases remain once every round is played
    let opened: usize = ROUND_SCHEDULE.iter().map(|n| *n as usize).sum();
    assert_eq!(CASE_COUNT - opened, 2);
}

#[test]
fn test_game_round_accounting() {
    let mut game = sample_game();
    assert_eq!(game.opened_this_round(), 3);
    assert_eq!(game.cases_left_in_round(), 3);
    assert_eq!(game.closed_cases().len(), CASE_COUNT - 4);
    assert_eq!(game.remaining_values().len(), CASE_COUNT - 3);
    assert_eq!(game.player_case_value(), Some(CASE_VALUES[12]));
    assert_eq!(game.case_value(0), None);
    assert_eq!(game.case_value(27), None);

    game.opened_cases.extend([4, 5, 6]);
    game.offers.push(BankerOffer {
        round: 0,
        amount: 500,
        response: OfferResponse::Pending,
    });
    assert_eq!(game.pending_offer().map(|o| o.amount), Some(500));
    assert_eq!(game.cases_left_in_round(), 0);

    game.offers[0].response = OfferResponse::Refused;
    game.round = 1;
    assert!(game.pending_offer().is_none());
    assert_eq!(game.opened_this_round(), 0);
    assert_eq!(game.cases_left_in_round(), 5);
    assert!(!game.awaiting_final_decision());

    game.round = ROUND_COUNT as u8;
    assert!(game.awaiting_final_decision());
}

#[test]
fn test_game_codec() {
    let mut game = sample_game();
    game.offers.push(BankerOffer {
        round: 0,
        amount: 1_234,
        response: OfferResponse::Refused,
    });
    game.final_winnings = Some(42);
    game.final_choice = Some(FinalChoice::Swap);
    let encoded = game.encode();
    assert_eq!(encoded.len(), game.encode_size());
    assert_eq!(Game::decode(encoded).unwrap(), game);
}

#[test]
fn test_truncated_game_rejected() {
    let encoded = sample_game().encode();
    let truncated = &encoded[..encoded.len() - 3];
    assert!(Game::read(&mut &truncated[..]).is_err());
}

#[test]
fn test_invalid_status_tag() {
    assert!(matches!(
        GameStatus::read(&mut &[9u8][..]),
        Err(commonware_codec::Error::InvalidEnum(9))
    ));
}

#[test]
fn test_profile_set_xp() {
    let mut profile = PlayerProfile::new(wallet(2), 5);
    profile.set_xp(9_000);
    assert_eq!(profile.completed_level, None);
    assert_eq!(profile.god_name, "");

    profile.set_xp(25_001);
    assert_eq!(profile.completed_level, Some(1));
    assert_eq!(profile.god_name, LEVELS[1].god);

    profile.merged_wallets.push(wallet(3));
    let encoded = profile.encode();
    assert_eq!(PlayerProfile::decode(encoded).unwrap(), profile);
}

#[test]
fn test_standings_update() {
    let mut standings = Standings::default();
    for i in 0..15u8 {
        standings.update(wallet(i), (i as u64 + 1) * 1_000);
    }

    // Only the top entries are kept, sorted descending and ranked from 1
    assert_eq!(standings.entries.len(), LEADERBOARD_SIZE);
    assert_eq!(standings.entries[0].wallet, wallet(14));
    for pair in standings.entries.windows(2) {
        assert!(pair[0].winnings >= pair[1].winnings);
    }
    for (i, entry) in standings.entries.iter().enumerate() {
        assert_eq!(entry.rank, (i + 1) as u32);
    }

    // Updating an existing wallet moves it rather than duplicating it
    standings.update(wallet(5), 100_000);
    assert_eq!(standings.entries[0].wallet, wallet(5));
    assert_eq!(standings.entries.len(), LEADERBOARD_SIZE);
    assert_eq!(
        standings
            .entries
            .iter()
            .filter(|e| e.wallet == wallet(5))
            .count(),
        1
    );

    // A total that does not beat the last entry is ignored when full
    standings.update(wallet(99), 1);
    assert!(standings.get(&wallet(99)).is_none());
}

#[test]
fn test_standings_ties_keep_first_entrant() {
    let mut standings = Standings::default();
    standings.update(wallet(1), 500);
    standings.update(wallet(2), 500);
    assert_eq!(standings.entries[0].wallet, wallet(1));
    assert_eq!(standings.entries[1].wallet, wallet(2));
}

#[test]
fn test_podium_payouts() {
    let mut period = LeaderboardPeriod::new(1, 0, LEADERBOARD_PERIOD_MS, 100_000);
    assert_eq!(period.end_ms, LEADERBOARD_PERIOD_MS);
    assert!(period.podium_payouts().is_empty());

    period.standings.update(wallet(1), 300);
    period.standings.update(wallet(2), 200);
    period.standings.update(wallet(3), 100);
    period.standings.update(wallet(4), 50);
    assert_eq!(
        period.podium_payouts(),
        vec![(wallet(1), 50_000), (wallet(2), 30_000), (wallet(3), 20_000)]
    );

    period.payouts.push(Uuid::from_u128(1));
    let encoded = period.encode();
    assert_eq!(LeaderboardPeriod::decode(encoded).unwrap(), period);
}

#[test]
fn test_podium_payouts_full_pool() {
    let mut period = LeaderboardPeriod::new(1, 0, LEADERBOARD_PERIOD_MS, u64::MAX);
    period.standings.update(wallet(1), 300);
    period.standings.update(wallet(2), 200);
    period.standings.update(wallet(3), 100);

    let payouts = period.podium_payouts();
    assert_eq!(payouts.len(), 3);
    assert_eq!(payouts[0], (wallet(1), u64::MAX / 2));
    let total: u128 = payouts.iter().map(|(_, amount)| *amount as u128).sum();
    assert!(total <= u64::MAX as u128);
}

#[test]
fn test_standings_remove() {
    let mut standings = Standings::default();
    standings.update(wallet(1), 300);
    standings.update(wallet(2), 200);
    standings.update(wallet(3), 100);

    standings.remove(&wallet(1));
    assert!(standings.get(&wallet(1)).is_none());
    assert_eq!(standings.entries[0].wallet, wallet(2));
    assert_eq!(standings.entries[0].rank, 1);
    assert_eq!(standings.entries[1].rank, 2);

    // Removing an absent wallet changes nothing
    standings.remove(&wallet(9));
    assert_eq!(standings.entries.len(), 2);
}

#[test]
fn test_merged_wallets_cap() {
    let mut profile = PlayerProfile::new(wallet(1), 0);
    profile.merged_wallets = (0..MAX_MERGED_WALLETS).map(|i| wallet(i as u8)).collect();
    let encoded = profile.encode();
    assert_eq!(PlayerProfile::decode(encoded).unwrap(), profile);

    profile.merged_wallets.push(wallet(200));
    assert!(PlayerProfile::decode(profile.encode()).is_err());
}

#[test]
fn test_normalize_tx_hash() {
    let lower = format!("0x{}", "ab".repeat(32));
    assert_eq!(
        normalize_tx_hash(&format!("0X{}", "AB".repeat(32))),
        Some(lower.clone())
    );
    assert_eq!(normalize_tx_hash(&lower), Some(lower));
    assert_eq!(normalize_tx_hash(&"ab".repeat(32)), None);
    assert_eq!(normalize_tx_hash("0x1234"), None);
    assert_eq!(normalize_tx_hash(&format!("0x{}", "zz".repeat(32))), None);
}

#[test]
fn test_trophy_placeholder() {
    let trophy = Trophy::placeholder(13).unwrap();
    assert_eq!(trophy.god, "Zeus");
    assert_eq!(trophy.btc_price_sats, 14 * SATS_PER_BTC / 100);
    assert!(Trophy::placeholder(14).is_none());
}

#[test]
fn test_payout_records_codec() {
    let payout = ManualPayout {
        id: Uuid::from_u128(3),
        wallet: wallet(4),
        amount: 2_500,
        reason: "Leaderboard period 1 rank 2".to_string(),
        status: PayoutStatus::Pending,
        created_at_ms: 10,
        resolved_at_ms: None,
    };
    assert_eq!(ManualPayout::decode(payout.encode()).unwrap(), payout);

    let payment = PendingGamePayment {
        tx_hash: format!("0x{}", "cd".repeat(32)),
        wallet: wallet(4),
        amount: 1_000,
        status: PaymentStatus::Confirmed,
        reason: String::new(),
        game_id: Some(Uuid::from_u128(11)),
        created_at_ms: 1,
        settled_at_ms: Some(2),
    };
    assert!(payment.is_consumed());
    assert_eq!(PendingGamePayment::decode(payment.encode()).unwrap(), payment);
}
