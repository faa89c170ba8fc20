//! Deal or No Deal round state machine.
//!
//! A game starts with the player holding one of 26 cases. Each round the
//! player opens the number of cases the round schedule asks for, after which
//! the banker makes an offer. Accepting ends the game at the offer; refusing
//! moves to the next round. Once every offer is refused the player keeps their
//! case or swaps it for the last closed one.
//!
//! The case layout is a Fisher-Yates shuffle driven by a SHA-256 hash chain
//! over the game's server seed. The seed's hash is published when the game is
//! created and the seed itself once it ends, so players can recompute the
//! layout.

pub mod banker;
pub mod scatter;

use commonware_cryptography::{sha256::Sha256, Hasher};
use dond_types::{
    game::{
        BankerOffer, FinalChoice, Game, GameStatus, OfferResponse, CASE_COUNT, CASE_VALUES,
        ERROR_CASE_ALREADY_OPENED, ERROR_FINAL_DECISION_REQUIRED, ERROR_GAME_FINISHED,
        ERROR_GAME_NOT_FINISHED, ERROR_INVALID_CASE, ERROR_NOT_AWAITING_FINAL,
        ERROR_NO_OFFER_PENDING, ERROR_OFFER_MISMATCH, ERROR_OFFER_PENDING,
        ERROR_WINNINGS_MISMATCH,
    },
    Address,
};
use thiserror::Error;
use uuid::Uuid;

/// Deterministic random number generator over a game's server seed.
///
/// Uses a SHA-256 hash chain so the same seed always yields the same layout.
#[derive(Clone)]
pub struct GameRng {
    state: [u8; 32],
    index: usize,
}

impl GameRng {
    pub fn new(seed: &[u8; 32]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        Self {
            state: hasher.finalize().0,
            index: 0,
        }
    }

    fn next_byte(&mut self) -> u8 {
        if self.index >= 32 {
            let mut hasher = Sha256::new();
            hasher.update(&self.state);
            self.state = hasher.finalize().0;
            self.index = 0;
        }
        let result = self.state[self.index];
        self.index += 1;
        result
    }

    pub fn next_u8(&mut self) -> u8 {
        self.next_byte()
    }

    /// Get a random value in range [0, max).
    pub fn next_bounded(&mut self, max: u8) -> u8 {
        if max == 0 {
            return 0;
        }
        // Rejection sampling keeps the draw unbiased
        let limit = u8::MAX - (u8::MAX % max);
        loop {
            let value = self.next_u8();
            if value < limit {
                return value % max;
            }
        }
    }

    /// Shuffle a slice in place using Fisher-Yates.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_bounded((i + 1) as u8) as usize;
            slice.swap(i, j);
        }
    }
}

/// SHA-256 of a server seed, published before any case is opened.
pub fn commitment(server_seed: &[u8; 32]) -> [u8; 32] {
    Sha256::hash(server_seed).0
}

/// Case values in case-number order for a server seed.
pub fn case_layout(server_seed: &[u8; 32]) -> Vec<u64> {
    let mut rng = GameRng::new(server_seed);
    let mut cases = CASE_VALUES.to_vec();
    rng.shuffle(&mut cases);
    cases
}

/// Result of advancing a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Case opened, more cases to open this round.
    Opened { value: u64 },
    /// Case opened and the round quota met; the banker is calling.
    Offer { value: u64, offer: u64 },
    /// Offer refused, the next round starts.
    Refused,
    /// Last offer refused; only the keep-or-swap decision remains.
    AwaitingFinal { remaining_case: u8 },
    /// Game over.
    Finished { winnings: u64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("case {0} is not on the board")]
    InvalidCase(u8),
    #[error("case {0} is the player's case")]
    PlayersCase(u8),
    #[error("case {0} is already open")]
    CaseAlreadyOpened(u8),
    #[error("the banker is waiting for an answer")]
    OfferPending,
    #[error("there is no banker offer to answer")]
    NoOfferPending,
    #[error("offer {presented} does not match the banker's offer of {expected}")]
    OfferMismatch { expected: u64, presented: u64 },
    #[error("game is already finished")]
    GameFinished,
    #[error("every offer was refused; keep or swap the case")]
    FinalDecisionRequired,
    #[error("game is not waiting for a final decision")]
    NotAwaitingFinal,
    #[error("game is still in progress")]
    GameNotFinished,
    #[error("claimed winnings {claimed} do not match recorded {recorded:?}")]
    WinningsMismatch { claimed: u64, recorded: Option<u64> },
}

impl GameError {
    pub fn code(&self) -> u8 {
        match self {
            Self::InvalidCase(_) | Self::PlayersCase(_) => ERROR_INVALID_CASE,
            Self::CaseAlreadyOpened(_) => ERROR_CASE_ALREADY_OPENED,
            Self::OfferPending => ERROR_OFFER_PENDING,
            Self::NoOfferPending => ERROR_NO_OFFER_PENDING,
            Self::OfferMismatch { .. } => ERROR_OFFER_MISMATCH,
            Self::GameFinished => ERROR_GAME_FINISHED,
            Self::FinalDecisionRequired => ERROR_FINAL_DECISION_REQUIRED,
            Self::NotAwaitingFinal => ERROR_NOT_AWAITING_FINAL,
            Self::GameNotFinished => ERROR_GAME_NOT_FINISHED,
            Self::WinningsMismatch { .. } => ERROR_WINNINGS_MISMATCH,
        }
    }
}

fn check_case_number(case_number: u8) -> Result<(), GameError> {
    if case_number == 0 || case_number as usize > CASE_COUNT {
        return Err(GameError::InvalidCase(case_number));
    }
    Ok(())
}

/// Start a game with the player holding `player_case`.
pub fn new_game(
    id: Uuid,
    wallet: Address,
    player_case: u8,
    server_seed: [u8; 32],
    payment_tx: String,
    now_ms: u64,
) -> Result<Game, GameError> {
    check_case_number(player_case)?;
    Ok(Game {
        id,
        wallet,
        player_case,
        cases: case_layout(&server_seed),
        opened_cases: Vec::new(),
        offers: Vec::new(),
        round: 0,
        refusals: 0,
        final_choice: None,
        final_winnings: None,
        status: GameStatus::Active,
        commitment: commitment(&server_seed),
        server_seed,
        payment_tx,
        created_at_ms: now_ms,
        finished_at_ms: None,
    })
}

fn check_playable(game: &Game) -> Result<(), GameError> {
    if game.is_finished() {
        return Err(GameError::GameFinished);
    }
    if game.awaiting_final_decision() {
        return Err(GameError::FinalDecisionRequired);
    }
    Ok(())
}

pub fn open_case(game: &mut Game, case_number: u8) -> Result<Outcome, GameError> {
    check_playable(game)?;
    if game.pending_offer().is_some() {
        return Err(GameError::OfferPending);
    }
    check_case_number(case_number)?;
    if case_number == game.player_case {
        return Err(GameError::PlayersCase(case_number));
    }
    if game.is_opened(case_number) {
        return Err(GameError::CaseAlreadyOpened(case_number));
    }
    let value = game
        .case_value(case_number)
        .ok_or(GameError::InvalidCase(case_number))?;
    game.opened_cases.push(case_number);

    if game.cases_left_in_round() > 0 {
        return Ok(Outcome::Opened { value });
    }

    let offer = banker::offer(&game.remaining_values(), game.round as usize + 1);
    game.offers.push(BankerOffer {
        round: game.round,
        amount: offer,
        response: OfferResponse::Pending,
    });
    Ok(Outcome::Offer { value, offer })
}

fn finish(game: &mut Game, status: GameStatus, winnings: u64, now_ms: u64) -> Outcome {
    game.status = status;
    game.final_winnings = Some(winnings);
    game.finished_at_ms = Some(now_ms);
    Outcome::Finished { winnings }
}

/// Accept the pending offer. `presented` is the amount the player saw.
pub fn accept_deal(game: &mut Game, presented: u64, now_ms: u64) -> Result<Outcome, GameError> {
    check_playable(game)?;
    let expected = game
        .pending_offer()
        .map(|offer| offer.amount)
        .ok_or(GameError::NoOfferPending)?;
    if expected != presented {
        return Err(GameError::OfferMismatch {
            expected,
            presented,
        });
    }
    if let Some(offer) = game.offers.last_mut() {
        offer.response = OfferResponse::Accepted;
    }
    Ok(finish(game, GameStatus::DealAccepted, expected, now_ms))
}

pub fn refuse_deal(game: &mut Game) -> Result<Outcome, GameError> {
    check_playable(game)?;
    if game.pending_offer().is_none() {
        return Err(GameError::NoOfferPending);
    }
    if let Some(offer) = game.offers.last_mut() {
        offer.response = OfferResponse::Refused;
    }
    game.refusals = game.refusals.saturating_add(1);
    game.round += 1;

    if game.awaiting_final_decision() {
        let remaining_case = game
            .closed_cases()
            .first()
            .copied()
            .ok_or(GameError::NotAwaitingFinal)?;
        return Ok(Outcome::AwaitingFinal { remaining_case });
    }
    Ok(Outcome::Refused)
}

/// Keep the player's case or swap it for the last closed case.
pub fn final_decision(game: &mut Game, swap: bool, now_ms: u64) -> Result<Outcome, GameError> {
    if game.is_finished() {
        return Err(GameError::GameFinished);
    }
    if !game.awaiting_final_decision() {
        return Err(GameError::NotAwaitingFinal);
    }
    let chosen = if swap {
        game.closed_cases()
            .first()
            .copied()
            .ok_or(GameError::NotAwaitingFinal)?
    } else {
        game.player_case
    };
    let winnings = game
        .case_value(chosen)
        .ok_or(GameError::InvalidCase(chosen))?;
    game.final_choice = Some(if swap {
        FinalChoice::Swap
    } else {
        FinalChoice::Keep
    });
    Ok(finish(game, GameStatus::Completed, winnings, now_ms))
}

/// Confirm a claimed amount matches what the finished game recorded.
pub fn validate_final_winnings(game: &Game, claimed: u64) -> Result<(), GameError> {
    if !game.is_finished() {
        return Err(GameError::GameNotFinished);
    }
    if game.final_winnings != Some(claimed) {
        return Err(GameError::WinningsMismatch {
            claimed,
            recorded: game.final_winnings,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dond_types::game::{ROUND_COUNT, ROUND_SCHEDULE};

    const SEED: [u8; 32] = [7; 32];

    fn start(player_case: u8) -> Game {
        new_game(
            Uuid::from_u128(1),
            Address::new([1; 20]),
            player_case,
            SEED,
            String::new(),
            0,
        )
        .unwrap()
    }

    /// Open cases in ascending order until the banker calls.
    fn play_round(game: &mut Game) -> u64 {
        loop {
            let next = game.closed_cases()[0];
            match open_case(game, next).unwrap() {
                Outcome::Opened { .. } => continue,
                Outcome::Offer { offer, .. } => return offer,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn test_layout_is_deterministic_permutation() {
        let layout = case_layout(&SEED);
        assert_eq!(layout, case_layout(&SEED));
        assert_ne!(layout, case_layout(&[8; 32]));

        let mut sorted = layout.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, CASE_VALUES.to_vec());
    }

    #[test]
    fn test_commitment_matches_seed() {
        let game = start(5);
        assert_eq!(game.commitment, commitment(&SEED));
        assert_ne!(game.commitment, SEED);
    }

    #[test]
    fn test_next_bounded_in_range() {
        let mut rng = GameRng::new(&SEED);
        for max in 1..=26u8 {
            for _ in 0..50 {
                assert!(rng.next_bounded(max) < max);
            }
        }
        assert_eq!(rng.next_bounded(0), 0);
    }

    #[test]
    fn test_invalid_player_case() {
        for case in [0u8, 27, 255] {
            assert_eq!(
                new_game(Uuid::nil(), Address::default(), case, SEED, String::new(), 0),
                Err(GameError::InvalidCase(case))
            );
        }
    }

    #[test]
    fn test_open_case_rules() {
        let mut game = start(3);
        assert_eq!(open_case(&mut game, 3), Err(GameError::PlayersCase(3)));
        assert_eq!(open_case(&mut game, 0), Err(GameError::InvalidCase(0)));
        assert_eq!(open_case(&mut game, 27), Err(GameError::InvalidCase(27)));

        let value = game.case_value(1).unwrap();
        assert_eq!(open_case(&mut game, 1), Ok(Outcome::Opened { value }));
        assert_eq!(
            open_case(&mut game, 1),
            Err(GameError::CaseAlreadyOpened(1))
        );
        assert_eq!(game.opened_cases, vec![1]);
    }

    #[test]
    fn test_round_quota_triggers_offer() {
        let mut game = start(26);
        for case in 1..ROUND_SCHEDULE[0] {
            assert!(matches!(
                open_case(&mut game, case),
                Ok(Outcome::Opened { .. })
            ));
        }
        let outcome = open_case(&mut game, ROUND_SCHEDULE[0]).unwrap();
        let Outcome::Offer { offer, .. } = outcome else {
            panic!("expected offer, got {outcome:?}");
        };
        assert_eq!(offer, banker::offer(&game.remaining_values(), 1));
        assert_eq!(game.pending_offer().map(|o| o.amount), Some(offer));

        // No more cases until the offer is answered
        assert_eq!(open_case(&mut game, 10), Err(GameError::OfferPending));
    }

    #[test]
    fn test_accept_deal() {
        let mut game = start(26);
        assert_eq!(accept_deal(&mut game, 1, 5), Err(GameError::NoOfferPending));

        let offer = play_round(&mut game);
        assert_eq!(
            accept_deal(&mut game, offer + 1, 5),
            Err(GameError::OfferMismatch {
                expected: offer,
                presented: offer + 1
            })
        );
        assert_eq!(
            accept_deal(&mut game, offer, 5),
            Ok(Outcome::Finished { winnings: offer })
        );
        assert_eq!(game.status, GameStatus::DealAccepted);
        assert_eq!(game.final_winnings, Some(offer));
        assert_eq!(game.finished_at_ms, Some(5));
        assert_eq!(game.offers[0].response, OfferResponse::Accepted);

        // Finished games reject further moves
        assert_eq!(open_case(&mut game, 20), Err(GameError::GameFinished));
        assert_eq!(refuse_deal(&mut game), Err(GameError::GameFinished));
        assert_eq!(validate_final_winnings(&game, offer), Ok(()));
    }

    #[test]
    fn test_full_game_to_final_decision() {
        let mut game = start(13);
        for round in 0..ROUND_COUNT {
            assert_eq!(game.round as usize, round);
            play_round(&mut game);
            let outcome = refuse_deal(&mut game).unwrap();
            if round + 1 < ROUND_COUNT {
                assert_eq!(outcome, Outcome::Refused);
            } else {
                let Outcome::AwaitingFinal { remaining_case } = outcome else {
                    panic!("expected final decision, got {outcome:?}");
                };
                assert_eq!(game.closed_cases(), vec![remaining_case]);
            }
        }
        assert_eq!(game.refusals as usize, ROUND_COUNT);
        assert_eq!(game.opened_cases.len(), CASE_COUNT - 2);
        assert!(game.awaiting_final_decision());

        // Opening or refusing is no longer possible
        let last = game.closed_cases()[0];
        assert_eq!(
            open_case(&mut game, last),
            Err(GameError::FinalDecisionRequired)
        );
        assert_eq!(
            validate_final_winnings(&game, 0),
            Err(GameError::GameNotFinished)
        );

        let swapped_value = game.case_value(last).unwrap();
        assert_eq!(
            final_decision(&mut game, true, 9),
            Ok(Outcome::Finished {
                winnings: swapped_value
            })
        );
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.final_choice, Some(FinalChoice::Swap));
        assert_eq!(
            final_decision(&mut game, false, 10),
            Err(GameError::GameFinished)
        );
        assert_eq!(
            validate_final_winnings(&game, swapped_value + 1),
            Err(GameError::WinningsMismatch {
                claimed: swapped_value + 1,
                recorded: Some(swapped_value)
            })
        );
    }

    #[test]
    fn test_keep_pays_player_case() {
        let mut game = start(2);
        for _ in 0..ROUND_COUNT {
            play_round(&mut game);
            refuse_deal(&mut game).unwrap();
        }
        let kept = game.player_case_value().unwrap();
        assert_eq!(
            final_decision(&mut game, false, 1),
            Ok(Outcome::Finished { winnings: kept })
        );
        assert_eq!(game.final_choice, Some(FinalChoice::Keep));
    }

    #[test]
    fn test_final_decision_requires_all_refusals() {
        let mut game = start(2);
        assert_eq!(
            final_decision(&mut game, false, 1),
            Err(GameError::NotAwaitingFinal)
        );
    }

    #[test]
    fn test_opened_cases_only_grow() {
        let mut game = start(1);
        let mut previous = 0;
        for _ in 0..ROUND_COUNT {
            play_round(&mut game);
            assert!(game.opened_cases.len() > previous);
            previous = game.opened_cases.len();
            refuse_deal(&mut game).unwrap();
            assert_eq!(game.opened_cases.len(), previous);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(GameError::PlayersCase(1).code(), ERROR_INVALID_CASE);
        assert_eq!(
            GameError::OfferMismatch {
                expected: 1,
                presented: 2
            }
            .code(),
            ERROR_OFFER_MISMATCH
        );
    }
}
