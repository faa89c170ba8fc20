//! JSON bodies exchanged with the backend functions.

use commonware_utils::hex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    execution::Event,
    game::{
        completed_level_from_xp, completed_level_numbers, level_from_xp, xp_progress, BankerOffer,
        Game, GameStatus, LeaderboardPeriod, ManualPayout, NftSaleRequest, Notification,
        PaymentStatus, PayoutKind, PayoutRef, PendingGamePayment, PlayerProfile, PlayerTrophy,
        ScatterWin, Tier, XpProgress,
    },
    Address,
};

/// Header carrying the admin key on admin-only functions.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Path prefix of the function routes.
pub const FUNCTIONS_PREFIX: &str = "/functions/v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: u8,
    pub message: String,
}

/// Events produced by a state-changing function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub wallet: Address,
    pub player_case: u8,
    pub tx_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCaseRequest {
    pub wallet: Address,
    pub game_id: Uuid,
    pub case_number: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptDealRequest {
    pub wallet: Address,
    pub game_id: Uuid,
    /// Offer the client displayed; must equal the pending offer.
    pub offer: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectDealRequest {
    pub wallet: Address,
    pub game_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalDecisionRequest {
    pub wallet: Address,
    pub game_id: Uuid,
    pub swap: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateWinningsRequest {
    pub wallet: Address,
    pub game_id: Uuid,
    pub claimed: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateWinningsResponse {
    pub valid: bool,
    pub recorded: Option<u64>,
}

/// Response of every gameplay function: the events plus the player-visible game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResponse {
    pub game: GameView,
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPaymentRequest {
    pub wallet: Address,
    pub tx_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusRequest {
    pub tx_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub tx_hash: String,
    pub status: PaymentStatus,
    pub reason: String,
    pub game_id: Option<Uuid>,
}

impl From<&PendingGamePayment> for PaymentStatusResponse {
    fn from(payment: &PendingGamePayment) -> Self {
        Self {
            tx_hash: payment.tx_hash.clone(),
            status: payment.status,
            reason: payment.reason.clone(),
            game_id: payment.game_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRequest {
    pub wallet: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingScatterResponse {
    pub pending: Vec<ScatterWin>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuePastNineRequest {
    pub wallet: Address,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftSaleRequestBody {
    pub wallet: Address,
    pub level: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPlayerLevelRequest {
    pub wallet: Address,
    pub level: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeProfilesRequest {
    pub primary: Address,
    /// Raw wallet strings; parsed case-insensitively.
    pub duplicates: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPayoutRequest {
    pub wallet: Address,
    pub amount: u64,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvePayoutRequest {
    pub kind: PayoutKind,
    pub id: Uuid,
    pub approve: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayoutsResponse {
    pub queue: Vec<PayoutRef>,
    pub scatter: Vec<ScatterWin>,
    pub nft_sales: Vec<NftSaleRequest>,
    pub manual: Vec<ManualPayout>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedCase {
    pub case_number: u8,
    pub value: u64,
}

/// Player-visible game. The case layout and server seed stay hidden until the
/// game is over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub id: Uuid,
    pub wallet: Address,
    pub player_case: u8,
    pub opened: Vec<OpenedCase>,
    pub remaining_values: Vec<u64>,
    pub offers: Vec<BankerOffer>,
    pub round: u8,
    pub cases_left_in_round: u8,
    pub refusals: u8,
    pub awaiting_final_decision: bool,
    pub status: GameStatus,
    pub final_winnings: Option<u64>,
    pub player_case_value: Option<u64>,
    pub commitment: String,
    pub server_seed: Option<String>,
    pub created_at_ms: u64,
    pub finished_at_ms: Option<u64>,
}

impl From<&Game> for GameView {
    fn from(game: &Game) -> Self {
        let finished = game.is_finished();
        let mut remaining_values = game.remaining_values();
        remaining_values.sort_unstable();
        Self {
            id: game.id,
            wallet: game.wallet,
            player_case: game.player_case,
            opened: game
                .opened_cases
                .iter()
                .filter_map(|n| {
                    game.case_value(*n).map(|value| OpenedCase {
                        case_number: *n,
                        value,
                    })
                })
                .collect(),
            remaining_values,
            offers: game.offers.clone(),
            round: game.round,
            cases_left_in_round: game.cases_left_in_round(),
            refusals: game.refusals,
            awaiting_final_decision: game.awaiting_final_decision(),
            status: game.status,
            final_winnings: game.final_winnings,
            player_case_value: finished.then(|| game.player_case_value()).flatten(),
            commitment: hex(&game.commitment),
            server_seed: finished.then(|| hex(&game.server_seed)),
            created_at_ms: game.created_at_ms,
            finished_at_ms: game.finished_at_ms,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierView {
    pub number: u8,
    pub god: String,
    pub min_xp: u64,
}

impl From<&Tier> for TierView {
    fn from(tier: &Tier) -> Self {
        Self {
            number: tier.number,
            god: tier.god.to_string(),
            min_xp: tier.min_xp,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelResponse {
    pub xp: u64,
    pub level: TierView,
    pub completed_level: Option<TierView>,
    pub completed_levels: Vec<u8>,
    pub next: Option<TierView>,
    pub percent: f64,
    pub xp_needed: u64,
    pub target_xp: u64,
}

impl LevelResponse {
    pub fn new(xp: u64) -> Self {
        let XpProgress {
            current,
            next,
            percent,
            xp_needed,
            target_xp,
        } = xp_progress(xp);
        debug_assert_eq!(current, *level_from_xp(xp));
        Self {
            xp,
            level: TierView::from(&current),
            completed_level: completed_level_from_xp(xp).map(TierView::from),
            completed_levels: completed_level_numbers(xp),
            next: next.as_ref().map(TierView::from),
            percent,
            xp_needed,
            target_xp,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: PlayerProfile,
    pub level: LevelResponse,
    pub trophies: Vec<PlayerTrophy>,
    pub notifications: Vec<Notification>,
    pub active_game: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub period: Option<LeaderboardPeriod>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{CASE_COUNT, CASE_VALUES};

    fn game(status: GameStatus) -> Game {
        Game {
            id: Uuid::from_u128(1),
            wallet: Address::new([2; 20]),
            player_case: 26,
            cases: CASE_VALUES.to_vec(),
            opened_cases: vec![1, 25],
            offers: vec![],
            round: 0,
            refusals: 0,
            final_choice: None,
            final_winnings: None,
            status,
            server_seed: [0xaa; 32],
            commitment: [0xbb; 32],
            payment_tx: String::new(),
            created_at_ms: 0,
            finished_at_ms: None,
        }
    }

    #[test]
    fn test_game_view_hides_secrets_while_active() {
        let view = GameView::from(&game(GameStatus::Active));
        assert_eq!(view.server_seed, None);
        assert_eq!(view.player_case_value, None);
        assert_eq!(view.commitment, "bb".repeat(32));
        assert_eq!(
            view.opened,
            vec![
                OpenedCase {
                    case_number: 1,
                    value: CASE_VALUES[0]
                },
                OpenedCase {
                    case_number: 25,
                    value: CASE_VALUES[24]
                },
            ]
        );
        assert_eq!(view.remaining_values.len(), CASE_COUNT - 2);
        assert_eq!(view.cases_left_in_round, 4);

        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains(&"aa".repeat(32)));
    }

    #[test]
    fn test_game_view_reveals_when_finished() {
        let view = GameView::from(&game(GameStatus::Completed));
        assert_eq!(view.server_seed, Some("aa".repeat(32)));
        assert_eq!(view.player_case_value, Some(CASE_VALUES[25]));
    }

    #[test]
    fn test_level_response() {
        let response = LevelResponse::new(10_001);
        assert_eq!(response.level.number, 1);
        assert_eq!(response.completed_level.map(|t| t.number), Some(0));
        assert_eq!(response.completed_levels, vec![0]);
        assert_eq!(response.next.map(|t| t.number), Some(2));
    }
}
