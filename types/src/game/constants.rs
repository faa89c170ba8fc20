use crate::Address;

/// Cents per dollar. Every amount in the game is held in cents.
pub const CENTS_PER_DOLLAR: u64 = 100;

/// Number of briefcases on the board.
pub const CASE_COUNT: usize = 26;

/// Briefcase values in cents, ascending ($0.01 to $1,000,000).
pub const CASE_VALUES: [u64; CASE_COUNT] = [
    1,
    100,
    500,
    1_000,
    2_500,
    5_000,
    7_500,
    10_000,
    20_000,
    30_000,
    40_000,
    50_000,
    75_000,
    100_000,
    500_000,
    1_000_000,
    2_500_000,
    5_000_000,
    7_500_000,
    10_000_000,
    20_000_000,
    30_000_000,
    40_000_000,
    50_000_000,
    75_000_000,
    100_000_000,
];

/// Cases to open in each round before the banker calls.
pub const ROUND_SCHEDULE: [u8; 9] = [6, 5, 4, 3, 2, 1, 1, 1, 1];

/// Number of banker rounds.
pub const ROUND_COUNT: usize = ROUND_SCHEDULE.len();

/// Largest case value. Scatter streaks count games won at exactly this amount.
pub const TOP_PRIZE: u64 = CASE_VALUES[CASE_COUNT - 1];

/// Banker offer factor at the first call, in basis points.
pub const BANKER_BASE_BPS: u64 = 1_000;

/// Banker factor growth spread over all rounds, in basis points.
pub const BANKER_GROWTH_BPS: u64 = 7_500;

/// Ceiling on the banker factor, in basis points.
pub const BANKER_MAX_BPS: u64 = 8_500;

pub const BPS_DENOMINATOR: u64 = 10_000;

/// XP granted per refused banker offer.
pub const REFUSAL_XP: u64 = 100;

/// XP granted per refused banker offer once the player continues past level 9.
pub const REFUSAL_XP_PAST_NINE: u64 = 25;

/// Completed tier a player must reach before opting to continue past level 9.
pub const CONTINUE_PAST_LEVEL: u8 = 9;

/// Leaderboard periods run for 30 days.
pub const LEADERBOARD_PERIOD_MS: u64 = 30 * 24 * 60 * 60 * 1_000;

/// Entries kept in a period's standings.
pub const LEADERBOARD_SIZE: usize = 10;

/// Share of the period pool paid to ranks 1, 2 and 3, in basis points.
pub const PERIOD_PAYOUT_BPS: [u64; 3] = [5_000, 3_000, 2_000];

/// Binance Smart Chain mainnet.
pub const BSC_CHAIN_ID: u64 = 56;

/// BEP-20 token accepted for entry fees (BSC-USD).
pub const PAYMENT_TOKEN: Address = Address::new([
    0x55, 0xd3, 0x98, 0x32, 0x6f, 0x99, 0x05, 0x9f, 0xf7, 0x75, 0x48, 0x52, 0x46, 0x99, 0x90, 0x27,
    0xb3, 0x19, 0x79, 0x55,
]);

/// Decimals of [PAYMENT_TOKEN].
pub const PAYMENT_TOKEN_DECIMALS: u32 = 18;

/// `keccak256("Transfer(address,address,uint256)")`.
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Maximum length of free-form text (reasons, messages, urls).
pub const MAX_TEXT_LENGTH: usize = 512;

/// Maximum length of a transaction hash string (`0x` + 64 hex).
pub const TX_HASH_LENGTH: usize = 66;

/// Notifications kept per wallet.
pub const MAX_NOTIFICATIONS: usize = 50;

/// Upper bound on ids held in an index value (the payout queue and a
/// wallet's scatter wins). Writers refuse to grow an index past it.
pub const MAX_INDEX_LENGTH: usize = 4_096;

/// Upper bound on wallets folded in a single merge.
pub const MAX_MERGE_WALLETS: usize = 16;

/// Upper bound on wallets a profile records as merged into it, over all merges.
pub const MAX_MERGED_WALLETS: usize = MAX_MERGE_WALLETS * 4;

/// Error codes for Error events
pub const ERROR_PROFILE_NOT_FOUND: u8 = 1;
pub const ERROR_GAME_NOT_FOUND: u8 = 2;
pub const ERROR_GAME_NOT_OWNED: u8 = 3;
pub const ERROR_ACTIVE_GAME_EXISTS: u8 = 4;
pub const ERROR_INVALID_CASE: u8 = 5;
pub const ERROR_CASE_ALREADY_OPENED: u8 = 6;
pub const ERROR_OFFER_PENDING: u8 = 7;
pub const ERROR_NO_OFFER_PENDING: u8 = 8;
pub const ERROR_OFFER_MISMATCH: u8 = 9;
pub const ERROR_GAME_FINISHED: u8 = 10;
pub const ERROR_FINAL_DECISION_REQUIRED: u8 = 11;
pub const ERROR_NOT_AWAITING_FINAL: u8 = 12;
pub const ERROR_GAME_NOT_FINISHED: u8 = 13;
pub const ERROR_WINNINGS_MISMATCH: u8 = 14;
pub const ERROR_PAYMENT_NOT_FOUND: u8 = 15;
pub const ERROR_PAYMENT_NOT_CONFIRMED: u8 = 16;
pub const ERROR_PAYMENT_CONSUMED: u8 = 17;
pub const ERROR_PAYMENT_EXISTS: u8 = 18;
pub const ERROR_PAYMENT_NOT_OWNED: u8 = 19;
pub const ERROR_INVALID_LEVEL: u8 = 20;
pub const ERROR_NOTHING_TO_MERGE: u8 = 21;
pub const ERROR_PERIOD_NOT_FOUND: u8 = 22;
pub const ERROR_PERIOD_STATE: u8 = 23;
pub const ERROR_TROPHY_NOT_OWNED: u8 = 24;
pub const ERROR_SALE_PENDING: u8 = 25;
pub const ERROR_PAYOUT_NOT_FOUND: u8 = 26;
pub const ERROR_PAYOUT_RESOLVED: u8 = 27;
pub const ERROR_INVALID_AMOUNT: u8 = 28;
pub const ERROR_INVALID_SETTINGS: u8 = 29;
pub const ERROR_LIMIT_REACHED: u8 = 30;
