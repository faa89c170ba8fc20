//! Helpers for driving a [Layer] through whole games in tests.

use crate::{Layer, State};
use dond_types::{
    execution::{Event, Instruction, Key, Value},
    game::{Game, TOP_PRIZE},
    Address,
};
use uuid::Uuid;

/// Deterministic test wallet.
pub fn wallet(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xab;
    bytes[19] = n;
    Address::new(bytes)
}

/// Deterministic, well-formed transaction hash.
pub fn tx_hash(n: u64) -> String {
    format!("0x{n:064x}")
}

/// Entropy for a [Layer] built in tests.
pub fn entropy(n: u8) -> [u8; 32] {
    [n; 32]
}

/// Register and confirm an entry-fee payment for `wallet`.
pub async fn fund<S: State>(layer: &mut Layer<'_, S>, wallet: &Address, n: u64) -> String {
    let tx_hash = tx_hash(n);
    layer
        .apply(&Instruction::RegisterPayment {
            wallet: *wallet,
            tx_hash: tx_hash.clone(),
        })
        .await;
    layer
        .apply(&Instruction::SettlePayment {
            tx_hash: tx_hash.clone(),
            confirmed: true,
            reason: String::new(),
        })
        .await;
    tx_hash
}

/// Fund and start a game holding `player_case`, returning its id.
pub async fn start_game<S: State>(
    layer: &mut Layer<'_, S>,
    wallet: &Address,
    n: u64,
    player_case: u8,
) -> Option<Uuid> {
    let payment_tx = fund(layer, wallet, n).await;
    let events = layer
        .apply(&Instruction::CreateGame {
            wallet: *wallet,
            player_case,
            payment_tx,
        })
        .await;
    events.iter().find_map(|event| match event {
        Event::GameCreated { game_id, .. } => Some(*game_id),
        _ => None,
    })
}

pub async fn load_game<S: State>(layer: &Layer<'_, S>, game_id: &Uuid) -> Option<Game> {
    match layer.get(&Key::Game(*game_id)).await {
        Some(Value::Game(game)) => Some(game),
        _ => None,
    }
}

/// Play every round refusing each offer, never opening the top prize,
/// then take whichever final case holds it. Returns all events emitted.
pub async fn play_for_top_prize<S: State>(
    layer: &mut Layer<'_, S>,
    wallet: &Address,
    game_id: &Uuid,
) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let Some(game) = load_game(layer, game_id).await else {
            return events;
        };
        if game.is_finished() {
            return events;
        }
        let instruction = if game.awaiting_final_decision() {
            Instruction::FinalDecision {
                wallet: *wallet,
                game_id: *game_id,
                swap: game.player_case_value() != Some(TOP_PRIZE),
            }
        } else if game.pending_offer().is_some() {
            Instruction::RefuseDeal {
                wallet: *wallet,
                game_id: *game_id,
            }
        } else {
            let Some(case_number) = game
                .closed_cases()
                .into_iter()
                .find(|case| game.case_value(*case) != Some(TOP_PRIZE))
            else {
                return events;
            };
            Instruction::OpenCase {
                wallet: *wallet,
                game_id: *game_id,
                case_number,
            }
        };
        let emitted = layer.apply(&instruction).await;
        let failed = emitted.iter().any(Event::is_error);
        events.extend(emitted);
        if failed {
            return events;
        }
    }
}
