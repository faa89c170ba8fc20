use commonware_cryptography::{sha256::Sha256, Hasher};
use dond_types::{
    execution::{Event, Instruction, Key, Value},
    game::{
        Game, GameSettings, Notification, NotificationKind, PayoutKind, PayoutRef, PlayerProfile,
        ERROR_GAME_NOT_FOUND, ERROR_GAME_NOT_OWNED, ERROR_LIMIT_REACHED, MAX_INDEX_LENGTH,
        MAX_NOTIFICATIONS, MAX_TEXT_LENGTH,
    },
    Address,
};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::state::{State, Status};

mod handlers;


/// Build an error event.
fn error_event(
    wallet: Option<Address>,
    game_id: Option<Uuid>,
    error_code: u8,
    message: impl Into<String>,
) -> Event {
    Event::Error {
        wallet,
        game_id,
        error_code,
        message: message.into(),
    }
}

/// Render cents as dollars for notification text.
fn format_cents(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// Truncate free-form text to what the codec accepts.
fn clip(text: &str) -> String {
    if text.len() <= MAX_TEXT_LENGTH {
        return text.to_string();
    }
    let mut end = MAX_TEXT_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Stages the effects of instructions over a base [State].
///
/// Nothing reaches the base state until the caller applies the changes
/// returned by [Layer::commit]. Ids and server seeds are derived from the
/// entropy supplied by the caller, so replaying the same instructions with
/// the same entropy and clock yields the same changes.
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,

    now_ms: u64,
    entropy: [u8; 32],
    draws: u64,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, now_ms: u64, entropy: [u8; 32]) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),

            now_ms,
            entropy,
            draws: 0,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    fn remove(&mut self, key: Key) {
        self.pending.insert(key, Status::Delete);
    }

    /// Fresh 32 bytes for `domain`, unique per draw.
    fn draw(&mut self, domain: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.entropy);
        hasher.update(&self.draws.to_be_bytes());
        hasher.update(domain);
        self.draws += 1;
        hasher.finalize().0
    }

    fn next_id(&mut self) -> Uuid {
        let digest = self.draw(b"id");
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }

    fn next_server_seed(&mut self) -> [u8; 32] {
        self.draw(b"server-seed")
    }

    pub async fn apply(&mut self, instruction: &Instruction) -> Vec<Event> {
        match instruction {
            Instruction::CreateGame {
                wallet,
                player_case,
                payment_tx,
            } => {
                self.handle_create_game(wallet, *player_case, payment_tx)
                    .await
            }
            Instruction::OpenCase {
                wallet,
                game_id,
                case_number,
            } => self.handle_open_case(wallet, game_id, *case_number).await,
            Instruction::AcceptDeal {
                wallet,
                game_id,
                offer,
            } => self.handle_accept_deal(wallet, game_id, *offer).await,
            Instruction::RefuseDeal { wallet, game_id } => {
                self.handle_refuse_deal(wallet, game_id).await
            }
            Instruction::FinalDecision {
                wallet,
                game_id,
                swap,
            } => self.handle_final_decision(wallet, game_id, *swap).await,
            Instruction::RegisterPayment { wallet, tx_hash } => {
                self.handle_register_payment(wallet, tx_hash).await
            }
            Instruction::SettlePayment {
                tx_hash,
                confirmed,
                reason,
            } => {
                self.handle_settle_payment(tx_hash, *confirmed, reason)
                    .await
            }
            Instruction::SetContinuePastNine { wallet, enabled } => {
                self.handle_set_continue_past_nine(wallet, *enabled).await
            }
            Instruction::RequestNftSale { wallet, level } => {
                self.handle_request_nft_sale(wallet, *level).await
            }

            // Admin
            Instruction::SetPlayerLevel { wallet, level } => {
                self.handle_set_player_level(wallet, *level).await
            }
            Instruction::MergeProfiles {
                primary,
                duplicates,
            } => self.handle_merge_profiles(primary, duplicates).await,
            Instruction::CheckLeaderboardPeriod => self.handle_check_period().await,
            Instruction::PauseLeaderboardPeriod => self.handle_pause_period().await,
            Instruction::ResumeLeaderboardPeriod => self.handle_resume_period().await,
            Instruction::UpsertTrophy(trophy) => self.handle_upsert_trophy(trophy).await,
            Instruction::CreateManualPayout {
                wallet,
                amount,
                reason,
            } => {
                self.handle_create_manual_payout(wallet, *amount, reason)
                    .await
            }
            Instruction::ResolvePayout { kind, id, approve } => {
                self.handle_resolve_payout(*kind, id, *approve).await
            }
            Instruction::UpdateSettings(settings) => self.handle_update_settings(settings).await,
        }
    }

    pub async fn execute(&mut self, instructions: Vec<Instruction>) -> Vec<Event> {
        let mut events = Vec::new();
        for instruction in instructions {
            events.extend(self.apply(&instruction).await);
        }
        events
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }

    // === Shared loaders ===

    async fn settings(&self) -> GameSettings {
        match self.get(&Key::Settings).await {
            Some(Value::Settings(settings)) => settings,
            _ => GameSettings::default(),
        }
    }

    async fn profile(&self, wallet: &Address) -> Option<PlayerProfile> {
        match self.get(&Key::Profile(*wallet)).await {
            Some(Value::Profile(profile)) => Some(profile),
            _ => None,
        }
    }

    async fn profile_or_new(&self, wallet: &Address) -> PlayerProfile {
        match self.profile(wallet).await {
            Some(profile) => profile,
            None => PlayerProfile::new(*wallet, self.now_ms),
        }
    }

    /// Load a game the wallet owns.
    async fn owned_game(&self, wallet: &Address, game_id: &Uuid) -> Result<Game, Event> {
        let game = match self.get(&Key::Game(*game_id)).await {
            Some(Value::Game(game)) => game,
            _ => {
                return Err(error_event(
                    Some(*wallet),
                    Some(*game_id),
                    ERROR_GAME_NOT_FOUND,
                    "Game not found",
                ))
            }
        };
        if &game.wallet != wallet {
            return Err(error_event(
                Some(*wallet),
                Some(*game_id),
                ERROR_GAME_NOT_OWNED,
                "Game belongs to another wallet",
            ));
        }
        Ok(game)
    }

    async fn notify(&mut self, wallet: &Address, kind: NotificationKind, message: String) {
        let mut notifications = match self.get(&Key::Notifications(*wallet)).await {
            Some(Value::Notifications(notifications)) => notifications,
            _ => Vec::new(),
        };
        notifications.push(Notification {
            kind,
            message: clip(&message),
            created_at_ms: self.now_ms,
        });
        if notifications.len() > MAX_NOTIFICATIONS {
            let excess = notifications.len() - MAX_NOTIFICATIONS;
            notifications.drain(..excess);
        }
        self.insert(
            Key::Notifications(*wallet),
            Value::Notifications(notifications),
        );
    }

    async fn payout_queue(&self) -> Vec<PayoutRef> {
        match self.get(&Key::PendingPayouts).await {
            Some(Value::PendingPayouts(queue)) => queue,
            _ => Vec::new(),
        }
    }

    /// Check that the payout queue can take `additional` more entries.
    ///
    /// Handlers call this before staging anything; `enqueue_payout`
    /// itself never refuses.
    async fn ensure_payout_room(
        &self,
        wallet: Option<Address>,
        game_id: Option<Uuid>,
        additional: usize,
    ) -> Result<(), Event> {
        let queued = self.payout_queue().await.len();
        if queued + additional > MAX_INDEX_LENGTH {
            return Err(error_event(
                wallet,
                game_id,
                ERROR_LIMIT_REACHED,
                format!("Payout queue is full ({queued} pending)"),
            ));
        }
        Ok(())
    }

    async fn enqueue_payout(&mut self, kind: PayoutKind, id: Uuid) {
        let mut queue = self.payout_queue().await;
        queue.push(PayoutRef { kind, id });
        self.insert(Key::PendingPayouts, Value::PendingPayouts(queue));
    }

    async fn dequeue_payout(&mut self, kind: PayoutKind, id: Uuid) {
        let mut queue = self.payout_queue().await;
        queue.retain(|entry| !(entry.kind == kind && entry.id == id));
        self.insert(Key::PendingPayouts, Value::PendingPayouts(queue));
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    async fn get(&self, key: &Key) -> Option<Value> {
        match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await,
        }
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    async fn delete(&mut self, key: &Key) {
        self.pending.insert(key.clone(), Status::Delete);
    }
}
