//! Backend for the Deal or No Deal rewards game.
//!
//! [Backend] owns the authoritative state. Every state change goes through
//! [Backend::execute], which runs one instruction against a fresh
//! [dond_execution::Layer], journals the resulting changes (when a journal is
//! configured), applies them, and broadcasts the events. [Api] exposes the
//! backend over HTTP and WebSocket.

use dond_execution::{Layer, Memory, State};
use dond_types::{
    api::{LeaderboardResponse, LevelResponse, PendingPayoutsResponse, ProfileResponse},
    execution::{Event, Instruction, Key, Value},
    game::{
        normalize_tx_hash, Game, GameSettings, LeaderboardPeriod, PaymentStatus, PayoutKind,
        PayoutRef, PayoutStatus, PendingGamePayment, ScatterWin,
    },
    Address,
};
use std::{
    path::Path,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

mod api;
pub mod config;
pub mod journal;
pub mod payment;

pub use api::Api;
pub use config::{Config, ConfigError, PaymentConfig, RateLimitConfig, ValidatedConfig};
pub use journal::{Journal, JournalError};
pub use payment::{PaymentVerifier, StaticVerifier, Verification, Verifier};

/// Events buffered per subscriber before it starts lagging.
const UPDATE_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Journal(#[from] JournalError),
}

struct Inner {
    state: Memory,
    journal: Option<Journal>,
}

pub struct Backend<V> {
    inner: Mutex<Inner>,
    verifier: V,
    admin_key: Option<String>,
    updates: broadcast::Sender<Event>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

impl<V: PaymentVerifier> Backend<V> {
    /// In-memory backend. Nothing survives a restart.
    pub fn new(verifier: V, admin_key: Option<String>) -> Self {
        Self::from_parts(Memory::default(), None, verifier, admin_key)
    }

    /// Backend persisted to the journal at `path`, replaying whatever it holds.
    pub async fn with_journal(
        verifier: V,
        admin_key: Option<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, JournalError> {
        let (journal, batches) = Journal::open(path)?;
        let mut state = Memory::default();
        let replayed = batches.len();
        for changes in batches {
            state.apply(changes).await;
        }
        info!(replayed, keys = state.len(), "restored state from journal");
        Ok(Self::from_parts(state, Some(journal), verifier, admin_key))
    }

    fn from_parts(
        state: Memory,
        journal: Option<Journal>,
        verifier: V,
        admin_key: Option<String>,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        Self {
            inner: Mutex::new(Inner { state, journal }),
            verifier,
            admin_key,
            updates,
        }
    }

    pub fn admin_key(&self) -> Option<&str> {
        self.admin_key.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.updates.subscribe()
    }

    /// Apply one instruction at the current time.
    pub async fn execute(&self, instruction: Instruction) -> Result<Vec<Event>, BackendError> {
        self.execute_at(instruction, now_ms()).await
    }

    /// Apply one instruction as of `now_ms`.
    ///
    /// Changes reach the journal before they reach memory, so a failed append
    /// leaves both untouched. Rejected instructions still return their error
    /// events but are never broadcast.
    pub async fn execute_at(
        &self,
        instruction: Instruction,
        now_ms: u64,
    ) -> Result<Vec<Event>, BackendError> {
        let mut guard = self.inner.lock().await;
        let entropy: [u8; 32] = rand::random();
        let (events, changes) = {
            let mut layer = Layer::new(&guard.state, now_ms, entropy);
            let events = layer.apply(&instruction).await;
            (events, layer.commit())
        };

        let inner = &mut *guard;
        if let Some(journal) = inner.journal.as_mut() {
            journal.append(&changes)?;
        }
        inner.state.apply(changes).await;
        drop(guard);

        for event in events.iter().filter(|event| !event.is_error()) {
            // No subscribers is fine
            let _ = self.updates.send(event.clone());
        }
        Ok(events)
    }

    pub async fn get(&self, key: &Key) -> Option<Value> {
        self.inner.lock().await.state.get(key).await
    }

    pub async fn settings(&self) -> GameSettings {
        match self.get(&Key::Settings).await {
            Some(Value::Settings(settings)) => settings,
            _ => GameSettings::default(),
        }
    }

    pub async fn game(&self, game_id: &Uuid) -> Option<Game> {
        match self.get(&Key::Game(*game_id)).await {
            Some(Value::Game(game)) => Some(game),
            _ => None,
        }
    }

    pub async fn payment(&self, tx_hash: &str) -> Option<PendingGamePayment> {
        let tx_hash = normalize_tx_hash(tx_hash)?;
        match self.get(&Key::Payment(tx_hash)).await {
            Some(Value::Payment(payment)) => Some(payment),
            _ => None,
        }
    }

    /// Store `settings` if none exist yet, then make sure a leaderboard period is open.
    pub async fn bootstrap(&self, settings: GameSettings) -> Result<(), BackendError> {
        if self.get(&Key::Settings).await.is_none() {
            self.execute(Instruction::UpdateSettings(settings)).await?;
        }
        self.execute(Instruction::CheckLeaderboardPeriod).await?;
        Ok(())
    }

    /// Ask the verifier about a pending payment and record its verdict.
    ///
    /// Returns the payment as stored afterwards, or `None` if it was never
    /// registered. Verifier failures leave the payment pending.
    pub async fn refresh_payment(
        &self,
        tx_hash: &str,
    ) -> Result<Option<PendingGamePayment>, BackendError> {
        let Some(payment) = self.payment(tx_hash).await else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(Some(payment));
        }

        let settings = self.settings().await;
        let verdict = match self.verifier.verify(&payment, &settings).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(?err, tx_hash = %payment.tx_hash, "payment verification failed");
                return Ok(Some(payment));
            }
        };
        let (confirmed, reason) = match verdict {
            Verification::Pending => return Ok(Some(payment)),
            Verification::Confirmed => (true, String::new()),
            Verification::Failed(reason) => (false, reason),
        };
        debug!(tx_hash = %payment.tx_hash, confirmed, "payment verified");
        self.execute(Instruction::SettlePayment {
            tx_hash: payment.tx_hash.clone(),
            confirmed,
            reason,
        })
        .await?;
        Ok(self.payment(&payment.tx_hash).await)
    }

    pub async fn profile(&self, wallet: &Address) -> Option<ProfileResponse> {
        let inner = self.inner.lock().await;
        let Some(Value::Profile(profile)) = inner.state.get(&Key::Profile(*wallet)).await else {
            return None;
        };
        let trophies = match inner.state.get(&Key::PlayerTrophies(*wallet)).await {
            Some(Value::PlayerTrophies(trophies)) => trophies,
            _ => Vec::new(),
        };
        let notifications = match inner.state.get(&Key::Notifications(*wallet)).await {
            Some(Value::Notifications(notifications)) => notifications,
            _ => Vec::new(),
        };
        let active_game = match inner.state.get(&Key::ActiveGame(*wallet)).await {
            Some(Value::ActiveGame(game_id)) => Some(game_id),
            _ => None,
        };
        Some(ProfileResponse {
            level: LevelResponse::new(profile.total_xp),
            profile,
            trophies,
            notifications,
            active_game,
        })
    }

    pub async fn leaderboard(&self) -> LeaderboardResponse {
        let inner = self.inner.lock().await;
        let period = match inner.state.get(&Key::LeaderboardCursor).await {
            Some(Value::LeaderboardCursor(id)) => {
                match inner.state.get(&Key::LeaderboardPeriod(id)).await {
                    Some(Value::LeaderboardPeriod(period)) => Some(period),
                    _ => None,
                }
            }
            _ => None,
        };
        LeaderboardResponse { period }
    }

    pub async fn period(&self, id: u64) -> Option<LeaderboardPeriod> {
        match self.get(&Key::LeaderboardPeriod(id)).await {
            Some(Value::LeaderboardPeriod(period)) => Some(period),
            _ => None,
        }
    }

    /// Scatter bonuses owed to `wallet` that have not been paid yet.
    pub async fn pending_scatter(&self, wallet: &Address) -> Vec<ScatterWin> {
        let inner = self.inner.lock().await;
        let ids = match inner.state.get(&Key::WalletScatterWins(*wallet)).await {
            Some(Value::ScatterWinIds(ids)) => ids,
            _ => return Vec::new(),
        };
        let mut pending = Vec::new();
        for id in ids {
            if let Some(Value::ScatterWin(win)) = inner.state.get(&Key::ScatterWin(id)).await {
                if win.status == PayoutStatus::Pending {
                    pending.push(win);
                }
            }
        }
        pending
    }

    /// The admin payout queue with every referenced record.
    pub async fn pending_payouts(&self) -> PendingPayoutsResponse {
        let inner = self.inner.lock().await;
        let queue: Vec<PayoutRef> = match inner.state.get(&Key::PendingPayouts).await {
            Some(Value::PendingPayouts(queue)) => queue,
            _ => Vec::new(),
        };
        let mut response = PendingPayoutsResponse {
            queue: queue.clone(),
            scatter: Vec::new(),
            nft_sales: Vec::new(),
            manual: Vec::new(),
        };
        for PayoutRef { kind, id } in queue {
            let key = match kind {
                PayoutKind::Scatter => Key::ScatterWin(id),
                PayoutKind::NftSale => Key::NftSaleRequest(id),
                PayoutKind::Manual => Key::ManualPayout(id),
            };
            match inner.state.get(&key).await {
                Some(Value::ScatterWin(win)) => response.scatter.push(win),
                Some(Value::NftSaleRequest(request)) => response.nft_sales.push(request),
                Some(Value::ManualPayout(payout)) => response.manual.push(payout),
                _ => warn!(?kind, %id, "queued payout has no record"),
            }
        }
        response
    }

    /// Check the leaderboard period every `every`, closing it once it ends.
    pub fn spawn_period_ticker(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let backend = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match backend.execute(Instruction::CheckLeaderboardPeriod).await {
                    Ok(events) => {
                        for event in events {
                            if let Event::PeriodClosed { period_id, .. } = event {
                                info!(period_id, "leaderboard period closed");
                            }
                        }
                    }
                    Err(err) => warn!(?err, "failed to check leaderboard period"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dond_execution::mocks::{tx_hash, wallet};
    use dond_types::game::{
        GameStatus, ERROR_LIMIT_REACHED, LEADERBOARD_PERIOD_MS, MAX_MERGED_WALLETS,
        MAX_MERGE_WALLETS,
    };

    fn backend() -> Backend<StaticVerifier> {
        Backend::new(StaticVerifier::accept_all(), Some("secret".to_string()))
    }

    async fn register(backend: &Backend<StaticVerifier>, player: Address, n: u64) -> String {
        let tx_hash = tx_hash(n);
        backend
            .execute(Instruction::RegisterPayment {
                wallet: player,
                tx_hash: tx_hash.clone(),
            })
            .await
            .unwrap();
        tx_hash
    }

    #[tokio::test]
    async fn test_execute_broadcasts_accepted_events() {
        let backend = backend();
        let mut updates = backend.subscribe();
        let player = wallet(1);

        // Rejected instructions are not broadcast
        let events = backend
            .execute(Instruction::SetContinuePastNine {
                wallet: player,
                enabled: true,
            })
            .await
            .unwrap();
        assert!(events[0].is_error());
        assert!(updates.try_recv().is_err());

        register(&backend, player, 1).await;
        match updates.recv().await.unwrap() {
            Event::PaymentRecorded { wallet, status, .. } => {
                assert_eq!(wallet, player);
                assert_eq!(status, PaymentStatus::Pending);
            }
            event => panic!("unexpected event: {event:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_payment_settles_once() {
        let backend = Backend::new(
            StaticVerifier::new(vec![tx_hash(1)], false),
            None,
        );
        let player = wallet(1);
        assert!(backend.refresh_payment(&tx_hash(1)).await.unwrap().is_none());

        backend
            .execute(Instruction::RegisterPayment {
                wallet: player,
                tx_hash: tx_hash(1),
            })
            .await
            .unwrap();
        backend
            .execute(Instruction::RegisterPayment {
                wallet: player,
                tx_hash: tx_hash(2),
            })
            .await
            .unwrap();

        let confirmed = backend.refresh_payment(&tx_hash(1)).await.unwrap().unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Confirmed);
        assert!(confirmed.settled_at_ms.is_some());

        let pending = backend.refresh_payment(&tx_hash(2)).await.unwrap().unwrap();
        assert_eq!(pending.status, PaymentStatus::Pending);

        // Hash lookups are case-insensitive
        let upper = tx_hash(1).to_uppercase().replacen("0X", "0x", 1);
        assert_eq!(
            backend.payment(&upper).await.map(|p| p.status),
            Some(PaymentStatus::Confirmed)
        );
    }

    #[tokio::test]
    async fn test_bootstrap_opens_period_and_keeps_settings() {
        let backend = backend();
        let settings = GameSettings {
            entry_fee: 2_500,
            ..GameSettings::default()
        };
        backend.bootstrap(settings).await.unwrap();
        assert_eq!(backend.settings().await, settings);

        let period = backend.leaderboard().await.period.unwrap();
        assert_eq!(period.id, 1);
        assert_eq!(period.end_ms - period.start_ms, LEADERBOARD_PERIOD_MS);

        // A second bootstrap never overwrites stored settings
        backend.bootstrap(GameSettings::default()).await.unwrap();
        assert_eq!(backend.settings().await.entry_fee, 2_500);
        assert_eq!(backend.leaderboard().await.period.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_game_and_profile_reads() {
        let backend = backend();
        let player = wallet(3);
        let payment_tx = register(&backend, player, 3).await;
        backend.refresh_payment(&payment_tx).await.unwrap();

        let events = backend
            .execute(Instruction::CreateGame {
                wallet: player,
                player_case: 4,
                payment_tx,
            })
            .await
            .unwrap();
        let game_id = events
            .iter()
            .find_map(|event| match event {
                Event::GameCreated { game_id, .. } => Some(*game_id),
                _ => None,
            })
            .unwrap();

        let game = backend.game(&game_id).await.unwrap();
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.player_case, 4);

        let profile = backend.profile(&player).await.unwrap();
        assert_eq!(profile.active_game, Some(game_id));
        assert_eq!(profile.profile.total_xp, 0);
        assert!(backend.profile(&wallet(4)).await.is_none());
        assert!(backend.pending_scatter(&player).await.is_empty());
    }

    #[tokio::test]
    async fn test_pending_payouts_lists_records() {
        let backend = backend();
        let player = wallet(5);
        backend
            .execute(Instruction::CreateManualPayout {
                wallet: player,
                amount: 700,
                reason: "goodwill".to_string(),
            })
            .await
            .unwrap();

        let payouts = backend.pending_payouts().await;
        assert_eq!(payouts.queue.len(), 1);
        assert_eq!(payouts.queue[0].kind, PayoutKind::Manual);
        assert_eq!(payouts.manual.len(), 1);
        assert_eq!(payouts.manual[0].amount, 700);
        assert!(payouts.scatter.is_empty());
        assert!(payouts.nft_sales.is_empty());
    }

    #[tokio::test]
    async fn test_journal_restores_state() {
        let path = std::env::temp_dir().join(format!(
            "dond-backend-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        let player = wallet(6);
        {
            let backend =
                Backend::with_journal(StaticVerifier::accept_all(), None, &path)
                    .await
                    .unwrap();
            let payment_tx = register(&backend, player, 6).await;
            backend.refresh_payment(&payment_tx).await.unwrap();
            backend
                .execute(Instruction::CreateGame {
                    wallet: player,
                    player_case: 1,
                    payment_tx,
                })
                .await
                .unwrap();
        }

        let backend = Backend::with_journal(StaticVerifier::accept_all(), None, &path)
            .await
            .unwrap();
        let payment = backend.payment(&tx_hash(6)).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        let game_id = payment.game_id.unwrap();
        assert_eq!(backend.profile(&player).await.unwrap().active_game, Some(game_id));
        assert!(backend.game(&game_id).await.is_some());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_journal_reopens_after_merge_limit() {
        let path = std::env::temp_dir().join(format!(
            "dond-backend-merge-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        let primary = wallet(1);
        let batch_of = |batch: usize| -> Vec<Address> {
            (0..MAX_MERGE_WALLETS)
                .map(|i| wallet((10 + batch * MAX_MERGE_WALLETS + i) as u8))
                .collect()
        };
        {
            let backend =
                Backend::with_journal(StaticVerifier::accept_all(), None, &path)
                    .await
                    .unwrap();
            let mut rejected = Vec::new();
            for batch in 0..5 {
                let duplicates = batch_of(batch);
                for duplicate in &duplicates {
                    backend
                        .execute(Instruction::SetPlayerLevel {
                            wallet: *duplicate,
                            level: 1,
                        })
                        .await
                        .unwrap();
                }
                let events = backend
                    .execute(Instruction::MergeProfiles {
                        primary,
                        duplicates,
                    })
                    .await
                    .unwrap();
                if let Some(Event::Error { error_code, .. }) = events.first() {
                    rejected.push((batch, *error_code));
                }
            }

            // Four batches fill the profile, the fifth is refused
            assert_eq!(rejected, vec![(4, ERROR_LIMIT_REACHED)]);
        }

        let backend = Backend::with_journal(StaticVerifier::accept_all(), None, &path)
            .await
            .unwrap();
        let profile = backend.profile(&primary).await.unwrap();
        assert_eq!(profile.profile.merged_wallets.len(), MAX_MERGED_WALLETS);
        for duplicate in batch_of(4) {
            assert!(backend.profile(&duplicate).await.is_some());
        }
        assert!(backend.profile(&batch_of(0)[0]).await.is_none());
        let _ = std::fs::remove_file(&path);
    }
}
