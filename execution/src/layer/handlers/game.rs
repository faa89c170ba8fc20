use super::super::*;
use crate::{
    game::{self, scatter, Outcome},
    xp::calculate_xp,
};
use commonware_utils::hex;
use dond_types::game::{
    normalize_tx_hash, PaymentStatus, ERROR_ACTIVE_GAME_EXISTS, ERROR_PAYMENT_CONSUMED,
    ERROR_PAYMENT_NOT_CONFIRMED, ERROR_PAYMENT_NOT_FOUND, ERROR_PAYMENT_NOT_OWNED,
};
use tracing::info;

impl<'a, S: State> Layer<'a, S> {
    // === Game Handler Methods ===

    pub(in crate::layer) async fn handle_create_game(
        &mut self,
        wallet: &Address,
        player_case: u8,
        payment_tx: &str,
    ) -> Vec<Event> {
        let Some(tx_hash) = normalize_tx_hash(payment_tx) else {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_PAYMENT_NOT_FOUND,
                "Invalid transaction hash",
            )];
        };

        // One active game per wallet
        if self.get(&Key::ActiveGame(*wallet)).await.is_some() {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_ACTIVE_GAME_EXISTS,
                "Wallet already has an active game",
            )];
        }

        // The entry fee must be confirmed, paid by this wallet, and unused
        let mut payment = match self.get(&Key::Payment(tx_hash.clone())).await {
            Some(Value::Payment(payment)) => payment,
            _ => {
                return vec![error_event(
                    Some(*wallet),
                    None,
                    ERROR_PAYMENT_NOT_FOUND,
                    "Payment not registered",
                )]
            }
        };
        if &payment.wallet != wallet {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_PAYMENT_NOT_OWNED,
                "Payment was registered by another wallet",
            )];
        }
        if payment.is_consumed() {
            return vec![error_event(
                Some(*wallet),
                payment.game_id,
                ERROR_PAYMENT_CONSUMED,
                "Payment already used for a game",
            )];
        }
        if payment.status != PaymentStatus::Confirmed {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_PAYMENT_NOT_CONFIRMED,
                "Payment is not confirmed",
            )];
        }

        let id = self.next_id();
        let server_seed = self.next_server_seed();
        let game = match game::new_game(
            id,
            *wallet,
            player_case,
            server_seed,
            tx_hash.clone(),
            self.now_ms,
        ) {
            Ok(game) => game,
            Err(err) => {
                return vec![error_event(
                    Some(*wallet),
                    None,
                    err.code(),
                    err.to_string(),
                )]
            }
        };

        payment.game_id = Some(id);
        self.insert(Key::Payment(tx_hash), Value::Payment(payment));
        if self.profile(wallet).await.is_none() {
            self.insert(
                Key::Profile(*wallet),
                Value::Profile(PlayerProfile::new(*wallet, self.now_ms)),
            );
        }
        self.insert(Key::ActiveGame(*wallet), Value::ActiveGame(id));
        let event = Event::GameCreated {
            game_id: id,
            wallet: *wallet,
            player_case,
            commitment: hex(&game.commitment),
        };
        self.insert(Key::Game(id), Value::Game(game));

        vec![event]
    }

    pub(in crate::layer) async fn handle_open_case(
        &mut self,
        wallet: &Address,
        game_id: &Uuid,
        case_number: u8,
    ) -> Vec<Event> {
        let mut game = match self.owned_game(wallet, game_id).await {
            Ok(game) => game,
            Err(event) => return vec![event],
        };

        let outcome = match game::open_case(&mut game, case_number) {
            Ok(outcome) => outcome,
            Err(err) => {
                return vec![error_event(
                    Some(*wallet),
                    Some(*game_id),
                    err.code(),
                    err.to_string(),
                )]
            }
        };

        let mut events = Vec::new();
        match outcome {
            Outcome::Opened { value } => events.push(Event::CaseOpened {
                game_id: *game_id,
                wallet: *wallet,
                case_number,
                value,
                round: game.round,
                cases_left_in_round: game.cases_left_in_round(),
            }),
            Outcome::Offer { value, offer } => {
                events.push(Event::CaseOpened {
                    game_id: *game_id,
                    wallet: *wallet,
                    case_number,
                    value,
                    round: game.round,
                    cases_left_in_round: 0,
                });
                events.push(Event::BankerOffer {
                    game_id: *game_id,
                    wallet: *wallet,
                    round: game.round,
                    amount: offer,
                });
            }
            _ => {}
        }
        self.insert(Key::Game(*game_id), Value::Game(game));

        events
    }

    pub(in crate::layer) async fn handle_accept_deal(
        &mut self,
        wallet: &Address,
        game_id: &Uuid,
        offer: u64,
    ) -> Vec<Event> {
        let mut game = match self.owned_game(wallet, game_id).await {
            Ok(game) => game,
            Err(event) => return vec![event],
        };

        if let Err(err) = game::accept_deal(&mut game, offer, self.now_ms) {
            return vec![error_event(
                Some(*wallet),
                Some(*game_id),
                err.code(),
                err.to_string(),
            )];
        }

        if let Err(event) = self.ensure_finish_room(&game).await {
            return vec![event];
        }

        let mut events = vec![Event::DealAccepted {
            game_id: *game_id,
            wallet: *wallet,
            amount: offer,
        }];
        events.extend(self.finish_game(&game).await);
        self.insert(Key::Game(*game_id), Value::Game(game));

        events
    }

    pub(in crate::layer) async fn handle_refuse_deal(
        &mut self,
        wallet: &Address,
        game_id: &Uuid,
    ) -> Vec<Event> {
        let mut game = match self.owned_game(wallet, game_id).await {
            Ok(game) => game,
            Err(event) => return vec![event],
        };

        let outcome = match game::refuse_deal(&mut game) {
            Ok(outcome) => outcome,
            Err(err) => {
                return vec![error_event(
                    Some(*wallet),
                    Some(*game_id),
                    err.code(),
                    err.to_string(),
                )]
            }
        };

        let mut events = vec![Event::DealRefused {
            game_id: *game_id,
            wallet: *wallet,
            round: game.round,
            refusals: game.refusals,
        }];
        if let Outcome::AwaitingFinal { remaining_case } = outcome {
            events.push(Event::AwaitingFinalDecision {
                game_id: *game_id,
                wallet: *wallet,
                remaining_case,
            });
        }
        self.insert(Key::Game(*game_id), Value::Game(game));

        events
    }

    pub(in crate::layer) async fn handle_final_decision(
        &mut self,
        wallet: &Address,
        game_id: &Uuid,
        swap: bool,
    ) -> Vec<Event> {
        let mut game = match self.owned_game(wallet, game_id).await {
            Ok(game) => game,
            Err(event) => return vec![event],
        };

        if let Err(err) = game::final_decision(&mut game, swap, self.now_ms) {
            return vec![error_event(
                Some(*wallet),
                Some(*game_id),
                err.code(),
                err.to_string(),
            )];
        }

        if let Err(event) = self.ensure_finish_room(&game).await {
            return vec![event];
        }

        let events = self.finish_game(&game).await;
        self.insert(Key::Game(*game_id), Value::Game(game));

        events
    }

    /// Refuse to finish `game` when the scatter win it would trigger has
    /// nowhere to be recorded.
    async fn ensure_finish_room(&self, game: &Game) -> Result<(), Event> {
        let streak = self
            .profile(&game.wallet)
            .await
            .map_or(0, |profile| profile.scatter_streak);
        let streak = scatter::update_streak(streak, game.final_winnings.unwrap_or(0));
        if !scatter::is_triggered(streak, self.settings().await.scatter_trigger) {
            return Ok(());
        }
        self.ensure_scatter_room(&game.wallet, &game.id).await
    }

    /// Settle everything that follows a finished game: XP, trophies, profile
    /// totals, scatter streak, leaderboard standings and notifications.
    async fn finish_game(&mut self, game: &Game) -> Vec<Event> {
        let wallet = game.wallet;
        let winnings = game.final_winnings.unwrap_or(0);
        self.remove(Key::ActiveGame(wallet));

        let mut events = vec![Event::GameCompleted {
            game_id: game.id,
            wallet,
            status: game.status,
            final_winnings: winnings,
            player_case_value: game.player_case_value().unwrap_or(0),
            server_seed: hex(&game.server_seed),
        }];

        let mut profile = self.profile_or_new(&wallet).await;
        profile.games_played = profile.games_played.saturating_add(1);
        profile.total_winnings = profile.total_winnings.saturating_add(winnings);
        profile.best_winnings = profile.best_winnings.max(winnings);

        let xp = calculate_xp(
            winnings,
            game.refusals as u32,
            profile.continue_past_level_nine,
        );
        events.extend(self.award_xp(&mut profile, xp, game.id).await);

        profile.scatter_streak = scatter::update_streak(profile.scatter_streak, winnings);
        let settings = self.settings().await;
        if scatter::is_triggered(profile.scatter_streak, settings.scatter_trigger) {
            info!(
                %wallet,
                streak = profile.scatter_streak,
                "scatter bonus triggered"
            );
            events.extend(
                self.create_scatter_win(
                    &wallet,
                    profile.scatter_streak,
                    game.id,
                    settings.scatter_bonus,
                )
                .await,
            );
            profile.scatter_streak = scatter::reset_streak();
        }
        self.insert(Key::Profile(wallet), Value::Profile(profile));

        self.record_period_winnings(&wallet, winnings).await;
        self.notify(
            &wallet,
            NotificationKind::GameResult,
            format!("Game finished: you won {}", format_cents(winnings)),
        )
        .await;

        events
    }
}
