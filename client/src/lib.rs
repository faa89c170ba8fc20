pub mod client;
pub mod events;

pub use client::{Client, PollPolicy, RetryPolicy};
pub use events::Stream;
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("backend rejected request ({status}, code {error_code}): {message}")]
    Api {
        status: reqwest::StatusCode,
        error_code: u8,
        message: String,
    },
    #[error("invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),
    #[error("payment {tx_hash} failed: {reason}")]
    PaymentFailed { tx_hash: String, reason: String },
    #[error("payment {tx_hash} still pending after {attempts} attempts")]
    PaymentPending { tx_hash: String, attempts: usize },
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("dial timeout")]
    DialTimeout,
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use dond_backend::{Api, Backend, StaticVerifier};
    use dond_execution::mocks::{tx_hash, wallet};
    use dond_types::{
        execution::Event,
        game::{
            GameStatus, PaymentStatus, PayoutKind, ERROR_GAME_NOT_OWNED, ERROR_INVALID_LEVEL,
        },
    };
    use std::{net::SocketAddr, sync::Arc};
    use tokio::time::{sleep, timeout, Duration};

    const ADMIN: &str = "secret";

    struct TestContext {
        backend: Arc<Backend<StaticVerifier>>,
        base_url: String,
        server_handle: tokio::task::JoinHandle<()>,
    }

    impl TestContext {
        async fn new(verifier: StaticVerifier) -> Self {
            let backend = Arc::new(Backend::new(verifier, Some(ADMIN.to_string())));
            let api = Api::new(backend.clone(), None);

            // Start server on random port
            let addr = SocketAddr::from(([127, 0, 0, 1], 0));
            let router = api.router();
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            let actual_addr = listener.local_addr().unwrap();
            let base_url = format!("http://{actual_addr}");

            let server_handle = tokio::spawn(async move {
                axum::serve(
                    listener,
                    router.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .await
                .unwrap();
            });

            // Give server time to start
            sleep(Duration::from_millis(100)).await;

            Self {
                backend,
                base_url,
                server_handle,
            }
        }

        fn create_client(&self) -> Client {
            Client::new(&self.base_url).unwrap()
        }

        fn create_admin_client(&self) -> Client {
            self.create_client().with_admin_key(ADMIN)
        }
    }

    impl Drop for TestContext {
        fn drop(&mut self) {
            self.server_handle.abort();
        }
    }

    #[tokio::test]
    async fn test_client_plays_a_game() {
        let ctx = TestContext::new(StaticVerifier::accept_all()).await;
        let client = ctx.create_client();
        let player = wallet(1);

        let created = client
            .create_verified_game(player, 26, &tx_hash(1))
            .await
            .unwrap();
        let game_id = created.game.id;
        assert_eq!(created.game.player_case, 26);

        // Refuse every offer, then keep the case
        let mut game = created.game;
        let mut next_case = 1u8;
        while game.status == GameStatus::Active {
            game = if game.awaiting_final_decision {
                client.final_decision(player, game_id, false).await.unwrap().game
            } else if game.cases_left_in_round == 0 {
                client.reject_deal(player, game_id).await.unwrap().game
            } else {
                let response = client.open_case(player, game_id, next_case).await.unwrap();
                next_case += 1;
                response.game
            };
        }
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.refusals, 9);
        let winnings = game.final_winnings.unwrap();
        assert_eq!(Some(winnings), game.player_case_value);

        let validation = client
            .validate_final_winnings(player, game_id, winnings)
            .await
            .unwrap();
        assert!(validation.valid);

        // Someone else cannot claim the game
        let err = client
            .validate_final_winnings(wallet(2), game_id, winnings)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Api {
                error_code: ERROR_GAME_NOT_OWNED,
                ..
            }
        ));

        let fetched = client.game(game_id).await.unwrap().unwrap();
        assert_eq!(fetched, game);
        let profile = client.profile(&player).await.unwrap().unwrap();
        assert_eq!(profile.profile.games_played, 1);
        assert!(profile.profile.total_xp >= 900);
        assert!(client.profile(&wallet(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_client_waits_for_payment() {
        let ctx = TestContext::new(StaticVerifier::new(vec![tx_hash(1)], false)).await;
        let client = ctx.create_client();
        let player = wallet(1);
        let policy = PollPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(10),
        };

        let registered = client.register_payment(player, &tx_hash(1)).await.unwrap();
        assert_eq!(registered.status, PaymentStatus::Confirmed);
        let confirmed = client.wait_for_payment(&tx_hash(1), policy).await.unwrap();
        assert_eq!(confirmed.tx_hash, tx_hash(1));

        let registered = client.register_payment(player, &tx_hash(2)).await.unwrap();
        assert_eq!(registered.status, PaymentStatus::Pending);
        let err = client
            .wait_for_payment(&tx_hash(2), policy)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PaymentPending { attempts: 3, .. }));

        // Never registered
        let err = client
            .wait_for_payment(&tx_hash(3), policy)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
    }

    #[tokio::test]
    async fn test_client_updates_stream() {
        let ctx = TestContext::new(StaticVerifier::accept_all()).await;
        let client = ctx.create_client();
        let player = wallet(1);

        let mut stream = client.connect_updates(&player).await.unwrap();

        // Events of other wallets are filtered out
        client.register_payment(wallet(2), &tx_hash(2)).await.unwrap();
        client
            .create_verified_game(player, 5, &tx_hash(1))
            .await
            .unwrap();

        let mut seen = Vec::new();
        loop {
            let event = timeout(Duration::from_secs(5), stream.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(event.wallet(), Some(&player));
            let created = matches!(event, Event::GameCreated { player_case: 5, .. });
            seen.push(event);
            if created {
                break;
            }
        }
        assert!(matches!(seen[0], Event::PaymentRecorded { .. }));

        // Public events reach every subscriber
        ctx.backend
            .execute(dond_types::execution::Instruction::CheckLeaderboardPeriod)
            .await
            .unwrap();
        let event = timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::PeriodOpened { period_id: 1, .. }));
    }

    #[tokio::test]
    async fn test_client_admin_functions() {
        let ctx = TestContext::new(StaticVerifier::accept_all()).await;
        let client = ctx.create_client();
        let admin = ctx.create_admin_client();
        let player = wallet(1);

        let err = client.set_player_level(player, 3).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Api {
                status: reqwest::StatusCode::UNAUTHORIZED,
                ..
            }
        ));

        let set = admin.set_player_level(player, 3).await.unwrap();
        assert!(matches!(set.events[0], Event::LevelSet { level: 3, .. }));
        let err = admin.set_player_level(player, 14).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Api {
                error_code: ERROR_INVALID_LEVEL,
                ..
            }
        ));

        let profile = client.profile(&player).await.unwrap().unwrap();
        // Completion lags the current level by one
        assert_eq!(profile.level.level.number, 3);
        assert_eq!(profile.level.completed_level.map(|tier| tier.number), Some(2));
        assert_eq!(profile.trophies.len(), 3);

        // Sell the level 2 trophy
        let sale = client.request_nft_sale(player, 2).await.unwrap();
        let Event::PayoutCreated { id, kind, .. } = sale.events[0] else {
            panic!("expected payout event");
        };
        assert_eq!(kind, PayoutKind::NftSale);
        let pending = admin.pending_payouts().await.unwrap();
        assert_eq!(pending.nft_sales.len(), 1);

        admin.resolve_payout(kind, id, true).await.unwrap();
        let profile = client.profile(&player).await.unwrap().unwrap();
        let sold = profile
            .trophies
            .iter()
            .find(|trophy| trophy.level == 2)
            .unwrap();
        assert!(sold.sold);
        assert!(admin.pending_payouts().await.unwrap().queue.is_empty());

        let level = client.level(-10).await.unwrap();
        assert_eq!(level.xp, 0);
        assert!(client.leaderboard().await.unwrap().period.is_none());
        admin.check_leaderboard_period().await.unwrap();
        assert_eq!(client.leaderboard().await.unwrap().period.unwrap().id, 1);
    }

    #[test]
    fn test_client_invalid_scheme() {
        let result = Client::new("ftp://example.com");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(matches!(err, Error::InvalidScheme(_)));
            assert_eq!(
                err.to_string(),
                "invalid URL scheme: ftp (expected http or https)"
            );
        }

        assert!(Client::new("http://localhost:8080").is_ok());
        assert!(Client::new("https://localhost:8080").is_ok());
    }
}
