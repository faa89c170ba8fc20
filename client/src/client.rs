use crate::{events::Stream, Error, Result};
use dond_types::{
    api::{
        AcceptDealRequest, ActionResponse, ContinuePastNineRequest, CreateGameRequest,
        ErrorResponse, FinalDecisionRequest, GameResponse, GameView, LeaderboardResponse,
        LevelResponse, ManualPayoutRequest, MergeProfilesRequest, NftSaleRequestBody,
        OpenCaseRequest, PaymentStatusRequest, PaymentStatusResponse, PendingPayoutsResponse,
        PendingScatterResponse, ProfileResponse, RegisterPaymentRequest, RejectDealRequest,
        ResolvePayoutRequest, SetPlayerLevelRequest, ValidateWinningsRequest,
        ValidateWinningsResponse, WalletRequest, ADMIN_KEY_HEADER, FUNCTIONS_PREFIX,
    },
    execution::Event,
    game::{GameSettings, PaymentStatus, PayoutKind, Trophy},
    Address,
};
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// Timeout for connections and requests
const TIMEOUT: Duration = Duration::from_secs(30);

/// Retry policy for transient HTTP failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (including the first attempt).
    pub max_attempts: usize,
    /// Initial backoff delay after the first retryable failure.
    pub initial_backoff: Duration,
    /// Maximum backoff delay between attempts.
    pub max_backoff: Duration,
    /// Whether non-idempotent requests (e.g., POST) may be retried.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

/// How long [Client::wait_for_payment] keeps asking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: usize,
    /// Fixed delay between attempts.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// Deal or No Deal API client
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    pub ws_url: Url,
    pub http_client: HttpClient,

    admin_key: Option<String>,
    retry_policy: RetryPolicy,
}

impl Client {
    /// Create a new client
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        // Convert http(s) to ws(s) for WebSocket URL
        let ws_scheme = match base_url.scheme() {
            "http" => "ws",
            "https" => "wss",
            scheme => {
                return Err(Error::InvalidScheme(scheme.to_string()));
            }
        };

        let mut ws_url = base_url.clone();
        ws_url
            .set_scheme(ws_scheme)
            .map_err(|_| Error::InvalidScheme(ws_scheme.to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            ws_url,
            http_client,
            admin_key: None,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Returns a new client that sends `admin_key` on admin functions.
    pub fn with_admin_key(mut self, admin_key: impl Into<String>) -> Self {
        self.admin_key = Some(admin_key.into());
        self
    }

    /// Returns a copy of the current retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Sets the retry policy for subsequent HTTP requests.
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    /// Returns a new client with the provided retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    async fn send_with_retry(
        &self,
        method: reqwest::Method,
        make_request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let max_attempts =
            if method == reqwest::Method::GET || self.retry_policy.retry_non_idempotent {
                self.retry_policy.max_attempts.max(1)
            } else {
                1
            };

        let mut attempt = 0usize;
        let mut backoff = self.retry_policy.initial_backoff;
        loop {
            attempt += 1;
            let result = make_request().send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= max_attempts {
                        return Ok(response);
                    }
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable_error(&err) {
                        return Err(Error::Reqwest(err));
                    }
                }
            }

            debug!(attempt, ?backoff, "retrying request");
            if backoff > Duration::ZERO {
                sleep(backoff).await;
                backoff = std::cmp::min(backoff.saturating_mul(2), self.retry_policy.max_backoff);
            }
        }
    }

    async fn call<B: Serialize, R: DeserializeOwned>(
        &self,
        function: &str,
        body: &B,
        admin: bool,
    ) -> Result<R> {
        let url = self
            .base_url
            .join(&format!("{}/{function}", FUNCTIONS_PREFIX.trim_start_matches('/')))?;
        debug!("Calling {}", url);

        let admin_key = if admin { self.admin_key.as_deref() } else { None };
        let response = self
            .send_with_retry(reqwest::Method::POST, || {
                let request = self.http_client.post(url.clone()).json(body);
                match admin_key {
                    Some(key) => request.header(ADMIN_KEY_HEADER, key),
                    None => request,
                }
            })
            .await?;
        decode(response).await
    }

    async fn read<R: DeserializeOwned>(&self, path: &str) -> Result<Option<R>> {
        let url = self.base_url.join(path)?;
        let response = self
            .send_with_retry(reqwest::Method::GET, || self.http_client.get(url.clone()))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    pub async fn create_verified_game(
        &self,
        wallet: Address,
        player_case: u8,
        tx_hash: &str,
    ) -> Result<GameResponse> {
        let request = CreateGameRequest {
            wallet,
            player_case,
            tx_hash: tx_hash.to_string(),
        };
        self.call("create-verified-game", &request, false).await
    }

    pub async fn open_case(
        &self,
        wallet: Address,
        game_id: Uuid,
        case_number: u8,
    ) -> Result<GameResponse> {
        let request = OpenCaseRequest {
            wallet,
            game_id,
            case_number,
        };
        self.call("open-case", &request, false).await
    }

    /// Accept the banker's offer. `offer` must be the amount shown to the player.
    pub async fn accept_deal(
        &self,
        wallet: Address,
        game_id: Uuid,
        offer: u64,
    ) -> Result<GameResponse> {
        let request = AcceptDealRequest {
            wallet,
            game_id,
            offer,
        };
        self.call("validate-deal-acceptance", &request, false).await
    }

    pub async fn reject_deal(&self, wallet: Address, game_id: Uuid) -> Result<GameResponse> {
        let request = RejectDealRequest { wallet, game_id };
        self.call("reject-deal", &request, false).await
    }

    pub async fn final_decision(
        &self,
        wallet: Address,
        game_id: Uuid,
        swap: bool,
    ) -> Result<GameResponse> {
        let request = FinalDecisionRequest {
            wallet,
            game_id,
            swap,
        };
        self.call("final-decision", &request, false).await
    }

    pub async fn validate_final_winnings(
        &self,
        wallet: Address,
        game_id: Uuid,
        claimed: u64,
    ) -> Result<ValidateWinningsResponse> {
        let request = ValidateWinningsRequest {
            wallet,
            game_id,
            claimed,
        };
        self.call("validate-final-winnings", &request, false).await
    }

    pub async fn register_payment(
        &self,
        wallet: Address,
        tx_hash: &str,
    ) -> Result<PaymentStatusResponse> {
        let request = RegisterPaymentRequest {
            wallet,
            tx_hash: tx_hash.to_string(),
        };
        self.call("register-game-payment", &request, false).await
    }

    pub async fn payment_status(&self, tx_hash: &str) -> Result<PaymentStatusResponse> {
        let request = PaymentStatusRequest {
            tx_hash: tx_hash.to_string(),
        };
        self.call("check-game-payment-status", &request, false).await
    }

    /// Poll a registered payment until it settles.
    ///
    /// Returns the confirmed payment, [Error::PaymentFailed] if the chain
    /// rejected it, or [Error::PaymentPending] once `policy` runs out.
    pub async fn wait_for_payment(
        &self,
        tx_hash: &str,
        policy: PollPolicy,
    ) -> Result<PaymentStatusResponse> {
        for attempt in 1..=policy.max_attempts.max(1) {
            let payment = self.payment_status(tx_hash).await?;
            match payment.status {
                PaymentStatus::Confirmed => return Ok(payment),
                PaymentStatus::Failed => {
                    return Err(Error::PaymentFailed {
                        tx_hash: payment.tx_hash,
                        reason: payment.reason,
                    })
                }
                PaymentStatus::Pending => {
                    debug!(tx_hash, attempt, "payment still pending");
                    if attempt < policy.max_attempts {
                        sleep(policy.interval).await;
                    }
                }
            }
        }
        Err(Error::PaymentPending {
            tx_hash: tx_hash.to_string(),
            attempts: policy.max_attempts.max(1),
        })
    }

    pub async fn pending_scatter(&self, wallet: Address) -> Result<PendingScatterResponse> {
        let request = WalletRequest { wallet };
        self.call("check-pending-scatter", &request, false).await
    }

    pub async fn set_continue_past_nine(
        &self,
        wallet: Address,
        enabled: bool,
    ) -> Result<ActionResponse> {
        let request = ContinuePastNineRequest { wallet, enabled };
        self.call("set-continue-past-nine", &request, false).await
    }

    pub async fn request_nft_sale(&self, wallet: Address, level: u8) -> Result<ActionResponse> {
        let request = NftSaleRequestBody { wallet, level };
        self.call("request-nft-sale", &request, false).await
    }

    pub async fn set_player_level(&self, wallet: Address, level: u8) -> Result<ActionResponse> {
        let request = SetPlayerLevelRequest { wallet, level };
        self.call("set-admin-player-level", &request, true).await
    }

    pub async fn merge_profiles(
        &self,
        primary: Address,
        duplicates: Vec<String>,
    ) -> Result<ActionResponse> {
        let request = MergeProfilesRequest {
            primary,
            duplicates,
        };
        self.call("merge-duplicate-profiles", &request, true).await
    }

    pub async fn check_leaderboard_period(&self) -> Result<ActionResponse> {
        self.call("check-leaderboard-period", &(), true).await
    }

    pub async fn pause_leaderboard_period(&self) -> Result<ActionResponse> {
        self.call("pause-leaderboard-period", &(), true).await
    }

    pub async fn resume_leaderboard_period(&self) -> Result<ActionResponse> {
        self.call("resume-leaderboard-period", &(), true).await
    }

    pub async fn upsert_trophy(&self, trophy: &Trophy) -> Result<ActionResponse> {
        self.call("upsert-trophy", trophy, true).await
    }

    pub async fn create_manual_payout(
        &self,
        wallet: Address,
        amount: u64,
        reason: &str,
    ) -> Result<ActionResponse> {
        let request = ManualPayoutRequest {
            wallet,
            amount,
            reason: reason.to_string(),
        };
        self.call("create-manual-payout", &request, true).await
    }

    pub async fn resolve_payout(
        &self,
        kind: PayoutKind,
        id: Uuid,
        approve: bool,
    ) -> Result<ActionResponse> {
        let request = ResolvePayoutRequest { kind, id, approve };
        self.call("resolve-payout", &request, true).await
    }

    pub async fn update_settings(&self, settings: &GameSettings) -> Result<ActionResponse> {
        self.call("update-game-settings", settings, true).await
    }

    pub async fn pending_payouts(&self) -> Result<PendingPayoutsResponse> {
        self.call("list-pending-payouts", &(), true).await
    }

    pub async fn game(&self, game_id: Uuid) -> Result<Option<GameView>> {
        self.read(&format!("games/{game_id}")).await
    }

    pub async fn profile(&self, wallet: &Address) -> Result<Option<ProfileResponse>> {
        self.read(&format!("profiles/{wallet}")).await
    }

    pub async fn leaderboard(&self) -> Result<LeaderboardResponse> {
        self.read("leaderboard")
            .await?
            .ok_or(Error::UnexpectedResponse)
    }

    pub async fn level(&self, xp: i64) -> Result<LevelResponse> {
        self.read(&format!("levels/{xp}"))
            .await?
            .ok_or(Error::UnexpectedResponse)
    }

    /// Connect to the events of `wallet` plus public events.
    pub async fn connect_updates(&self, wallet: &Address) -> Result<Stream<Event>> {
        self.connect_updates_with_capacity(wallet, 0).await
    }

    /// Connect to the updates stream with a configurable channel capacity.
    ///
    /// A `channel_capacity` of `0` uses the default capacity.
    pub async fn connect_updates_with_capacity(
        &self,
        wallet: &Address,
        channel_capacity: usize,
    ) -> Result<Stream<Event>> {
        let ws_url = self.ws_url.join(&format!("updates/{wallet}"))?;
        info!(ws_url = %ws_url, "Connecting to updates WebSocket");

        let (ws_stream, _) = timeout(TIMEOUT, connect_async(ws_url.as_str()))
            .await
            .map_err(|_| Error::DialTimeout)??;
        info!("WebSocket connected");

        if channel_capacity == 0 {
            return Ok(Stream::new(ws_stream));
        }
        Ok(Stream::new_with_capacity(ws_stream, channel_capacity))
    }
}

/// Parse a success body, or the backend's [ErrorResponse] on failure.
async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.bytes().await?;
    match serde_json::from_slice::<ErrorResponse>(&body) {
        Ok(error) => Err(Error::Api {
            status,
            error_code: error.error_code,
            message: error.message,
        }),
        Err(_) => Err(Error::Failed(status)),
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    use reqwest::StatusCode;
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
