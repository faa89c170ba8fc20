use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State as AxumState,
    },
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dond_execution::game::{validate_final_winnings, GameError};
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
    execution::{Event, Instruction},
    game::{
        clamp_xp, normalize_tx_hash, GameSettings, Trophy, ERROR_GAME_NOT_FOUND,
        ERROR_GAME_NOT_OWNED, ERROR_INVALID_AMOUNT, ERROR_INVALID_CASE, ERROR_INVALID_LEVEL,
        ERROR_INVALID_SETTINGS, ERROR_OFFER_MISMATCH, ERROR_PAYMENT_NOT_CONFIRMED,
        ERROR_PAYMENT_NOT_FOUND, ERROR_PAYMENT_NOT_OWNED, ERROR_PAYOUT_NOT_FOUND,
        ERROR_PERIOD_NOT_FOUND, ERROR_PROFILE_NOT_FOUND, ERROR_TROPHY_NOT_OWNED,
        ERROR_WINNINGS_MISMATCH,
    },
    Address,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{Backend, BackendError, PaymentVerifier, RateLimitConfig};

/// Error code for failures outside the engine (bad input, auth, storage).
const ERROR_REQUEST: u8 = 0;

type Shared<V> = AxumState<Arc<Backend<V>>>;

pub struct Api<V> {
    backend: Arc<Backend<V>>,
    rate_limit: Option<RateLimitConfig>,
}

impl<V: PaymentVerifier> Api<V> {
    pub fn new(backend: Arc<Backend<V>>, rate_limit: Option<RateLimitConfig>) -> Self {
        Self {
            backend,
            rate_limit,
        }
    }

    pub fn router(&self) -> Router {
        // Configure CORS
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(ADMIN_KEY_HEADER)]);

        let functions = Router::new()
            .route("/create-verified-game", post(create_verified_game::<V>))
            .route("/open-case", post(open_case::<V>))
            .route("/validate-deal-acceptance", post(accept_deal::<V>))
            .route("/reject-deal", post(reject_deal::<V>))
            .route("/final-decision", post(final_decision::<V>))
            .route("/validate-final-winnings", post(validate_winnings::<V>))
            .route("/register-game-payment", post(register_payment::<V>))
            .route("/check-game-payment-status", post(payment_status::<V>))
            .route("/check-pending-scatter", post(pending_scatter::<V>))
            .route("/set-continue-past-nine", post(continue_past_nine::<V>))
            .route("/request-nft-sale", post(request_nft_sale::<V>))
            .route("/set-admin-player-level", post(set_player_level::<V>))
            .route("/merge-duplicate-profiles", post(merge_profiles::<V>))
            .route("/check-leaderboard-period", post(check_period::<V>))
            .route("/pause-leaderboard-period", post(pause_period::<V>))
            .route("/resume-leaderboard-period", post(resume_period::<V>))
            .route("/upsert-trophy", post(upsert_trophy::<V>))
            .route("/create-manual-payout", post(create_manual_payout::<V>))
            .route("/resolve-payout", post(resolve_payout::<V>))
            .route("/update-game-settings", post(update_settings::<V>))
            .route("/list-pending-payouts", post(list_pending_payouts::<V>));

        let router = Router::new()
            .nest(FUNCTIONS_PREFIX, functions)
            .route("/games/:id", get(get_game::<V>))
            .route("/profiles/:wallet", get(get_profile::<V>))
            .route("/leaderboard", get(get_leaderboard::<V>))
            .route("/levels/:xp", get(get_level))
            .route("/updates/:wallet", get(updates_ws::<V>))
            .layer(cors)
            .with_state(self.backend.clone());

        // Configure rate limiting
        let Some(limit) = self.rate_limit else {
            return router;
        };
        match GovernorConfigBuilder::default()
            .per_millisecond(limit.replenish_ms)
            .burst_size(limit.burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
        {
            Some(config) => router.layer(GovernorLayer {
                config: Arc::new(config),
            }),
            None => {
                warn!(?limit, "invalid rate limit, serving without one");
                router
            }
        }
    }
}

/// Failure returned to the caller as an [ErrorResponse].
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error_code: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error_code,
                message: message.into(),
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ERROR_REQUEST, message)
    }

    fn from_code(error_code: u8, message: impl Into<String>) -> Self {
        Self::new(status_for(error_code), error_code, message)
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        error!(?err, "failed to persist changes");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ERROR_REQUEST,
            "Failed to persist changes",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn status_for(error_code: u8) -> StatusCode {
    match error_code {
        ERROR_PROFILE_NOT_FOUND
        | ERROR_GAME_NOT_FOUND
        | ERROR_PAYMENT_NOT_FOUND
        | ERROR_PERIOD_NOT_FOUND
        | ERROR_PAYOUT_NOT_FOUND => StatusCode::NOT_FOUND,
        ERROR_GAME_NOT_OWNED | ERROR_PAYMENT_NOT_OWNED | ERROR_TROPHY_NOT_OWNED => {
            StatusCode::FORBIDDEN
        }
        ERROR_PAYMENT_NOT_CONFIRMED => StatusCode::PAYMENT_REQUIRED,
        ERROR_INVALID_CASE
        | ERROR_INVALID_LEVEL
        | ERROR_INVALID_AMOUNT
        | ERROR_INVALID_SETTINGS
        | ERROR_OFFER_MISMATCH
        | ERROR_WINNINGS_MISMATCH => StatusCode::BAD_REQUEST,
        _ => StatusCode::CONFLICT,
    }
}

/// Apply `instruction`, turning a rejection into an [ApiError].
async fn run<V: PaymentVerifier>(
    backend: &Backend<V>,
    instruction: Instruction,
) -> Result<Vec<Event>, ApiError> {
    let events = backend.execute(instruction).await?;
    let rejection = events.iter().find_map(|event| match event {
        Event::Error {
            error_code,
            message,
            ..
        } => Some(ApiError::from_code(*error_code, message.clone())),
        _ => None,
    });
    match rejection {
        Some(err) => Err(err),
        None => Ok(events),
    }
}

async fn action<V: PaymentVerifier>(
    backend: &Backend<V>,
    instruction: Instruction,
) -> ApiResult<ActionResponse> {
    let events = run(backend, instruction).await?;
    Ok(Json(ActionResponse { events }))
}

async fn game_response<V: PaymentVerifier>(
    backend: &Backend<V>,
    game_id: Uuid,
    events: Vec<Event>,
) -> ApiResult<GameResponse> {
    let game = backend
        .game(&game_id)
        .await
        .ok_or_else(|| ApiError::from_code(ERROR_GAME_NOT_FOUND, "Game not found"))?;
    Ok(Json(GameResponse {
        game: GameView::from(&game),
        events,
    }))
}

fn tx_hash(raw: &str) -> Result<String, ApiError> {
    normalize_tx_hash(raw).ok_or_else(|| ApiError::bad_request("Invalid transaction hash"))
}

fn authorize<V>(backend: &Backend<V>, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    match (backend.admin_key.as_deref(), presented) {
        (Some(expected), Some(presented)) if expected == presented => Ok(()),
        _ => Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            ERROR_REQUEST,
            "Admin key required",
        )),
    }
}

async fn create_verified_game<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<CreateGameRequest>,
) -> ApiResult<GameResponse> {
    let tx_hash = tx_hash(&request.tx_hash)?;
    run(
        &backend,
        Instruction::RegisterPayment {
            wallet: request.wallet,
            tx_hash: tx_hash.clone(),
        },
    )
    .await?;
    backend.refresh_payment(&tx_hash).await?;

    let events = run(
        &backend,
        Instruction::CreateGame {
            wallet: request.wallet,
            player_case: request.player_case,
            payment_tx: tx_hash,
        },
    )
    .await?;
    let game_id = events
        .iter()
        .find_map(|event| match event {
            Event::GameCreated { game_id, .. } => Some(*game_id),
            _ => None,
        })
        .ok_or_else(|| ApiError::from_code(ERROR_GAME_NOT_FOUND, "Game was not created"))?;
    info!(wallet = %request.wallet, %game_id, "game created");
    game_response(&backend, game_id, events).await
}

async fn open_case<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<OpenCaseRequest>,
) -> ApiResult<GameResponse> {
    let events = run(
        &backend,
        Instruction::OpenCase {
            wallet: request.wallet,
            game_id: request.game_id,
            case_number: request.case_number,
        },
    )
    .await?;
    game_response(&backend, request.game_id, events).await
}

async fn accept_deal<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<AcceptDealRequest>,
) -> ApiResult<GameResponse> {
    let events = run(
        &backend,
        Instruction::AcceptDeal {
            wallet: request.wallet,
            game_id: request.game_id,
            offer: request.offer,
        },
    )
    .await?;
    game_response(&backend, request.game_id, events).await
}

async fn reject_deal<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<RejectDealRequest>,
) -> ApiResult<GameResponse> {
    let events = run(
        &backend,
        Instruction::RefuseDeal {
            wallet: request.wallet,
            game_id: request.game_id,
        },
    )
    .await?;
    game_response(&backend, request.game_id, events).await
}

async fn final_decision<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<FinalDecisionRequest>,
) -> ApiResult<GameResponse> {
    let events = run(
        &backend,
        Instruction::FinalDecision {
            wallet: request.wallet,
            game_id: request.game_id,
            swap: request.swap,
        },
    )
    .await?;
    game_response(&backend, request.game_id, events).await
}

async fn validate_winnings<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<ValidateWinningsRequest>,
) -> ApiResult<ValidateWinningsResponse> {
    let game = backend
        .game(&request.game_id)
        .await
        .ok_or_else(|| ApiError::from_code(ERROR_GAME_NOT_FOUND, "Game not found"))?;
    if game.wallet != request.wallet {
        return Err(ApiError::from_code(
            ERROR_GAME_NOT_OWNED,
            "Game belongs to another wallet",
        ));
    }
    match validate_final_winnings(&game, request.claimed) {
        Ok(()) => Ok(Json(ValidateWinningsResponse {
            valid: true,
            recorded: game.final_winnings,
        })),
        Err(GameError::WinningsMismatch { claimed, recorded }) => {
            warn!(wallet = %request.wallet, game_id = %request.game_id, claimed, ?recorded, "winnings mismatch");
            Ok(Json(ValidateWinningsResponse {
                valid: false,
                recorded,
            }))
        }
        Err(err) => Err(ApiError::from_code(err.code(), err.to_string())),
    }
}

async fn register_payment<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<RegisterPaymentRequest>,
) -> ApiResult<PaymentStatusResponse> {
    let tx_hash = tx_hash(&request.tx_hash)?;
    run(
        &backend,
        Instruction::RegisterPayment {
            wallet: request.wallet,
            tx_hash: tx_hash.clone(),
        },
    )
    .await?;
    let payment = backend
        .refresh_payment(&tx_hash)
        .await?
        .ok_or_else(|| ApiError::from_code(ERROR_PAYMENT_NOT_FOUND, "Payment not registered"))?;
    Ok(Json(PaymentStatusResponse::from(&payment)))
}

async fn payment_status<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<PaymentStatusRequest>,
) -> ApiResult<PaymentStatusResponse> {
    let tx_hash = tx_hash(&request.tx_hash)?;
    let payment = backend
        .refresh_payment(&tx_hash)
        .await?
        .ok_or_else(|| ApiError::from_code(ERROR_PAYMENT_NOT_FOUND, "Payment not registered"))?;
    Ok(Json(PaymentStatusResponse::from(&payment)))
}

async fn pending_scatter<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<WalletRequest>,
) -> ApiResult<PendingScatterResponse> {
    Ok(Json(PendingScatterResponse {
        pending: backend.pending_scatter(&request.wallet).await,
    }))
}

async fn continue_past_nine<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<ContinuePastNineRequest>,
) -> ApiResult<ActionResponse> {
    action(
        &backend,
        Instruction::SetContinuePastNine {
            wallet: request.wallet,
            enabled: request.enabled,
        },
    )
    .await
}

async fn request_nft_sale<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Json(request): Json<NftSaleRequestBody>,
) -> ApiResult<ActionResponse> {
    action(
        &backend,
        Instruction::RequestNftSale {
            wallet: request.wallet,
            level: request.level,
        },
    )
    .await
}

async fn set_player_level<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
    Json(request): Json<SetPlayerLevelRequest>,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(
        &backend,
        Instruction::SetPlayerLevel {
            wallet: request.wallet,
            level: request.level,
        },
    )
    .await
}

async fn merge_profiles<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
    Json(request): Json<MergeProfilesRequest>,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    let duplicates = request
        .duplicates
        .iter()
        .map(|raw| {
            Address::parse(raw).map_err(|_| ApiError::bad_request(format!("Invalid wallet: {raw}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    action(
        &backend,
        Instruction::MergeProfiles {
            primary: request.primary,
            duplicates,
        },
    )
    .await
}

async fn check_period<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(&backend, Instruction::CheckLeaderboardPeriod).await
}

async fn pause_period<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(&backend, Instruction::PauseLeaderboardPeriod).await
}

async fn resume_period<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(&backend, Instruction::ResumeLeaderboardPeriod).await
}

async fn upsert_trophy<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
    Json(trophy): Json<Trophy>,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(&backend, Instruction::UpsertTrophy(trophy)).await
}

async fn create_manual_payout<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
    Json(request): Json<ManualPayoutRequest>,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(
        &backend,
        Instruction::CreateManualPayout {
            wallet: request.wallet,
            amount: request.amount,
            reason: request.reason,
        },
    )
    .await
}

async fn resolve_payout<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
    Json(request): Json<ResolvePayoutRequest>,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(
        &backend,
        Instruction::ResolvePayout {
            kind: request.kind,
            id: request.id,
            approve: request.approve,
        },
    )
    .await
}

async fn update_settings<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
    Json(settings): Json<GameSettings>,
) -> ApiResult<ActionResponse> {
    authorize(&backend, &headers)?;
    action(&backend, Instruction::UpdateSettings(settings)).await
}

async fn list_pending_payouts<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    headers: HeaderMap,
) -> ApiResult<PendingPayoutsResponse> {
    authorize(&backend, &headers)?;
    Ok(Json(backend.pending_payouts().await))
}

async fn get_game<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Path(game_id): Path<Uuid>,
) -> ApiResult<GameView> {
    let game = backend
        .game(&game_id)
        .await
        .ok_or_else(|| ApiError::from_code(ERROR_GAME_NOT_FOUND, "Game not found"))?;
    Ok(Json(GameView::from(&game)))
}

async fn get_profile<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Path(wallet): Path<String>,
) -> ApiResult<ProfileResponse> {
    let wallet =
        Address::parse(&wallet).map_err(|_| ApiError::bad_request("Invalid wallet address"))?;
    let profile = backend
        .profile(&wallet)
        .await
        .ok_or_else(|| ApiError::from_code(ERROR_PROFILE_NOT_FOUND, "Profile not found"))?;
    Ok(Json(profile))
}

async fn get_leaderboard<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
) -> ApiResult<LeaderboardResponse> {
    Ok(Json(backend.leaderboard().await))
}

/// Level progress for any XP value. Unparseable or negative input reads as 0.
async fn get_level(Path(xp): Path<String>) -> Json<LevelResponse> {
    Json(LevelResponse::new(clamp_xp(xp.parse().ok())))
}

async fn updates_ws<V: PaymentVerifier>(
    AxumState(backend): Shared<V>,
    Path(wallet): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let wallet = match Address::parse(&wallet) {
        Ok(wallet) => wallet,
        Err(_) => return ApiError::bad_request("Invalid wallet address").into_response(),
    };
    let updates = backend.subscribe();
    ws.on_upgrade(move |socket| handle_updates_ws(socket, updates, wallet))
}

/// Events for `wallet` plus public events, as JSON text frames.
fn is_relevant(event: &Event, wallet: &Address) -> bool {
    match event.wallet() {
        Some(owner) => owner == wallet,
        None => true,
    }
}

async fn handle_updates_ws(
    socket: WebSocket,
    mut updates: broadcast::Receiver<Event>,
    wallet: Address,
) {
    info!(%wallet, "updates websocket connected");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) => {
                        debug!(%wallet, "client closed websocket");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            warn!(%wallet, "failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(%wallet, ?err, "websocket error");
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(event) => {
                        if !is_relevant(&event, &wallet) {
                            continue;
                        }
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(err) => {
                                error!(?err, "failed to serialize event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(text)).await.is_err() {
                            warn!(%wallet, "failed to send update, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%wallet, skipped, "websocket client lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    info!(%wallet, "updates websocket closed");
    let _ = sender.close().await;
}
