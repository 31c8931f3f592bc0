//! HTTP API Server
//!
//! REST surface over the chain readers, the quote client, the sweep
//! executor, and the orchestrator. Wire shapes use camelCase JSON; every
//! error response carries a stable machine code alongside the message.

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::chain::ChainReader;
use crate::common::{OmniSweepError, Result};
use crate::config::OmniSweepConfig;
use crate::contracts::{contract_listing, Chain, OMNISWEEPER, TEST_DUST_TOKEN};
use crate::executor::SweepExecutor;
use crate::logging::{generate_correlation_id, log_api_request};
use crate::executor::SweepSubmission;
use crate::orchestrator::SweepOrchestrator;
use crate::quote::QuoteClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<OmniSweepConfig>,
    pub reader: Arc<dyn ChainReader>,
    pub quotes: Arc<QuoteClient>,
    pub executor: Arc<SweepExecutor>,
    pub orchestrator: Arc<SweepOrchestrator>,
}

/// Error wrapper mapping the service taxonomy onto HTTP responses
pub struct ApiError(OmniSweepError);

impl<E: Into<OmniSweepError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "code": self.0.error_code(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn parse_address(s: &str, field: &str) -> Result<Address> {
    Address::from_str(s)
        .map_err(|_| OmniSweepError::validation(format!("{} is not a valid address: {}", field, s)))
}

fn parse_amount(s: &str, field: &str) -> Result<U256> {
    U256::from_str_radix(s, 10)
        .map_err(|_| OmniSweepError::validation(format!("{} is not a base-unit amount: {}", field, s)))
}

fn parse_hash(s: &str) -> Result<B256> {
    B256::from_str(s)
        .map_err(|_| OmniSweepError::validation(format!("not a transaction hash: {}", s)))
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let correlation_id = generate_correlation_id();

    let response = next.run(req).await;
    log_api_request(&method, &path, response.status().as_u16(), &correlation_id);
    response
}

/// Build the router over the shared state
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/contracts", get(contracts))
        .route("/api/quote", get(quote))
        .route("/api/sweep", post(sweep))
        .route("/api/sweep/orchestrated", post(orchestrated_sweep))
        .route("/api/sweep/attempt/:id", get(sweep_attempt))
        .route("/api/transaction/:hash", get(transaction))
        .route("/api/balance/:address", get(balance))
        .route("/api/allowance/:address", get(allowance))
        .route("/api/receipts/:address", get(receipts))
        .route("/api/stats", get(stats))
        .route("/api/tokens/:address", get(tokens))
        .layer(axum::middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "omnisweep-backend",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "signerConfigured": state.executor.can_submit(),
        "dataSource": format!("{:?}", state.config.data_source).to_lowercase(),
        "contracts": contract_listing(),
    }))
}

async fn contracts() -> Json<serde_json::Value> {
    Json(contract_listing())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteQuery {
    token_in: String,
    amount: String,
    chain_id: Option<u64>,
}

async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let token_in = parse_address(&query.token_in, "tokenIn")?;
    let amount = parse_amount(&query.amount, "amount")?;
    let chain_id = query.chain_id.unwrap_or_else(|| Chain::EthSepolia.chain_id());

    let quote = state.quotes.get_quote(token_in, amount, chain_id).await?;
    Ok(Json(json!({ "success": true, "quote": quote })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepRequest {
    user_address: String,
    token_in: String,
    amount: String,
    one_inch_data: String,
    min_usdc_out: String,
}

/// Body shape for a broadcast, unconfirmed sweep transaction
fn submission_response(submission: &SweepSubmission) -> serde_json::Value {
    json!({
        "success": true,
        "status": "submitted",
        "txHash": submission.hash,
        "explorerUrl": Chain::EthSepolia.explorer_tx_url(&submission.hash),
        "submission": submission,
    })
}

/// Submit a sweep through the backend signer.
///
/// Returns as soon as the transaction is broadcast; confirmation is the
/// caller's to poll via GET /api/transaction/:hash. Replying before the
/// receipt keeps the response unambiguous about what happened, so a
/// timeout can never read as an invitation to resubmit.
async fn sweep(
    State(state): State<AppState>,
    Json(request): Json<SweepRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = parse_address(&request.user_address, "userAddress")?;
    let token_in = parse_address(&request.token_in, "tokenIn")?;
    let amount = parse_amount(&request.amount, "amount")?;
    let min_usdc_out = parse_amount(&request.min_usdc_out, "minUsdcOut")?;
    let one_inch_data: Bytes = request
        .one_inch_data
        .parse()
        .map_err(|_| OmniSweepError::validation("oneInchData is not hex calldata"))?;

    if amount.is_zero() {
        return Err(OmniSweepError::validation("amount must be greater than zero").into());
    }

    let submission = state
        .executor
        .execute_sweep(user, token_in, amount, one_inch_data, min_usdc_out)
        .await?;

    Ok(Json(submission_response(&submission)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrchestratedSweepRequest {
    user_address: String,
    token_in: String,
    amount: String,
}

/// Run the full orchestrated flow and return the terminal attempt
async fn orchestrated_sweep(
    State(state): State<AppState>,
    Json(request): Json<OrchestratedSweepRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = parse_address(&request.user_address, "userAddress")?;
    let token_in = parse_address(&request.token_in, "tokenIn")?;
    let amount = parse_amount(&request.amount, "amount")?;

    let attempt = state.orchestrator.run_sweep(user, token_in, amount).await?;
    Ok(Json(json!({ "attempt": attempt })))
}

async fn sweep_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    match state.orchestrator.attempt(&id) {
        Some(attempt) => Ok(Json(json!({ "attempt": attempt })).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": { "code": "NOT_FOUND", "message": format!("no attempt {}", id) }
            })),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct TxQuery {
    chain: Option<String>,
}

async fn transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(query): Query<TxQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let chain = match query.chain.as_deref() {
        Some(s) => Chain::from_str(s).map_err(OmniSweepError::validation)?,
        None => Chain::EthSepolia,
    };
    let parsed = parse_hash(&hash)?;

    match state.reader.transaction_receipt(chain, parsed).await? {
        Some(receipt) => Ok(Json(json!({
            "confirmed": true,
            "receipt": receipt,
            "explorerUrl": chain.explorer_tx_url(&hash),
        }))),
        None => Ok(Json(json!({
            "confirmed": false,
            "status": "pending",
            "hash": hash,
        }))),
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
    spender: Option<String>,
}

async fn balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let owner = parse_address(&address, "address")?;
    let token = match query.token.as_deref() {
        Some(t) => parse_address(t, "token")?,
        None => TEST_DUST_TOKEN,
    };

    let balance = state.reader.token_balance(owner, token).await?;
    Ok(Json(json!({ "balance": balance })))
}

async fn allowance(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let owner = parse_address(&address, "address")?;
    let token = match query.token.as_deref() {
        Some(t) => parse_address(t, "token")?,
        None => TEST_DUST_TOKEN,
    };
    let spender = match query.spender.as_deref() {
        Some(s) => parse_address(s, "spender")?,
        None => OMNISWEEPER,
    };

    let allowance = state.reader.token_allowance(owner, token, spender).await?;
    Ok(Json(json!({ "allowance": allowance })))
}

async fn receipts(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = parse_address(&address, "address")?;
    let stats = state.reader.user_stats(user).await?;
    Ok(Json(json!({ "userStats": stats })))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.reader.protocol_stats().await?;
    Ok(Json(json!({ "protocolStats": stats })))
}

async fn tokens(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let owner = parse_address(&address, "address")?;
    let tokens = state.reader.dust_tokens(owner).await?;
    Ok(Json(json!({ "tokens": tokens })))
}

/// Bind and serve until the process exits
pub async fn start_server(state: AppState) -> Result<()> {
    let port = state.config.port;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(target: "omnisweep::api", port, "HTTP API listening");

    println!("OmniSweep backend listening on port {}", port);
    println!("  GET  /api/health");
    println!("  GET  /api/contracts");
    println!("  GET  /api/quote?tokenIn=&amount=&chainId=");
    println!("  POST /api/sweep");
    println!("  POST /api/sweep/orchestrated");
    println!("  GET  /api/sweep/attempt/:id");
    println!("  GET  /api/transaction/:hash?chain=");
    println!("  GET  /api/balance/:address?token=");
    println!("  GET  /api/allowance/:address?token=&spender=");
    println!("  GET  /api/receipts/:address");
    println!("  GET  /api/stats");
    println!("  GET  /api/tokens/:address");

    axum::serve(listener, app)
        .await
        .map_err(|e| OmniSweepError::internal(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::FixtureChainReader;
    use crate::orchestrator::demo_orchestrator;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    const USER: &str = "0x0101010101010101010101010101010101010101";

    fn fixture_state() -> AppState {
        let reader = Arc::new(FixtureChainReader::new());
        // Unroutable aggregator so quote tests exercise the mock fallback.
        let quotes = Arc::new(QuoteClient::new("http://127.0.0.1:9", None));
        let orchestrator = Arc::new(demo_orchestrator(reader.clone(), quotes.clone()));

        AppState {
            config: Arc::new(OmniSweepConfig::default()),
            reader,
            quotes,
            executor: Arc::new(SweepExecutor::read_only()),
            orchestrator,
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_read_only_mode() {
        let (status, body) = get(router(fixture_state()), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["signerConfigured"], false);
    }

    #[tokio::test]
    async fn test_contract_listing_served() {
        let (status, body) = get(router(fixture_state()), "/api/contracts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ethSepolia"]["chainId"], 11155111);
    }

    #[tokio::test]
    async fn test_quote_zero_amount_is_bad_request() {
        let uri = format!("/api/quote?tokenIn={}&amount=0", TEST_DUST_TOKEN);
        let (status, body) = get(router(fixture_state()), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_quote_degrades_to_flagged_mock() {
        let uri = format!("/api/quote?tokenIn={}&amount=1000000000000000000", TEST_DUST_TOKEN);
        let (status, body) = get(router(fixture_state()), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quote"]["isMock"], true);
        assert_eq!(body["quote"]["estimatedOutput"], "1000000");
        assert_eq!(body["quote"]["minOutput"], "950000");
    }

    #[test]
    fn test_sweep_response_is_submission_shaped() {
        let submission = SweepSubmission {
            hash: format!("{:#x}", B256::from([1u8; 32])),
            from: Address::ZERO,
            to: OMNISWEEPER,
            value: "10000000000000000".into(),
            gas_limit: "240000".into(),
        };

        let body = submission_response(&submission);
        assert_eq!(body["status"], "submitted");
        assert_eq!(body["submission"]["gasLimit"], "240000");
        // No confirmation claims in the submission reply.
        assert!(body.get("receipt").is_none());
    }

    #[tokio::test]
    async fn test_sweep_without_signer_is_service_unavailable() {
        let (status, body) = post(
            router(fixture_state()),
            "/api/sweep",
            serde_json::json!({
                "userAddress": USER,
                "tokenIn": TEST_DUST_TOKEN.to_string(),
                "amount": "1000",
                "oneInchData": "0x",
                "minUsdcOut": "950",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SIGNER_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_orchestrated_sweep_over_demo_backend() {
        let (status, body) = post(
            router(fixture_state()),
            "/api/sweep/orchestrated",
            serde_json::json!({
                "userAddress": USER,
                "tokenIn": TEST_DUST_TOKEN.to_string(),
                "amount": "10000000000000000000",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attempt"]["status"], "success");
        assert_eq!(body["attempt"]["finalSettlement"]["amount"], "950000");
    }

    #[tokio::test]
    async fn test_attempt_lookup_after_orchestrated_sweep() {
        let state = fixture_state();
        let (_, body) = post(
            router(state.clone()),
            "/api/sweep/orchestrated",
            serde_json::json!({
                "userAddress": USER,
                "tokenIn": TEST_DUST_TOKEN.to_string(),
                "amount": "1000",
            }),
        )
        .await;
        let id = body["attempt"]["id"].as_str().unwrap().to_string();

        let (status, body) =
            get(router(state.clone()), &format!("/api/sweep/attempt/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attempt"]["id"], id.as_str());

        let (status, _) = get(router(state), "/api/sweep/attempt/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_balance_from_fixture() {
        let uri = format!("/api/balance/{}", USER);
        let (status, body) = get(router(fixture_state()), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"]["symbol"], "DUST");
        assert_eq!(body["balance"]["formatted"], "10.0");
    }

    #[tokio::test]
    async fn test_allowance_defaults_to_sweeper_spender() {
        let uri = format!("/api/allowance/{}", USER);
        let (status, body) = get(router(fixture_state()), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowance"]["needsApproval"], true);
    }

    #[tokio::test]
    async fn test_unmined_transaction_is_pending_not_failed() {
        let hash = format!("{:#x}", B256::from([7u8; 32]));
        let (status, body) =
            get(router(fixture_state()), &format!("/api/transaction/{}", hash)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["confirmed"], false);
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn test_stats_and_receipts() {
        let state = fixture_state();
        let (status, body) = get(router(state.clone()), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["protocolStats"]["totalCount"], 7);

        let (status, body) = get(router(state), &format!("/api/receipts/{}", USER)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userStats"]["sweepCount"], 0);
    }

    #[tokio::test]
    async fn test_tokens_listing() {
        let (status, body) = get(router(fixture_state()), &format!("/api/tokens/{}", USER)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tokens"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_address_rejected() {
        let (status, body) = get(router(fixture_state()), "/api/balance/banana").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
