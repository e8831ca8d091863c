use {
    crate::{
        auction::api as auction_api,
        config::RunOptions,
        models::{
            AccessToken,
            User,
        },
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
        state::StoreNew,
    },
    anyhow::Result,
    axum::{
        async_trait,
        extract::FromRequestParts,
        http::{
            request::Parts,
            StatusCode,
        },
        response::{
            IntoResponse,
            Response,
        },
        routing::{
            get,
            post,
        },
        Json,
        Router,
    },
    axum_extra::{
        headers::{
            authorization::Bearer,
            Authorization,
        },
        TypedHeader,
    },
    bidhall_api_types::{
        auction::{
            Auction,
            AuctionCreate,
            AuctionStatus,
            Bid,
            BidCreate,
            BidResult,
            SortBy,
        },
        ws::{
            APIResponse,
            AuctionEndedUpdate,
            AuctionStartedUpdate,
            AuctionWonUpdate,
            ClientMessage,
            ClientRequest,
            NewBidUpdate,
            OutbidUpdate,
            ServerResultMessage,
            ServerResultResponse,
            ServerUpdateResponse,
        },
        ErrorBodyResponse,
    },
    clap::crate_version,
    std::sync::{
        atomic::Ordering,
        Arc,
    },
    tower_http::cors::CorsLayer,
    utoipa::OpenApi,
    utoipa_redoc::{
        Redoc,
        Servable,
    },
};

pub mod ws;

async fn root() -> String {
    format!("Bidhall Auction Server API {}", crate_version!())
}

pub async fn live() -> Response {
    (StatusCode::OK, "OK").into_response()
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestError {
    /// The request contained invalid parameters.
    BadParameters(String),
    /// The auction was not found.
    AuctionNotFound,
    /// The auction is not live or the current time is outside its window.
    AuctionNotLive,
    /// The bid amount does not strictly exceed the auction's current bid.
    BidTooLow,
    /// A concurrent bid won the race for the same price level and internal
    /// retries were exhausted.
    BidConflict,
    /// The caller did not present a valid access token.
    Unauthorized,
    /// The caller is authenticated but lacks the required role.
    Forbidden,
    /// The identity already holds the maximum number of open websocket connections.
    TooManyConnections,
    /// Internal error occurred during processing the request.
    TemporarilyUnavailable,
}

impl RestError {
    pub fn to_status_and_message(&self) -> (StatusCode, String) {
        match self {
            RestError::BadParameters(msg) => {
                (StatusCode::BAD_REQUEST, format!("Bad parameters: {}", msg))
            }
            RestError::AuctionNotFound => (
                StatusCode::NOT_FOUND,
                "Auction with the specified id was not found".to_string(),
            ),
            RestError::AuctionNotLive => (
                StatusCode::BAD_REQUEST,
                "Auction is not live or is outside its bidding window".to_string(),
            ),
            RestError::BidTooLow => (
                StatusCode::BAD_REQUEST,
                "Bid amount must strictly exceed the auction's current bid".to_string(),
            ),
            RestError::BidConflict => (
                StatusCode::CONFLICT,
                "Another bid was accepted concurrently; fetch the auction and bid again"
                    .to_string(),
            ),
            RestError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing access token".to_string(),
            ),
            RestError::Forbidden => (
                StatusCode::FORBIDDEN,
                "This operation requires administrator access".to_string(),
            ),
            RestError::TooManyConnections => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many open websocket connections for this user".to_string(),
            ),
            RestError::TemporarilyUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "This service is temporarily unavailable".to_string(),
            ),
        }
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_status_and_message().1)
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, msg) = self.to_status_and_message();
        (status, Json(ErrorBodyResponse { error: msg })).into_response()
    }
}

#[derive(Clone)]
pub enum Auth {
    Authorized(AccessToken, User),
    Unauthorized,
}

#[async_trait]
impl FromRequestParts<Arc<StoreNew>> for Auth {
    type Rejection = RestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<StoreNew>,
    ) -> Result<Self, Self::Rejection> {
        match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await {
            Ok(TypedHeader(token)) => {
                // A presented token must resolve; a bad token is rejected
                // rather than downgraded to an anonymous caller.
                let user = state
                    .store
                    .get_user_by_access_token(token.token())
                    .await?;
                Ok(Auth::Authorized(token.token().to_string(), user))
            }
            Err(_) => Ok(Auth::Unauthorized),
        }
    }
}

pub async fn start_api(run_options: RunOptions, store: Arc<StoreNew>) -> Result<()> {
    // Make sure functions included in the paths section have distinct names, otherwise some api generators will fail
    #[derive(OpenApi)]
    #[openapi(
    paths(
    crate::auction::api::post_auction,
    crate::auction::api::get_auctions,
    crate::auction::api::get_auction,
    crate::auction::api::post_bid,
    ),
    components(
    schemas(
    Auction,
    AuctionCreate,
    AuctionStatus,
    Bid,
    BidCreate,
    BidResult,
    SortBy,
    ErrorBodyResponse,
    APIResponse,
    ClientMessage,
    ClientRequest,
    NewBidUpdate,
    AuctionStartedUpdate,
    AuctionEndedUpdate,
    OutbidUpdate,
    AuctionWonUpdate,
    ServerResultMessage,
    ServerResultResponse,
    ServerUpdateResponse,
    ),
    responses(
    ErrorBodyResponse,
    Auction,
    BidResult,
    ),
    ),
    tags(
    (name = "Bidhall Auction Server", description = "The auction server runs the marketplace's live vehicle auctions. \
    It validates and applies bids, broadcasts auction activity to connected clients, and settles auctions when their window closes.")
    )
    )]
    struct ApiDoc;

    let auction_routes = Router::new()
        .route("/", post(auction_api::post_auction))
        .route("/", get(auction_api::get_auctions))
        .route("/:auction_id", get(auction_api::get_auction));
    let bid_routes = Router::new().route("/", post(auction_api::post_bid));

    let v1_routes = Router::new().nest(
        "/v1",
        Router::new()
            .nest("/auctions", auction_routes)
            .nest("/bids", bid_routes)
            .route("/ws", get(ws::ws_route_handler)),
    );

    let app: Router<()> = Router::new()
        .merge(Redoc::with_url("/docs", ApiDoc::openapi()))
        .merge(v1_routes)
        .route("/", get(root))
        .route("/live", get(live))
        .layer(CorsLayer::permissive())
        .with_state(store);

    let listener = tokio::net::TcpListener::bind(&run_options.server.listen_addr).await?;
    tracing::info!(listen_addr = %run_options.server.listen_addr, "Starting api server...");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            while !SHOULD_EXIT.load(Ordering::Acquire) {
                tokio::time::sleep(EXIT_CHECK_INTERVAL).await;
            }
            tracing::info!("Shutting down api server...");
        })
        .await?;
    Ok(())
}
