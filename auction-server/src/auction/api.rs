use {
    super::{
        entities,
        service::{
            add_auction::AddAuctionInput,
            get_auction_by_id::GetAuctionByIdInput,
            get_auctions::GetAuctionsInput,
            handle_bid::HandleBidInput,
        },
    },
    crate::{
        api::{
            Auth,
            RestError,
        },
        models::UserRole,
        state::StoreNew,
    },
    axum::{
        extract::{
            Path,
            Query,
            State,
        },
        Json,
    },
    bidhall_api_types::{
        auction::{
            Auction,
            AuctionCreate,
            AuctionId,
            AuctionStatus,
            Bid,
            BidCreate,
            BidResult,
            GetAuctionsQueryParams,
        },
        ErrorBodyResponse,
    },
    std::sync::Arc,
};

impl From<entities::AuctionStatus> for AuctionStatus {
    fn from(status: entities::AuctionStatus) -> Self {
        match status {
            entities::AuctionStatus::Pending => AuctionStatus::Pending,
            entities::AuctionStatus::Live => AuctionStatus::Live,
            entities::AuctionStatus::Finished => AuctionStatus::Finished,
        }
    }
}

impl From<entities::Bid> for Bid {
    fn from(bid: entities::Bid) -> Self {
        Self {
            id:            bid.id,
            bidder:        bid.bidder,
            amount:        bid.amount,
            creation_time: bid.creation_time,
        }
    }
}

impl From<entities::Auction> for Auction {
    fn from(auction: entities::Auction) -> Self {
        Self {
            id:              auction.id,
            title:           auction.title,
            description:     auction.description,
            vehicles:        auction.vehicles,
            start_time:      auction.start_time,
            end_time:        auction.end_time,
            status:          auction.status.into(),
            starting_price:  auction.starting_price,
            current_bid:     auction.current_bid,
            highest_bidder:  auction.highest_bidder,
            winner:          auction.winner,
            bids:            auction.bids.into_iter().map(Into::into).collect(),
            creation_time:   auction.creation_time,
            conclusion_time: auction.conclusion_time,
        }
    }
}

/// Create an auction for one or more vehicles.
///
/// The auction is created pending and goes live automatically when its start
/// time arrives. Administrator access is required.
#[utoipa::path(post, path = "/v1/auctions", request_body = AuctionCreate, responses(
    (status = 200, description = "Auction was created successfully", body = Auction),
    (status = 400, response = ErrorBodyResponse),
    (status = 403, description = "Caller is not an administrator", body = ErrorBodyResponse),
),)]
pub async fn post_auction(
    auth: Auth,
    State(store): State<Arc<StoreNew>>,
    Json(auction_create): Json<AuctionCreate>,
) -> Result<Json<Auction>, RestError> {
    let user = match auth {
        Auth::Authorized(_, user) => user,
        Auth::Unauthorized => return Err(RestError::Unauthorized),
    };
    if user.role != UserRole::Admin {
        return Err(RestError::Forbidden);
    }
    let auction = store
        .auction_service
        .add_auction(AddAuctionInput {
            auction_create: entities::AuctionCreate {
                title:          auction_create.title,
                description:    auction_create.description,
                vehicles:       auction_create.vehicles,
                start_time:     auction_create.start_time,
                end_time:       auction_create.end_time,
                starting_price: auction_create.starting_price,
            },
        })
        .await?;
    Ok(Json(auction.into()))
}

/// List auctions, optionally sorted by recency, price, or bid activity.
#[utoipa::path(get, path = "/v1/auctions", responses(
    (status = 200, description = "List of auctions for the specified query", body = Vec<Auction>),
    (status = 400, response = ErrorBodyResponse),
),  params(GetAuctionsQueryParams),
)]
pub async fn get_auctions(
    State(store): State<Arc<StoreNew>>,
    query: Query<GetAuctionsQueryParams>,
) -> Result<Json<Vec<Auction>>, RestError> {
    let auctions = store
        .auction_service
        .get_auctions(GetAuctionsInput {
            sort_by: query.sort_by.unwrap_or_default(),
        })
        .await?;
    Ok(Json(auctions.into_iter().map(Into::into).collect()))
}

/// Query a single auction, including its full bid history.
#[utoipa::path(get, path = "/v1/auctions/{auction_id}",
    params(("auction_id" = String, description = "Auction id to query for")),
    responses(
    (status = 200, body = Auction),
    (status = 404, description = "Auction was not found", body = ErrorBodyResponse),
),)]
pub async fn get_auction(
    State(store): State<Arc<StoreNew>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Json<Auction>, RestError> {
    let auction = store
        .auction_service
        .get_auction_by_id(GetAuctionByIdInput { auction_id })
        .await?;
    Ok(Json(auction.into()))
}

/// Bid on a live auction.
///
/// The bid amount must strictly exceed the auction's current bid. On success
/// the updated auction is returned and the new price is broadcast to the
/// auction's room.
#[utoipa::path(post, path = "/v1/bids", request_body = BidCreate, responses(
    (status = 200, description = "Bid was placed successfully", body = BidResult),
    (status = 400, response = ErrorBodyResponse),
    (status = 404, description = "Auction was not found", body = ErrorBodyResponse),
),)]
pub async fn post_bid(
    auth: Auth,
    State(store): State<Arc<StoreNew>>,
    Json(bid_create): Json<BidCreate>,
) -> Result<Json<BidResult>, RestError> {
    process_bid(auth, store, bid_create).await
}

// Shared by the rest route and the websocket `place_bid` message. The bidder
// identity always comes from the authenticated caller, never the payload.
pub async fn process_bid(
    auth: Auth,
    store: Arc<StoreNew>,
    bid_create: BidCreate,
) -> Result<Json<BidResult>, RestError> {
    let user = match auth {
        Auth::Authorized(_, user) => user,
        Auth::Unauthorized => return Err(RestError::Unauthorized),
    };
    let (bid, auction) = store
        .auction_service
        .handle_bid(HandleBidInput {
            auction_id: bid_create.auction_id,
            bidder:     user.id,
            amount:     bid_create.amount,
        })
        .await?;
    Ok(Json(BidResult {
        status:  "OK".to_string(),
        id:      bid.id,
        auction: auction.into(),
    }))
}
