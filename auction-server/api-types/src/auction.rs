use {
    crate::{
        Amount,
        UserId,
        VehicleId,
    },
    serde::{
        Deserialize,
        Serialize,
    },
    time::OffsetDateTime,
    utoipa::{
        IntoParams,
        ToResponse,
        ToSchema,
    },
    uuid::Uuid,
};

pub type AuctionId = Uuid;
pub type BidId = Uuid;

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// The auction has been created but its start time has not arrived yet.
    #[schema(title = "Pending")]
    Pending,
    /// The auction is inside its bidding window and accepts bids.
    #[schema(title = "Live")]
    Live,
    /// The auction has been settled. No further bids are accepted.
    #[schema(title = "Finished")]
    Finished,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, PartialEq, Debug)]
pub struct Bid {
    /// The unique id for the bid.
    #[schema(example = "obo3ee3e-58cc-4372-a567-0e02b2c3d479", value_type = String)]
    pub id:            BidId,
    /// The dealer who placed the bid.
    #[schema(example = "5b6b8c3d-58cc-4372-a567-0e02b2c3d479", value_type = String)]
    pub bidder:        UserId,
    /// The bid amount in minor currency units.
    #[schema(example = 250_000)]
    pub amount:        Amount,
    /// The time the bid was accepted by the server.
    #[schema(example = "2026-08-01T12:00:00+00:00", value_type = String)]
    #[serde(with = "crate::serde::datetime")]
    pub creation_time: OffsetDateTime,
}

#[derive(Serialize, Deserialize, ToResponse, ToSchema, Clone, PartialEq, Debug)]
pub struct Auction {
    /// The unique id for the auction.
    #[schema(example = "beedbeed-58cc-4372-a567-0e02b2c3d479", value_type = String)]
    pub id:              AuctionId,
    /// Short human readable title shown in listings.
    #[schema(example = "2019 Land Cruiser, single owner")]
    pub title:           String,
    /// Free-form description of the lot.
    pub description:     String,
    /// The vehicles included in this lot.
    #[schema(value_type = Vec<String>)]
    pub vehicles:        Vec<VehicleId>,
    /// The time bidding opens.
    #[schema(example = "2026-08-01T12:00:00+00:00", value_type = String)]
    #[serde(with = "crate::serde::datetime")]
    pub start_time:      OffsetDateTime,
    /// The time bidding closes.
    #[schema(example = "2026-08-02T12:00:00+00:00", value_type = String)]
    #[serde(with = "crate::serde::datetime")]
    pub end_time:        OffsetDateTime,
    pub status:          AuctionStatus,
    /// The price bidding starts at, in minor currency units.
    #[schema(example = 200_000)]
    pub starting_price:  Amount,
    /// The highest accepted bid amount, or the starting price if there are no bids yet.
    #[schema(example = 250_000)]
    pub current_bid:     Amount,
    /// The dealer holding the current bid. None until the first bid is accepted.
    #[schema(example = "5b6b8c3d-58cc-4372-a567-0e02b2c3d479", value_type = Option<String>)]
    pub highest_bidder:  Option<UserId>,
    /// The winning dealer. Set at settlement only.
    #[schema(example = "5b6b8c3d-58cc-4372-a567-0e02b2c3d479", value_type = Option<String>)]
    pub winner:          Option<UserId>,
    /// All accepted bids, oldest first.
    pub bids:            Vec<Bid>,
    /// The time the auction record was created.
    #[schema(example = "2026-07-30T12:00:00+00:00", value_type = String)]
    #[serde(with = "crate::serde::datetime")]
    pub creation_time:   OffsetDateTime,
    /// The time the auction was settled, if it has been.
    #[schema(example = "2026-08-02T12:00:30+00:00", value_type = Option<String>)]
    #[serde(with = "crate::serde::nullable_datetime")]
    pub conclusion_time: Option<OffsetDateTime>,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
pub struct AuctionCreate {
    #[schema(example = "2019 Land Cruiser, single owner")]
    pub title:          String,
    pub description:    String,
    #[schema(value_type = Vec<String>)]
    pub vehicles:       Vec<VehicleId>,
    /// The time bidding opens.
    #[schema(example = "2026-08-01T12:00:00+00:00", value_type = String)]
    #[serde(with = "crate::serde::datetime")]
    pub start_time:     OffsetDateTime,
    /// The time bidding closes. Must be after the start time.
    #[schema(example = "2026-08-02T12:00:00+00:00", value_type = String)]
    #[serde(with = "crate::serde::datetime")]
    pub end_time:       OffsetDateTime,
    /// The price bidding starts at, in minor currency units.
    #[schema(example = 200_000)]
    pub starting_price: Amount,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
pub struct BidCreate {
    /// The auction to bid on.
    #[schema(example = "beedbeed-58cc-4372-a567-0e02b2c3d479", value_type = String)]
    pub auction_id: AuctionId,
    /// The proposed bid amount in minor currency units.
    /// Must strictly exceed the auction's current bid.
    #[schema(example = 260_000)]
    pub amount:     Amount,
}

#[derive(Serialize, Deserialize, ToResponse, ToSchema, Clone, Debug)]
pub struct BidResult {
    /// The status of the request. If the bid was placed successfully, the status will be "OK".
    #[schema(example = "OK")]
    pub status:  String,
    /// The unique id created to identify the bid.
    #[schema(example = "beedbeed-58cc-4372-a567-0e02b2c3d479", value_type = String)]
    pub id:      BidId,
    /// The auction as updated by this bid.
    pub auction: Auction,
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Most recently created auctions first.
    #[default]
    Recency,
    /// Highest current bid first.
    Price,
    /// Most bids first.
    Activity,
}

#[derive(Serialize, Deserialize, IntoParams, Clone, Copy, Debug, Default)]
pub struct GetAuctionsQueryParams {
    /// The order auctions are returned in. Defaults to recency.
    #[param(example = "price", value_type = Option<SortBy>)]
    pub sort_by: Option<SortBy>,
}
