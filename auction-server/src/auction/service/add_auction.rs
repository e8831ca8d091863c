use {
    super::Service,
    crate::{
        api::RestError,
        auction::entities,
    },
    time::OffsetDateTime,
};

pub struct AddAuctionInput {
    pub auction_create: entities::AuctionCreate,
}

impl Service {
    /// Creates a pending auction. Promotion to live is the sweep's job, even
    /// when the start time is already in the past at creation.
    #[tracing::instrument(skip_all, fields(auction_id), err(level = tracing::Level::TRACE))]
    pub async fn add_auction(
        &self,
        input: AddAuctionInput,
    ) -> Result<entities::Auction, RestError> {
        if input.auction_create.end_time <= input.auction_create.start_time {
            return Err(RestError::BadParameters(
                "Auction end time must be after its start time".to_string(),
            ));
        }
        let auction = entities::Auction::new(input.auction_create, OffsetDateTime::now_utc());
        tracing::Span::current().record("auction_id", auction.id.to_string());
        self.repo.add_auction(auction).await
    }
}
