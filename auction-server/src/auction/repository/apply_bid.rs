use {
    super::{
        models,
        Repository,
    },
    crate::auction::entities,
    sqlx::types::BigDecimal,
};

impl Repository {
    /// Appends a validated bid and advances the auction's price state.
    /// The update only matches while the auction is live and its current bid
    /// still equals the value the caller validated against; a false return
    /// means another writer got there first and the caller must re-read.
    pub async fn apply_bid(
        &self,
        auction: &entities::Auction,
        bid: &entities::Bid,
    ) -> anyhow::Result<bool> {
        let bid_model = models::Bid::from_entity(auction.id, bid);
        self.db
            .apply_bid(&bid_model, &BigDecimal::from(auction.current_bid))
            .await
    }
}
