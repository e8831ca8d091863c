use {
    super::{
        models,
        Repository,
    },
    crate::auction::entities,
    sqlx::types::BigDecimal,
};

impl Repository {
    /// Status-guarded settlement write. The guard on `status IN
    /// ('pending', 'live')` is what makes the sweep idempotent: a second
    /// settlement of the same auction matches no row and returns false.
    pub async fn finish_auction(
        &self,
        auction_id: entities::AuctionId,
        winning_bid: Option<&entities::Bid>,
    ) -> anyhow::Result<bool> {
        let outcome = winning_bid.map(|bid| models::AuctionOutcome {
            winner:       bid.bidder,
            final_amount: BigDecimal::from(bid.amount),
        });
        self.db.finish_auction(auction_id, outcome).await
    }
}
