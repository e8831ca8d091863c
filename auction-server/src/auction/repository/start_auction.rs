use {
    super::Repository,
    crate::auction::entities,
};

impl Repository {
    /// Status-guarded pending -> live transition. Returns false when the
    /// auction was not pending anymore, so concurrent sweeps promote at most
    /// once.
    pub async fn start_auction(&self, auction_id: entities::AuctionId) -> anyhow::Result<bool> {
        self.db.start_auction(auction_id).await
    }
}
