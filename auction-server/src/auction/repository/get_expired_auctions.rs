use {
    super::Repository,
    crate::auction::entities,
    time::OffsetDateTime,
};

impl Repository {
    /// Auctions past their end time that have not been settled, oldest
    /// first, bounded so a large backlog is worked off across sweeps.
    pub async fn get_expired_auctions(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> anyhow::Result<Vec<entities::AuctionId>> {
        self.db.get_expired_auctions(now, limit).await
    }
}
