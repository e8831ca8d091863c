use {
    super::Service,
    crate::auction::service::settle_auction::SettleAuctionInput,
    time::OffsetDateTime,
};

impl Service {
    /// Settles expired auctions in a bounded batch. Items are independent:
    /// one failure is logged and the rest of the batch continues, and the
    /// failed auction is picked up again on the next sweep because its
    /// status did not advance.
    pub async fn settle_auctions(&self) {
        let now = OffsetDateTime::now_utc();
        let auction_ids = match self
            .repo
            .get_expired_auctions(now, self.config.settlement_batch_size)
            .await
        {
            Ok(auction_ids) => auction_ids,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to fetch expired auctions");
                return;
            }
        };
        if auction_ids.is_empty() {
            return;
        }

        tracing::info!(count = auction_ids.len(), "Settling expired auctions...");
        for auction_id in auction_ids {
            self.task_tracker.spawn({
                let service = self.clone();
                async move {
                    let result = service
                        .settle_auction(SettleAuctionInput { auction_id })
                        .await;
                    if let Err(err) = result {
                        tracing::error!(
                            error = ?err,
                            auction_id = ?auction_id,
                            "Failed to settle auction",
                        );
                    }
                }
            });
        }
    }
}
