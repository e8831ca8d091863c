use {
    super::Service,
    crate::api::ws::UpdateEvent,
    bidhall_api_types::ws::AuctionStartedUpdate,
    time::OffsetDateTime,
};

impl Service {
    /// Promotes every pending auction whose window has opened. The
    /// status-guarded update means a concurrent sweep promotes each auction
    /// at most once; a false return is another sweep's win, not an error.
    pub async fn start_auctions(&self) {
        let now = OffsetDateTime::now_utc();
        let auction_ids = match self.repo.get_startable_auctions(now).await {
            Ok(auction_ids) => auction_ids,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to fetch startable auctions");
                return;
            }
        };

        for auction_id in auction_ids {
            match self.repo.start_auction(auction_id).await {
                Ok(true) => {
                    tracing::info!(auction_id = %auction_id, "Auction is now live");
                    if let Err(e) = self
                        .event_sender
                        .send(UpdateEvent::AuctionStarted(AuctionStartedUpdate {
                            auction_id,
                        }))
                    {
                        tracing::error!(
                            error = e.to_string(),
                            "Failed to send auction started event"
                        );
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(
                        error = ?err,
                        auction_id = %auction_id,
                        "Failed to start auction",
                    );
                }
            }
        }
    }
}
