use {
    super::Service,
    crate::server::{
        EXIT_CHECK_INTERVAL,
        SHOULD_EXIT,
    },
    anyhow::Result,
    std::sync::atomic::Ordering,
};

impl Service {
    /// The recurring lifecycle sweep: promote pending auctions whose window
    /// has opened, then settle everything past its end time. Runs until
    /// shutdown is signalled.
    pub async fn run_auction_lifecycle_loop(&self) -> Result<()> {
        tracing::info!(
            sweep_interval = ?self.config.sweep_interval,
            "Starting auction lifecycle sweep..."
        );
        let mut sweep_interval = tokio::time::interval(self.config.sweep_interval);
        let mut exit_check_interval = tokio::time::interval(EXIT_CHECK_INTERVAL);

        while !SHOULD_EXIT.load(Ordering::Acquire) {
            tokio::select! {
                _ = sweep_interval.tick() => {
                    self.start_auctions().await;
                    self.settle_auctions().await;
                }
                _ = exit_check_interval.tick() => {}
            }
        }
        tracing::info!("Shutting down auction lifecycle sweep...");
        Ok(())
    }
}
