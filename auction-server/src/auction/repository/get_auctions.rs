use {
    super::{
        models,
        Repository,
    },
    crate::{
        api::RestError,
        auction::entities,
    },
    bidhall_api_types::auction::SortBy,
    std::collections::HashMap,
};

impl Repository {
    pub async fn get_auctions(
        &self,
        sort_by: SortBy,
    ) -> Result<Vec<entities::Auction>, RestError> {
        let auctions = self.db.get_auctions(sort_by).await?;
        let bids = self
            .db
            .get_bids_for_auctions(auctions.iter().map(|auction| auction.id).collect())
            .await?;

        let mut bids_by_auction: HashMap<entities::AuctionId, Vec<models::Bid>> = HashMap::new();
        for bid in bids {
            bids_by_auction.entry(bid.auction_id).or_default().push(bid);
        }

        auctions
            .into_iter()
            .map(|auction| {
                let bids = bids_by_auction.remove(&auction.id).unwrap_or_default();
                auction.get_entity(bids)
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| {
                tracing::error!(error = e.to_string(), "Failed to convert auctions to entities");
                RestError::TemporarilyUnavailable
            })
    }
}
