use {
    super::{
        models,
        Repository,
    },
    crate::{
        api::RestError,
        auction::entities,
    },
};

impl Repository {
    // NOTE: Do not call this function directly. Instead call `add_auction` from `Service`.
    pub async fn add_auction(&self, auction: entities::Auction) -> Result<entities::Auction, RestError> {
        let model = models::Auction::from_entity(&auction);
        self.db.add_auction(&model).await?;
        Ok(auction)
    }
}
