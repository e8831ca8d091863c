use {
    super::Service,
    crate::{
        api::RestError,
        auction::entities,
    },
    bidhall_api_types::auction::SortBy,
};

pub struct GetAuctionsInput {
    pub sort_by: SortBy,
}

impl Service {
    pub async fn get_auctions(
        &self,
        input: GetAuctionsInput,
    ) -> Result<Vec<entities::Auction>, RestError> {
        self.repo.get_auctions(input.sort_by).await
    }
}
