use {
    super::entities,
    std::collections::HashMap,
    tokio::sync::Mutex,
};

mod add_auction;
mod apply_bid;
mod finish_auction;
mod get_auction;
mod get_auctions;
mod get_expired_auctions;
mod get_or_create_auction_lock;
mod get_startable_auctions;
mod models;
mod remove_auction_lock;
mod start_auction;

pub use models::*;

#[derive(Debug)]
pub struct Repository {
    /// Per-auction write locks. All in-process writers of one auction's
    /// price state (bid application and settlement) serialize on the same
    /// lock; the storage-level conditional updates guard against writers in
    /// other processes.
    auction_locks: Mutex<HashMap<entities::AuctionId, entities::AuctionLock>>,
    db:            Box<dyn Database>,
}

impl Repository {
    pub fn new(db: impl Database) -> Self {
        Self {
            auction_locks: Mutex::new(HashMap::new()),
            db:            Box::new(db),
        }
    }
}
