use {
    super::repository::{
        Database,
        Repository,
    },
    crate::{
        api::ws::UpdateEvent,
        config::AuctionConfig,
        notification::service::Service as NotificationService,
    },
    std::sync::Arc,
    tokio::sync::broadcast,
    tokio_util::task::TaskTracker,
};

pub mod add_auction;
pub mod get_auction_by_id;
pub mod get_auctions;
pub mod handle_bid;
pub mod settle_auction;
pub mod settle_auctions;
pub mod start_auctions;
pub mod verification;
pub mod workers;

pub struct ServiceInner {
    config:               AuctionConfig,
    repo:                 Arc<Repository>,
    notification_service: Arc<NotificationService>,
    task_tracker:         TaskTracker,
    event_sender:         broadcast::Sender<UpdateEvent>,
}

#[derive(Clone)]
pub struct Service(Arc<ServiceInner>);
impl std::ops::Deref for Service {
    type Target = ServiceInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Service {
    pub fn new(
        db: impl Database,
        config: AuctionConfig,
        notification_service: Arc<NotificationService>,
        task_tracker: TaskTracker,
        event_sender: broadcast::Sender<UpdateEvent>,
    ) -> Self {
        Self(Arc::new(ServiceInner {
            config,
            repo: Arc::new(Repository::new(db)),
            notification_service,
            task_tracker,
            event_sender,
        }))
    }
}

#[cfg(test)]
pub mod tests {
    use {
        super::*,
        crate::{
            auction::{
                entities,
                repository::MockDatabase,
            },
            kernel::entities::{
                Amount,
                VehicleId,
            },
            notification,
        },
        std::time::Duration,
        time::OffsetDateTime,
    };

    impl Service {
        pub fn new_with_mocks(
            db: MockDatabase,
            notification_db: notification::repository::MockDatabase,
        ) -> (Self, broadcast::Receiver<UpdateEvent>) {
            let (event_sender, event_receiver) = broadcast::channel(64);
            let notification_service = Arc::new(NotificationService::new(
                notification_db,
                event_sender.clone(),
            ));
            let service = Service::new(
                db,
                AuctionConfig {
                    sweep_interval:        Duration::from_secs(30),
                    settlement_batch_size: 50,
                    max_bid_retries:       3,
                },
                notification_service,
                TaskTracker::new(),
                event_sender,
            );
            (service, event_receiver)
        }
    }

    /// A live auction entity inside its window, with the given bids already
    /// accepted.
    pub fn live_auction(starting_price: Amount, bids: Vec<entities::Bid>) -> entities::Auction {
        let now = OffsetDateTime::now_utc();
        let current_bid = bids.last().map(|b| b.amount).unwrap_or(starting_price);
        let highest_bidder = bids.last().map(|b| b.bidder);
        entities::Auction {
            id: entities::AuctionId::new_v4(),
            title: "1987 Grand Wagoneer".to_string(),
            description: "runs great".to_string(),
            vehicles: vec![VehicleId::new_v4()],
            start_time: now - time::Duration::hours(1),
            end_time: now + time::Duration::hours(1),
            status: entities::AuctionStatus::Live,
            starting_price,
            current_bid,
            highest_bidder,
            winner: None,
            bids,
            creation_time: now - time::Duration::hours(2),
            conclusion_time: None,
        }
    }
}
