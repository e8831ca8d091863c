use {
    super::{
        verification::verify_bid,
        Service,
    },
    crate::{
        api::{
            ws::UpdateEvent,
            RestError,
        },
        auction::entities,
        kernel::entities::{
            Amount,
            UserId,
        },
        notification::service::NotifyOutbidInput,
    },
    bidhall_api_types::ws::NewBidUpdate,
    time::OffsetDateTime,
};

pub struct HandleBidInput {
    pub auction_id: entities::AuctionId,
    pub bidder:     UserId,
    pub amount:     Amount,
}

impl Service {
    /// Validates and applies one bid. The per-auction lock serializes
    /// writers in this process; the conditional update in the repository is
    /// the cross-instance gate, retried with a fresh read when it loses.
    #[tracing::instrument(
        skip_all,
        fields(auction_id = %input.auction_id, bidder = %input.bidder, bid_id),
        err(level = tracing::Level::TRACE)
    )]
    pub async fn handle_bid(
        &self,
        input: HandleBidInput,
    ) -> Result<(entities::Bid, entities::Auction), RestError> {
        let auction_lock = self.repo.get_or_create_auction_lock(input.auction_id).await;
        let _guard = auction_lock.lock().await;

        for attempt in 0..=self.config.max_bid_retries {
            if attempt > 0 {
                tracing::warn!(
                    auction_id = %input.auction_id,
                    attempt,
                    "Bid lost a current_bid race, retrying with a fresh read"
                );
            }

            let auction = self.repo.get_auction(input.auction_id).await?;
            let now = OffsetDateTime::now_utc();
            verify_bid(&auction, input.amount, now)?;

            let bid = entities::Bid::new(input.bidder, input.amount, now);
            let applied = self
                .repo
                .apply_bid(&auction, &bid)
                .await
                .map_err(|e| {
                    tracing::error!(error = ?e, "Failed to apply bid");
                    RestError::TemporarilyUnavailable
                })?;
            if !applied {
                continue;
            }

            tracing::Span::current().record("bid_id", bid.id.to_string());
            let previous_bidder = auction.highest_bidder;

            let mut auction = auction;
            auction.current_bid = bid.amount;
            auction.highest_bidder = Some(bid.bidder);
            auction.bids.push(bid.clone());

            if let Err(e) = self.event_sender.send(UpdateEvent::NewBid(NewBidUpdate {
                auction_id:     auction.id,
                amount:         bid.amount,
                highest_bidder: bid.bidder,
            })) {
                tracing::error!(error = e.to_string(), "Failed to send new bid event");
            }

            // The displaced bidder is told out of band; a failure here must
            // not fail the bid that was already applied.
            if let Some(previous_bidder) = previous_bidder {
                if previous_bidder != input.bidder {
                    self.task_tracker.spawn({
                        let notification_service = self.notification_service.clone();
                        let notify_input = NotifyOutbidInput {
                            recipient:     previous_bidder,
                            auction_id:    auction.id,
                            auction_title: auction.title.clone(),
                            amount:        bid.amount,
                        };
                        async move {
                            if let Err(e) = notification_service.notify_outbid(notify_input).await {
                                tracing::error!(error = ?e, "Failed to notify outbid bidder");
                            }
                        }
                    });
                }
            }

            return Ok((bid, auction));
        }

        Err(RestError::BidConflict)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            auction::{
                repository::MockDatabase,
                service::tests::live_auction,
            },
            notification,
        },
        std::sync::{
            atomic::{
                AtomicU32,
                Ordering,
            },
            Arc,
        },
    };

    fn auction_model(auction: &entities::Auction) -> crate::auction::repository::Auction {
        crate::auction::repository::Auction::from_entity(auction)
    }

    #[tokio::test]
    async fn accepted_bid_updates_price_and_broadcasts() {
        let auction = live_auction(100, vec![]);
        let auction_id = auction.id;
        let bidder = UserId::new_v4();

        let mut db = MockDatabase::new();
        let model = auction_model(&auction);
        db.expect_get_auction()
            .returning(move |_| Ok(model.clone()));
        db.expect_get_bids_for_auction().returning(|_| Ok(vec![]));
        db.expect_apply_bid().returning(|_, _| Ok(true));

        let (service, mut events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        let (bid, updated) = service
            .handle_bid(HandleBidInput {
                auction_id,
                bidder,
                amount: 150,
            })
            .await
            .unwrap();

        assert_eq!(bid.amount, 150);
        assert_eq!(updated.current_bid, 150);
        assert_eq!(updated.highest_bidder, Some(bidder));
        assert_eq!(updated.bids.last().unwrap().amount, 150);

        match events.try_recv().unwrap() {
            UpdateEvent::NewBid(update) => {
                assert_eq!(update.auction_id, auction_id);
                assert_eq!(update.amount, 150);
                assert_eq!(update.highest_bidder, bidder);
            }
            event => panic!("unexpected event: {event:?}"),
        }
    }

    #[tokio::test]
    async fn bid_too_low_is_rejected_without_touching_storage() {
        let now = OffsetDateTime::now_utc();
        let auction = live_auction(100, vec![entities::Bid::new(UserId::new_v4(), 150, now)]);
        let auction_id = auction.id;

        let mut db = MockDatabase::new();
        let model = auction_model(&auction);
        let bids = auction
            .bids
            .iter()
            .map(|bid| crate::auction::repository::Bid::from_entity(auction_id, bid))
            .collect::<Vec<_>>();
        db.expect_get_auction()
            .returning(move |_| Ok(model.clone()));
        db.expect_get_bids_for_auction()
            .returning(move |_| Ok(bids.clone()));
        // No expect_apply_bid: the mock panics if a rejected bid reaches storage.

        let (service, _events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        let result = service
            .handle_bid(HandleBidInput {
                auction_id,
                bidder: UserId::new_v4(),
                amount: 150,
            })
            .await;
        assert_eq!(result.unwrap_err(), RestError::BidTooLow);
    }

    #[tokio::test]
    async fn lost_race_is_retried_with_a_fresh_read() {
        let auction = live_auction(100, vec![]);
        let auction_id = auction.id;

        let mut db = MockDatabase::new();
        let model = auction_model(&auction);
        db.expect_get_auction()
            .times(2)
            .returning(move |_| Ok(model.clone()));
        db.expect_get_bids_for_auction().returning(|_| Ok(vec![]));
        let attempts = Arc::new(AtomicU32::new(0));
        db.expect_apply_bid().returning(move |_, _| {
            // First writer wins the race; the retry succeeds.
            Ok(attempts.fetch_add(1, Ordering::SeqCst) > 0)
        });

        let (service, _events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        let result = service
            .handle_bid(HandleBidInput {
                auction_id,
                bidder: UserId::new_v4(),
                amount: 150,
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn exhausted_retries_surface_a_conflict() {
        let auction = live_auction(100, vec![]);
        let auction_id = auction.id;

        let mut db = MockDatabase::new();
        let model = auction_model(&auction);
        db.expect_get_auction()
            .returning(move |_| Ok(model.clone()));
        db.expect_get_bids_for_auction().returning(|_| Ok(vec![]));
        db.expect_apply_bid().returning(|_, _| Ok(false));

        let (service, _events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        let result = service
            .handle_bid(HandleBidInput {
                auction_id,
                bidder: UserId::new_v4(),
                amount: 150,
            })
            .await;
        assert_eq!(result.unwrap_err(), RestError::BidConflict);
    }

    #[tokio::test]
    async fn displaced_bidder_gets_an_outbid_notification() {
        let now = OffsetDateTime::now_utc();
        let displaced = UserId::new_v4();
        let auction = live_auction(100, vec![entities::Bid::new(displaced, 150, now)]);
        let auction_id = auction.id;

        let mut db = MockDatabase::new();
        let model = auction_model(&auction);
        let bids = auction
            .bids
            .iter()
            .map(|bid| crate::auction::repository::Bid::from_entity(auction_id, bid))
            .collect::<Vec<_>>();
        db.expect_get_auction()
            .returning(move |_| Ok(model.clone()));
        db.expect_get_bids_for_auction()
            .returning(move |_| Ok(bids.clone()));
        db.expect_apply_bid().returning(|_, _| Ok(true));

        let mut notification_db = notification::repository::MockDatabase::new();
        notification_db
            .expect_add_notification()
            .withf(move |notification| {
                notification.recipient == displaced && notification.metadata.amount == 200
            })
            .times(1)
            .returning(|_| Ok(()));

        let (service, mut events) = Service::new_with_mocks(db, notification_db);
        service
            .handle_bid(HandleBidInput {
                auction_id,
                bidder: UserId::new_v4(),
                amount: 200,
            })
            .await
            .unwrap();

        // The notification task is fire-and-forget; drain it before asserting.
        service.task_tracker.close();
        service.task_tracker.wait().await;

        let mut saw_outbid = false;
        while let Ok(event) = events.try_recv() {
            if let UpdateEvent::Outbid { recipient, update } = event {
                assert_eq!(recipient, displaced);
                assert_eq!(update.amount, 200);
                assert_eq!(update.auction_id, auction_id);
                saw_outbid = true;
            }
        }
        assert!(saw_outbid);
    }

    #[tokio::test]
    async fn rebidding_own_highest_bid_does_not_notify() {
        let now = OffsetDateTime::now_utc();
        let bidder = UserId::new_v4();
        let auction = live_auction(100, vec![entities::Bid::new(bidder, 150, now)]);
        let auction_id = auction.id;

        let mut db = MockDatabase::new();
        let model = auction_model(&auction);
        let bids = auction
            .bids
            .iter()
            .map(|bid| crate::auction::repository::Bid::from_entity(auction_id, bid))
            .collect::<Vec<_>>();
        db.expect_get_auction()
            .returning(move |_| Ok(model.clone()));
        db.expect_get_bids_for_auction()
            .returning(move |_| Ok(bids.clone()));
        db.expect_apply_bid().returning(|_, _| Ok(true));

        // No notification expectation: raising your own bid is not an outbid.
        let (service, _events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        service
            .handle_bid(HandleBidInput {
                auction_id,
                bidder,
                amount: 200,
            })
            .await
            .unwrap();

        service.task_tracker.close();
        service.task_tracker.wait().await;
    }
}
