use {
    super::Service,
    crate::{
        api::ws::UpdateEvent,
        auction::entities,
        notification::service::NotifyAuctionWonInput,
    },
    bidhall_api_types::ws::AuctionEndedUpdate,
};

pub struct SettleAuctionInput {
    pub auction_id: entities::AuctionId,
}

impl Service {
    // Takes the lock Arc by value so it is dropped before the caller
    // reclaims the lock map entry.
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id, winner))]
    async fn settle_auction_for_lock(
        &self,
        auction_id: entities::AuctionId,
        auction_lock: entities::AuctionLock,
    ) -> anyhow::Result<()> {
        let _acquired_lock = auction_lock.lock().await;

        let auction = self
            .repo
            .get_auction(auction_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load auction for settlement: {:?}", e))?;

        let winning_bid = auction.settlement_outcome().cloned();
        let finished = auction.status != entities::AuctionStatus::Finished
            && self
                .repo
                .finish_auction(auction.id, winning_bid.as_ref())
                .await?;
        if finished {
            let winner = winning_bid.as_ref().map(|bid| bid.bidder);
            let final_amount = winning_bid
                .as_ref()
                .map(|bid| bid.amount)
                .unwrap_or(auction.starting_price);
            tracing::Span::current().record("winner", format!("{winner:?}"));
            tracing::info!(
                auction_id = %auction.id,
                final_amount,
                "Auction settled"
            );

            if let Err(e) = self
                .event_sender
                .send(UpdateEvent::AuctionEnded(AuctionEndedUpdate {
                    auction_id: auction.id,
                    winner,
                    final_amount,
                }))
            {
                tracing::error!(error = e.to_string(), "Failed to send auction ended event");
            }

            // Winner notification is best-effort; the settlement is already
            // durable at this point.
            if let Some(winning_bid) = winning_bid {
                let result = self
                    .notification_service
                    .notify_auction_won(NotifyAuctionWonInput {
                        recipient:     winning_bid.bidder,
                        auction_id:    auction.id,
                        auction_title: auction.title.clone(),
                        final_amount:  winning_bid.amount,
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(
                        error = ?e,
                        auction_id = %auction.id,
                        "Failed to notify auction winner",
                    );
                }
            }
        }
        Ok(())
    }

    /// Settles one expired auction: computes the winner, performs the
    /// status-guarded finished transition, and notifies the room and the
    /// winner. Safe to call for an already-settled auction; the guard makes
    /// it a no-op.
    pub async fn settle_auction(&self, input: SettleAuctionInput) -> anyhow::Result<()> {
        let auction_lock = self.repo.get_or_create_auction_lock(input.auction_id).await;
        let result = self
            .settle_auction_for_lock(input.auction_id, auction_lock)
            .await;
        self.repo.remove_auction_lock(&input.auction_id).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            auction::{
                repository::{
                    AuctionOutcome,
                    MockDatabase,
                },
                service::tests::live_auction,
            },
            kernel::entities::UserId,
            notification,
        },
        sqlx::types::BigDecimal,
        time::{
            Duration,
            OffsetDateTime,
        },
    };

    fn expired_auction(bids: Vec<entities::Bid>) -> entities::Auction {
        let mut auction = live_auction(100, bids);
        auction.end_time = OffsetDateTime::now_utc() - Duration::minutes(1);
        auction
    }

    fn mocks_for(
        auction: &entities::Auction,
    ) -> MockDatabase {
        let mut db = MockDatabase::new();
        let model = crate::auction::repository::Auction::from_entity(auction);
        let bids = auction
            .bids
            .iter()
            .map(|bid| crate::auction::repository::Bid::from_entity(auction.id, bid))
            .collect::<Vec<_>>();
        db.expect_get_auction()
            .returning(move |_| Ok(model.clone()));
        db.expect_get_bids_for_auction()
            .returning(move |_| Ok(bids.clone()));
        db
    }

    #[tokio::test]
    async fn settles_with_highest_bid_as_winner() {
        let now = OffsetDateTime::now_utc();
        let x = UserId::new_v4();
        let y = UserId::new_v4();
        let auction = expired_auction(vec![
            entities::Bid::new(x, 300, now - Duration::minutes(30)),
            entities::Bid::new(y, 500, now - Duration::minutes(20)),
        ]);
        let auction_id = auction.id;

        let mut db = mocks_for(&auction);
        db.expect_finish_auction()
            .withf(move |id, outcome| {
                *id == auction_id
                    && *outcome
                        == Some(AuctionOutcome {
                            winner:       y,
                            final_amount: BigDecimal::from(500u64),
                        })
            })
            .times(1)
            .returning(|_, _| Ok(true));

        let mut notification_db = notification::repository::MockDatabase::new();
        notification_db
            .expect_add_notification()
            .withf(move |notification| {
                notification.recipient == y && notification.metadata.amount == 500
            })
            .times(1)
            .returning(|_| Ok(()));

        let (service, mut events) = Service::new_with_mocks(db, notification_db);
        service
            .settle_auction(SettleAuctionInput { auction_id })
            .await
            .unwrap();

        match events.try_recv().unwrap() {
            UpdateEvent::AuctionEnded(update) => {
                assert_eq!(update.auction_id, auction_id);
                assert_eq!(update.winner, Some(y));
                assert_eq!(update.final_amount, 500);
            }
            event => panic!("unexpected event: {event:?}"),
        }
        match events.try_recv().unwrap() {
            UpdateEvent::AuctionWon { recipient, update } => {
                assert_eq!(recipient, y);
                assert_eq!(update.final_amount, 500);
            }
            event => panic!("unexpected event: {event:?}"),
        }
    }

    #[tokio::test]
    async fn settles_without_bids_and_without_winner() {
        let auction = expired_auction(vec![]);
        let auction_id = auction.id;

        let mut db = mocks_for(&auction);
        db.expect_finish_auction()
            .withf(move |id, outcome| *id == auction_id && outcome.is_none())
            .times(1)
            .returning(|_, _| Ok(true));

        // No notification expectation: a lot with no bids has no winner to tell.
        let (service, mut events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        service
            .settle_auction(SettleAuctionInput { auction_id })
            .await
            .unwrap();

        match events.try_recv().unwrap() {
            UpdateEvent::AuctionEnded(update) => {
                assert_eq!(update.winner, None);
                assert_eq!(update.final_amount, 100);
            }
            event => panic!("unexpected event: {event:?}"),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn already_finished_auction_is_a_no_op() {
        let mut auction = expired_auction(vec![]);
        auction.status = entities::AuctionStatus::Finished;
        let auction_id = auction.id;

        // No expect_finish_auction: re-settling must not write anything.
        let db = mocks_for(&auction);
        let (service, mut events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        service
            .settle_auction(SettleAuctionInput { auction_id })
            .await
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn settlement_race_lost_emits_nothing() {
        let auction = expired_auction(vec![]);
        let auction_id = auction.id;

        let mut db = mocks_for(&auction);
        // Another sweep finished the auction between our read and our write.
        db.expect_finish_auction().returning(|_, _| Ok(false));

        let (service, mut events) =
            Service::new_with_mocks(db, notification::repository::MockDatabase::new());
        service
            .settle_auction(SettleAuctionInput { auction_id })
            .await
            .unwrap();
        assert!(events.try_recv().is_err());
    }
}
