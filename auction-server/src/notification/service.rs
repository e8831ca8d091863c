use {
    super::{
        entities,
        repository::{
            Database,
            Repository,
        },
    },
    crate::{
        api::ws::UpdateEvent,
        auction::entities::AuctionId,
        kernel::entities::{
            Amount,
            UserId,
        },
    },
    bidhall_api_types::ws::{
        AuctionWonUpdate,
        OutbidUpdate,
    },
    std::sync::Arc,
    time::OffsetDateTime,
    tokio::sync::broadcast,
};

pub struct NotifyOutbidInput {
    pub recipient:     UserId,
    pub auction_id:    AuctionId,
    pub auction_title: String,
    /// The bid amount that displaced the recipient.
    pub amount:        Amount,
}

pub struct NotifyAuctionWonInput {
    pub recipient:     UserId,
    pub auction_id:    AuctionId,
    pub auction_title: String,
    pub final_amount:  Amount,
}

pub struct ServiceInner {
    repo:         Arc<Repository>,
    event_sender: broadcast::Sender<UpdateEvent>,
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
    pub fn new(db: impl Database, event_sender: broadcast::Sender<UpdateEvent>) -> Self {
        Self(Arc::new(ServiceInner {
            repo: Arc::new(Repository::new(db)),
            event_sender,
        }))
    }

    /// Records an outbid notification and pushes it to every live connection
    /// of the displaced bidder.
    #[tracing::instrument(skip_all, fields(recipient = %input.recipient, auction_id = %input.auction_id))]
    pub async fn notify_outbid(&self, input: NotifyOutbidInput) -> anyhow::Result<()> {
        let notification = entities::Notification::new_outbid(
            input.recipient,
            input.auction_id,
            &input.auction_title,
            input.amount,
            OffsetDateTime::now_utc(),
        );
        self.repo.add_notification(&notification).await?;
        if let Err(e) = self.event_sender.send(UpdateEvent::Outbid {
            recipient: input.recipient,
            update:    OutbidUpdate {
                auction_id: input.auction_id,
                amount:     input.amount,
            },
        }) {
            tracing::error!(error = e.to_string(), "Failed to send outbid event");
        }
        Ok(())
    }

    /// Records a win notification for the settled auction's winner and
    /// pushes it to their live connections.
    #[tracing::instrument(skip_all, fields(recipient = %input.recipient, auction_id = %input.auction_id))]
    pub async fn notify_auction_won(&self, input: NotifyAuctionWonInput) -> anyhow::Result<()> {
        let notification = entities::Notification::new_auction_won(
            input.recipient,
            input.auction_id,
            &input.auction_title,
            input.final_amount,
            OffsetDateTime::now_utc(),
        );
        self.repo.add_notification(&notification).await?;
        if let Err(e) = self.event_sender.send(UpdateEvent::AuctionWon {
            recipient: input.recipient,
            update:    AuctionWonUpdate {
                auction_id:   input.auction_id,
                final_amount: input.final_amount,
            },
        }) {
            tracing::error!(error = e.to_string(), "Failed to send auction won event");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::notification::repository::MockDatabase,
        mockall::predicate,
    };

    #[tokio::test]
    async fn notify_outbid_persists_and_broadcasts() {
        let recipient = UserId::new_v4();
        let auction_id = AuctionId::new_v4();

        let mut db = MockDatabase::new();
        db.expect_add_notification()
            .withf(move |notification| {
                notification.recipient == recipient
                    && notification.metadata.auction_id == auction_id
                    && notification.metadata.amount == 200
                    && !notification.read
            })
            .times(1)
            .returning(|_| Ok(()));

        let (event_sender, mut event_receiver) = broadcast::channel(8);
        let service = Service::new(db, event_sender);
        service
            .notify_outbid(NotifyOutbidInput {
                recipient,
                auction_id,
                auction_title: "lot".to_string(),
                amount: 200,
            })
            .await
            .unwrap();

        match event_receiver.try_recv().unwrap() {
            UpdateEvent::Outbid {
                recipient: event_recipient,
                update,
            } => {
                assert_eq!(event_recipient, recipient);
                assert_eq!(update.amount, 200);
                assert_eq!(update.auction_id, auction_id);
            }
            event => panic!("unexpected event: {event:?}"),
        }
    }

    #[tokio::test]
    async fn notify_auction_won_surfaces_storage_errors() {
        let mut db = MockDatabase::new();
        db.expect_add_notification()
            .with(predicate::always())
            .returning(|_| Err(anyhow::anyhow!("db down")));

        let (event_sender, _event_receiver) = broadcast::channel(8);
        let service = Service::new(db, event_sender);
        let result = service
            .notify_auction_won(NotifyAuctionWonInput {
                recipient:     UserId::new_v4(),
                auction_id:    AuctionId::new_v4(),
                auction_title: "lot".to_string(),
                final_amount:  500,
            })
            .await;
        assert!(result.is_err());
    }
}
