use {
    crate::{
        auction::entities::AuctionId,
        kernel::entities::{
            Amount,
            UserId,
        },
    },
    serde::{
        Deserialize,
        Serialize,
    },
    time::OffsetDateTime,
    uuid::Uuid,
};

pub type NotificationId = Uuid;

/// Structured payload clients use to link a notification back to the
/// auction it is about.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NotificationMetadata {
    pub auction_id: AuctionId,
    pub amount:     Amount,
}

/// A persisted notification for one recipient. Delivery to live connections
/// is best-effort; the record is what the recipient's inbox reads later.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub id:            NotificationId,
    pub recipient:     UserId,
    pub title:         String,
    pub body:          String,
    pub metadata:      NotificationMetadata,
    pub read:          bool,
    pub creation_time: OffsetDateTime,
}

impl Notification {
    pub fn new_outbid(
        recipient: UserId,
        auction_id: AuctionId,
        auction_title: &str,
        amount: Amount,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: NotificationId::new_v4(),
            recipient,
            title: "You have been outbid".to_string(),
            body: format!("A higher bid of {amount} was placed on \"{auction_title}\"."),
            metadata: NotificationMetadata { auction_id, amount },
            read: false,
            creation_time: now,
        }
    }

    pub fn new_auction_won(
        recipient: UserId,
        auction_id: AuctionId,
        auction_title: &str,
        amount: Amount,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: NotificationId::new_v4(),
            recipient,
            title: "You won the auction".to_string(),
            body: format!("Your bid of {amount} won \"{auction_title}\"."),
            metadata: NotificationMetadata { auction_id, amount },
            read: false,
            creation_time: now,
        }
    }
}
