use {
    crate::kernel::entities::{
        Amount,
        UserId,
    },
    time::OffsetDateTime,
    uuid::Uuid,
};

pub type BidId = Uuid;

/// One accepted bid. Bids are append-only: once part of an auction's history
/// they are never mutated or removed.
#[derive(Clone, Debug, PartialEq)]
pub struct Bid {
    pub id:            BidId,
    pub bidder:        UserId,
    pub amount:        Amount,
    pub creation_time: OffsetDateTime,
}

impl Bid {
    pub fn new(bidder: UserId, amount: Amount, creation_time: OffsetDateTime) -> Self {
        Self {
            id: BidId::new_v4(),
            bidder,
            amount,
            creation_time,
        }
    }
}
