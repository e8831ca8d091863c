use {
    super::bid::Bid,
    crate::kernel::entities::{
        Amount,
        UserId,
        VehicleId,
    },
    std::sync::Arc,
    time::OffsetDateTime,
    tokio::sync::Mutex,
    uuid::Uuid,
};

pub type AuctionId = Uuid;
pub type AuctionLock = Arc<Mutex<()>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuctionStatus {
    Pending,
    Live,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Auction {
    pub id:              AuctionId,
    pub title:           String,
    pub description:     String,
    pub vehicles:        Vec<VehicleId>,
    pub start_time:      OffsetDateTime,
    pub end_time:        OffsetDateTime,
    pub status:          AuctionStatus,
    pub starting_price:  Amount,
    pub current_bid:     Amount,
    pub highest_bidder:  Option<UserId>,
    pub winner:          Option<UserId>,
    /// Accepted bids, oldest first. Amounts are strictly increasing.
    pub bids:            Vec<Bid>,
    pub creation_time:   OffsetDateTime,
    pub conclusion_time: Option<OffsetDateTime>,
}

pub struct AuctionCreate {
    pub title:          String,
    pub description:    String,
    pub vehicles:       Vec<VehicleId>,
    pub start_time:     OffsetDateTime,
    pub end_time:       OffsetDateTime,
    pub starting_price: Amount,
}

impl Auction {
    pub fn new(create: AuctionCreate, creation_time: OffsetDateTime) -> Self {
        Self {
            id: AuctionId::new_v4(),
            title: create.title,
            description: create.description,
            vehicles: create.vehicles,
            start_time: create.start_time,
            end_time: create.end_time,
            status: AuctionStatus::Pending,
            starting_price: create.starting_price,
            current_bid: create.starting_price,
            highest_bidder: None,
            winner: None,
            bids: Vec::new(),
            creation_time,
            conclusion_time: None,
        }
    }

    /// Whether `now` falls inside the bidding window `[start_time, end_time)`.
    pub fn is_in_window(&self, now: OffsetDateTime) -> bool {
        self.start_time <= now && now < self.end_time
    }

    /// The amount a new bid must strictly exceed.
    pub fn minimum_accepted_bid(&self) -> Amount {
        self.current_bid.max(self.starting_price)
    }

    /// The bid that wins this auction at settlement: the maximum amount,
    /// with the earliest bid winning on equal amounts. Amounts are strictly
    /// increasing under correct validation so ties should not occur, but the
    /// tie-break keeps settlement deterministic regardless.
    pub fn settlement_outcome(&self) -> Option<&Bid> {
        self.bids
            .iter()
            .reduce(|best, bid| if bid.amount > best.amount { bid } else { best })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        time::Duration,
    };

    fn auction_with_bids(bids: Vec<Bid>) -> Auction {
        let now = OffsetDateTime::now_utc();
        let current_bid = bids.last().map(|b| b.amount).unwrap_or(100);
        Auction {
            id: AuctionId::new_v4(),
            title: "lot".to_string(),
            description: String::new(),
            vehicles: vec![],
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            status: AuctionStatus::Live,
            starting_price: 100,
            current_bid,
            highest_bidder: bids.last().map(|b| b.bidder),
            winner: None,
            bids,
            creation_time: now - Duration::hours(2),
            conclusion_time: None,
        }
    }

    #[test]
    fn settlement_outcome_empty_bids() {
        let auction = auction_with_bids(vec![]);
        assert!(auction.settlement_outcome().is_none());
    }

    #[test]
    fn settlement_outcome_picks_maximum_amount() {
        let now = OffsetDateTime::now_utc();
        let x = UserId::new_v4();
        let y = UserId::new_v4();
        let auction = auction_with_bids(vec![
            Bid::new(x, 300, now - Duration::minutes(10)),
            Bid::new(y, 500, now - Duration::minutes(5)),
        ]);
        let winning = auction.settlement_outcome().unwrap();
        assert_eq!(winning.bidder, y);
        assert_eq!(winning.amount, 500);
    }

    #[test]
    fn settlement_outcome_breaks_ties_by_earliest_bid() {
        let now = OffsetDateTime::now_utc();
        let first = UserId::new_v4();
        let second = UserId::new_v4();
        let auction = auction_with_bids(vec![
            Bid::new(first, 500, now - Duration::minutes(10)),
            Bid::new(second, 500, now - Duration::minutes(5)),
        ]);
        assert_eq!(auction.settlement_outcome().unwrap().bidder, first);
    }

    #[test]
    fn window_is_start_inclusive_end_exclusive() {
        let auction = auction_with_bids(vec![]);
        assert!(auction.is_in_window(auction.start_time));
        assert!(auction.is_in_window(auction.end_time - Duration::seconds(1)));
        assert!(!auction.is_in_window(auction.end_time));
        assert!(!auction.is_in_window(auction.start_time - Duration::seconds(1)));
    }

    #[test]
    fn minimum_accepted_bid_is_starting_price_without_bids() {
        let auction = auction_with_bids(vec![]);
        assert_eq!(auction.minimum_accepted_bid(), 100);
        let with_bid = auction_with_bids(vec![Bid::new(UserId::new_v4(), 250, OffsetDateTime::now_utc())]);
        assert_eq!(with_bid.minimum_accepted_bid(), 250);
    }
}
