use {
    crate::{
        api::RestError,
        auction::entities,
        kernel::entities::Amount,
    },
    time::OffsetDateTime,
};

/// Decides whether a proposed bid is acceptable against a snapshot of the
/// auction. Pure so it can be tested without storage; resolution of the
/// auction id itself happens in the repository and surfaces as
/// `AuctionNotFound` before this runs.
///
/// Payment authorization and bidder eligibility are not checked here; they
/// belong to the marketplace services in front of this one.
pub fn verify_bid(
    auction: &entities::Auction,
    amount: Amount,
    now: OffsetDateTime,
) -> Result<(), RestError> {
    if auction.status != entities::AuctionStatus::Live || !auction.is_in_window(now) {
        return Err(RestError::AuctionNotLive);
    }
    if amount <= auction.minimum_accepted_bid() {
        return Err(RestError::BidTooLow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            auction::service::tests::live_auction,
            kernel::entities::UserId,
        },
        time::Duration,
    };

    #[test]
    fn accepts_bid_above_starting_price() {
        let auction = live_auction(100, vec![]);
        let now = OffsetDateTime::now_utc();
        assert!(verify_bid(&auction, 150, now).is_ok());
    }

    #[test]
    fn rejects_bid_equal_to_current_bid() {
        let now = OffsetDateTime::now_utc();
        let auction = live_auction(100, vec![entities::Bid::new(UserId::new_v4(), 150, now)]);
        assert_eq!(verify_bid(&auction, 150, now), Err(RestError::BidTooLow));
    }

    #[test]
    fn rejects_bid_equal_to_starting_price() {
        let auction = live_auction(100, vec![]);
        let now = OffsetDateTime::now_utc();
        assert_eq!(verify_bid(&auction, 100, now), Err(RestError::BidTooLow));
    }

    #[test]
    fn rejects_bid_below_current_bid_regardless_of_timing() {
        let now = OffsetDateTime::now_utc();
        let auction = live_auction(100, vec![entities::Bid::new(UserId::new_v4(), 300, now)]);
        assert_eq!(verify_bid(&auction, 200, now), Err(RestError::BidTooLow));
    }

    #[test]
    fn rejects_before_window_opens() {
        let mut auction = live_auction(100, vec![]);
        let now = auction.start_time - Duration::seconds(1);
        assert_eq!(verify_bid(&auction, 150, now), Err(RestError::AuctionNotLive));
        // The status check alone is not enough; the window is checked too.
        auction.status = entities::AuctionStatus::Live;
        assert_eq!(verify_bid(&auction, 150, now), Err(RestError::AuctionNotLive));
    }

    #[test]
    fn rejects_at_and_after_window_close() {
        let auction = live_auction(100, vec![]);
        assert_eq!(
            verify_bid(&auction, 150, auction.end_time),
            Err(RestError::AuctionNotLive)
        );
        assert_eq!(
            verify_bid(&auction, 150, auction.end_time + Duration::minutes(5)),
            Err(RestError::AuctionNotLive)
        );
    }

    #[test]
    fn rejects_when_status_is_not_live() {
        let now = OffsetDateTime::now_utc();
        for status in [
            entities::AuctionStatus::Pending,
            entities::AuctionStatus::Finished,
        ] {
            let mut auction = live_auction(100, vec![]);
            auction.status = status;
            assert_eq!(verify_bid(&auction, 150, now), Err(RestError::AuctionNotLive));
        }
    }

    #[test]
    fn state_is_checked_before_amount() {
        let mut auction = live_auction(100, vec![]);
        auction.status = entities::AuctionStatus::Finished;
        // Both checks fail; the state rejection wins.
        assert_eq!(
            verify_bid(&auction, 50, OffsetDateTime::now_utc()),
            Err(RestError::AuctionNotLive)
        );
    }
}
