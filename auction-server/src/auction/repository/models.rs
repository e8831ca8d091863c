#[cfg(test)]
use mockall::automock;
use {
    super::entities,
    crate::{
        api::RestError,
        kernel::{
            db::DB,
            entities::{
                UserId,
                VehicleId,
            },
        },
    },
    axum::async_trait,
    bidhall_api_types::auction::SortBy,
    sqlx::{
        types::BigDecimal,
        FromRow,
        QueryBuilder,
    },
    std::{
        fmt::Debug,
        num::ParseIntError,
    },
    time::{
        OffsetDateTime,
        PrimitiveDateTime,
        UtcOffset,
    },
    tracing::instrument,
};

#[derive(Clone, Debug, PartialEq, PartialOrd, sqlx::Type)]
#[sqlx(type_name = "auction_status", rename_all = "lowercase")]
pub enum AuctionStatus {
    Pending,
    Live,
    Finished,
}

impl From<AuctionStatus> for entities::AuctionStatus {
    fn from(status: AuctionStatus) -> Self {
        match status {
            AuctionStatus::Pending => entities::AuctionStatus::Pending,
            AuctionStatus::Live => entities::AuctionStatus::Live,
            AuctionStatus::Finished => entities::AuctionStatus::Finished,
        }
    }
}

impl From<entities::AuctionStatus> for AuctionStatus {
    fn from(status: entities::AuctionStatus) -> Self {
        match status {
            entities::AuctionStatus::Pending => AuctionStatus::Pending,
            entities::AuctionStatus::Live => AuctionStatus::Live,
            entities::AuctionStatus::Finished => AuctionStatus::Finished,
        }
    }
}

#[derive(Clone, FromRow, Debug)]
pub struct Auction {
    pub id:              entities::AuctionId,
    pub title:           String,
    pub description:     String,
    pub vehicles:        Vec<VehicleId>,
    pub start_time:      PrimitiveDateTime,
    pub end_time:        PrimitiveDateTime,
    pub status:          AuctionStatus,
    pub starting_price:  BigDecimal,
    pub current_bid:     BigDecimal,
    pub highest_bidder:  Option<UserId>,
    pub winner:          Option<UserId>,
    pub creation_time:   PrimitiveDateTime,
    pub conclusion_time: Option<PrimitiveDateTime>,
}

#[derive(Clone, FromRow, Debug)]
pub struct Bid {
    pub id:            entities::BidId,
    pub auction_id:    entities::AuctionId,
    pub bidder:        UserId,
    pub amount:        BigDecimal,
    pub creation_time: PrimitiveDateTime,
}

fn primitive(datetime: OffsetDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(datetime.date(), datetime.time())
}

fn amount_entity(amount: &BigDecimal) -> anyhow::Result<entities::Amount> {
    amount
        .to_string()
        .parse()
        .map_err(|e: ParseIntError| anyhow::anyhow!(e))
}

impl Bid {
    pub fn from_entity(auction_id: entities::AuctionId, bid: &entities::Bid) -> Self {
        Self {
            id:            bid.id,
            auction_id,
            bidder:        bid.bidder,
            amount:        BigDecimal::from(bid.amount),
            creation_time: primitive(bid.creation_time),
        }
    }

    pub fn get_entity(&self) -> anyhow::Result<entities::Bid> {
        Ok(entities::Bid {
            id:            self.id,
            bidder:        self.bidder,
            amount:        amount_entity(&self.amount)?,
            creation_time: self.creation_time.assume_offset(UtcOffset::UTC),
        })
    }
}

impl Auction {
    pub fn from_entity(auction: &entities::Auction) -> Self {
        Self {
            id:              auction.id,
            title:           auction.title.clone(),
            description:     auction.description.clone(),
            vehicles:        auction.vehicles.clone(),
            start_time:      primitive(auction.start_time),
            end_time:        primitive(auction.end_time),
            status:          auction.status.into(),
            starting_price:  BigDecimal::from(auction.starting_price),
            current_bid:     BigDecimal::from(auction.current_bid),
            highest_bidder:  auction.highest_bidder,
            winner:          auction.winner,
            creation_time:   primitive(auction.creation_time),
            conclusion_time: auction.conclusion_time.map(primitive),
        }
    }

    pub fn get_entity(&self, bids: Vec<Bid>) -> anyhow::Result<entities::Auction> {
        Ok(entities::Auction {
            id:              self.id,
            title:           self.title.clone(),
            description:     self.description.clone(),
            vehicles:        self.vehicles.clone(),
            start_time:      self.start_time.assume_offset(UtcOffset::UTC),
            end_time:        self.end_time.assume_offset(UtcOffset::UTC),
            status:          self.status.clone().into(),
            starting_price:  amount_entity(&self.starting_price)?,
            current_bid:     amount_entity(&self.current_bid)?,
            highest_bidder:  self.highest_bidder,
            winner:          self.winner,
            bids:            bids
                .iter()
                .map(Bid::get_entity)
                .collect::<anyhow::Result<Vec<_>>>()?,
            creation_time:   self.creation_time.assume_offset(UtcOffset::UTC),
            conclusion_time: self
                .conclusion_time
                .map(|t| t.assume_offset(UtcOffset::UTC)),
        })
    }
}

/// The settled result of an auction with at least one bid.
#[derive(Clone, Debug, PartialEq)]
pub struct AuctionOutcome {
    pub winner:       UserId,
    pub final_amount: BigDecimal,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Debug + Send + Sync + 'static {
    async fn add_auction(&self, auction: &Auction) -> Result<(), RestError>;
    async fn get_auction(&self, auction_id: entities::AuctionId) -> Result<Auction, RestError>;
    async fn get_auctions(&self, sort_by: SortBy) -> Result<Vec<Auction>, RestError>;
    async fn get_bids_for_auction(
        &self,
        auction_id: entities::AuctionId,
    ) -> Result<Vec<Bid>, RestError>;
    async fn get_bids_for_auctions(
        &self,
        auction_ids: Vec<entities::AuctionId>,
    ) -> Result<Vec<Bid>, RestError>;
    /// Appends the bid and advances the auction's price state in one
    /// transaction, but only if the auction is still live and its current
    /// bid still equals `observed_current_bid`. Returns false when the
    /// conditional update matched no row (the caller lost a race).
    async fn apply_bid(&self, bid: &Bid, observed_current_bid: &BigDecimal)
        -> anyhow::Result<bool>;
    /// Promotes a pending auction to live. Returns false if the auction was
    /// not pending anymore.
    async fn start_auction(&self, auction_id: entities::AuctionId) -> anyhow::Result<bool>;
    /// Marks an unfinished auction finished, recording the outcome when one
    /// exists. Returns false if the auction was already finished, which makes
    /// concurrent settlement sweeps a no-op.
    async fn finish_auction(
        &self,
        auction_id: entities::AuctionId,
        outcome: Option<AuctionOutcome>,
    ) -> anyhow::Result<bool>;
    async fn get_startable_auctions(
        &self,
        now: OffsetDateTime,
    ) -> anyhow::Result<Vec<entities::AuctionId>>;
    async fn get_expired_auctions(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> anyhow::Result<Vec<entities::AuctionId>>;
}

#[async_trait]
impl Database for DB {
    #[instrument(name = "db_add_auction", skip_all, fields(auction_id = %auction.id))]
    async fn add_auction(&self, auction: &Auction) -> Result<(), RestError> {
        sqlx::query(
            "INSERT INTO auction (id, title, description, vehicles, start_time, end_time, status, starting_price, current_bid, highest_bidder, winner, creation_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(auction.id)
        .bind(&auction.title)
        .bind(&auction.description)
        .bind(&auction.vehicles)
        .bind(auction.start_time)
        .bind(auction.end_time)
        .bind(&auction.status)
        .bind(&auction.starting_price)
        .bind(&auction.current_bid)
        .bind(auction.highest_bidder)
        .bind(auction.winner)
        .bind(auction.creation_time)
        .execute(self)
        .await
        .map_err(|e| {
            tracing::error!(error = e.to_string(), auction = ?auction, "DB: Failed to insert auction");
            RestError::TemporarilyUnavailable
        })?;
        Ok(())
    }

    #[instrument(name = "db_get_auction", skip_all, fields(auction_id = %auction_id))]
    async fn get_auction(&self, auction_id: entities::AuctionId) -> Result<Auction, RestError> {
        sqlx::query_as("SELECT * FROM auction WHERE id = $1")
            .bind(auction_id)
            .fetch_one(self)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => RestError::AuctionNotFound,
                _ => {
                    tracing::error!(
                        error = e.to_string(),
                        auction_id = auction_id.to_string(),
                        "Failed to get auction from db"
                    );
                    RestError::TemporarilyUnavailable
                }
            })
    }

    #[instrument(name = "db_get_auctions", skip_all)]
    async fn get_auctions(&self, sort_by: SortBy) -> Result<Vec<Auction>, RestError> {
        let mut query = QueryBuilder::new("SELECT * FROM auction");
        match sort_by {
            SortBy::Recency => query.push(" ORDER BY creation_time DESC"),
            SortBy::Price => query.push(" ORDER BY current_bid DESC"),
            SortBy::Activity => query
                .push(" ORDER BY (SELECT COUNT(*) FROM bid WHERE bid.auction_id = auction.id) DESC"),
        };
        query.push(" LIMIT 50");
        query.build_query_as().fetch_all(self).await.map_err(|e| {
            tracing::error!("DB: Failed to fetch auctions: {}", e);
            RestError::TemporarilyUnavailable
        })
    }

    #[instrument(name = "db_get_bids_for_auction", skip_all, fields(auction_id = %auction_id))]
    async fn get_bids_for_auction(
        &self,
        auction_id: entities::AuctionId,
    ) -> Result<Vec<Bid>, RestError> {
        sqlx::query_as("SELECT * FROM bid WHERE auction_id = $1 ORDER BY creation_time ASC")
            .bind(auction_id)
            .fetch_all(self)
            .await
            .map_err(|e| {
                tracing::error!("DB: Failed to fetch bids: {}", e);
                RestError::TemporarilyUnavailable
            })
    }

    async fn get_bids_for_auctions(
        &self,
        auction_ids: Vec<entities::AuctionId>,
    ) -> Result<Vec<Bid>, RestError> {
        sqlx::query_as("SELECT * FROM bid WHERE auction_id = ANY($1) ORDER BY creation_time ASC")
            .bind(auction_ids)
            .fetch_all(self)
            .await
            .map_err(|e| {
                tracing::error!("DB: Failed to fetch bids: {}", e);
                RestError::TemporarilyUnavailable
            })
    }

    #[instrument(name = "db_apply_bid", skip_all, fields(auction_id = %bid.auction_id, bid_id = %bid.id))]
    async fn apply_bid(
        &self,
        bid: &Bid,
        observed_current_bid: &BigDecimal,
    ) -> anyhow::Result<bool> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE auction SET current_bid = $1, highest_bidder = $2 \
             WHERE id = $3 AND status = 'live' AND current_bid = $4",
        )
        .bind(&bid.amount)
        .bind(bid.bidder)
        .bind(bid.auction_id)
        .bind(observed_current_bid)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            "INSERT INTO bid (id, auction_id, bidder, amount, creation_time) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(bid.id)
        .bind(bid.auction_id)
        .bind(bid.bidder)
        .bind(&bid.amount)
        .bind(bid.creation_time)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    #[instrument(name = "db_start_auction", skip_all, fields(auction_id = %auction_id))]
    async fn start_auction(&self, auction_id: entities::AuctionId) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE auction SET status = 'live' WHERE id = $1 AND status = 'pending'")
            .bind(auction_id)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(name = "db_finish_auction", skip_all, fields(auction_id = %auction_id))]
    async fn finish_auction(
        &self,
        auction_id: entities::AuctionId,
        outcome: Option<AuctionOutcome>,
    ) -> anyhow::Result<bool> {
        let now = OffsetDateTime::now_utc();
        let result = match outcome {
            Some(outcome) => {
                sqlx::query(
                    "UPDATE auction SET status = 'finished', conclusion_time = $1, winner = $2, highest_bidder = $2, current_bid = $3 \
                     WHERE id = $4 AND status IN ('pending', 'live')",
                )
                .bind(primitive(now))
                .bind(outcome.winner)
                .bind(&outcome.final_amount)
                .bind(auction_id)
                .execute(self)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE auction SET status = 'finished', conclusion_time = $1 \
                     WHERE id = $2 AND status IN ('pending', 'live')",
                )
                .bind(primitive(now))
                .bind(auction_id)
                .execute(self)
                .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn get_startable_auctions(
        &self,
        now: OffsetDateTime,
    ) -> anyhow::Result<Vec<entities::AuctionId>> {
        let now = primitive(now);
        Ok(sqlx::query_scalar(
            "SELECT id FROM auction WHERE status = 'pending' AND start_time <= $1 AND end_time > $1",
        )
        .bind(now)
        .fetch_all(self)
        .await?)
    }

    async fn get_expired_auctions(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> anyhow::Result<Vec<entities::AuctionId>> {
        Ok(sqlx::query_scalar(
            "SELECT id FROM auction WHERE status IN ('pending', 'live') AND end_time <= $1 \
             ORDER BY end_time ASC LIMIT $2",
        )
        .bind(primitive(now))
        .bind(limit)
        .fetch_all(self)
        .await?)
    }
}
