use {
    crate::{
        auction::{
            AuctionId,
            BidCreate,
            BidResult,
        },
        Amount,
        UserId,
    },
    serde::{
        Deserialize,
        Serialize,
    },
    utoipa::ToSchema,
};

#[derive(Deserialize, Clone, ToSchema, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum ClientMessage {
    /// Join the rooms of the given auctions. Joining is idempotent.
    #[serde(rename = "subscribe")]
    Subscribe {
        #[schema(value_type = Vec<String>)]
        auction_ids: Vec<AuctionId>,
    },
    /// Leave the rooms of the given auctions.
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        #[schema(value_type = Vec<String>)]
        auction_ids: Vec<AuctionId>,
    },
    /// Place a bid using the connection's authenticated identity.
    #[serde(rename = "place_bid")]
    PlaceBid { bid: BidCreate },
}

#[derive(Deserialize, Clone, ToSchema, Serialize)]
pub struct ClientRequest {
    pub id:  String,
    #[serde(flatten)]
    pub msg: ClientMessage,
}

#[derive(Serialize, Clone, ToSchema, Deserialize, Debug, PartialEq)]
pub struct NewBidUpdate {
    #[schema(value_type = String)]
    pub auction_id:     AuctionId,
    pub amount:         Amount,
    #[schema(value_type = String)]
    pub highest_bidder: UserId,
}

#[derive(Serialize, Clone, ToSchema, Deserialize, Debug, PartialEq)]
pub struct AuctionStartedUpdate {
    #[schema(value_type = String)]
    pub auction_id: AuctionId,
}

#[derive(Serialize, Clone, ToSchema, Deserialize, Debug, PartialEq)]
pub struct AuctionEndedUpdate {
    #[schema(value_type = String)]
    pub auction_id:   AuctionId,
    #[schema(value_type = Option<String>)]
    pub winner:       Option<UserId>,
    /// The settled price: the winning bid amount, or the starting price if there were no bids.
    pub final_amount: Amount,
}

#[derive(Serialize, Clone, ToSchema, Deserialize, Debug, PartialEq)]
pub struct OutbidUpdate {
    #[schema(value_type = String)]
    pub auction_id: AuctionId,
    /// The amount that displaced the recipient's bid.
    pub amount:     Amount,
}

#[derive(Serialize, Clone, ToSchema, Deserialize, Debug, PartialEq)]
pub struct AuctionWonUpdate {
    #[schema(value_type = String)]
    pub auction_id:   AuctionId,
    pub final_amount: Amount,
}

/// This enum is used to send an update to the client for any subscriptions made.
#[derive(Serialize, Clone, ToSchema, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerUpdateResponse {
    #[serde(rename = "new_bid")]
    NewBid { update: NewBidUpdate },
    #[serde(rename = "auction_started")]
    AuctionStarted { update: AuctionStartedUpdate },
    #[serde(rename = "auction_ended")]
    AuctionEnded { update: AuctionEndedUpdate },
    #[serde(rename = "outbid")]
    Outbid { update: OutbidUpdate },
    #[serde(rename = "auction_won")]
    AuctionWon { update: AuctionWonUpdate },
}

#[derive(Serialize, Clone, ToSchema, Deserialize, Debug)]
#[serde(untagged)]
pub enum APIResponse {
    BidResult(BidResult),
}

#[derive(Serialize, Clone, ToSchema, Deserialize, Debug)]
#[serde(tag = "status", content = "result")]
pub enum ServerResultMessage {
    #[serde(rename = "success")]
    Success(Option<APIResponse>),
    #[serde(rename = "error")]
    Err(String),
}

/// This enum is used to send the result for a specific client request with the same id.
/// Id is only None when the client message is invalid.
#[derive(Serialize, ToSchema, Deserialize, Clone, Debug)]
pub struct ServerResultResponse {
    pub id:     Option<String>,
    #[serde(flatten)]
    pub result: ServerResultMessage,
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        uuid::Uuid,
    };

    #[test]
    fn client_request_place_bid_roundtrip() {
        let auction_id = Uuid::new_v4();
        let request = ClientRequest {
            id:  "1".to_string(),
            msg: ClientMessage::PlaceBid {
                bid: BidCreate {
                    auction_id,
                    amount: 260_000,
                },
            },
        };
        let text = serde_json::to_string(&request).unwrap();
        assert!(text.contains("\"method\":\"place_bid\""));
        let parsed: ClientRequest = serde_json::from_str(&text).unwrap();
        match parsed.msg {
            ClientMessage::PlaceBid { bid } => {
                assert_eq!(bid.auction_id, auction_id);
                assert_eq!(bid.amount, 260_000);
            }
            _ => panic!("expected place_bid"),
        }
    }

    #[test]
    fn server_update_is_tagged_by_type() {
        let update = ServerUpdateResponse::AuctionEnded {
            update: AuctionEndedUpdate {
                auction_id:   Uuid::new_v4(),
                winner:       None,
                final_amount: 200_000,
            },
        };
        let text = serde_json::to_string(&update).unwrap();
        assert!(text.contains("\"type\":\"auction_ended\""));
        assert!(text.contains("\"winner\":null"));
    }
}
