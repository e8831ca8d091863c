use {
    super::{
        Auth,
        RestError,
    },
    crate::{
        auction::{
            api::process_bid,
            entities::AuctionId,
            service::get_auction_by_id::GetAuctionByIdInput,
        },
        kernel::entities::UserId,
        models::{
            AccessToken,
            User,
        },
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
        state::StoreNew,
    },
    anyhow::{
        anyhow,
        Result,
    },
    axum::{
        extract::{
            ws::{
                Message,
                WebSocket,
            },
            State,
            WebSocketUpgrade,
        },
        response::IntoResponse,
    },
    bidhall_api_types::{
        auction::BidCreate,
        ws::{
            APIResponse,
            AuctionEndedUpdate,
            AuctionStartedUpdate,
            AuctionWonUpdate,
            ClientMessage,
            ClientRequest,
            NewBidUpdate,
            OutbidUpdate,
            ServerResultMessage,
            ServerResultResponse,
            ServerUpdateResponse,
        },
    },
    futures::{
        stream::{
            SplitSink,
            SplitStream,
        },
        SinkExt,
        StreamExt,
    },
    std::{
        collections::{
            HashMap,
            HashSet,
        },
        future::Future,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
        },
        time::Duration,
    },
    tokio::sync::{
        broadcast,
        RwLock,
        Semaphore,
    },
    tracing::{
        instrument,
        Instrument,
    },
};

pub type SubscriberId = usize;

/// Everything the broadcast layer fans out. Room events are filtered by each
/// subscriber's joined auctions; identity events carry their recipient and
/// reach every open connection of that identity.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateEvent {
    NewBid(NewBidUpdate),
    AuctionStarted(AuctionStartedUpdate),
    AuctionEnded(AuctionEndedUpdate),
    Outbid {
        recipient: UserId,
        update:    OutbidUpdate,
    },
    AuctionWon {
        recipient: UserId,
        update:    AuctionWonUpdate,
    },
}

pub struct WsState {
    subscriber_counter:       AtomicUsize,
    connections_by_user:      RwLock<HashMap<UserId, HashSet<SubscriberId>>>,
    max_connections_per_user: usize,
    pub broadcast_sender:     broadcast::Sender<UpdateEvent>,
    // Keeping one receiver alive means sends never fail just because no
    // client is connected at that moment.
    pub broadcast_receiver:   broadcast::Receiver<UpdateEvent>,
}

impl WsState {
    pub fn new(broadcast_channel_size: usize, max_connections_per_user: usize) -> Self {
        let (broadcast_sender, broadcast_receiver) = broadcast::channel(broadcast_channel_size);
        Self {
            subscriber_counter: AtomicUsize::new(0),
            connections_by_user: RwLock::new(HashMap::new()),
            max_connections_per_user,
            broadcast_sender,
            broadcast_receiver,
        }
    }

    /// Registers a new connection under the authenticated identity. If the
    /// identity already holds too many open connections this returns None.
    pub async fn register_connection(&self, user_id: UserId) -> Option<SubscriberId> {
        let id = self.subscriber_counter.fetch_add(1, Ordering::SeqCst);
        let mut write_guard = self.connections_by_user.write().await;
        let ids = write_guard.entry(user_id).or_insert_with(HashSet::new);
        if ids.len() >= self.max_connections_per_user {
            return None;
        }
        ids.insert(id);
        Some(id)
    }

    /// Removes a closed connection from its identity's active set, dropping
    /// the identity entry entirely once the set is empty.
    pub async fn remove_connection(&self, user_id: UserId, id: SubscriberId) {
        let mut write_guard = self.connections_by_user.write().await;
        if let Some(ids) = write_guard.get_mut(&user_id) {
            ids.remove(&id);
            if ids.is_empty() {
                write_guard.remove(&user_id);
            }
        }
    }
}

pub async fn ws_route_handler(
    auth: Auth,
    ws: WebSocketUpgrade,
    State(store): State<Arc<StoreNew>>,
) -> impl IntoResponse {
    // Connections must authenticate before any room operation is possible.
    let (access_token, user) = match auth {
        Auth::Authorized(access_token, user) => (access_token, user),
        Auth::Unauthorized => return RestError::Unauthorized.into_response(),
    };

    match store.store.ws.register_connection(user.id).await {
        Some(subscriber_id) => ws
            .on_upgrade(move |socket| {
                websocket_handler(socket, store, subscriber_id, access_token, user)
            })
            .into_response(),
        None => RestError::TooManyConnections.into_response(),
    }
}

async fn websocket_handler(
    stream: WebSocket,
    store: Arc<StoreNew>,
    subscriber_id: SubscriberId,
    access_token: AccessToken,
    user: User,
) {
    let user_id = user.id;
    let (sender, receiver) = stream.split();
    let new_receiver = store.store.ws.broadcast_receiver.resubscribe();
    let mut subscriber = Subscriber::new(
        subscriber_id,
        store.clone(),
        new_receiver,
        receiver,
        sender,
        access_token,
        user,
    );
    subscriber.run().await;
    store.store.ws.remove_connection(user_id, subscriber_id).await;
}

#[derive(Debug, Clone)]
struct DeferredResponse {
    response:           ServerResultResponse,
    /// A successful bid implicitly joins the auction's room so the bidder
    /// keeps seeing its activity.
    auction_id_to_join: Option<AuctionId>,
}

/// Subscriber is an actor that handles a single websocket connection.
/// It listens to the store for updates and sends them to the client.
pub struct Subscriber {
    id:                  SubscriberId,
    closed:              bool,
    store:               Arc<StoreNew>,
    notify_receiver:     broadcast::Receiver<UpdateEvent>,
    receiver:            SplitStream<WebSocket>,
    sender:              SplitSink<WebSocket, Message>,
    auction_ids:         HashSet<AuctionId>,
    access_token:        AccessToken,
    user:                User,
    ping_interval:       tokio::time::Interval,
    exit_check_interval: tokio::time::Interval,
    responded_to_ping:   bool,
    active_requests:     Arc<Semaphore>,
    response_sender:     broadcast::Sender<DeferredResponse>,
    response_receiver:   broadcast::Receiver<DeferredResponse>,
}

const PING_INTERVAL_DURATION: Duration = Duration::from_secs(30);

const MAX_ACTIVE_REQUESTS: usize = 50;

fn ok_response(id: String) -> ServerResultResponse {
    ServerResultResponse {
        id:     Some(id),
        result: ServerResultMessage::Success(None),
    }
}

impl Subscriber {
    pub fn new(
        id: SubscriberId,
        store: Arc<StoreNew>,
        notify_receiver: broadcast::Receiver<UpdateEvent>,
        receiver: SplitStream<WebSocket>,
        sender: SplitSink<WebSocket, Message>,
        access_token: AccessToken,
        user: User,
    ) -> Self {
        let (response_sender, response_receiver) = broadcast::channel(100);
        Self {
            id,
            closed: false,
            store,
            notify_receiver,
            receiver,
            sender,
            auction_ids: HashSet::new(),
            access_token,
            user,
            ping_interval: tokio::time::interval(PING_INTERVAL_DURATION),
            exit_check_interval: tokio::time::interval(EXIT_CHECK_INTERVAL),
            responded_to_ping: true, // We start with true so we don't close the connection immediately
            active_requests: Arc::new(Semaphore::new(MAX_ACTIVE_REQUESTS)),
            response_sender,
            response_receiver,
        }
    }

    pub async fn run(&mut self) {
        while !self.closed {
            if let Err(e) = self.handle_next().await {
                tracing::debug!(subscriber = self.id, error = ?e, "Error Handling Subscriber Message.");
                break;
            }
        }
    }

    async fn handle_next(&mut self) -> Result<()> {
        tokio::select! {
            maybe_update_event = self.notify_receiver.recv() => {
                match maybe_update_event {
                    Ok(event) => self.handle_update(event).await,
                    Err(e) => Err(anyhow!("Error receiving update event: {:?}", e)),
                }
            },
            maybe_message_or_err = self.receiver.next() => {
                self.handle_client_message(
                    maybe_message_or_err.ok_or(anyhow!("Client channel is closed"))??
                ).await
            },
            response_received = self.response_receiver.recv() => {
                match response_received {
                    Ok(DeferredResponse { response, auction_id_to_join }) => {
                        if let Some(auction_id) = auction_id_to_join {
                            self.auction_ids.insert(auction_id);
                        }
                        self.sender.send(serde_json::to_string(&response)?.into()).await?;
                    }
                    Err(e) => {
                        tracing::warn!(
                            subscriber = self.id,
                            error = ?e,
                            "Error Handling Subscriber Response Message."
                        );
                    }
                }
                Ok(())
            },
            _  = self.ping_interval.tick() => {
                // A token revoked mid-session closes the connection on the
                // next ping rather than living until disconnect.
                if self.store.store.get_user_by_access_token(&self.access_token).await.is_err() {
                    return Err(anyhow!("Invalid token. Closing connection."));
                }
                if !self.responded_to_ping {
                    return Err(anyhow!("Subscriber did not respond to ping. Closing connection."));
                }
                self.responded_to_ping = false;
                self.sender.send(Message::Ping(vec![])).await?;
                Ok(())
            },
            _ = self.exit_check_interval.tick() => {
                if SHOULD_EXIT.load(Ordering::Acquire) {
                    self.sender.close().await?;
                    self.closed = true;
                    return Err(anyhow!("Application is shutting down. Closing connection."));
                }
                Ok(())
            }
        }
    }

    #[instrument(fields(subscriber = self.id, name), skip_all)]
    async fn handle_update(&mut self, event: UpdateEvent) -> Result<()> {
        let message = match event {
            UpdateEvent::NewBid(update) => {
                tracing::Span::current().record("name", "new_bid");
                self.auction_ids
                    .contains(&update.auction_id)
                    .then_some(ServerUpdateResponse::NewBid { update })
            }
            UpdateEvent::AuctionStarted(update) => {
                tracing::Span::current().record("name", "auction_started");
                self.auction_ids
                    .contains(&update.auction_id)
                    .then_some(ServerUpdateResponse::AuctionStarted { update })
            }
            UpdateEvent::AuctionEnded(update) => {
                tracing::Span::current().record("name", "auction_ended");
                self.auction_ids
                    .contains(&update.auction_id)
                    .then_some(ServerUpdateResponse::AuctionEnded { update })
            }
            UpdateEvent::Outbid { recipient, update } => {
                tracing::Span::current().record("name", "outbid");
                (recipient == self.user.id).then_some(ServerUpdateResponse::Outbid { update })
            }
            UpdateEvent::AuctionWon { recipient, update } => {
                tracing::Span::current().record("name", "auction_won");
                (recipient == self.user.id).then_some(ServerUpdateResponse::AuctionWon { update })
            }
        };

        match message {
            // Irrelevant update for this connection.
            None => Ok(()),
            Some(message) => {
                self.sender
                    .send(serde_json::to_string(&message)?.into())
                    .await?;
                Ok(())
            }
        }
    }

    async fn handle_subscribe(&mut self, message_id: String, auction_ids: Vec<AuctionId>) {
        let mut not_found_auction_ids = Vec::new();
        for auction_id in &auction_ids {
            if self
                .store
                .auction_service
                .get_auction_by_id(GetAuctionByIdInput {
                    auction_id: *auction_id,
                })
                .await
                .is_err()
            {
                not_found_auction_ids.push(*auction_id);
            }
        }
        // If there is a single auction id that is not found, we don't
        // subscribe to any of the asked correct auction ids and return an
        // error to be more explicit and clear.
        let resp = if !not_found_auction_ids.is_empty() {
            ServerResultResponse {
                id:     Some(message_id),
                result: ServerResultMessage::Err(format!(
                    "Auction(s) with id(s) {:?} not found",
                    not_found_auction_ids
                )),
            }
        } else {
            self.auction_ids.extend(auction_ids);
            ok_response(message_id)
        };
        Self::send_response(
            &self.response_sender,
            DeferredResponse {
                response:           resp,
                auction_id_to_join: None,
            },
        );
    }

    async fn handle_unsubscribe(&mut self, message_id: String, auction_ids: Vec<AuctionId>) {
        self.auction_ids
            .retain(|auction_id| !auction_ids.contains(auction_id));
        Self::send_response(
            &self.response_sender,
            DeferredResponse {
                response:           ok_response(message_id),
                auction_id_to_join: None,
            },
        );
    }

    fn send_response(
        response_sender: &broadcast::Sender<DeferredResponse>,
        deferred_response: DeferredResponse,
    ) {
        if let Err(e) = response_sender.send(deferred_response) {
            tracing::warn!(error = ?e, "Error sending response to subscriber");
        }
    }

    async fn spawn_deferred(
        &mut self,
        fut: impl Future<Output = DeferredResponse> + Send + 'static,
    ) {
        let permit = self
            .active_requests
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore should not be closed");
        let response_sender = self.response_sender.clone();
        self.store.task_tracker.spawn(
            async move {
                let resp = fut.await;
                Self::send_response(&response_sender, resp);
                drop(permit);
            }
            .in_current_span(),
        );
    }

    async fn handle_place_bid(&mut self, message_id: String, bid: BidCreate) {
        let auth = Auth::Authorized(self.access_token.clone(), self.user.clone());
        let store = self.store.clone();
        self.spawn_deferred(async move {
            match process_bid(auth, store, bid).await {
                Ok(bid_result) => DeferredResponse {
                    auction_id_to_join: Some(bid_result.auction.id),
                    response:           ServerResultResponse {
                        id:     Some(message_id),
                        result: ServerResultMessage::Success(Some(APIResponse::BidResult(
                            bid_result.0,
                        ))),
                    },
                },
                Err(e) => DeferredResponse {
                    response:           ServerResultResponse {
                        id:     Some(message_id),
                        result: ServerResultMessage::Err(e.to_status_and_message().1),
                    },
                    auction_id_to_join: None,
                },
            }
        })
        .await;
    }

    #[instrument(fields(subscriber = self.id, name), skip_all)]
    async fn handle_client_message(&mut self, message: Message) -> Result<()> {
        let maybe_client_message = match message {
            Message::Close(_) => {
                // Closing the connection. We don't remove it from the subscribers
                // list, instead when the Subscriber struct is dropped the channel
                // to subscribers list will be closed and it will eventually get
                // removed.
                // Send the close message to gracefully shut down the connection
                // Otherwise the client might get an abnormal Websocket closure
                // error.
                tracing::Span::current().record("name", "close");
                self.sender.close().await?;
                self.closed = true;
                return Ok(());
            }
            Message::Text(text) => serde_json::from_str::<ClientRequest>(&text),
            Message::Binary(data) => serde_json::from_slice::<ClientRequest>(&data),
            Message::Ping(_) => {
                // Axum will send Pong automatically
                tracing::Span::current().record("name", "ping");
                return Ok(());
            }
            Message::Pong(_) => {
                tracing::Span::current().record("name", "pong");
                self.responded_to_ping = true;
                return Ok(());
            }
        };

        match maybe_client_message {
            Err(e) => {
                Self::send_response(
                    &self.response_sender,
                    DeferredResponse {
                        response:           ServerResultResponse {
                            id:     None,
                            result: ServerResultMessage::Err(e.to_string()),
                        },
                        auction_id_to_join: None,
                    },
                );
            }
            Ok(ClientRequest { msg, id }) => match msg {
                ClientMessage::Subscribe { auction_ids } => {
                    tracing::Span::current().record("name", "subscribe");
                    self.handle_subscribe(id, auction_ids).await
                }
                ClientMessage::Unsubscribe { auction_ids } => {
                    tracing::Span::current().record("name", "unsubscribe");
                    self.handle_unsubscribe(id, auction_ids).await
                }
                ClientMessage::PlaceBid { bid } => {
                    tracing::Span::current().record("name", "place_bid");
                    self.handle_place_bid(id, bid).await
                }
            },
        };

        Ok(())
    }
}
