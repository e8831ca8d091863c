use {
    crate::{
        api,
        api::ws::WsState,
        auction,
        config::{
            Config,
            RunOptions,
        },
        notification,
        state::{
            Store,
            StoreNew,
        },
    },
    anyhow::anyhow,
    futures::future::join_all,
    sqlx::postgres::PgPoolOptions,
    std::{
        sync::{
            atomic::{
                AtomicBool,
                Ordering,
            },
            Arc,
        },
        time::Duration,
    },
    tokio_util::task::TaskTracker,
};

const DATABASE_MAX_CONNECTIONS: u32 = 10;

pub async fn start_server(run_options: RunOptions) -> anyhow::Result<()> {
    tokio::spawn(async move {
        tracing::info!("Registered shutdown signal handler...");
        tokio::signal::ctrl_c().await.unwrap();
        tracing::info!("Shut down signal received, waiting for tasks...");
        SHOULD_EXIT.store(true, Ordering::Release);
    });

    let config = Config::load(&run_options.config.config).map_err(|err| {
        anyhow!(
            "Failed to load config from file({path}): {:?}",
            err,
            path = run_options.config.config
        )
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(DATABASE_MAX_CONNECTIONS)
        .connect(&run_options.server.database_url)
        .await
        .map_err(|err| anyhow!("Failed to connect to database: {:?}", err))?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let task_tracker = TaskTracker::new();
    let ws_state = WsState::new(
        config.ws.broadcast_channel_size,
        config.ws.max_connections_per_user,
    );
    let event_sender = ws_state.broadcast_sender.clone();

    let store = Arc::new(Store {
        db: pool.clone(),
        ws: ws_state,
    });
    let notification_service = Arc::new(notification::service::Service::new(
        pool.clone(),
        event_sender.clone(),
    ));
    let auction_service = auction::service::Service::new(
        pool,
        config.auction,
        notification_service,
        task_tracker.clone(),
        event_sender,
    );
    let store_new = Arc::new(StoreNew {
        store,
        auction_service: auction_service.clone(),
        task_tracker: task_tracker.clone(),
    });

    let lifecycle_loop = tokio::spawn(async move {
        auction_service.run_auction_lifecycle_loop().await
    });
    let server_loop = tokio::spawn(api::start_api(run_options, store_new));
    join_all(vec![lifecycle_loop, server_loop]).await;

    // Let spawned settlement and notification work drain before exiting.
    task_tracker.close();
    task_tracker.wait().await;
    Ok(())
}

// A static exit flag to indicate to running threads that we're shutting down. This is used to
// gracefully shutdown the application.
//
// NOTE: A more idiomatic approach would be to use a tokio::sync::broadcast channel, and to send a
// shutdown signal to all running tasks. However, this is a bit more complicated to implement and
// we don't rely on global state for anything else.
pub(crate) static SHOULD_EXIT: AtomicBool = AtomicBool::new(false);
pub const EXIT_CHECK_INTERVAL: Duration = Duration::from_secs(1);
