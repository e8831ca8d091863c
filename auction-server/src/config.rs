use {
    anyhow::Result,
    clap::{
        crate_authors,
        crate_description,
        crate_name,
        crate_version,
        Args,
        Parser,
    },
    std::{
        fs,
        time::Duration,
    },
};

mod server;

#[derive(Parser, Debug)]
#[command(name = crate_name!())]
#[command(author = crate_authors!())]
#[command(about = crate_description!())]
#[command(version = crate_version!())]
pub enum Options {
    /// Run the auction server service.
    Run(RunOptions),
}

#[derive(Args, Clone, Debug)]
pub struct RunOptions {
    /// Server Options
    #[command(flatten)]
    pub server: server::Options,

    #[command(flatten)]
    pub config: ConfigOptions,
}

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Config Options")]
#[group(id = "Config")]
pub struct ConfigOptions {
    /// Path to a configuration file with auction and websocket tuning.
    #[arg(long = "config")]
    #[arg(env = "BIDHALL_CONFIG")]
    #[arg(default_value = "config.yaml")]
    pub config: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub auction: AuctionConfig,
    pub ws:      WsConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Config> {
        let yaml_content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&yaml_content)?;
        Ok(config)
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AuctionConfig {
    /// How often the lifecycle sweep promotes and settles auctions.
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    pub sweep_interval: Duration,

    /// Upper bound on the number of expired auctions settled per sweep.
    #[serde(default = "default_settlement_batch_size")]
    pub settlement_batch_size: i64,

    /// How many times a bid is retried with a fresh read after losing a
    /// conditional-update race before the conflict is surfaced to the caller.
    #[serde(default = "default_max_bid_retries")]
    pub max_bid_retries: u32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WsConfig {
    #[serde(default = "default_broadcast_channel_size")]
    pub broadcast_channel_size: usize,

    /// An identity may hold several concurrent connections (multiple tabs),
    /// up to this many.
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_settlement_batch_size() -> i64 {
    50
}

fn default_max_bid_retries() -> u32 {
    3
}

fn default_broadcast_channel_size() -> usize {
    1000
}

fn default_max_connections_per_user() -> usize {
    10
}
