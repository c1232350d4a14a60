//! Process configuration: environment variables and CLI flags, loaded
//! once at startup (`dotenvy` for local `.env` files layered under the
//! real environment, `clap` for flags).

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "gateway-node", about = "AR.IO-style chunk and data retrieval gateway")]
pub struct Config {
    #[arg(long, env = "GATEWAY_BIND_ADDR", default_value = "0.0.0.0:4000")]
    pub bind_addr: String,

    #[arg(long, env = "GATEWAY_BUFFER_STORE_DIR", default_value = "./data/chunks")]
    pub buffer_store_dir: String,

    #[arg(long, env = "GATEWAY_LOG_FILTER", default_value = "info")]
    pub log_filter: String,

    #[arg(long, env = "GATEWAY_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    #[arg(long, env = "GATEWAY_MAX_HOPS", default_value_t = gateway_types::DEFAULT_MAX_HOPS)]
    pub max_hops: u32,

    /// Upper bound on in-flight parallel attempts per composite-source
    /// `get` call.
    #[arg(long, env = "GATEWAY_SOURCE_PARALLELISM", default_value_t = 3)]
    pub source_parallelism: usize,
}

impl Config {
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Config::parse()
    }
}
