pub mod schema;

pub use schema::{
    CacheConfig, Config, DataConfig, GatewayConfig, MessengerConfig, SessionsConfig,
};
