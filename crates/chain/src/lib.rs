pub mod client;
pub mod gateway;
pub mod metrics;

pub use client::NodeClient;
pub use gateway::{GatewayError, PoolGateway, RpcGateway};
pub use metrics::GatewayMetrics;
