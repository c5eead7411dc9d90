pub mod config;
pub mod error;
pub mod metrics;
pub mod modes;
pub mod normalize;
pub mod types;
pub mod utils;

pub use config::AppConfig;
pub use error::{Error, FormatError, Result};
pub use types::{
    EntryStatus, NormalizedAddress, NormalizedHash, PoolEntry, PoolSnapshot, PoolStatus,
    QueueReason, RawSummary,
};
