pub mod analytics;
pub mod backup;
pub mod binder;
pub mod client;
pub mod error;
pub mod events;
pub mod legacy;
pub mod normalize;
pub mod retry;
pub mod session;
pub mod types;

pub use analytics::{
    AnalyticsRelay, AnalyticsSink, EcommerceAction, EcommerceEvent, Platform, TracingSink,
};
pub use backup::{BackupCache, BackupRecord, BackupStore, FileStore, MemoryStore, StorageError};
pub use binder::{BadgeState, CountBadge, CountBinder, CountTarget};
pub use client::{CartClient, ClientSettings};
pub use error::{CartError, ErrorKind, Operation};
pub use events::{CartEvent, CartListener, EventBus, ListenerId};
pub use legacy::{parse_legacy, EventError, LegacyAdapter, LegacyEvent, LegacySink};
pub use retry::RetryPolicy;
pub use session::CartSession;
