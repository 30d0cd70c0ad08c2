pub mod core;
pub mod models;
pub mod service;

pub use crate::core::{
    AppContext, Clock, FocusProvider, LocalClock, ManualClock, MemoryStore, NoFocus, SqliteStore,
    StatsAggregator, StatsEvent, StatsStore, StoreError,
};
pub use models::{
    AppUsageTotal, DailyStats, HourlyStats, LifetimeStats, MouseButton, Settings, UsageRange,
};
pub use service::TelemetryService;
