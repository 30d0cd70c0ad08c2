pub mod settings;
pub mod stats;
pub mod usage;

pub use settings::Settings;
pub use stats::{
    Counters, DailyStats, HourlyStats, KeyStat, LifetimeStats, MouseButton, RawEvent, RawEventKind,
};
pub use usage::{sort_usage, AppUsageDelta, AppUsageTotal, UsageRange};
