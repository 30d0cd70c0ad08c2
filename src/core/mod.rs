pub mod aggregator;
pub mod app_usage;
pub mod clock;
pub mod distance;
pub mod history_db;
pub mod logging;
pub mod notify;
pub mod perf;
pub mod persist_queue;
pub mod scheduler;
pub mod store;

pub use aggregator::StatsAggregator;
pub use app_usage::{AppContext, AppUsageTracker, FocusProvider, NoFocus};
pub use clock::{Clock, LocalClock, ManualClock};
pub use distance::DistanceCalculator;
pub use history_db::SqliteStore;
pub use notify::{Notifier, StatsEvent};
pub use persist_queue::{PersistOp, PersistQueue};
pub use store::{MemoryStore, StatsStore, StoreError, StoreResult};
