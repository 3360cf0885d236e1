//! Resumable work queue feeding pages through analysis into the result store.

pub mod events;
pub mod images;
pub mod item;
pub mod scheduler;
pub mod status;
pub mod store;

pub use events::{QueueEvent, QueueEventBroadcaster, QueueEventKind};
pub use images::{CachedImage, ImageCache};
pub use item::QueueItem;
pub use scheduler::{RunOutcome, Scheduler, SchedulerBuilder, DEFAULT_FAN_OUT_LIMIT};
pub use status::{ItemProgress, QueueState, QueueStatus};
pub use store::{JsonQueueStore, MemoryQueueStore, QueueStore};
