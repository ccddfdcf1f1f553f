mod channel;
mod event_types;
mod hooks;
mod subscription;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
pub use subscription::{follow, FeedNotifier, FollowOptions, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL};
