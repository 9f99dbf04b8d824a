pub mod mediator;
pub mod pager;

pub use mediator::{Cursor, FeedMediator, FeedStatus, LoadDirection, LoadOutcome, SkipReason};
pub use pager::FeedPager;
