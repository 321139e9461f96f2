pub mod workflow;

pub use workflow::{plan_units, FeedDispatcher};
