pub mod dedup;
pub mod publisher;
pub mod source;
pub mod story;
