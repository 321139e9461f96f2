pub mod model;
pub mod repository;

pub use model::{FetchResult, Story};
pub use repository::{GraphqlStoryWriter, MemoryStoryWriter, PgStoryWriter, StoryWriter};
