pub mod model;
pub mod store;

pub use model::{Chunk, ChunkRecord, Citation, TextLocator};
pub use store::CorpusStore;
