pub mod error;
pub mod ingest;
pub mod insertion;
pub mod loader;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod orientation;
pub mod query;
pub mod rerank;
pub mod signature;
pub mod store;
pub mod stores;
pub mod traits;

pub use error::{MatchError, StoreError};
pub use ingest::{add_folder_best_effort, discover_image_files, AddedImage, IngestionReport, SkippedImage};
pub use insertion::{delete_duplicates, insert_record};
pub use loader::{decode, ImageSource};
pub use merge::merge;
pub use models::{Candidate, Record, SearchConfig, SearchOptions, SearchResult};
pub use orchestrator::SignatureSearch;
pub use orientation::{expand, Inversion, Mirror, Orientation, Rotation, TransformedImage};
pub use query::{retrieve, QueryBuilder, StoreQuery};
pub use rerank::{normalized_distance, rerank};
pub use signature::{words_from_signature, GridSignature};
pub use store::{encode_record, StoreHit};
pub use stores::{ElasticsearchStore, MemoryStore};
pub use traits::{DocumentStore, ImageSignature, SignatureGenerator};
