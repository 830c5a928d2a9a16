// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod social;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use memory::MemoryStore;
pub use postgres::PostgresClient;
pub use social::{RawTextClient, SocialError};
pub use store::{ProfileStore, RelationshipStore, StoreError};
