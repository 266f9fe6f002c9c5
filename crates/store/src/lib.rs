//! Record store, volume index and pagination
//!
//! Features:
//! - `RecordStore` collaborator interface (key/value with TTL + scored set)
//! - In-process store with lazy TTL expiry
//! - Typed JSON access to canonical records
//! - Volume-ranked index and stable cursor pagination over it

pub mod store;
pub mod memory;
pub mod records;
pub mod volume_index;
pub mod pager;

pub use store::RecordStore;
pub use memory::{MemoryStore, MemoryStoreStats};
pub use records::RecordRepository;
pub use volume_index::{VolumeIndex, VOLUME_INDEX_KEY};
pub use pager::{decode_cursor, encode_cursor, Cursor, Page, Pager};
