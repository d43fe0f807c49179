pub mod connection_graph;
pub mod memory;
pub mod message_store;
pub mod pagination;
pub mod user_directory;

pub use connection_graph::{ConnectionGraph, PgConnectionGraph};
pub use memory::MemoryStore;
pub use message_store::{MessageStore, PgMessageStore, Slice};
pub use pagination::PaginationService;
pub use user_directory::{PgUserDirectory, UserDirectory};
