pub mod db;
pub mod memory;
pub mod sample;

pub use db::PgDocumentStore;
pub use memory::MemoryDocumentStore;
pub use sample::SampleUserDirectory;
