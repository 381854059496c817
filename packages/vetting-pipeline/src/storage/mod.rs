mod memory;
mod postgres;

pub use memory::InMemoryEvidenceStore;
pub use postgres::PostgresEvidenceStore;
