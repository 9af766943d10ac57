//! Local backend: SQLite records, filesystem objects, host-driven identity

mod identity;
mod objects;
mod records;
mod schema;

pub use identity::LocalIdentityProvider;
pub use objects::LocalObjectStorage;
pub use records::LocalRecordStore;
pub use schema::init_record_schema;
