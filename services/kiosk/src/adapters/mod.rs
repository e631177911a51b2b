pub mod backend;
mod record;
pub mod secure_store;
pub mod sqlite_store;

pub use backend::BackendClient;
pub use record::PASSPORT_KEY;
pub use secure_store::EncryptedFileStore;
pub use sqlite_store::SqliteCredentialStore;
