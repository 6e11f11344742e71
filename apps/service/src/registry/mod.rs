/// File-backed registry of monitored URIs
///
/// The registry is a JSON array of URI strings kept in one local file. Every
/// operation goes through [`RegistryStore`], which serializes the whole
/// load, mutate and persist sequence behind a single lock.
pub mod file;
pub mod store;

pub use file::{FileState, InPlaceFile, RegistryFile, ReplaceFile, WriteMode};
pub use store::{AddOutcome, RegistryError, RegistryStore, RemoveOutcome};
