pub mod dataset_ref;
pub mod error;
pub mod handle;
pub mod loader;
