pub mod export;
pub mod result;
pub mod summary;
