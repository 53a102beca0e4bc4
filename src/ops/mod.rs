//! Top-level transfer operations.

pub mod download;
pub mod upload;

pub use download::download_files;
pub use upload::upload_files;
