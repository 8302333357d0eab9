pub mod config;
pub mod errors;

pub use self::config::*;
pub use errors::{LibraryError, LibraryResult};
