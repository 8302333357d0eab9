pub mod entities;
pub mod repositories;

pub use entities::*;
pub use library_core::{LibraryError, LibraryResult};
pub use repositories::*;
