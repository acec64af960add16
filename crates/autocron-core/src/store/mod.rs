//! Job persistence.

mod jobs;
mod text;
mod validate;

pub use jobs::JobStore;
pub use text::{FileTextStore, MemoryTextStore};
pub use validate::{validate_script, validate_spec};
