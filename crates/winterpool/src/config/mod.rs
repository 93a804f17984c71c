pub mod loader;
pub mod schema;

pub use loader::{load_jobspec, load_jobspec_from_str};
pub use schema::{JobSpec, OcrSettings};
