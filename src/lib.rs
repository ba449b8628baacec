pub mod config;
pub mod docx;
pub mod errors;
pub mod extractor;
pub mod importer;
pub mod logging;
pub mod models;
pub mod planner;
pub mod render;
pub mod segmenter;
pub mod store;
pub mod validator;

pub use config::Config;
pub use errors::{ErrorKind, ImportError};
pub use importer::{ImportMode, ImportOptions, Importer};
pub use models::*;
pub use planner::{ApplyMode, ApplyOutcome, LookupStore};
pub use render::render_record;
pub use store::SqliteStore;
pub use validator::Validator;
