#![deny(clippy::perf, clippy::complexity, clippy::style, unused_imports)]
//! Tourism-site records as exported by the national open-data portal, and
//! their projection into the place-registration form.

pub mod document;
pub mod payload;

pub use document::{load_document, parse_document, LoadError, RecordsDocument};
pub use payload::{MappingError, UploadPayload, PLACE_RATING};
