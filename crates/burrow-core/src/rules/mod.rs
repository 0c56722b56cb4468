pub mod validation;

pub use validation::{is_identifier, validate_document};
