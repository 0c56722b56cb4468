pub mod document;
pub mod schema;
pub mod value;

pub use document::{EntityDocument, FieldDocument, SchemaDocument};
pub use schema::{EntityDef, FieldDef, SchemaDefinition};
pub use value::{FieldType, Fields, Record, RecordId, Value};
