#![forbid(unsafe_code)]

//! The fieldwork form engine.
//!
//! A schema-driven dynamic form core: declarative field descriptors
//! (including conditional selector branches), a flat type-erased value
//! record, kind-specific coercion and validation, and a single-owner state
//! engine that computes submittability incrementally as values change.
//!
//! The engine is UI-agnostic. The companion `fieldwork-widgets` crate maps
//! resolved descriptors to terminal input behaviors; any other front end
//! can drive the same operations.
//!
//! # Overview
//!
//! ```rust
//! use fieldwork_engine::schema::{FieldDescriptor, Schema, SchemaNode};
//! use fieldwork_engine::engine::FormEngine;
//!
//! let schema = Schema::new(vec![
//!     SchemaNode::Field(FieldDescriptor::text("name", "Name").required()),
//!     SchemaNode::Field(FieldDescriptor::email("mail", "Email")),
//! ])
//! .expect("schema is well-formed");
//!
//! let mut engine = FormEngine::new(schema);
//! assert!(!engine.is_submittable());
//! engine.set_value("name", "Ada");
//! assert!(engine.is_submittable());
//! ```

pub mod engine;
pub mod lookup;
pub mod schema;
pub mod validate;
pub mod value;

pub use engine::{FieldState, FormEngine};
pub use lookup::{
    LocationResolver, LookupConfig, LookupKinds, LookupReply, LookupResolution, LookupSink,
    LookupToken,
};
pub use schema::{ChoiceOption, FieldDescriptor, FieldKind, Schema, SchemaError, SchemaNode,
    SelectorDescriptor};
pub use validate::{ValidationError, validate_field};
pub use value::{DateValue, FieldValue, FormRecord, GeoLocation};
