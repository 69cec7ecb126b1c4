//! Mapping resolution: turns the unresolved statement produced by
//! preparation into one that names concrete tables and columns.

mod context;
mod identifiers;
mod resolver;
pub mod schema;
mod stage;

pub use context::MappingResolutionContext;
pub use identifiers::UniqueIdentifierGenerator;
pub use resolver::MappingResolver;
pub use schema::{MappingSchema, SchemaResolver};
pub use stage::{resolve, ResolutionStage};
