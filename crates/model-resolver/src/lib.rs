//! Model Builder Resolver
//!
//! Everything that decides *what* a resolution round does with an object:
//!
//! - [`SupertypeResolver`]: declared `extends`/`implements` relations and the
//!   memoized supertype closure of each concrete type
//! - [`IdExtractor`] / [`ValueExtractor`]: per-type functions producing ids or
//!   ready (id, value) entries for a target namespace
//! - [`BatchBuilder`]: turns a batch of ids into values
//! - [`ExtractorRegistry`]: stores all of the above and answers "which
//!   extractors apply to this concrete type, and how do I project to them"

pub mod extract;
pub mod registry;
pub mod supertypes;

pub use extract::{id_of, Extracted, IdExtractor, IdOf, ValueExtractor};
pub use registry::{BatchBuilder, BuilderFn, Dispatch, ExtractorRegistry, RegistryStats};
pub use supertypes::{Route, Supertype, SupertypeResolver, TypeKey};
