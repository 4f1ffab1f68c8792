//! Predicate compilation
//!
//! Translates attribute-typed predicate trees into the backend's native
//! boolean query, with graceful degradation:
//!
//! - Each supported predicate kind maps to a term, range, exists, ids,
//!   regexp, query_string, nested or spatial clause
//! - An unsupported subtree becomes match-all and clears the support flag
//! - A cleared support flag means results must pass through [`PostFilter`]
//!
//! Compilation is a pure function of the predicate, schema and native
//! override. Only a malformed override aborts it.

pub mod ast;
pub mod bounds;
pub mod compiler;
mod errors;
pub mod evaluate;
pub mod like;
pub mod native;
pub mod query;
pub mod schema;
pub mod temporal;

pub use ast::{
    ComparisonOp, DistanceOp, Expr, LikeSyntax, Literal, Period, Predicate, SpatialOp, TemporalOp,
};
pub use bounds::{bounds, Bounds};
pub use compiler::{compile, CompiledFilter, FilterCompiler};
pub use errors::{FilterError, FilterResult, Unsupported};
pub use evaluate::PostFilter;
pub use native::NativeOverride;
pub use schema::{AttributeSchema, Binding, FeatureSchema, GeometryStorage};
