//! Resource-graph substrate: typed property values, deferred output handles,
//! and the append-only registration scope that components plan into.

pub mod scope;
pub mod types;
pub mod value;

pub use scope::{GraphDoc, InvokeRecord, Scope, ScopeError};
pub use types::{Node, NodeId, NodeSpec, NodeType, Origin, OutputRef};
pub use value::{Fragment, Interpolation, PropertyMap, PropertyValue};
