//! Ids, nodes, and the distance ordered collections built on them.

mod candidates;
mod closest_nodes;
mod id;
mod node;
mod order;

pub use candidates::*;
pub use closest_nodes::*;
pub use id::*;
pub use node::*;
pub use order::*;
