//! Last-Writer-Wins element set and graph CRDTs.
//!
//! Every mutation takes a caller-supplied, totally ordered timestamp; the
//! crate never reads a clock. Replicas exchange whole states and fold them
//! together with [`Merge::merge_from`], which is commutative, associative and
//! idempotent, so replicas converge regardless of delivery order.
//!
//! ```
//! use lww_graph::{LwwElementGraph, Merge, Timestamp};
//!
//! let mut a: LwwElementGraph<u32> = LwwElementGraph::new();
//! a.add_vertex(1, Timestamp::from_millis(1));
//! a.add_vertex(2, Timestamp::from_millis(1));
//! assert!(a.add_edge_between(1, 2, Timestamp::from_millis(2)));
//!
//! let mut b = a.clone();
//! assert!(b.remove_vertex(2, Timestamp::from_millis(3)));
//!
//! a.merge_from(&b);
//! assert!(a.edges().is_empty());
//! assert_eq!(a.path(&1, &2), None);
//! ```

pub mod config;
pub mod crdt;
pub mod dst;
pub mod graph;
pub mod time;

pub use config::{ConfigError, GraphConfig, IsolatedVertexPolicy, Traversal};
pub use crdt::{LwwElementSet, Merge, TimestampedGrowSet};
pub use graph::{Edge, LwwElementGraph};
pub use time::Timestamp;
