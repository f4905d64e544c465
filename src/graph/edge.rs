use serde::{Deserialize, Serialize};
use std::fmt;

/// Directed pair of vertices. Two edges are equal only when both endpoints
/// match in the same roles, so `1->2` and `2->1` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge<T> {
    pub from: T,
    pub to: T,
}

impl<T: PartialEq> Edge<T> {
    pub fn new(from: T, to: T) -> Self {
        Edge { from, to }
    }

    /// True when `vertex` is either endpoint.
    pub fn contains(&self, vertex: &T) -> bool {
        self.from == *vertex || self.to == *vertex
    }

    /// The endpoint opposite `vertex`; `vertex` itself for a self-loop.
    pub fn other_endpoint(&self, vertex: &T) -> Option<&T> {
        if self.from == *vertex {
            Some(&self.to)
        } else if self.to == *vertex {
            Some(&self.from)
        } else {
            None
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

impl<T: fmt::Display> fmt::Display for Edge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}
