pub mod edge;
pub mod lww_graph;
pub mod search;

pub use edge::Edge;
pub use lww_graph::LwwElementGraph;
pub use search::depth_first_path;
