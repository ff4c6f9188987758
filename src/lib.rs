// Re-export all public modules
pub mod as_graph;
pub mod engine;
pub mod io;
pub mod shared;

// Re-export commonly used types at the crate root
pub use as_graph::{ASGraph, ASN};
pub use engine::{Prefix, RankTable, Route, SimulationEngine};
pub use shared::{Relationships, SimError};
