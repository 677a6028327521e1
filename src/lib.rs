//! Waygraph: consolidation core for an OSM-to-road-graph extractor
//!
//! An upstream parser streams raw map primitives into unsorted on-disk
//! containers; this crate turns them into the artifacts a routing engine
//! loads:
//!
//! - a graph file of used nodes and directed, weighted node-based edges,
//! - a restrictions file with way references resolved to node references,
//! - a street name index (range table + byte blob).
//!
//! The data generally does not fit in RAM, so every preparation step is an
//! external-memory sort followed by a linear merge-join over the sorted
//! containers. Orchestration is single-threaded; only run generation inside
//! the sorter parallelizes.

pub mod consolidate;
pub mod container;
pub mod formats;
pub mod geo;
pub mod join;
pub mod records;
pub mod sort;

pub use consolidate::{run, ConsolidateConfig, ConsolidateResult, Containers};
pub use container::ExternalVec;
pub use geo::FixedCoord;
pub use records::{Edge, Node, TurnRestriction, WayEndpoint, WeightSpec, SPECIAL_NODEID};
pub use sort::ExternalSorter;
