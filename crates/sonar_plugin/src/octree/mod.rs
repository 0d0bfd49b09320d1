//! Octree index of reflective surface cells.
//!
//! The environment is covered by one root cube whose structure is kept in
//! memory down to the cache granularity. Below that, each cache cell is an
//! independently loadable unit persisted as one JSON file.
//!
//! ```text
//! level  root_level ──┐       permanent structure (roots.json)
//!        ...          │
//!        cache_level ─┼─ cell  load()/unload(), one file per cell
//!        ...          │
//!        0           ─┘ leaf  normal + material + impedance
//! ```
//!
//! # Module Structure
//!
//! - [`bounds`]: `DAabb3` - environment volume
//! - [`config`]: `OctreeConfig` - sizing, lattice math, cache paths
//! - [`node`]: `NodeKey`, `SpatialNode` - construction from occupancy queries
//! - [`cache`]: JSON records and load/unload of cells

pub mod bounds;
pub mod cache;
pub mod config;
pub mod node;

// Re-exports
pub use bounds::DAabb3;
pub use cache::NodeRecord;
pub use config::{CacheLocation, OctreeConfig};
pub use node::{BuildContext, NodeKey, SpatialNode, Surface};
