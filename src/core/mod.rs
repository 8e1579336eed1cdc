//! Core metadata and geometry modules

pub mod coerce;
pub mod bounds;
pub mod grouping;

// Re-export main types
pub use coerce::{MetadataTypeCoercer, INTEGER_FIELDS};
pub use bounds::{bounds_for_subdataset, compute_bounds};
pub use grouping::{merge_metadata, TileGrouper};
