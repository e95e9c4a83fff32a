// Constants
//
// Version and flag constants shared across the core.

/// Version string that participates in every cache key. Bumping it
/// invalidates every cached transformation at once.
pub const QUARRY_VERSION: &str = env!("CARGO_PKG_VERSION");
