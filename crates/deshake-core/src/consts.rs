//! Detection and correction tuning constants.

/// Side of a detection cell at the smallest pyramid level, in pixels.
pub const CELL_SIZE: u32 = 8;

/// Minimal count of detection cells along the shorter frame axis.
pub const CELLS_MIN_COUNT: u32 = 16;

/// Pyramid levels stop once either dimension drops to this size.
pub const PYRAMID_MIN_DIM: u32 = CELLS_MIN_COUNT * CELL_SIZE;

/// Texture score below which a cell is discarded as low contrast.
pub const CONTRAST_THRESHOLD: u32 = 64;

/// Frames between refreshes of the slow reference pyramids.
pub const SLOW_PERIOD: u64 = 15;

/// Phase offset of the second slow reference.
pub const SLOW_PHASE: u64 = SLOW_PERIOD / 2;

/// Frames between refreshes of the static reference pyramids.
pub const STATIC_PERIOD: u64 = 60;

/// Phase offset of the second static reference.
pub const STATIC_PHASE: u64 = STATIC_PERIOD / 2;

/// Length of the per-cell motion history ring.
pub const HISTORY_LEN: usize = 8;

/// Search range divider: cells are searched over `width / BORDER_DIV`.
pub const BORDER_DIV: u32 = 6;

/// Weight applied to the estimation error in the outlier filter.
pub const DEV_FACTOR: i64 = 4;

/// Squared vector magnitude below which a measurement is taken as-is.
pub const MIN_QSIZE: i64 = 1;

/// Minimal number of textured neighbours required for an estimate.
pub const MIN_SURROUND: usize = 2;
