//! Global constants for kneemark

/// Maximum number of landmarks for an axial sequence
pub const MAX_LANDMARKS_AXIAL: usize = 11;

/// Maximum number of landmarks for a sagittal sequence
pub const MAX_LANDMARKS_SAGITTAL: usize = 7;

/// Maximum number of landmarks for a dynamic sequence
pub const MAX_LANDMARKS_DYNAMIC: usize = 18;

/// Prefix shared by every dataset-type directory (`DATASET_AXIAL`, ...)
pub const DATASET_DIR_PREFIX: &str = "DATASET_";

/// Extension of the per-sequence landmark record
pub const RECORD_EXTENSION: &str = "json";

/// Extension of the slice files inside a sequence directory
pub const SLICE_EXTENSION: &str = "dcm";

/// Default file name of the global status index
pub const STATUS_FILE_NAME: &str = "status.json";

/// Default dataset root when nothing is configured
pub const DEFAULT_BASE_DIR: &str = "DataOrtho";

/// Status flag for a sequence that still needs annotation
pub const STATUS_INCOMPLETE: u8 = 0;

/// Status flag for a sequence with a complete, persisted set of landmarks
pub const STATUS_COMPLETE: u8 = 1;
