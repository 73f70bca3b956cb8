//! Project-wide constants used across multiple modules.

/// Supported audio file extensions
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac"];

/// Sibling image extensions probed for track artwork
pub const ARTWORK_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Directories to skip during file system traversal
pub const SKIP_DIRECTORIES: &[&str] = &["node_modules", ".git", "target"];

/// Cadence of the rate sampler while playing
pub const SAMPLE_INTERVAL_MS: u64 = 500;

/// Transport seek step
pub const SEEK_STEP_SECS: f64 = 10.0;

/// Increment applied by the tunable adjustment keys
pub const TUNABLE_STEP: f64 = 0.1;

/// Advisory UI bounds for the tunables (the session only requires
/// positive, finite, start <= max)
pub const START_RATE_BOUNDS: (f64, f64) = (0.5, 2.0);
pub const MAX_RATE_BOUNDS: (f64, f64) = (1.0, 4.0);
pub const ACCELERATION_BOUNDS: (f64, f64) = (0.1, 2.0);
