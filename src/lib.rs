//! Accelerating Player - a terminal audio player whose playback rate
//! rises as the song progresses.
//!
//! The player binds a track, plays it through a rodio-backed engine,
//! and while playback runs a 500 ms sampler maps the current progress
//! fraction through a configurable exponent curve to a playback rate
//! between a start and a max rate. Three tunables shape the curve and
//! can be adjusted live from the keyboard; the file browser selects
//! tracks from the current directory tree.

pub mod constants;
pub mod player;
