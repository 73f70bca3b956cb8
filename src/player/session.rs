//! Player session state machine.
//!
//! `PlayerSession` owns the playback primitive and is the only place
//! that mutates playback state. User actions (select, play/pause,
//! seek, tunable updates) and primitive notifications (metadata
//! loaded, time update, ended) all arrive as named transition methods,
//! and the session drives the rate sampler's lifecycle as playback
//! starts and stops.

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::rate::{RateConfig, RateSampler, compute_rate};
use crate::constants::{ARTWORK_EXTENSIONS, SAMPLE_INTERVAL_MS, SEEK_STEP_SECS};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no track loaded - select a track first")]
    NoTrackLoaded,
    #[error("invalid {name}: {reason}")]
    InvalidConfig {
        name: &'static str,
        reason: &'static str,
    },
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("audio backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Notification from the playback primitive, each delivered exactly
/// once per underlying event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    MetadataLoaded { duration: f64 },
    TimeUpdate { position: f64 },
    Ended,
}

/// The playback primitive: decode, transport and rate control.
///
/// The session exclusively owns the implementation. Rate sampling only
/// ever calls `position`, `duration` and `set_rate` on it.
pub trait Playback {
    fn load(&mut self, source: &Path) -> Result<(), PlayerError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn set_position(&mut self, seconds: f64);
    fn set_rate(&mut self, multiplier: f64);
    /// Current position in seconds.
    fn position(&self) -> f64;
    /// Total duration in seconds; NaN before metadata is known.
    fn duration(&self) -> f64;
    fn rate(&self) -> f64;
    /// Drain pending notifications in arrival order.
    fn poll_events(&mut self) -> Vec<PlaybackEvent>;
}

/// Identity of the loaded audio item. Immutable; replaced wholesale on
/// track change.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub source: PathBuf,
    pub artwork: Option<PathBuf>,
}

impl Track {
    pub fn from_path(source: &Path) -> Self {
        let name = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();

        // Sibling image with the same stem, if one exists
        let artwork = ARTWORK_EXTENSIONS.iter().find_map(|ext| {
            let candidate = source.with_extension(ext);
            candidate.exists().then_some(candidate)
        });

        Self {
            name,
            source: source.to_path_buf(),
            artwork,
        }
    }
}

/// Cached view of the primitive's transport state, updated only
/// through session transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position: f64,
    pub duration: f64,
    pub current_rate: f64,
}

impl PlaybackState {
    fn baseline(rate: f64) -> Self {
        Self {
            is_playing: false,
            position: 0.0,
            duration: 0.0,
            current_rate: rate,
        }
    }

    /// Progress fraction in [0,1], or NaN while duration is unknown.
    pub fn progress(&self) -> f64 {
        self.position / self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loaded,
    Playing,
    Paused,
    Ended,
}

pub struct PlayerSession<P: Playback> {
    playback: P,
    track: Option<Track>,
    phase: Phase,
    state: PlaybackState,
    config: RateConfig,
    sampler: RateSampler,
}

impl<P: Playback> PlayerSession<P> {
    pub fn new(playback: P, config: RateConfig) -> Self {
        Self {
            playback,
            track: None,
            phase: Phase::Idle,
            state: PlaybackState::baseline(config.start_rate),
            config,
            sampler: RateSampler::new(Duration::from_millis(SAMPLE_INTERVAL_MS)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    /// Bind a new track. Replaces the previous track wholesale and
    /// resets transport state (duration pending metadata). If playback
    /// was running, it continues on the new source immediately;
    /// otherwise the track sits in Loaded until a play request.
    pub fn select_track(&mut self, source: &Path, now: Instant) -> Result<(), PlayerError> {
        let resume = self.phase == Phase::Playing;

        // A failed load leaves the session untouched: the previous
        // track keeps playing and its sampler keeps ticking.
        self.playback.load(source)?;

        self.sampler.stop();
        let track = Track::from_path(source);
        info!("Selected track: {}", track.name);
        self.track = Some(track);
        self.state = PlaybackState::baseline(self.config.start_rate);
        self.phase = Phase::Loaded;

        if resume {
            self.play(now)?;
        }
        Ok(())
    }

    /// Start playback. Fails with `NoTrackLoaded` when nothing is
    /// selected; from Ended the track is rewound first so a replay
    /// starts at the beginning and at baseline rate.
    pub fn play(&mut self, now: Instant) -> Result<(), PlayerError> {
        if self.track.is_none() {
            return Err(PlayerError::NoTrackLoaded);
        }

        if self.phase == Phase::Ended {
            self.playback.set_position(0.0);
            self.state.position = 0.0;
        }

        self.playback.play();
        self.state.is_playing = true;
        self.phase = Phase::Playing;
        // Cancel-then-start: a second play request replaces the
        // schedule instead of stacking another one.
        self.sampler.start(now);
        debug!("Playback started, sampler scheduled");
        Ok(())
    }

    /// Pause playback. The current rate is retained, not reset.
    pub fn pause(&mut self) {
        if self.phase != Phase::Playing {
            return;
        }
        self.playback.pause();
        self.state.is_playing = false;
        self.phase = Phase::Paused;
        self.sampler.stop();
        debug!("Playback paused at {:.1}s", self.state.position);
    }

    pub fn toggle_play(&mut self, now: Instant) -> Result<(), PlayerError> {
        if self.phase == Phase::Playing {
            self.pause();
            Ok(())
        } else {
            self.play(now)
        }
    }

    pub fn seek_backward(&mut self) {
        self.seek_by(-SEEK_STEP_SECS);
    }

    pub fn seek_forward(&mut self) {
        self.seek_by(SEEK_STEP_SECS);
    }

    /// Step the position, clamped into [0, duration]. Valid whenever a
    /// track is loaded; play state and rate are untouched.
    fn seek_by(&mut self, seconds: f64) {
        if self.track.is_none() {
            return;
        }
        let duration = if self.state.duration.is_finite() {
            self.state.duration
        } else {
            0.0
        };
        let target = (self.state.position + seconds).clamp(0.0, duration);
        self.state.position = target;
        self.playback.set_position(target);
        debug!("Seek to {target:.1}s");
    }

    /// Drain primitive notifications, then drive the rate sampler.
    /// The single periodic entry point called from the event loop.
    pub fn pump(&mut self, now: Instant) {
        for event in self.playback.poll_events() {
            self.handle_event(event);
        }
        self.tick(now);
    }

    fn handle_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::MetadataLoaded { duration } => self.on_metadata_loaded(duration),
            PlaybackEvent::TimeUpdate { position } => self.on_time_update(position),
            PlaybackEvent::Ended => self.on_ended(),
        }
    }

    /// Duration became known. The rate is forced back to the start
    /// rate so a fresh load never inherits a stale high rate from a
    /// prior track.
    pub fn on_metadata_loaded(&mut self, duration: f64) {
        self.state.duration = duration;
        self.state.current_rate = self.config.start_rate;
        self.playback.set_rate(self.config.start_rate);
        info!("Metadata loaded: duration {duration:.1}s");
    }

    /// Position report from the primitive, written through
    /// unconditionally (the primitive owns the clock).
    pub fn on_time_update(&mut self, position: f64) {
        self.state.position = position;
    }

    /// Playback completed. Sampling stops and the rate resets to
    /// baseline so a replay or the next track starts at the start rate.
    pub fn on_ended(&mut self) {
        self.state.is_playing = false;
        self.phase = Phase::Ended;
        self.sampler.stop();
        self.state.current_rate = self.config.start_rate;
        self.playback.set_rate(self.config.start_rate);
        info!("Playback ended, rate reset to {}", self.config.start_rate);
    }

    /// Fire the rate sampler if due. Reads the primitive's live
    /// position and duration rather than the cached state, so a tick
    /// right after a seek uses fresh values.
    fn tick(&mut self, now: Instant) {
        if !self.sampler.poll(now) {
            return;
        }
        let progress = self.playback.position() / self.playback.duration();
        if let Some(rate) = compute_rate(progress, &self.config) {
            self.playback.set_rate(rate);
            self.state.current_rate = rate;
            debug!("Sampled progress {progress:.3} -> rate {rate:.3}");
        }
    }

    pub fn set_start_rate(&mut self, value: f64) -> Result<(), PlayerError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(PlayerError::InvalidConfig {
                name: "start rate",
                reason: "must be positive and finite",
            });
        }
        if value > self.config.max_rate {
            return Err(PlayerError::InvalidConfig {
                name: "start rate",
                reason: "must not exceed max rate",
            });
        }
        self.config.start_rate = value;
        Ok(())
    }

    pub fn set_max_rate(&mut self, value: f64) -> Result<(), PlayerError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(PlayerError::InvalidConfig {
                name: "max rate",
                reason: "must be positive and finite",
            });
        }
        if value < self.config.start_rate {
            return Err(PlayerError::InvalidConfig {
                name: "max rate",
                reason: "must not be below start rate",
            });
        }
        self.config.max_rate = value;
        Ok(())
    }

    pub fn set_acceleration(&mut self, value: f64) -> Result<(), PlayerError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(PlayerError::InvalidConfig {
                name: "acceleration",
                reason: "must be positive and finite",
            });
        }
        self.config.acceleration = value;
        Ok(())
    }

    #[cfg(test)]
    fn sampler_active(&self) -> bool {
        self.sampler.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted playback primitive for state machine tests.
    struct FakePlayback {
        position: f64,
        duration: f64,
        rate: f64,
        playing: bool,
        loaded: Option<PathBuf>,
        fail_next_load: bool,
        pending: VecDeque<PlaybackEvent>,
        rate_writes: Vec<f64>,
    }

    impl FakePlayback {
        fn new() -> Self {
            Self {
                position: 0.0,
                duration: f64::NAN,
                rate: 1.0,
                playing: false,
                loaded: None,
                fail_next_load: false,
                pending: VecDeque::new(),
                rate_writes: Vec::new(),
            }
        }

        fn push(&mut self, event: PlaybackEvent) {
            self.pending.push_back(event);
        }
    }

    impl Playback for FakePlayback {
        fn load(&mut self, source: &Path) -> Result<(), PlayerError> {
            if self.fail_next_load {
                self.fail_next_load = false;
                return Err(PlayerError::UnsupportedFormat("mp3".into()));
            }
            self.loaded = Some(source.to_path_buf());
            self.position = 0.0;
            self.duration = f64::NAN;
            Ok(())
        }

        fn play(&mut self) {
            self.playing = true;
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn set_position(&mut self, seconds: f64) {
            self.position = seconds;
        }

        fn set_rate(&mut self, multiplier: f64) {
            self.rate = multiplier;
            self.rate_writes.push(multiplier);
        }

        fn position(&self) -> f64 {
            self.position
        }

        fn duration(&self) -> f64 {
            self.duration
        }

        fn rate(&self) -> f64 {
            self.rate
        }

        fn poll_events(&mut self) -> Vec<PlaybackEvent> {
            self.pending.drain(..).collect()
        }
    }

    fn session() -> PlayerSession<FakePlayback> {
        PlayerSession::new(FakePlayback::new(), RateConfig::default())
    }

    fn loaded_session(duration: f64) -> (PlayerSession<FakePlayback>, Instant) {
        let now = Instant::now();
        let mut s = session();
        s.select_track(Path::new("song.wav"), now).unwrap();
        s.playback.duration = duration;
        s.on_metadata_loaded(duration);
        (s, now)
    }

    fn tick_interval() -> Duration {
        Duration::from_millis(SAMPLE_INTERVAL_MS)
    }

    #[test]
    fn test_play_without_track_fails_without_state_change() {
        let mut s = session();
        let err = s.play(Instant::now());
        assert!(matches!(err, Err(PlayerError::NoTrackLoaded)));
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.state().is_playing);
        assert!(!s.sampler_active());
    }

    #[test]
    fn test_select_track_does_not_autoplay() {
        let now = Instant::now();
        let mut s = session();
        s.select_track(Path::new("song.wav"), now).unwrap();
        assert_eq!(s.phase(), Phase::Loaded);
        assert!(!s.state().is_playing);
        assert!(!s.playback.playing);
    }

    #[test]
    fn test_metadata_resets_stale_rate_to_baseline() {
        let now = Instant::now();
        let mut s = session();
        s.select_track(Path::new("a.wav"), now).unwrap();
        s.playback.rate = 1.9; // stale high rate from a prior track
        s.on_metadata_loaded(120.0);
        assert_eq!(s.state().current_rate, 1.0);
        assert_eq!(s.playback.rate, 1.0);
        assert_eq!(s.state().duration, 120.0);
    }

    #[test]
    fn test_tick_applies_curve_rate() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.playback.position = 25.0; // progress 0.25, exp 0.5 -> 1.0625

        s.pump(now + tick_interval());

        assert!((s.state().current_rate - 1.0625).abs() < 1e-12);
        assert!((s.playback.rate - 1.0625).abs() < 1e-12);
    }

    #[test]
    fn test_tick_with_unknown_duration_leaves_rate_unchanged() {
        let now = Instant::now();
        let mut s = session();
        s.select_track(Path::new("song.wav"), now).unwrap();
        s.play(now).unwrap();
        // No metadata yet: duration is NaN on the primitive
        s.playback.position = 10.0;
        let before = s.state().current_rate;

        s.pump(now + tick_interval());

        assert_eq!(s.state().current_rate, before);
    }

    #[test]
    fn test_tick_with_zero_duration_leaves_rate_unchanged() {
        let (mut s, now) = loaded_session(0.0);
        s.play(now).unwrap();
        s.playback.position = 0.0; // 0/0 = NaN progress
        let before = s.state().current_rate;

        s.pump(now + tick_interval());

        assert_eq!(s.state().current_rate, before);
    }

    #[test]
    fn test_ended_resets_rate_and_stops_sampling() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.playback.position = 90.0;
        s.pump(now + tick_interval());
        assert!(s.state().current_rate > 1.5);

        s.playback.push(PlaybackEvent::Ended);
        s.pump(now + tick_interval());

        assert_eq!(s.phase(), Phase::Ended);
        assert!(!s.state().is_playing);
        assert_eq!(s.state().current_rate, 1.0);
        assert_eq!(s.playback.rate, 1.0);
        assert!(!s.sampler_active());

        // A tick that was already due fires into a stopped sampler:
        // no further rate mutation after the reset.
        let writes_after_reset = s.playback.rate_writes.len();
        s.pump(now + tick_interval() * 10);
        assert_eq!(s.playback.rate_writes.len(), writes_after_reset);
    }

    #[test]
    fn test_pause_retains_rate_then_resume_continues_curve() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.playback.position = 25.0;
        s.pump(now + tick_interval());
        let rate_at_pause = s.state().current_rate;

        s.pause();
        assert_eq!(s.phase(), Phase::Paused);
        assert!(!s.sampler_active());
        assert_eq!(s.state().current_rate, rate_at_pause);

        // Resume with progress further along
        let later = now + tick_interval() * 3;
        s.play(later).unwrap();
        s.playback.position = 40.0;
        s.pump(later + tick_interval());
        assert!(s.state().current_rate >= rate_at_pause);
    }

    #[test]
    fn test_seek_clamps_into_duration() {
        let (mut s, _now) = loaded_session(30.0);
        s.on_time_update(25.0);

        s.seek_forward(); // 25 + 10 clamps to 30
        assert_eq!(s.state().position, 30.0);
        assert_eq!(s.playback.position, 30.0);

        s.on_time_update(3.0);
        s.seek_backward(); // 3 - 10 clamps to 0
        assert_eq!(s.state().position, 0.0);
    }

    #[test]
    fn test_seek_does_not_touch_play_state_or_rate() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.playback.position = 50.0;
        s.pump(now + tick_interval());
        let rate = s.state().current_rate;

        s.on_time_update(50.0);
        s.seek_backward();

        assert!(s.state().is_playing);
        assert_eq!(s.phase(), Phase::Playing);
        assert_eq!(s.state().current_rate, rate);
    }

    #[test]
    fn test_seek_without_track_is_a_no_op() {
        let mut s = session();
        s.seek_forward();
        assert_eq!(s.state().position, 0.0);
    }

    #[test]
    fn test_double_play_keeps_single_schedule() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.play(now + Duration::from_millis(100)).unwrap();

        // The first schedule was replaced, so only one tick fires in
        // the window covering both potential due times.
        s.playback.position = 50.0;
        assert!(!s.sampler.poll(now + tick_interval()));
        assert!(
            s.sampler
                .poll(now + Duration::from_millis(100) + tick_interval())
        );
    }

    #[test]
    fn test_reselect_while_playing_continues_on_new_source() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();

        let later = now + Duration::from_secs(5);
        s.select_track(Path::new("next.flac"), later).unwrap();

        assert_eq!(s.phase(), Phase::Playing);
        assert!(s.state().is_playing);
        assert!(s.playback.playing);
        assert_eq!(s.playback.loaded.as_deref(), Some(Path::new("next.flac")));
        assert_eq!(s.state().position, 0.0);
        assert_eq!(s.state().duration, 0.0);
        assert!(s.sampler_active());
    }

    #[test]
    fn test_failed_reselect_while_playing_keeps_sampling() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();

        s.playback.fail_next_load = true;
        let err = s.select_track(Path::new("broken.mp3"), now);
        assert!(matches!(err, Err(PlayerError::UnsupportedFormat(_))));

        // The old track is still the session's track and still playing
        assert_eq!(s.phase(), Phase::Playing);
        assert!(s.state().is_playing);
        assert_eq!(s.playback.loaded.as_deref(), Some(Path::new("song.wav")));
        assert!(s.sampler_active());

        // And its rate keeps being sampled
        s.playback.position = 50.0;
        s.pump(now + tick_interval());
        assert!(s.state().current_rate > 1.0);
        assert_eq!(s.playback.rate, s.state().current_rate);
    }

    #[test]
    fn test_failed_reselect_while_paused_keeps_state() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.pause();
        s.on_time_update(30.0);

        s.playback.fail_next_load = true;
        assert!(s.select_track(Path::new("broken.mp3"), now).is_err());

        assert_eq!(s.phase(), Phase::Paused);
        assert_eq!(s.state().position, 30.0);
        assert_eq!(s.state().duration, 100.0);
    }

    #[test]
    fn test_reselect_while_paused_lands_in_loaded() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.pause();

        s.select_track(Path::new("next.wav"), now).unwrap();
        assert_eq!(s.phase(), Phase::Loaded);
        assert!(!s.state().is_playing);
    }

    #[test]
    fn test_replay_after_ended_rewinds() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.playback.position = 100.0;
        s.playback.push(PlaybackEvent::Ended);
        s.pump(now + tick_interval());
        assert_eq!(s.phase(), Phase::Ended);

        s.play(now + Duration::from_secs(1)).unwrap();
        assert_eq!(s.playback.position, 0.0);
        assert_eq!(s.phase(), Phase::Playing);
    }

    #[test]
    fn test_config_rejects_non_positive_acceleration() {
        let mut s = session();
        assert!(s.set_acceleration(0.0).is_err());
        assert!(s.set_acceleration(-0.5).is_err());
        assert!(s.set_acceleration(f64::NAN).is_err());
        assert_eq!(s.config().acceleration, 0.5);
        assert!(s.set_acceleration(1.3).is_ok());
        assert_eq!(s.config().acceleration, 1.3);
    }

    #[test]
    fn test_config_rejects_inverted_rate_window() {
        let mut s = session();
        assert!(s.set_start_rate(3.0).is_err()); // above max 2.0
        assert!(s.set_max_rate(0.5).is_err()); // below start 1.0
        assert_eq!(s.config().start_rate, 1.0);
        assert_eq!(s.config().max_rate, 2.0);

        assert!(s.set_max_rate(4.0).is_ok());
        assert!(s.set_start_rate(3.0).is_ok());
    }

    #[test]
    fn test_config_change_applies_on_next_tick() {
        let (mut s, now) = loaded_session(100.0);
        s.play(now).unwrap();
        s.playback.position = 50.0;
        s.set_acceleration(1.0).unwrap(); // linear from here on

        s.pump(now + tick_interval());
        assert!((s.state().current_rate - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_time_update_overwrites_position() {
        let (mut s, _now) = loaded_session(100.0);
        s.on_time_update(12.5);
        assert_eq!(s.state().position, 12.5);
        s.on_time_update(7.0); // not monotonic, still trusted
        assert_eq!(s.state().position, 7.0);
    }
}
