//! Audio playback engine built on rodio.
//!
//! This is the playback primitive behind the session: it decodes a
//! whole file up front (WAV via hound, FLAC via claxon), plays it
//! through a rodio sink, and exposes transport, rate control and
//! progress. Rate changes go through `Sink::set_speed`; seeking
//! rebuilds the sink at a sample offset because a consumed source
//! cannot be rewound. Notifications (metadata loaded, time update,
//! ended) travel from the audio thread over an mpsc channel and are
//! drained by the session on its own loop.

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
    mpsc,
};
use std::time::Duration;

use super::session::{Playback, PlaybackEvent, PlayerError};

/// Fully decoded track, shared between the engine and the source it
/// hands to the sink so seeks never touch the disk again.
struct DecodedAudio {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedAudio {
    fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

pub struct AudioEngine {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Sink,
    events_tx: mpsc::Sender<PlaybackEvent>,
    events_rx: mpsc::Receiver<PlaybackEvent>,
    samples_played: Arc<AtomicUsize>,
    decoded: Option<Arc<DecodedAudio>>,
    current_rate: f64,
}

impl AudioEngine {
    pub fn new() -> Result<Self, PlayerError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| PlayerError::Backend(e.to_string()))?;
        let sink = Sink::try_new(&stream_handle).map_err(|e| PlayerError::Backend(e.to_string()))?;
        let (events_tx, events_rx) = mpsc::channel();

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink,
            events_tx,
            events_rx,
            samples_played: Arc::new(AtomicUsize::new(0)),
            decoded: None,
            current_rate: 1.0,
        })
    }

    fn fresh_sink(&self) -> Result<Sink, PlayerError> {
        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| PlayerError::Backend(e.to_string()))?;
        sink.set_speed(self.current_rate as f32);
        Ok(sink)
    }

    /// Rebuild the sink with the current track's source starting at
    /// `start_sample`, preserving the pause state of the sink being
    /// replaced.
    fn rebuild_at(&mut self, start_sample: usize) -> Result<(), PlayerError> {
        let decoded = match &self.decoded {
            Some(d) => Arc::clone(d),
            None => return Ok(()),
        };
        let was_paused = self.sink.is_paused();

        // Stopping releases the previous source before the new one
        // is bound.
        self.sink.stop();
        self.sink = self.fresh_sink()?;

        let start_sample = start_sample.min(decoded.samples.len());
        self.samples_played.store(start_sample, Ordering::Relaxed);

        let mut source = TrackSource::new(
            decoded,
            self.events_tx.clone(),
            self.samples_played.clone(),
        );
        source.skip_to(start_sample);
        self.sink.append(source);

        if was_paused {
            self.sink.pause();
        }
        Ok(())
    }

    fn decode(path: &Path) -> Result<DecodedAudio, PlayerError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "wav" => decode_wav(path),
            "flac" => decode_flac(path),
            _ => Err(PlayerError::UnsupportedFormat(ext)),
        }
    }
}

impl Playback for AudioEngine {
    fn load(&mut self, source: &Path) -> Result<(), PlayerError> {
        let decoded = Arc::new(Self::decode(source)?);
        let duration = decoded.duration_seconds();

        log::info!(
            "Loaded {}: {} Hz, {} channels, {:.1}s",
            source.display(),
            decoded.sample_rate,
            decoded.channels,
            duration
        );

        // Stop the previous track and drop its sample buffer before
        // binding the new source. Pausing first makes the rebuilt sink
        // come up paused: binding a source must not start playback,
        // that is the session's decision.
        self.sink.stop();
        self.sink.pause();
        self.decoded = Some(decoded);
        self.rebuild_at(0)?;

        // Discard notifications still queued from the previous track
        // so a stale position report cannot follow the new one.
        while self.events_rx.try_recv().is_ok() {}

        let _ = self.events_tx.send(PlaybackEvent::MetadataLoaded { duration });
        Ok(())
    }

    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn set_position(&mut self, seconds: f64) {
        let Some(decoded) = &self.decoded else {
            return;
        };
        let frame = (seconds.max(0.0) * decoded.sample_rate as f64) as usize;
        let sample = frame * decoded.channels as usize;
        if let Err(e) = self.rebuild_at(sample) {
            log::error!("Seek failed: {e}");
        }
    }

    fn set_rate(&mut self, multiplier: f64) {
        self.current_rate = multiplier;
        self.sink.set_speed(multiplier as f32);
        log::debug!("Playback rate set to {multiplier:.3}");
    }

    fn position(&self) -> f64 {
        match &self.decoded {
            Some(decoded) => {
                let played = self.samples_played.load(Ordering::Relaxed);
                played as f64 / (decoded.sample_rate as f64 * decoded.channels as f64)
            }
            None => 0.0,
        }
    }

    fn duration(&self) -> f64 {
        match &self.decoded {
            Some(decoded) => decoded.duration_seconds(),
            None => f64::NAN,
        }
    }

    fn rate(&self) -> f64 {
        self.current_rate
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

fn decode_wav(path: &Path) -> Result<DecodedAudio, PlayerError> {
    let mut reader = hound::WavReader::new(BufReader::new(File::open(path)?))
        .map_err(|e| PlayerError::Backend(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.bits_per_sample {
        16 => {
            let samples: Result<Vec<i16>, _> = reader.samples().collect();
            samples.map_err(|e| PlayerError::Backend(e.to_string()))?
        }
        24 => {
            let samples: Result<Vec<i32>, _> = reader.samples().collect();
            samples
                .map_err(|e| PlayerError::Backend(e.to_string()))?
                .into_iter()
                .map(|s| (s >> 8) as i16)
                .collect()
        }
        32 => {
            let samples: Result<Vec<i32>, _> = reader.samples().collect();
            samples
                .map_err(|e| PlayerError::Backend(e.to_string()))?
                .into_iter()
                .map(|s| (s >> 16) as i16)
                .collect()
        }
        8 => {
            let samples: Result<Vec<i8>, _> = reader.samples().collect();
            samples
                .map_err(|e| PlayerError::Backend(e.to_string()))?
                .into_iter()
                .map(|s| (s as i16) << 8)
                .collect()
        }
        other => {
            return Err(PlayerError::UnsupportedFormat(format!(
                "{other}-bit WAV"
            )));
        }
    };

    Ok(DecodedAudio {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

fn decode_flac(path: &Path) -> Result<DecodedAudio, PlayerError> {
    let mut reader =
        claxon::FlacReader::open(path).map_err(|e| PlayerError::Backend(e.to_string()))?;
    let info = reader.streaminfo();

    let mut samples = Vec::new();
    for sample in reader.samples() {
        let sample = sample.map_err(|e| PlayerError::Backend(e.to_string()))?;
        samples.push(match info.bits_per_sample {
            16 => sample as i16,
            24 => (sample >> 8) as i16,
            _ => (sample >> 16) as i16,
        });
    }

    Ok(DecodedAudio {
        samples,
        channels: info.channels as u16,
        sample_rate: info.sample_rate,
    })
}

/// Source fed to the sink. Tracks consumption through the shared
/// counter, reports position at its own cadence and announces
/// exhaustion exactly once.
struct TrackSource {
    audio: Arc<DecodedAudio>,
    position: usize,
    events_tx: mpsc::Sender<PlaybackEvent>,
    samples_played: Arc<AtomicUsize>,
    update_every: usize,
    since_update: usize,
    ended_sent: bool,
}

impl TrackSource {
    fn new(
        audio: Arc<DecodedAudio>,
        events_tx: mpsc::Sender<PlaybackEvent>,
        samples_played: Arc<AtomicUsize>,
    ) -> Self {
        // Roughly four position reports per second of media time
        let update_every =
            ((audio.sample_rate as usize * audio.channels as usize) / 4).max(1);
        Self {
            audio,
            position: 0,
            events_tx,
            samples_played,
            update_every,
            since_update: 0,
            ended_sent: false,
        }
    }

    fn skip_to(&mut self, sample_position: usize) {
        self.position = sample_position.min(self.audio.samples.len());
    }
}

impl Iterator for TrackSource {
    type Item = i16;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.audio.samples.len() {
            if !self.ended_sent {
                self.ended_sent = true;
                let _ = self.events_tx.send(PlaybackEvent::Ended);
            }
            return None;
        }

        let sample = self.audio.samples[self.position];
        self.position += 1;

        let played = self.samples_played.fetch_add(1, Ordering::Relaxed) + 1;
        self.since_update += 1;
        if self.since_update >= self.update_every {
            self.since_update = 0;
            let position = played as f64
                / (self.audio.sample_rate as f64 * self.audio.channels as f64);
            let _ = self.events_tx.send(PlaybackEvent::TimeUpdate { position });
        }

        Some(sample)
    }
}

impl Source for TrackSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.audio.channels
    }

    fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.audio.duration_seconds()))
    }
}
