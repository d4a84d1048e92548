//! Audio playback: a rodio sink plus position bookkeeping.
//!
//! Seeking restarts decoding from the requested offset rather than
//! seeking within the sink, so the position clock is the sole source of
//! truth for the scrubber. Track end is detected by polling the sink.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, Instant};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Playback position as "offset of the last seek/load" plus wall time
/// elapsed since playback last started. Pausing folds the elapsed time
/// into the base.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionClock {
    seek_base: Duration,
    play_start: Option<Instant>,
}

impl PositionClock {
    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn start_at(offset: Duration, now: Instant) -> Self {
        Self { seek_base: offset, play_start: Some(now) }
    }

    pub fn pause_at(&mut self, now: Instant) {
        if let Some(start) = self.play_start.take() {
            self.seek_base += now.saturating_duration_since(start);
        }
    }

    pub fn resume_at(&mut self, now: Instant) {
        if self.play_start.is_none() {
            self.play_start = Some(now);
        }
    }

    pub fn is_running(&self) -> bool {
        self.play_start.is_some()
    }

    pub fn position_at(&self, now: Instant) -> Duration {
        let running = self
            .play_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        self.seek_base + running
    }

    pub fn position(&self) -> Duration {
        self.position_at(Instant::now())
    }
}

/// Output stream, sink and volume state for the one playing track.
pub struct Player {
    _stream: Option<OutputStream>,
    stream_handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    clock: PositionClock,
    duration: Option<Duration>,
    master_volume: f32,
    track_gain: f32,
    muted: bool,
    playing: bool,
}

impl Player {
    pub fn new(master_volume: f32) -> Self {
        let (stream, handle) = OutputStream::try_default().ok().unzip();
        if handle.is_none() {
            log::warn!("no audio output device available");
        }
        Self {
            _stream: stream,
            stream_handle: handle,
            sink: None,
            clock: PositionClock::stopped(),
            duration: None,
            master_volume,
            track_gain: 1.0,
            muted: false,
            playing: false,
        }
    }

    /// Decode a file and start playing from `offset`. Used both for
    /// starting a track and for seeking within it.
    pub fn play_file(&mut self, path: &Path, offset: Duration) -> Result<(), String> {
        self.stop();

        if !path.exists() {
            return Err(format!("file not found: {}", path.display()));
        }
        let data = std::fs::read(path).map_err(|e| format!("file error: {e}"))?;

        // rodio's Decoder covers wav, mp3, flac and ogg. It can panic on
        // some containers, so the attempt is fenced off.
        let rodio_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            Decoder::new(Cursor::new(data.clone()))
        }));
        if let Ok(Ok(source)) = rodio_result {
            let source = source.convert_samples::<f32>();
            self.duration = source.total_duration();
            return self.start(source.skip_duration(offset), offset);
        }

        // Fallback for m4a/aac: decode the whole file up front, dropping
        // the samples before the offset as they arrive.
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let (source, total) = decode_fallback(data, ext, offset)?;
        self.duration = Some(total);
        self.start(source, offset)
    }

    fn start<S>(&mut self, source: S, offset: Duration) -> Result<(), String>
    where
        S: Source<Item = f32> + Send + 'static,
    {
        let handle = self
            .stream_handle
            .as_ref()
            .ok_or_else(|| "no audio output device".to_string())?;
        let sink = Sink::try_new(handle).map_err(|e| format!("audio error: {e}"))?;
        sink.set_volume(self.effective_volume());
        sink.append(source);
        self.sink = Some(sink);
        self.clock = PositionClock::start_at(offset, Instant::now());
        self.playing = true;
        Ok(())
    }

    pub fn toggle_pause(&mut self) {
        if let Some(ref sink) = self.sink {
            if sink.is_paused() {
                sink.play();
                self.clock.resume_at(Instant::now());
                self.playing = true;
            } else {
                sink.pause();
                self.clock.pause_at(Instant::now());
                self.playing = false;
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(ref sink) = self.sink {
            sink.stop();
        }
        self.sink = None;
        self.playing = false;
        self.clock = PositionClock::stopped();
        self.duration = None;
    }

    pub fn has_track(&self) -> bool {
        self.sink.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// True once the sink drained while we still thought it was playing.
    pub fn finished(&self) -> bool {
        self.playing && self.sink.as_ref().is_some_and(|s| s.empty())
    }

    pub fn position(&self) -> Duration {
        self.clock.position()
    }

    /// Decoder-reported duration where available; the caller may
    /// override it with the library's stored value.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn set_duration_hint(&mut self, duration: Option<Duration>) {
        if self.duration.is_none() {
            self.duration = duration;
        }
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Per-track gain multiplier, applied on top of the master volume.
    pub fn set_track_gain(&mut self, gain: f32) {
        self.track_gain = gain.clamp(0.0, 2.0);
        self.apply_volume();
    }

    pub fn track_gain(&self) -> f32 {
        self.track_gain
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.apply_volume();
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.track_gain
        }
    }

    fn apply_volume(&mut self) {
        if let Some(ref sink) = self.sink {
            sink.set_volume(self.effective_volume());
        }
    }
}

/// Interleaved PCM decoded up front, already trimmed to the seek
/// offset, served to the sink as-is.
struct PcmSource {
    frames: std::vec::IntoIter<f32>,
    sample_rate: u32,
    channels: u16,
}

impl Iterator for PcmSource {
    type Item = f32;
    fn next(&mut self) -> Option<f32> {
        self.frames.next()
    }
}

impl Source for PcmSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.frames.len())
    }
    fn channels(&self) -> u16 {
        self.channels
    }
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Number of interleaved samples that fall before `offset`.
fn samples_before(offset: Duration, sample_rate: u32, channels: u16) -> usize {
    (offset.as_secs_f64() * sample_rate as f64) as usize * channels as usize
}

/// Append one packet's samples, dropping whatever still falls before
/// the seek offset.
fn push_after_skip(frames: &mut Vec<f32>, samples: &[f32], to_skip: &mut usize) {
    if *to_skip >= samples.len() {
        *to_skip -= samples.len();
    } else {
        frames.extend_from_slice(&samples[*to_skip..]);
        *to_skip = 0;
    }
}

/// Decode a container rodio's decoder rejected. Returns the PCM from
/// `offset` onward plus the full track duration.
fn decode_fallback(
    data: Vec<u8>,
    ext: &str,
    offset: Duration,
) -> Result<(PcmSource, Duration), String> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let mut hint = Hint::new();
    if !ext.is_empty() {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("unsupported container: {e}"))?;

    let mut reader = probed.format;
    let track = reader.default_track().ok_or("no audio track found")?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params.sample_rate.unwrap_or(44_100);
    let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| format!("unsupported codec: {e}"))?;

    let mut to_skip = samples_before(offset, sample_rate, channels);
    let mut decoded_total = 0usize;
    let mut frames: Vec<f32> = Vec::new();
    while let Ok(packet) = reader.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        let Ok(audio) = decoder.decode(&packet) else { continue };
        let mut buf = SampleBuffer::<f32>::new(audio.capacity() as u64, *audio.spec());
        buf.copy_interleaved_ref(audio);
        decoded_total += buf.samples().len();
        push_after_skip(&mut frames, buf.samples(), &mut to_skip);
    }

    if decoded_total == 0 {
        return Err("no audio data decoded".into());
    }
    let total = Duration::from_secs_f64(
        decoded_total as f64 / channels as f64 / sample_rate as f64,
    );
    Ok((PcmSource { frames: frames.into_iter(), sample_rate, channels }, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_to_half_of_180s_reads_90s() {
        let duration = Duration::from_secs(180);
        let offset = duration.mul_f32(0.5);
        let now = Instant::now();
        let clock = PositionClock::start_at(offset, now);

        let position = clock.position_at(now + Duration::from_millis(100));
        let expected = Duration::from_secs(90);
        let delta = position.as_secs_f64() - expected.as_secs_f64();
        assert!(delta.abs() <= 0.2, "position {position:?}, delta {delta}");
    }

    #[test]
    fn test_pause_folds_elapsed_into_base() {
        let now = Instant::now();
        let mut clock = PositionClock::start_at(Duration::from_secs(10), now);

        clock.pause_at(now + Duration::from_secs(5));
        assert!(!clock.is_running());
        // Position is frozen while paused.
        assert_eq!(
            clock.position_at(now + Duration::from_secs(60)),
            Duration::from_secs(15)
        );

        clock.resume_at(now + Duration::from_secs(60));
        assert_eq!(
            clock.position_at(now + Duration::from_secs(62)),
            Duration::from_secs(17)
        );
    }

    #[test]
    fn test_stopped_clock_reads_zero() {
        let clock = PositionClock::stopped();
        assert_eq!(clock.position_at(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_double_pause_and_resume_are_harmless() {
        let now = Instant::now();
        let mut clock = PositionClock::start_at(Duration::ZERO, now);
        clock.pause_at(now + Duration::from_secs(3));
        clock.pause_at(now + Duration::from_secs(9));
        assert_eq!(clock.position_at(now + Duration::from_secs(9)), Duration::from_secs(3));

        clock.resume_at(now + Duration::from_secs(10));
        clock.resume_at(now + Duration::from_secs(20));
        assert_eq!(
            clock.position_at(now + Duration::from_secs(11)),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_fallback_skip_spans_packet_boundaries() {
        // Skip 5 samples across 4-sample packets: the whole first
        // packet, one sample of the second, all of the third.
        let mut to_skip = 5;
        let mut frames = Vec::new();
        push_after_skip(&mut frames, &[0.0, 0.1, 0.2, 0.3], &mut to_skip);
        assert!(frames.is_empty());
        push_after_skip(&mut frames, &[0.4, 0.5, 0.6, 0.7], &mut to_skip);
        assert_eq!(frames, vec![0.5, 0.6, 0.7]);
        push_after_skip(&mut frames, &[0.8, 0.9], &mut to_skip);
        assert_eq!(frames, vec![0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(to_skip, 0);
    }

    #[test]
    fn test_samples_before_offset() {
        assert_eq!(samples_before(Duration::ZERO, 44_100, 2), 0);
        assert_eq!(samples_before(Duration::from_secs(90), 44_100, 2), 7_938_000);
        assert_eq!(samples_before(Duration::from_secs(1), 48_000, 1), 48_000);
    }

    #[test]
    fn test_pcm_source_drains_in_order() {
        let mut source = PcmSource {
            frames: vec![0.1f32, 0.2, 0.3].into_iter(),
            sample_rate: 44_100,
            channels: 2,
        };
        assert_eq!(source.current_frame_len(), Some(3));
        assert_eq!(source.next(), Some(0.1));
        assert_eq!(source.current_frame_len(), Some(2));
        assert_eq!(source.by_ref().count(), 2);
        assert_eq!(source.next(), None);
    }
}
