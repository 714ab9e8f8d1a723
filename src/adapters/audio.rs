//! Streaming audio adapter: HTTP WAV → I2S amplifier (MAX98357-class).
//!
//! Implements [`AudioPort`].  A stream is a plain HTTP GET of a RIFF/WAVE
//! file carrying 16-bit PCM.  The header is parsed on open; every
//! [`service`](AudioPort::service) call then moves one chunk from the
//! socket through the volume stage into the I2S DMA buffer.  Mono input
//! is duplicated onto both slots.
//!
//! Elapsed time is derived from the PCM bytes consumed, so it follows the
//! audio actually sent to the amplifier rather than wall time.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` + `I2sDriver` (standard
//!   Philips mode, TX only).
//! - **all other targets**: deterministic simulation.

use std::collections::VecDeque;

use crate::app::ports::{AudioError, AudioStatus, AudioStatusKind, I2sPins};
use crate::config::MAX_OUTPUT_GPIO;

/// Status reports kept for the loop to drain.
const STATUS_CAPACITY: usize = 8;

// ───────────────────────────────────────────────────────────────
// WAV header
// ───────────────────────────────────────────────────────────────

/// PCM layout of a WAV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.channels) * u32::from(self.bits_per_sample / 8)
    }

    /// Parse a RIFF/WAVE header.  Returns the format and the offset of the
    /// first PCM byte, or `None` if `buf` does not (yet) hold a complete
    /// header for a supported format.
    pub fn parse(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < 12 || &buf[0..4] != b"RIFF" || &buf[8..12] != b"WAVE" {
            return None;
        }

        let mut pos = 12;
        let mut format = None;
        while pos + 8 <= buf.len() {
            let id = &buf[pos..pos + 4];
            let size = u32::from_le_bytes([buf[pos + 4], buf[pos + 5], buf[pos + 6], buf[pos + 7]])
                as usize;
            let body = pos + 8;

            match id {
                b"fmt " => {
                    if size < 16 || body + 16 > buf.len() {
                        return None;
                    }
                    let f = &buf[body..body + 16];
                    let audio_format = u16::from_le_bytes([f[0], f[1]]);
                    let channels = u16::from_le_bytes([f[2], f[3]]);
                    let sample_rate = u32::from_le_bytes([f[4], f[5], f[6], f[7]]);
                    let bits_per_sample = u16::from_le_bytes([f[14], f[15]]);
                    if audio_format != 1 || bits_per_sample != 16 || !(1..=2).contains(&channels) {
                        return None;
                    }
                    format = Some(Self {
                        channels,
                        sample_rate,
                        bits_per_sample,
                    });
                }
                b"data" => return format.map(|f| (f, body)),
                _ => {}
            }
            // Chunks are word-aligned.
            let padded = size.checked_add(size & 1)?;
            pos = body.checked_add(padded)?;
        }
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Sample processing
// ───────────────────────────────────────────────────────────────

/// Scale little-endian i16 samples in place.  Volume 0–100 maps onto a
/// square-law gain so equal steps sound roughly equal.
pub fn apply_volume(pcm: &mut [u8], volume: u8) {
    let v = i32::from(volume.min(100));
    let gain = v * v; // out of 10_000
    if gain == 10_000 {
        return;
    }
    for frame in pcm.chunks_exact_mut(2) {
        let s = i32::from(i16::from_le_bytes([frame[0], frame[1]]));
        let scaled = (s * gain / 10_000) as i16;
        frame.copy_from_slice(&scaled.to_le_bytes());
    }
}

/// Duplicate mono i16 samples onto left and right slots.
pub fn mono_to_stereo(pcm: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(pcm.len() * 2);
    for s in pcm.chunks_exact(2) {
        out.extend_from_slice(s);
        out.extend_from_slice(s);
    }
}

/// Reassembles whole PCM frames from socket reads of any length.  A
/// partial frame left at the end of one read is held for the next.
#[derive(Debug, Default)]
pub struct FrameAligner {
    frame_bytes: usize,
    carry: Vec<u8>,
}

impl FrameAligner {
    pub fn new(format: &WavFormat) -> Self {
        Self {
            frame_bytes: usize::from(format.channels) * usize::from(format.bits_per_sample / 8),
            carry: Vec::new(),
        }
    }

    /// Append `input` and move every complete frame into `out`.
    pub fn push(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.clear();
        let frame = self.frame_bytes.max(1);
        self.carry.extend_from_slice(input);
        let whole = self.carry.len() - self.carry.len() % frame;
        out.extend_from_slice(&self.carry[..whole]);
        self.carry.drain(..whole);
    }

    /// Bytes waiting for the rest of their frame.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }
}

fn check_pins(pins: I2sPins) -> Result<(), AudioError> {
    for pin in [pins.bclk, pins.lrc, pins.dout] {
        if pin > MAX_OUTPUT_GPIO {
            return Err(AudioError::InvalidPin(pin));
        }
    }
    Ok(())
}

/// Bounded queue of engine status reports.
#[derive(Debug, Default)]
struct StatusQueue(VecDeque<AudioStatus>);

impl StatusQueue {
    fn push(&mut self, kind: AudioStatusKind, text: impl Into<String>) {
        if self.0.len() >= STATUS_CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(AudioStatus {
            kind,
            text: text.into(),
        });
    }

    fn pop(&mut self) -> Option<AudioStatus> {
        self.0.pop_front()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use std::time::Duration;

    use embedded_svc::io::Read;
    use esp_idf_hal::delay::BLOCK;
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::i2s::config::{DataBitWidth, StdConfig};
    use esp_idf_hal::i2s::{I2S0, I2sDriver, I2sTx};
    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use log::{info, warn};

    use super::{FrameAligner, StatusQueue, WavFormat, apply_volume, check_pins, mono_to_stereo};
    use crate::app::ports::{AudioError, AudioPort, AudioStatus, AudioStatusKind, I2sPins};

    const CHUNK: usize = 2048;
    const HEADER_MAX: usize = 1024;
    const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

    struct Stream {
        conn: EspHttpConnection,
        format: WavFormat,
        /// PCM bytes already read past the header.
        pending: Vec<u8>,
        aligner: FrameAligner,
        bytes_played: u64,
        eof: bool,
        url: String,
    }

    pub struct I2sAudio {
        pins: Option<I2sPins>,
        driver: Option<I2sDriver<'static, I2sTx>>,
        stream: Option<Stream>,
        volume: u8,
        status: StatusQueue,
        chunk: Vec<u8>,
        frames: Vec<u8>,
        stereo: Vec<u8>,
    }

    impl Default for I2sAudio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl I2sAudio {
        pub fn new() -> Self {
            Self {
                pins: None,
                driver: None,
                stream: None,
                volume: 0,
                status: StatusQueue::default(),
                chunk: vec![0; CHUNK],
                frames: Vec::with_capacity(CHUNK + 4),
                stereo: Vec::with_capacity(CHUNK * 2),
            }
        }

        /// (Re)create the TX driver for `sample_rate`.
        fn open_driver(&mut self, sample_rate: u32) -> Result<(), AudioError> {
            let pins = self.pins.ok_or(AudioError::Driver(-1))?;
            self.driver = None;
            let config = StdConfig::philips(sample_rate, DataBitWidth::Bits16);
            // The I2S0 peripheral and the configured pins are owned
            // exclusively by this adapter for the lifetime of the program.
            let (i2s, bclk, dout, ws) = unsafe {
                (
                    I2S0::new(),
                    AnyIOPin::new(i32::from(pins.bclk)),
                    AnyIOPin::new(i32::from(pins.dout)),
                    AnyIOPin::new(i32::from(pins.lrc)),
                )
            };
            let mut driver =
                I2sDriver::new_std_tx(i2s, &config, bclk, dout, Option::<AnyIOPin>::None, ws)
                    .map_err(|e| AudioError::Driver(e.code()))?;
            driver
                .tx_enable()
                .map_err(|e| AudioError::Driver(e.code()))?;
            self.driver = Some(driver);
            Ok(())
        }

        fn open_stream(&mut self, url: &str) -> Result<Stream, String> {
            let mut conn = EspHttpConnection::new(&Configuration {
                timeout: Some(HTTP_TIMEOUT),
                ..Default::default()
            })
            .map_err(|e| format!("http init: {e}"))?;
            conn.initiate_request(Method::Get, url, &[])
                .map_err(|e| format!("request: {e}"))?;
            conn.initiate_response()
                .map_err(|e| format!("response: {e}"))?;
            let status = conn.status();
            if !(200..300).contains(&status) {
                return Err(format!("HTTP {status}"));
            }

            let mut header = Vec::with_capacity(HEADER_MAX);
            let mut buf = [0u8; 256];
            loop {
                if let Some((format, offset)) = WavFormat::parse(&header) {
                    return Ok(Stream {
                        conn,
                        format,
                        pending: header.split_off(offset),
                        aligner: FrameAligner::new(&format),
                        bytes_played: 0,
                        eof: false,
                        url: url.to_owned(),
                    });
                }
                if header.len() >= HEADER_MAX {
                    return Err("not a 16-bit PCM WAV stream".into());
                }
                let n = conn.read(&mut buf).map_err(|e| format!("read: {e:?}"))?;
                if n == 0 {
                    return Err("stream ended inside header".into());
                }
                header.extend_from_slice(&buf[..n]);
            }
        }
    }

    impl AudioPort for I2sAudio {
        fn set_pinout(&mut self, pins: I2sPins) -> Result<(), AudioError> {
            check_pins(pins)?;
            self.pins = Some(pins);
            self.open_driver(44_100)?;
            info!(
                "Audio: I2S pinout BCLK={} LRC={} DOUT={}",
                pins.bclk, pins.lrc, pins.dout
            );
            Ok(())
        }

        fn connect_to_host(&mut self, url: &str) -> bool {
            self.stream = None;
            match self.open_stream(url) {
                Ok(stream) => {
                    let f = stream.format;
                    if let Err(e) = self.open_driver(f.sample_rate) {
                        warn!("Audio: I2S reconfigure failed: {}", e);
                        return false;
                    }
                    self.status.push(AudioStatusKind::LastHost, url);
                    self.status.push(
                        AudioStatusKind::StreamInfo,
                        format!("PCM {} Hz, {} ch, 16 bit", f.sample_rate, f.channels),
                    );
                    self.status
                        .push(AudioStatusKind::Bitrate, format!("{}", f.byte_rate() * 8));
                    self.stream = Some(stream);
                    true
                }
                Err(e) => {
                    self.status
                        .push(AudioStatusKind::Info, format!("open {url} failed: {e}"));
                    false
                }
            }
        }

        fn is_running(&self) -> bool {
            self.stream.as_ref().is_some_and(|s| !s.eof)
        }

        fn current_time_secs(&self) -> u32 {
            self.stream.as_ref().map_or(0, |s| {
                let rate = u64::from(s.format.byte_rate().max(1));
                (s.bytes_played / rate) as u32
            })
        }

        fn set_volume(&mut self, volume: u8) {
            self.volume = volume.min(100);
        }

        fn stop(&mut self) {
            if let Some(stream) = self.stream.take() {
                info!("Audio: closed {}", stream.url);
            }
            if let Some(driver) = self.driver.as_mut() {
                // Flushes whatever is still queued in the DMA buffers.
                if let Err(e) = driver.tx_disable() {
                    warn!("Audio: I2S tx_disable failed: {}", e);
                }
                if let Err(e) = driver.tx_enable() {
                    warn!("Audio: I2S tx_enable failed: {}", e);
                }
            }
        }

        fn service(&mut self) {
            let Some(stream) = self.stream.as_mut() else {
                return;
            };
            if stream.eof {
                return;
            }
            let Some(driver) = self.driver.as_mut() else {
                return;
            };

            let n = if stream.pending.is_empty() {
                match stream.conn.read(&mut self.chunk) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("Audio: read error {:?}", e);
                        0
                    }
                }
            } else {
                let n = stream.pending.len().min(self.chunk.len());
                self.chunk[..n].copy_from_slice(&stream.pending[..n]);
                stream.pending.drain(..n);
                n
            };

            if n == 0 {
                if stream.aligner.carried() > 0 {
                    warn!(
                        "Audio: {} trailing bytes short of a frame dropped",
                        stream.aligner.carried()
                    );
                }
                stream.eof = true;
                self.status.push(AudioStatusKind::EofMp3, stream.url.clone());
                return;
            }

            stream.aligner.push(&self.chunk[..n], &mut self.frames);
            if self.frames.is_empty() {
                return;
            }
            apply_volume(&mut self.frames, self.volume);
            let out: &[u8] = if stream.format.channels == 1 {
                mono_to_stereo(&self.frames, &mut self.stereo);
                &self.stereo
            } else {
                &self.frames
            };
            if let Err(e) = driver.write_all(out, BLOCK) {
                warn!("Audio: I2S write failed: {}", e);
            }
            stream.bytes_played += self.frames.len() as u64;
        }

        fn take_status(&mut self) -> Option<AudioStatus> {
            self.status.pop()
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::I2sAudio;

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Host simulation: every `service` call advances playback by
/// `1 / services_per_sec` seconds until `stream_secs` is reached.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
pub struct I2sAudio {
    pins: Option<I2sPins>,
    running: bool,
    services: u32,
    volume: u8,
    status: StatusQueue,
    /// Open attempts that fail before one succeeds.
    pub fail_opens: u32,
    pub services_per_sec: u32,
    pub stream_secs: u32,
}

#[cfg(not(target_os = "espidf"))]
impl Default for I2sAudio {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl I2sAudio {
    pub fn new() -> Self {
        Self {
            pins: None,
            running: false,
            services: 0,
            volume: 0,
            status: StatusQueue::default(),
            fail_opens: 0,
            services_per_sec: 10,
            stream_secs: 60,
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn pins(&self) -> Option<I2sPins> {
        self.pins
    }
}

#[cfg(not(target_os = "espidf"))]
impl crate::app::ports::AudioPort for I2sAudio {
    fn set_pinout(&mut self, pins: I2sPins) -> Result<(), AudioError> {
        check_pins(pins)?;
        self.pins = Some(pins);
        Ok(())
    }

    fn connect_to_host(&mut self, url: &str) -> bool {
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            self.status
                .push(AudioStatusKind::Info, format!("open {url} failed"));
            return false;
        }
        self.running = true;
        self.services = 0;
        self.status.push(AudioStatusKind::LastHost, url);
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn current_time_secs(&self) -> u32 {
        self.services / self.services_per_sec.max(1)
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    fn stop(&mut self) {
        self.running = false;
        self.services = 0;
    }

    fn service(&mut self) {
        if !self.running {
            return;
        }
        self.services += 1;
        if self.current_time_secs() >= self.stream_secs {
            self.running = false;
            self.status.push(AudioStatusKind::EofMp3, "sim");
        }
    }

    fn take_status(&mut self) -> Option<AudioStatus> {
        self.status.pop()
    }
}
