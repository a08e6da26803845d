//! Audio capture from microphone
//!
//! The device callback runs on the audio thread and pushes samples into a
//! lock-free single-producer/single-consumer ring. The session thread drains
//! whatever has accumulated as one [`AudioBlock`], so block sizes follow the
//! driver and the polling cadence rather than the detector frame length.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Format of an open input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Samples per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
}

impl StreamSpec {
    /// Single-channel stream at the given rate
    #[must_use]
    pub const fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }
}

/// Raw samples delivered by a [`FrameSource`] in one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlock {
    samples: Vec<i16>,
    spec: StreamSpec,
}

impl AudioBlock {
    /// Wrap captured samples with the format they were captured in
    #[must_use]
    pub const fn new(samples: Vec<i16>, spec: StreamSpec) -> Self {
        Self { samples, spec }
    }

    /// Captured samples
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Take ownership of the samples
    #[must_use]
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Format at capture time
    #[must_use]
    pub const fn spec(&self) -> StreamSpec {
        self.spec
    }

    /// Number of samples in the block
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the block carries no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// An open input stream
///
/// Dropping the source releases the underlying device handle.
pub trait FrameSource {
    /// Format of the samples this source delivers
    fn spec(&self) -> StreamSpec;

    /// Drain the samples captured since the last read
    ///
    /// Returns `Ok(None)` when nothing has arrived yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamInterrupted`] if the stream faulted
    fn read_block(&mut self) -> Result<Option<AudioBlock>>;
}

/// Something that can open input streams
pub trait AudioInput {
    /// Acquire the device and start capturing
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if no stream can be opened
    fn open(&self) -> Result<Box<dyn FrameSource>>;
}

/// Wait for the next non-empty block from a source
///
/// Polls every `poll` and gives up with [`Error::StreamInterrupted`] once the
/// source has been silent for longer than `stall_timeout`.
///
/// # Errors
///
/// Returns error if the source faults or stalls
#[allow(clippy::future_not_send)]
pub async fn next_block(
    source: &mut dyn FrameSource,
    poll: Duration,
    stall_timeout: Duration,
) -> Result<AudioBlock> {
    let started = Instant::now();
    loop {
        match source.read_block()? {
            Some(block) if !block.is_empty() => return Ok(block),
            _ => {}
        }

        if started.elapsed() > stall_timeout {
            return Err(Error::StreamInterrupted(format!(
                "no samples for {}ms",
                stall_timeout.as_millis()
            )));
        }

        tokio::time::sleep(poll).await;
    }
}

/// Opens mono input streams on the default input device
pub struct MicrophoneInput {
    sample_rate: u32,
    ring_capacity: usize,
}

impl MicrophoneInput {
    /// Create a microphone input
    ///
    /// `ring_capacity` bounds how many samples may queue between the audio
    /// callback and the session thread before new samples are dropped.
    #[must_use]
    pub const fn new(sample_rate: u32, ring_capacity: usize) -> Self {
        Self {
            sample_rate,
            ring_capacity,
        }
    }
}

impl AudioInput for MicrophoneInput {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(self.sample_rate)
                    && c.max_sample_rate() >= SampleRate(self.sample_rate)
            })
            .ok_or_else(|| {
                Error::Config(format!(
                    "no mono input config at {}Hz on this device",
                    self.sample_rate
                ))
            })?
            .with_sample_rate(SampleRate(self.sample_rate));

        let sample_format = supported_config.sample_format();
        let config = supported_config.config();

        let (mut producer, consumer) = HeapRb::<i16>::new(self.ring_capacity).split();
        let dropped = Arc::new(AtomicUsize::new(0));
        let faulted = Arc::new(AtomicBool::new(false));

        let err_flag = Arc::clone(&faulted);
        let err_fn = move |err: cpal::StreamError| {
            err_flag.store(true, Ordering::Relaxed);
            tracing::error!(error = %err, "audio capture error");
        };

        let dropped_cb = Arc::clone(&dropped);
        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let written = producer.push_slice(data);
                    if written < data.len() {
                        dropped_cb.fetch_add(data.len() - written, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    write_f32(data, &mut producer, &dropped_cb);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(Error::Config(format!("unsupported sample format {other:?}")));
            }
        }
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            format = ?sample_format,
            "audio capture started"
        );

        Ok(Box::new(MicrophoneStream {
            _stream: stream,
            consumer,
            spec: StreamSpec::mono(self.sample_rate),
            dropped,
            reported_dropped: 0,
            faulted,
        }))
    }
}

/// Live capture stream; the device is released on drop
struct MicrophoneStream {
    _stream: Stream,
    consumer: HeapCons<i16>,
    spec: StreamSpec,
    dropped: Arc<AtomicUsize>,
    reported_dropped: usize,
    faulted: Arc<AtomicBool>,
}

impl FrameSource for MicrophoneStream {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read_block(&mut self) -> Result<Option<AudioBlock>> {
        if self.faulted.load(Ordering::Relaxed) {
            return Err(Error::StreamInterrupted(
                "device reported a stream error".to_string(),
            ));
        }

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.reported_dropped {
            tracing::warn!(
                dropped = dropped - self.reported_dropped,
                "capture ring full, samples dropped"
            );
            self.reported_dropped = dropped;
        }

        let available = self.consumer.occupied_len();
        if available == 0 {
            return Ok(None);
        }

        let mut samples = vec![0i16; available];
        let read = self.consumer.pop_slice(&mut samples);
        samples.truncate(read);

        Ok(Some(AudioBlock::new(samples, self.spec)))
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        tracing::debug!("audio capture stopped");
    }
}

/// Convert float samples to i16 and queue them
fn write_f32(input: &[f32], producer: &mut HeapProd<i16>, dropped: &AtomicUsize) {
    let mut lost = 0;
    for &sample in input {
        if producer.try_push(f32_to_i16(sample)).is_err() {
            lost += 1;
        }
    }
    if lost > 0 {
        dropped.fetch_add(lost, Ordering::Relaxed);
    }
}

/// Convert f32 [-1.0, 1.0] to i16
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Names of the input devices on the default host
///
/// # Errors
///
/// Returns error if the host cannot enumerate devices
pub fn input_device_names() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}
