/// Immutable block of interleaved samples returned by bulk reads.
///
/// Samples are normalized to `[-1.0, 1.0]`. For multi-channel audio the
/// samples are interleaved (`[L0, R0, L1, R1, ...]` for stereo). The length
/// invariant `samples.len() == channel_count * frame_count` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    samples: Vec<f64>,
    sample_rate: u32,
    channel_count: u32,
    start_frame: u64,
    frame_count: u64,
}

impl AudioData {
    /// Builds an audio block, asserting the interleaving invariant.
    ///
    /// # Panics
    ///
    /// Panics if `sample_rate` or `channel_count` is zero, or if the sample
    /// buffer length does not equal `channel_count * frame_count`.
    pub fn new(
        samples: Vec<f64>,
        sample_rate: u32,
        channel_count: u32,
        start_frame: u64,
        frame_count: u64,
    ) -> Self {
        assert!(sample_rate > 0, "sample rate must be positive");
        assert!(channel_count > 0, "channel count must be positive");
        assert_eq!(
            samples.len() as u64,
            u64::from(channel_count) * frame_count,
            "sample buffer length does not match channel_count * frame_count",
        );
        Self {
            samples,
            sample_rate,
            channel_count,
            start_frame,
            frame_count,
        }
    }

    /// An empty block positioned at `start_frame`, used for reads past EOF.
    pub fn empty(sample_rate: u32, channel_count: u32, start_frame: u64) -> Self {
        Self::new(Vec::new(), sample_rate, channel_count, start_frame, 0)
    }

    /// Interleaved normalized samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels.
    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    /// Absolute position of the first frame within the source file.
    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Number of frames actually read; may be less than requested at EOF.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Duration of this block in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / f64::from(self.sample_rate)
    }

    /// Start offset of this block in seconds from the beginning of the file.
    pub fn start_time_seconds(&self) -> f64 {
        self.start_frame as f64 / f64::from(self.sample_rate)
    }

    /// End offset of this block in seconds from the beginning of the file.
    pub fn end_time_seconds(&self) -> f64 {
        self.start_time_seconds() + self.duration_seconds()
    }
}
