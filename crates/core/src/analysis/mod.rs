use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::Result;

/// Transform length; half of it is the number of reported bins.
pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Byte magnitudes for one animation frame, lowest frequency first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrequencySnapshot {
    bins: Vec<u8>,
}

impl FrequencySnapshot {
    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.bins.get(index).copied()
    }
}

/// Turns a stream of mono samples into byte frequency snapshots the way a
/// browser analyser node does: Blackman window, magnitude smoothing over time,
/// decibel conversion and a linear map of `[-100 dB, -30 dB]` onto `0..=255`.
pub struct FrequencyAnalyser {
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    history: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    smoothed: Vec<f32>,
    snapshot: FrequencySnapshot,
}

impl FrequencyAnalyser {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(FFT_SIZE);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Self {
            plan,
            window: (0..FFT_SIZE).map(|i| blackman_value(i, FFT_SIZE)).collect(),
            history: vec![0.0; FFT_SIZE],
            input,
            spectrum,
            scratch,
            smoothed: vec![0.0; BIN_COUNT],
            snapshot: FrequencySnapshot::from_bins(vec![0; BIN_COUNT]),
        }
    }

    /// Appends captured samples, keeping only the newest `FFT_SIZE`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if samples.len() >= FFT_SIZE {
            self.history
                .copy_from_slice(&samples[samples.len() - FFT_SIZE..]);
            return;
        }
        self.history.drain(..samples.len());
        self.history.extend_from_slice(samples);
    }

    /// Analyses the current window and returns the resulting snapshot.
    pub fn snapshot(&mut self) -> Result<&FrequencySnapshot> {
        for ((slot, sample), weight) in self
            .input
            .iter_mut()
            .zip(&self.history)
            .zip(&self.window)
        {
            *slot = sample * weight;
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let norm = 1.0 / FFT_SIZE as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        let bins = self
            .smoothed
            .iter_mut()
            .zip(&self.spectrum)
            .map(|(previous, bin)| {
                let magnitude = bin.norm() * norm;
                *previous = SMOOTHING_TIME_CONSTANT * *previous
                    + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
                to_byte(*previous, range)
            })
            .collect();

        self.snapshot = FrequencySnapshot::from_bins(bins);
        Ok(&self.snapshot)
    }
}

impl Default for FrequencyAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrequencyAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyAnalyser")
            .field("fft_size", &FFT_SIZE)
            .field("snapshot", &self.snapshot.len())
            .finish()
    }
}

fn to_byte(magnitude: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let decibels = 20.0 * magnitude.log10();
    let scaled = (255.0 / range) * (decibels - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let x = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
}
