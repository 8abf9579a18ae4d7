//! Short-time Fourier spectrogram with density scaling.

use crate::core::TimeSeries;
use crate::error::{AnalysisError, Result};
use rustfft::{num_complex::Complex64, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Offset added to power before taking the logarithm.
pub const DB_FLOOR: f64 = 1e-10;

/// Segment taper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Window {
    /// Tapered cosine with the given taper fraction in `[0, 1]`.
    Tukey(f64),
    Hann,
    Rectangular,
}

impl Default for Window {
    fn default() -> Self {
        Window::Tukey(0.25)
    }
}

impl Window {
    /// Periodic (DFT-even) window coefficients of length `len`.
    pub fn coefficients(&self, len: usize) -> Vec<f64> {
        match *self {
            Window::Rectangular => vec![1.0; len],
            Window::Hann => (0..len)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
                .collect(),
            Window::Tukey(alpha) => {
                let mut w = tukey_symmetric(len + 1, alpha.clamp(0.0, 1.0));
                w.truncate(len);
                w
            }
        }
    }
}

fn tukey_symmetric(m: usize, alpha: f64) -> Vec<f64> {
    if alpha <= 0.0 || m < 2 {
        return vec![1.0; m];
    }
    let last = (m - 1) as f64;
    let width = (alpha * last / 2.0).floor();
    (0..m)
        .map(|i| {
            let n = i as f64;
            if n <= width {
                0.5 * (1.0 + (PI * (-1.0 + 2.0 * n / alpha / last)).cos())
            } else if n < last - width {
                1.0
            } else {
                0.5 * (1.0 + (PI * (-2.0 / alpha + 1.0 + 2.0 * n / alpha / last)).cos())
            }
        })
        .collect()
}

/// Per-segment detrending applied before the taper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Detrend {
    None,
    /// Subtract the segment mean.
    #[default]
    Constant,
}

/// Spectrogram parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// Samples per segment.
    pub window_length: usize,
    /// Samples shared by consecutive segments; must be below `window_length`.
    pub overlap: usize,
    pub window: Window,
    pub detrend: Detrend,
    /// Samples per unit of time.
    pub sampling_rate: f64,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_length: 256,
            overlap: 128,
            window: Window::default(),
            detrend: Detrend::default(),
            sampling_rate: 1.0,
        }
    }
}

impl SpectrogramConfig {
    pub fn new(window_length: usize, overlap: usize) -> Self {
        Self {
            window_length,
            overlap,
            ..Default::default()
        }
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    pub fn with_detrend(mut self, detrend: Detrend) -> Self {
        self.detrend = detrend;
        self
    }

    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Samples between consecutive segment starts.
    pub fn step(&self) -> usize {
        self.window_length - self.overlap
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_length < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "window length must be at least 2, got {}",
                self.window_length
            )));
        }
        if self.overlap >= self.window_length {
            return Err(AnalysisError::InvalidParameter(format!(
                "overlap {} must be smaller than the window length {}",
                self.overlap, self.window_length
            )));
        }
        if !(self.sampling_rate > 0.0) || !self.sampling_rate.is_finite() {
            return Err(AnalysisError::InvalidParameter(
                "sampling rate must be positive".to_string(),
            ));
        }
        if let Window::Tukey(alpha) = self.window {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(AnalysisError::InvalidParameter(format!(
                    "tukey taper fraction must lie in [0, 1], got {alpha}"
                )));
            }
        }
        Ok(())
    }
}

/// Power spectral density per segment.
///
/// `power[f][t]` is the one-sided density at `frequencies[f]` for the
/// segment centred at `segment_times[t]`. All entries are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    pub frequencies: Vec<f64>,
    pub segment_times: Vec<f64>,
    pub power: Vec<Vec<f64>>,
}

impl Spectrogram {
    /// `(rows, columns)` of the power matrix.
    pub fn shape(&self) -> (usize, usize) {
        (self.frequencies.len(), self.segment_times.len())
    }

    /// `10 · log10(power + 1e-10)`.
    pub fn to_decibels(&self) -> Vec<Vec<f64>> {
        self.power
            .iter()
            .map(|row| row.iter().map(|p| 10.0 * (p + DB_FLOOR).log10()).collect())
            .collect()
    }

    /// Frequency with the highest power in each segment, ignoring the DC bin.
    pub fn dominant_frequencies(&self) -> Vec<f64> {
        (0..self.segment_times.len())
            .map(|t| {
                let mut best = (0usize, f64::NEG_INFINITY);
                for (f, row) in self.power.iter().enumerate().skip(1) {
                    if row[t] > best.1 {
                        best = (f, row[t]);
                    }
                }
                self.frequencies.get(best.0).copied().unwrap_or(0.0)
            })
            .collect()
    }
}

/// Compute the spectrogram of a series.
///
/// Missing values are replaced by zero. Segments of `window_length` samples
/// advance by `window_length − overlap`; a trailing partial segment is
/// dropped. Fails with [`AnalysisError::InsufficientData`] if the series is
/// shorter than one window.
pub fn spectrogram(series: &TimeSeries, config: &SpectrogramConfig) -> Result<Spectrogram> {
    config.validate()?;
    let signal: Vec<f64> = series
        .values()
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0.0 })
        .collect();

    let n = signal.len();
    let nperseg = config.window_length;
    if n < nperseg {
        return Err(AnalysisError::InsufficientData {
            needed: nperseg,
            got: n,
        });
    }

    let step = config.step();
    let segments = (n - config.overlap) / step;
    let bins = nperseg / 2 + 1;
    let fs = config.sampling_rate;

    let taper = config.window.coefficients(nperseg);
    let scale = 1.0 / (fs * taper.iter().map(|w| w * w).sum::<f64>());

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);
    let mut buffer = vec![Complex64::new(0.0, 0.0); nperseg];
    let mut power = vec![vec![0.0; segments]; bins];

    for t in 0..segments {
        let segment = &signal[t * step..t * step + nperseg];
        let offset = match config.detrend {
            Detrend::Constant => segment.iter().sum::<f64>() / nperseg as f64,
            Detrend::None => 0.0,
        };
        for ((slot, x), w) in buffer.iter_mut().zip(segment).zip(&taper) {
            *slot = Complex64::new((x - offset) * w, 0.0);
        }
        fft.process(&mut buffer);

        for (f, row) in power.iter_mut().enumerate() {
            let mut p = buffer[f].norm_sqr() * scale;
            let nyquist = nperseg % 2 == 0 && f == nperseg / 2;
            if f != 0 && !nyquist {
                p *= 2.0;
            }
            row[t] = p;
        }
    }

    let frequencies = (0..bins).map(|k| k as f64 * fs / nperseg as f64).collect();
    let segment_times = (0..segments)
        .map(|t| (nperseg as f64 / 2.0 + (t * step) as f64) / fs)
        .collect();

    debug!(n, segments, bins, "spectrogram computed");
    Ok(Spectrogram {
        frequencies,
        segment_times,
        power,
    })
}
