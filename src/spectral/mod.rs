//! Spectral analysis: orthonormal DCT and the short-time Fourier spectrogram.

mod fft;
mod spectrogram;

pub use fft::{dct_ortho, idct_ortho};
pub use spectrogram::{spectrogram, Detrend, Spectrogram, SpectrogramConfig, Window, DB_FLOOR};
