//! Windowed spectral estimation for EEG band power
//!
//! Each window is mean-removed, tapered with a Hann window and transformed
//! with a real FFT. Power per bin is `|X_k|^2`; bins are assigned to bands by
//! centre frequency, `low <= f < high`, with the highest band's upper edge
//! inclusive.

use crate::config::BandRange;
use mindwave_core::{BandPowerVector, MindwaveError, MindwaveResult};
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

/// Raw per-band energy of one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSpectrum {
    /// Energy per band, ordered as `Band::ALL`
    pub powers: [f32; 5],
    /// Sum of `powers`
    pub total: f32,
    /// Centre frequency of the strongest in-band bin (Hz)
    pub peak_frequency: f32,
}

impl BandSpectrum {
    /// Normalize to percent of in-band energy. `None` when the window
    /// carried no in-band energy. Any positive total counts, whatever the
    /// units of the input.
    pub fn to_percentages(&self) -> Option<BandPowerVector> {
        if !(self.total > 0.0) || !self.total.is_finite() {
            return None;
        }
        let mut percent = [0.0f32; 5];
        for (out, power) in percent.iter_mut().zip(self.powers) {
            *out = (power / self.total * 100.0).clamp(0.0, 100.0);
        }
        Some(BandPowerVector::from_array(percent))
    }
}

/// Reusable FFT plan, taper and buffers for one window length
pub struct SpectralEstimator {
    sample_rate: f32,
    window_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    taper: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Band index for every one-sided bin, `None` outside all bands
    bin_bands: Vec<Option<usize>>,
}

impl SpectralEstimator {
    pub fn new(sample_rate: f32, window_size: usize, bands: &[BandRange]) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        let freq_resolution = sample_rate / window_size as f32;
        let top_band = bands
            .iter()
            .max_by(|a, b| a.high_hz.total_cmp(&b.high_hz))
            .map(|r| r.band);

        let bin_bands = (0..spectrum.len())
            .map(|bin| {
                let freq = bin as f32 * freq_resolution;
                bands
                    .iter()
                    .find(|r| {
                        let upper_ok = if Some(r.band) == top_band {
                            freq <= r.high_hz
                        } else {
                            freq < r.high_hz
                        };
                        freq >= r.low_hz && upper_ok
                    })
                    .map(|r| r.band.index())
            })
            .collect();

        SpectralEstimator {
            sample_rate,
            window_size,
            fft,
            taper: hann_window(window_size),
            input,
            spectrum,
            scratch,
            bin_bands,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Frequency spacing between bins (Hz)
    pub fn resolution(&self) -> f32 {
        self.sample_rate / self.window_size as f32
    }

    /// Band energies of one full window
    pub fn band_spectrum(&mut self, window: &[f32]) -> MindwaveResult<BandSpectrum> {
        if window.len() != self.window_size {
            return Err(MindwaveError::Processing {
                stage: "spectral estimate",
                reason: format!("expected {} samples, got {}", self.window_size, window.len()),
            });
        }

        // Mean removal of a constant can leave a rounding residue that the
        // taper would leak into the lowest band
        if window.windows(2).all(|pair| pair[0] == pair[1]) {
            return Ok(BandSpectrum {
                powers: [0.0; 5],
                total: 0.0,
                peak_frequency: 0.0,
            });
        }

        let mean = window.iter().sum::<f32>() / window.len() as f32;
        for ((slot, &x), &w) in self.input.iter_mut().zip(window).zip(&self.taper) {
            *slot = (x - mean) * w;
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| MindwaveError::Processing {
                stage: "spectral estimate",
                reason: e.to_string(),
            })?;

        let mut powers = [0.0f32; 5];
        let mut peak_bin = 0usize;
        let mut peak_power = 0.0f32;
        for (bin, (value, band)) in self.spectrum.iter().zip(&self.bin_bands).enumerate() {
            if let Some(band) = band {
                let power = value.norm_sqr();
                powers[*band] += power;
                if power > peak_power {
                    peak_power = power;
                    peak_bin = bin;
                }
            }
        }

        Ok(BandSpectrum {
            powers,
            total: powers.iter().sum(),
            peak_frequency: peak_bin as f32 * self.resolution(),
        })
    }

    /// Percent-of-total band power for one full window
    pub fn band_percentages(&mut self, window: &[f32]) -> MindwaveResult<Option<BandPowerVector>> {
        Ok(self.band_spectrum(window)?.to_percentages())
    }
}

/// Periodic Hann taper
fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / len as f32).cos())
        .collect()
}
