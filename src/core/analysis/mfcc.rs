// src/core/analysis/mfcc.rs
//
// Mel filterbank and cepstral reduction of magnitude spectrograms

use log::debug;

use crate::core::dsp::{DctTransform, DctVariant, Matrix, Spectrogram};
use crate::error::{FindSimilarError, Result};

/// Mel scale used for filter placement
fn hz_to_mel(freq: f64) -> f64 {
    1127.01048 * (1.0 + freq / 700.0).ln()
}

/// Triangular filters spaced evenly on the mel scale.
///
/// Filter `j` rises from `freqs[j]` to its peak at `freqs[j + 1]` and falls
/// back to zero at `freqs[j + 2]`; each triangle has area one.
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    weights: Matrix,
    /// Non-zero column range of every filter row
    ranges: Vec<(usize, usize)>,
}

impl MelFilterBank {
    pub fn new(fft_size: usize, sample_rate: u32, filters: usize, min_frequency: u32) -> Result<Self> {
        let nyquist = sample_rate / 2;
        if filters == 0 || min_frequency >= nyquist || fft_size < 2 {
            return Err(FindSimilarError::InvalidConfig(format!(
                "cannot place {} mel filters between {} and {} Hz",
                filters, min_frequency, nyquist
            )));
        }

        // Candidate centre frequencies at every integer Hz, snapped to the nearest mel
        let candidates: Vec<(f64, f64)> = (min_frequency..=nyquist)
            .map(|f| (f as f64, hz_to_mel(f as f64)))
            .collect();
        let mel_max = candidates[candidates.len() - 1].1;
        let points = filters + 2;
        let freqs: Vec<f64> = (0..points)
            .map(|p| {
                let target = 1.0 + (mel_max - 1.0) / (points - 1) as f64 * p as f64;
                candidates
                    .iter()
                    .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
                    .map(|c| c.0)
                    .unwrap_or(min_frequency as f64)
            })
            .collect();

        let bins = fft_size / 2 + 1;
        let bin_width = nyquist as f64 / (bins - 1) as f64;
        let mut weights = Matrix::new(filters, bins);
        for j in 0..filters {
            let (lo, peak, hi) = (freqs[j], freqs[j + 1], freqs[j + 2]);
            let height = 2.0 / (hi - lo);
            for k in 0..bins {
                let f = bin_width * k as f64;
                if f > lo && f <= peak {
                    weights[(j, k)] = height * (f - lo) / (peak - lo);
                }
                if f > peak && f < hi {
                    weights[(j, k)] += height * (hi - f) / (hi - peak);
                }
            }
        }

        let ranges = (0..filters)
            .map(|j| {
                let row = weights.row(j);
                let start = row.iter().position(|&w| w != 0.0).unwrap_or(0);
                let end = row.iter().rposition(|&w| w != 0.0).map_or(start, |e| e + 1);
                (start, end)
            })
            .collect();

        Ok(Self { weights, ranges })
    }

    pub fn filters(&self) -> usize {
        self.weights.rows()
    }

    pub fn bins(&self) -> usize {
        self.weights.cols()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    /// Filter energies in decibels (`10 log10`); energies below 1 map to 0
    pub fn apply(&self, spectrogram: &Spectrogram) -> Result<Matrix> {
        let spec = spectrogram.as_matrix();
        if spec.rows() != self.bins() {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.bins(),
                found: spec.rows(),
            });
        }

        let mut mel = Matrix::new(self.filters(), spec.cols());
        for (k, &(start, end)) in self.ranges.iter().enumerate() {
            let weights = self.weights.row(k);
            for frame in 0..spec.cols() {
                let energy: f64 = (start..end).map(|j| weights[j] * spec[(j, frame)]).sum();
                mel[(k, frame)] = if energy < 1.0 { 0.0 } else { 10.0 * energy.log10() };
            }
        }
        Ok(mel)
    }
}

/// Mel filterbank followed by a DCT over the filter axis.
///
/// Coefficient 0 (overall loudness) is dropped; the model keeps
/// coefficients `1..=coefficients`.
pub struct MfccReducer {
    filter_bank: MelFilterBank,
    dct: Box<dyn DctTransform>,
    coefficients: usize,
}

impl MfccReducer {
    pub fn new(
        fft_size: usize,
        sample_rate: u32,
        filters: usize,
        coefficients: usize,
        min_frequency: u32,
        dct: DctVariant,
    ) -> Result<Self> {
        if coefficients == 0 || coefficients + 1 > filters {
            return Err(FindSimilarError::InvalidConfig(format!(
                "{} cepstral coefficients need more than {} mel filters",
                coefficients, filters
            )));
        }
        let filter_bank = MelFilterBank::new(fft_size, sample_rate, filters, min_frequency)?;
        debug!(
            "mfcc: {} filters over {} bins, {} coefficients, {:?} dct",
            filters,
            filter_bank.bins(),
            coefficients,
            dct
        );
        Ok(Self {
            filter_bank,
            dct: dct.build(filters, 1),
            coefficients,
        })
    }

    pub fn filter_bank(&self) -> &MelFilterBank {
        &self.filter_bank
    }

    pub fn coefficients(&self) -> usize {
        self.coefficients
    }

    /// `coefficients x frames` cepstra of a spectrogram
    pub fn apply(&self, spectrogram: &Spectrogram) -> Result<Matrix> {
        let mel = self.filter_bank.apply(spectrogram)?;
        let cepstra = self.dct.forward_columns(&mel)?;
        Ok(cepstra.row_range(1, self.coefficients))
    }
}
