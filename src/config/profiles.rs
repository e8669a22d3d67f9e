// src/config/profiles.rs
//
// Engine configuration with presets for the two fingerprinting setups.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::dsp::{DctVariant, HaarVariant, ThresholdPolicy, WindowType};
use crate::core::fingerprint::StridePolicy;
use crate::error::{FindSimilarError, Result};

/// How a spectrogram is reduced to a feature matrix for the SCMS model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureReduction {
    /// Mel filterbank, log, DCT (MFCC-like)
    #[default]
    MelDct,
    /// Log-frequency bands compressed with a Haar wavelet per frame
    Wavelet,
}

/// Gaussian model fitted to a track's features
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Packed symmetric covariance, audio zero-padded before analysis
    #[default]
    Scms,
    /// Full covariance with the classic symmetric KL sum, no padding
    MandelEllis,
}

impl AnalysisMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace(['-', '_'], "").as_str() {
            "scms" => Some(Self::Scms),
            "mandelellis" | "me" => Some(Self::MandelEllis),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Scms => "scms",
            Self::MandelEllis => "mandel-ellis",
        }
    }
}

/// Settings for the statistical (SCMS) retrieval path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmsConfig {
    #[serde(default)]
    pub method: AnalysisMethod,
    pub sample_rate: u32,
    pub window_size: usize,
    pub hop_size: usize,
    pub window: WindowType,
    pub mel_filters: usize,
    /// Feature dimension of the model
    pub coefficients: usize,
    pub seconds_to_analyze: u32,
    pub min_frequency: u32,
    pub reduction: FeatureReduction,
    pub dct: DctVariant,
    /// Number of log bands in wavelet mode (power of two)
    pub wavelet_bands: usize,
    pub wavelet_threshold: Option<ThresholdPolicy>,
    /// Pre-emphasis coefficient, e.g. 0.95; `None` disables the filter
    pub pre_emphasis: Option<f32>,
    /// Short audio is zero-padded to `window_size * pad_windows` samples
    pub pad_windows: usize,
}

impl Default for ScmsConfig {
    fn default() -> Self {
        Self {
            method: AnalysisMethod::Scms,
            sample_rate: 22050,
            window_size: 1024,
            hop_size: 1024,
            window: WindowType::Hann,
            mel_filters: 36,
            coefficients: 20,
            seconds_to_analyze: 120,
            min_frequency: 20,
            reduction: FeatureReduction::MelDct,
            dct: DctVariant::Matrix,
            wavelet_bands: 32,
            wavelet_threshold: None,
            pre_emphasis: None,
            pad_windows: 8,
        }
    }
}

/// Settings for spectral-image fingerprints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    pub sample_rate: u32,
    /// FFT size of the log spectrogram
    pub wdft_size: usize,
    /// Hop between spectrogram frames, in samples
    pub overlap: usize,
    /// Frames per spectral image
    pub fingerprint_length: usize,
    pub log_bins: usize,
    pub min_frequency: u32,
    pub max_frequency: u32,
    pub log_base: f64,
    pub use_dynamic_log_base: bool,
    pub top_wavelets: usize,
    pub normalize_signal: bool,
    pub window: WindowType,
    pub haar: HaarVariant,
    pub stride: StridePolicy,
    /// `None` fingerprints the whole track
    pub seconds_to_analyze: Option<u32>,
}

impl FingerprintConfig {
    /// Bits per fingerprint: two per image coefficient
    pub fn fingerprint_bits(&self) -> usize {
        2 * self.fingerprint_length * self.log_bins
    }

    pub fn samples_per_fingerprint(&self) -> usize {
        self.fingerprint_length * self.overlap
    }
}

/// MinHash/LSH table layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LshConfig {
    pub hash_tables: usize,
    pub keys_per_table: usize,
    /// Positions visited by each permutation; min-hash values stay below 256
    pub permutation_length: usize,
    pub seed: u64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            hash_tables: 25,
            keys_per_table: 4,
            permutation_length: 255,
            seed: 0x00f1_d5e1,
        }
    }
}

/// Query-time knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Minimum distinct tables a candidate must hit; 0 and 1 both disable filtering
    pub threshold_tables: usize,
    pub top_k: usize,
    /// Keep SCMS candidates whose duration is within this fraction of the seed's
    pub duration_filter: Option<f64>,
    /// Stride for query fingerprints; `None` reuses the indexing stride
    pub query_stride: Option<StridePolicy>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            threshold_tables: 1,
            top_k: 25,
            duration_filter: None,
            query_stride: Some(StridePolicy::IncrementalRandom {
                min: 1,
                max: 4096,
                seed: 0x5eed,
            }),
        }
    }
}

/// Preset configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigPreset {
    /// 44.1 kHz, natural-log bands over 20 Hz - 22.05 kHz
    Default,
    /// 32 kHz, octave-based bands over 40 Hz - 16 kHz
    FullFrequency,
}

impl ConfigPreset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace(['-', '_'], "").as_str() {
            "default" | "standard" => Some(Self::Default),
            "fullfrequency" | "full" => Some(Self::FullFrequency),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::FullFrequency => "full-frequency",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Default, Self::FullFrequency]
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub preset: ConfigPreset,
    pub scms: ScmsConfig,
    pub fingerprint: FingerprintConfig,
    pub lsh: LshConfig,
    pub query: QueryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_preset(ConfigPreset::FullFrequency)
    }
}

impl EngineConfig {
    pub fn from_preset(preset: ConfigPreset) -> Self {
        let fingerprint = match preset {
            ConfigPreset::Default => FingerprintConfig {
                sample_rate: 44100,
                wdft_size: 2048,
                overlap: 1024,
                fingerprint_length: 128,
                log_bins: 32,
                min_frequency: 20,
                max_frequency: 22050,
                log_base: std::f64::consts::E,
                use_dynamic_log_base: false,
                top_wavelets: 200,
                normalize_signal: true,
                window: WindowType::Hann,
                haar: HaarVariant::Interleaved,
                // 40924 / 44100 = 0.928 s between image starts
                stride: StridePolicy::IncrementalStatic { increment: 40924, first: 0 },
                seconds_to_analyze: None,
            },
            ConfigPreset::FullFrequency => FingerprintConfig {
                sample_rate: 32000,
                wdft_size: 4096,
                overlap: 256,
                fingerprint_length: 128,
                log_bins: 32,
                min_frequency: 40,
                max_frequency: 16000,
                log_base: 2.0,
                use_dynamic_log_base: false,
                top_wavelets: 200,
                normalize_signal: true,
                window: WindowType::Hann,
                haar: HaarVariant::Interleaved,
                // 29695 / 32000 = 0.928 s between image starts
                stride: StridePolicy::IncrementalStatic { increment: 29695, first: 0 },
                seconds_to_analyze: None,
            },
        };

        Self {
            preset,
            scms: ScmsConfig::default(),
            fingerprint,
            lsh: LshConfig::default(),
            query: QueryConfig::default(),
        }
    }

    /// Read a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FindSimilarError::InvalidConfig(msg));
        let s = &self.scms;
        if s.sample_rate == 0 || s.window_size < 2 || s.hop_size == 0 {
            return invalid("scms sample rate, window and hop must be positive".into());
        }
        if s.mel_filters < 2 || s.coefficients == 0 || s.coefficients + 1 > s.mel_filters {
            return invalid(format!(
                "need 0 < coefficients < mel filters, got {} and {}",
                s.coefficients, s.mel_filters
            ));
        }
        if s.min_frequency == 0 || s.min_frequency >= s.sample_rate / 2 {
            return invalid(format!("scms min frequency {} out of range", s.min_frequency));
        }
        if s.reduction == FeatureReduction::Wavelet
            && (!s.wavelet_bands.is_power_of_two() || s.coefficients > s.wavelet_bands)
        {
            return invalid(format!(
                "wavelet bands must be a power of two holding {} coefficients, got {}",
                s.coefficients, s.wavelet_bands
            ));
        }

        let f = &self.fingerprint;
        if f.sample_rate == 0 || f.wdft_size < 2 || f.overlap == 0 {
            return invalid("fingerprint sample rate, wdft size and overlap must be positive".into());
        }
        if !f.fingerprint_length.is_power_of_two() || !f.log_bins.is_power_of_two() {
            return invalid(format!(
                "fingerprint images must have power-of-two sides, got {}x{}",
                f.fingerprint_length, f.log_bins
            ));
        }
        if f.min_frequency == 0 || f.min_frequency >= f.max_frequency || f.max_frequency > f.sample_rate / 2 {
            return invalid(format!(
                "fingerprint band {}-{} Hz invalid for {} Hz",
                f.min_frequency, f.max_frequency, f.sample_rate
            ));
        }
        if f.log_base <= 1.0 {
            return invalid(format!("log base must exceed 1, got {}", f.log_base));
        }
        if f.top_wavelets == 0 || f.top_wavelets > f.fingerprint_length * f.log_bins {
            return invalid(format!("top wavelets {} out of range", f.top_wavelets));
        }
        f.stride.validate()?;
        if let Some(stride) = &self.query.query_stride {
            stride.validate()?;
        }

        let l = &self.lsh;
        if l.hash_tables == 0 || l.keys_per_table == 0 || l.keys_per_table > 8 {
            return invalid(format!(
                "need at least one table and 1-8 keys per table, got {} x {}",
                l.hash_tables, l.keys_per_table
            ));
        }
        if l.permutation_length == 0 || l.permutation_length > 255 || l.permutation_length > f.fingerprint_bits() {
            return invalid(format!("permutation length {} out of range", l.permutation_length));
        }

        if let Some(band) = self.query.duration_filter {
            if !(0.0..1.0).contains(&band) {
                return invalid(format!("duration filter must be within [0, 1), got {}", band));
            }
        }
        Ok(())
    }
}

/// Builder for custom configurations
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn from_preset(preset: ConfigPreset) -> Self {
        Self {
            config: EngineConfig::from_preset(preset),
        }
    }

    pub fn analysis_method(mut self, method: AnalysisMethod) -> Self {
        self.config.scms.method = method;
        self
    }

    pub fn reduction(mut self, reduction: FeatureReduction) -> Self {
        self.config.scms.reduction = reduction;
        self
    }

    pub fn dct(mut self, variant: DctVariant) -> Self {
        self.config.scms.dct = variant;
        self
    }

    pub fn seconds_to_analyze(mut self, seconds: u32) -> Self {
        self.config.scms.seconds_to_analyze = seconds;
        self
    }

    pub fn pre_emphasis(mut self, alpha: f32) -> Self {
        self.config.scms.pre_emphasis = Some(alpha);
        self
    }

    pub fn stride(mut self, stride: StridePolicy) -> Self {
        self.config.fingerprint.stride = stride;
        self
    }

    pub fn query_stride(mut self, stride: Option<StridePolicy>) -> Self {
        self.config.query.query_stride = stride;
        self
    }

    pub fn top_wavelets(mut self, top: usize) -> Self {
        self.config.fingerprint.top_wavelets = top;
        self
    }

    pub fn hash_tables(mut self, tables: usize, keys_per_table: usize) -> Self {
        self.config.lsh.hash_tables = tables;
        self.config.lsh.keys_per_table = keys_per_table;
        self
    }

    pub fn threshold_tables(mut self, threshold: usize) -> Self {
        self.config.query.threshold_tables = threshold;
        self
    }

    pub fn duration_filter(mut self, band: Option<f64>) -> Self {
        self.config.query.duration_filter = band;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.query.top_k = k;
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in ConfigPreset::all() {
            let config = EngineConfig::from_preset(preset);
            config.validate().unwrap();
            assert_eq!(config.fingerprint.fingerprint_bits(), 8192);
        }
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(ConfigPreset::from_name("full-frequency"), Some(ConfigPreset::FullFrequency));
        assert_eq!(ConfigPreset::from_name("DEFAULT"), Some(ConfigPreset::Default));
        assert_eq!(ConfigPreset::from_name("loud"), None);
        assert_eq!(AnalysisMethod::from_name("Mandel_Ellis"), Some(AnalysisMethod::MandelEllis));
        assert_eq!(AnalysisMethod::from_name("scms"), Some(AnalysisMethod::Scms));
    }

    #[test]
    fn test_method_defaults_when_missing_from_json() {
        let config = EngineConfig::default();
        let mut value = serde_json::to_value(&config).unwrap();
        value["scms"].as_object_mut().unwrap().remove("method");
        let parsed: EngineConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.scms.method, AnalysisMethod::Scms);

        let mandel = ConfigBuilder::new().analysis_method(AnalysisMethod::MandelEllis).build().unwrap();
        let text = serde_json::to_string(&mandel).unwrap();
        assert!(text.contains("\"method\":\"mandel_ellis\""));
    }

    #[test]
    fn test_full_frequency_values() {
        let config = EngineConfig::from_preset(ConfigPreset::FullFrequency);
        assert_eq!(config.fingerprint.samples_per_fingerprint(), 128 * 256);
        assert_eq!(config.lsh.hash_tables, 25);
        assert_eq!(config.lsh.keys_per_table, 4);
        assert_eq!(config.scms.coefficients, 20);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(ConfigBuilder::new().hash_tables(25, 9).build().is_err());
        assert!(ConfigBuilder::new().top_wavelets(0).build().is_err());
        assert!(ConfigBuilder::new().duration_filter(Some(1.5)).build().is_err());
        assert!(ConfigBuilder::new().threshold_tables(3).build().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ConfigBuilder::from_preset(ConfigPreset::FullFrequency)
            .reduction(FeatureReduction::Wavelet)
            .build()
            .unwrap();
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }
}
