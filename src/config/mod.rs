//! Configuration module for findsimilar

mod profiles;

pub use profiles::{
    AnalysisMethod, ConfigBuilder, ConfigPreset, EngineConfig, FeatureReduction, FingerprintConfig, LshConfig,
    QueryConfig, ScmsConfig,
};
