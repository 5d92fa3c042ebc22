//! Aligner configuration: scoring parameters and run-level settings, loaded
//! from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::genomics::chain::ChainingParams;
use crate::genomics::classify::ClassificationParams;
use crate::genomics::extend::ExtendParams;
use crate::genomics::pairing::PairingParams;
use crate::genomics::seed::SeedingParams;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Scoring parameters, serializable so a user can override defaults via a
/// JSON config file (`-A`/`-B`/`-O`/`-E` in bwa-mem terms).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParameters {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_open_del: i32,
    pub gap_extend_del: i32,
    pub gap_open_ins: i32,
    pub gap_extend_ins: i32,
    pub z_dropoff: i32,
    pub clip5: i32,
    pub clip3: i32,
    /// Penalty applied to one mate's pair score when its placement is
    /// discordant with the other's (wrong orientation or out of the
    /// estimated insert-size window).
    pub unpaired_penalty: i32,
    /// Maximum number of the better-placed mate's candidate anchors tried
    /// when rescuing an unmapped or poorly placed mate.
    pub max_mate_rescue: usize,
}

impl Default for ScoringParameters {
    fn default() -> Self {
        let extend = ExtendParams::default();
        Self {
            match_score: extend.match_score,
            mismatch_penalty: extend.mismatch_penalty,
            gap_open_del: extend.gap_open_del,
            gap_extend_del: extend.gap_extend_del,
            gap_open_ins: extend.gap_open_ins,
            gap_extend_ins: extend.gap_extend_ins,
            z_dropoff: extend.z_dropoff,
            clip5: extend.clip5,
            clip3: extend.clip3,
            unpaired_penalty: 17,
            max_mate_rescue: 3,
        }
    }
}

impl ScoringParameters {
    /// Convert into the runtime parameters the extension kernel consumes.
    pub fn to_extend_params(self) -> ExtendParams {
        ExtendParams {
            match_score: self.match_score,
            mismatch_penalty: self.mismatch_penalty,
            gap_open_del: self.gap_open_del,
            gap_extend_del: self.gap_extend_del,
            gap_open_ins: self.gap_open_ins,
            gap_extend_ins: self.gap_extend_ins,
            z_dropoff: self.z_dropoff,
            clip5: self.clip5,
            clip3: self.clip3,
        }
    }
}

/// Top-level aligner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    pub scoring: ScoringParameters,
    pub seeding: SeedingParamsConfig,
    pub chaining: ChainingParamsConfig,
    pub classification: ClassificationParamsConfig,
    pub pairing: PairingParamsConfig,
    /// Number of reads processed per worker-pool batch.
    pub batch_size: usize,
    /// Read-group ID emitted as the `RG` tag on every record, if set.
    pub read_group: Option<String>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringParameters::default(),
            seeding: SeedingParamsConfig::default(),
            chaining: ChainingParamsConfig::default(),
            classification: ClassificationParamsConfig::default(),
            pairing: PairingParamsConfig::default(),
            batch_size: 512,
            read_group: None,
        }
    }
}

impl AlignerConfig {
    /// Load configuration from a JSON file, falling back to field defaults
    /// for any key the file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Serializable mirror of [`SeedingParams`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedingParamsConfig {
    pub min_seed_len: usize,
    pub max_occ: usize,
    pub reseed_factor: f64,
}

impl Default for SeedingParamsConfig {
    fn default() -> Self {
        let p = SeedingParams::default();
        Self {
            min_seed_len: p.min_seed_len,
            max_occ: p.max_occ,
            reseed_factor: p.reseed_factor,
        }
    }
}

impl SeedingParamsConfig {
    pub fn to_params(self) -> SeedingParams {
        SeedingParams {
            min_seed_len: self.min_seed_len,
            max_occ: self.max_occ,
            reseed_factor: self.reseed_factor,
        }
    }
}

/// Serializable mirror of [`ChainingParams`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainingParamsConfig {
    pub max_chain_gap: i64,
    pub bandwidth: i64,
    pub min_chain_weight: usize,
    pub chain_drop_ratio: f64,
}

impl Default for ChainingParamsConfig {
    fn default() -> Self {
        let p = ChainingParams::default();
        Self {
            max_chain_gap: p.max_chain_gap,
            bandwidth: p.bandwidth,
            min_chain_weight: p.min_chain_weight,
            chain_drop_ratio: p.chain_drop_ratio,
        }
    }
}

impl ChainingParamsConfig {
    pub fn to_params(self) -> ChainingParams {
        ChainingParams {
            max_chain_gap: self.max_chain_gap,
            bandwidth: self.bandwidth,
            min_chain_weight: self.min_chain_weight,
            chain_drop_ratio: self.chain_drop_ratio,
        }
    }
}

/// Serializable mirror of [`ClassificationParams`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationParamsConfig {
    pub mask_level: f64,
    pub xa_max: usize,
}

impl Default for ClassificationParamsConfig {
    fn default() -> Self {
        let p = ClassificationParams::default();
        Self {
            mask_level: p.mask_level,
            xa_max: p.xa_max,
        }
    }
}

impl ClassificationParamsConfig {
    pub fn to_params(self) -> ClassificationParams {
        ClassificationParams {
            mask_level: self.mask_level,
            xa_max: self.xa_max,
        }
    }
}

/// Serializable mirror of [`PairingParams`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingParamsConfig {
    pub min_pairs_for_estimate: usize,
    pub std_devs: f64,
    pub rescue_window_fallback: usize,
}

impl Default for PairingParamsConfig {
    fn default() -> Self {
        let p = PairingParams::default();
        Self {
            min_pairs_for_estimate: p.min_pairs_for_estimate,
            std_devs: p.std_devs,
            rescue_window_fallback: p.rescue_window_fallback,
        }
    }
}

impl PairingParamsConfig {
    /// Build the runtime [`PairingParams`], pulling `unpaired_penalty` and
    /// `max_mate_rescue` from `scoring` since both are scored-alignment
    /// concerns configured alongside the rest of `ScoringParameters`.
    pub fn to_params(self, scoring: &ScoringParameters) -> PairingParams {
        PairingParams {
            min_pairs_for_estimate: self.min_pairs_for_estimate,
            std_devs: self.std_devs,
            rescue_window_fallback: self.rescue_window_fallback,
            unpaired_penalty: scoring.unpaired_penalty,
            max_mate_rescue: scoring.max_mate_rescue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = AlignerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AlignerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.batch_size, config.batch_size);
        assert_eq!(parsed.scoring.match_score, config.scoring.match_score);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let parsed: AlignerConfig = serde_json::from_str(r#"{"batch_size": 128}"#).unwrap();
        assert_eq!(parsed.batch_size, 128);
        assert_eq!(parsed.scoring.match_score, ScoringParameters::default().match_score);
    }

    #[test]
    fn missing_file_produces_read_error() {
        let err = AlignerConfig::load("/nonexistent/path/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
