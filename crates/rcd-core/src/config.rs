//! Configuration for structure learning runs.
//!
//! Load order: `.rcd/config.toml` → environment variables → defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Top-level RCD configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcdConfig {
    pub learning: LearningConfig,
}

/// Where the reasoning-by-overlap rule is interleaved with the other
/// orientation rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RboOrder {
    /// Collider detection, then RBO, then the sepset-free rules.
    #[default]
    Normal,
    /// RBO before collider detection.
    First,
    /// RBO after a first pass of the sepset-free rules.
    Last,
}

impl FromStr for RboOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(RboOrder::Normal),
            "first" => Ok(RboOrder::First),
            "last" => Ok(RboOrder::Last),
            other => Err(format!(
                "rbo order must be one of 'normal', 'first', or 'last': found {other:?}"
            )),
        }
    }
}

impl fmt::Display for RboOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RboOrder::Normal => "normal",
            RboOrder::First => "first",
            RboOrder::Last => "last",
        })
    }
}

/// Skeleton and orientation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Maximum relational path length (in hops) of candidate dependencies.
    pub hop_threshold: usize,
    /// Largest conditioning set size tried. Unset means the largest abstract
    /// ground graph size minus two.
    pub depth: Option<usize>,
    /// Hop threshold given to a d-separation oracle. Unset means twice
    /// `hop_threshold`, the radius Phase II reasons at.
    pub oracle_hop_threshold: Option<usize>,
    pub rbo_order: RboOrder,
    /// Defer abstract ground graph edge removal to the end of each
    /// conditioning set size, so the skeleton does not depend on test order.
    pub order_independent_skeleton: bool,
    /// Also remove dependencies that co-tag an edge with a pruned dependency
    /// during skeleton discovery, closing over every ground graph.
    pub transitive_skeleton_removal: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            hop_threshold: 1,
            depth: None,
            oracle_hop_threshold: None,
            rbo_order: RboOrder::Normal,
            order_independent_skeleton: false,
            transitive_skeleton_removal: false,
        }
    }
}

impl LearningConfig {
    pub fn oracle_hop_threshold(&self) -> usize {
        self.oracle_hop_threshold.unwrap_or(2 * self.hop_threshold)
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

fn env_override_opt<T: FromStr>(var: &str, target: &mut Option<T>) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = Some(n);
    }
}

impl RcdConfig {
    /// Load config from `.rcd/config.toml` under `root`, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(".rcd").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        env_override("RCD_HOP_THRESHOLD", &mut config.learning.hop_threshold);
        env_override_opt("RCD_DEPTH", &mut config.learning.depth);
        env_override_opt(
            "RCD_ORACLE_HOP_THRESHOLD",
            &mut config.learning.oracle_hop_threshold,
        );
        env_override("RCD_RBO_ORDER", &mut config.learning.rbo_order);
        env_override(
            "RCD_ORDER_INDEPENDENT_SKELETON",
            &mut config.learning.order_independent_skeleton,
        );
        env_override(
            "RCD_TRANSITIVE_SKELETON_REMOVAL",
            &mut config.learning.transitive_skeleton_removal,
        );

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let learning = &self.learning;
        if let Some(oracle_hop) = learning.oracle_hop_threshold
            && oracle_hop < 2 * learning.hop_threshold
        {
            anyhow::bail!(
                "oracle_hop_threshold ({}) must be at least twice hop_threshold ({})",
                oracle_hop,
                learning.hop_threshold,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RcdConfig::default();
        assert_eq!(config.learning.hop_threshold, 1);
        assert_eq!(config.learning.depth, None);
        assert_eq!(config.learning.oracle_hop_threshold(), 2);
        assert_eq!(config.learning.rbo_order, RboOrder::Normal);
        assert!(!config.learning.order_independent_skeleton);
        assert!(!config.learning.transitive_skeleton_removal);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[learning]
hop_threshold = 2
depth = 3
rbo_order = "last"
"#;
        let config = RcdConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.learning.hop_threshold, 2);
        assert_eq!(config.learning.depth, Some(3));
        assert_eq!(config.learning.rbo_order, RboOrder::Last);
        // Defaults for unspecified fields
        assert_eq!(config.learning.oracle_hop_threshold(), 4);
        assert!(!config.learning.order_independent_skeleton);
    }

    #[test]
    fn test_negative_hop_rejected() {
        assert!(RcdConfig::from_toml_str("[learning]\nhop_threshold = -1\n").is_err());
        assert!(RcdConfig::from_toml_str("[learning]\nrbo_order = \"sideways\"\n").is_err());
    }

    #[test]
    fn test_oracle_hop_must_cover_phase_two() {
        let err = RcdConfig::from_toml_str("[learning]\nhop_threshold = 2\noracle_hop_threshold = 3\n")
            .unwrap_err();
        assert!(err.to_string().contains("oracle_hop_threshold"));
    }

    #[test]
    fn test_rbo_order_parse() {
        assert_eq!("FIRST".parse::<RboOrder>().unwrap(), RboOrder::First);
        assert!("middle".parse::<RboOrder>().is_err());
        assert_eq!(RboOrder::Last.to_string(), "last");
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = RcdConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.learning.rbo_order, RboOrder::Normal);
    }

    #[test]
    fn test_transitive_skeleton_removal_env_override() {
        let tmp = tempfile::tempdir().unwrap();
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("RCD_TRANSITIVE_SKELETON_REMOVAL", "true") };
        let config = RcdConfig::load(tmp.path());
        unsafe { std::env::remove_var("RCD_TRANSITIVE_SKELETON_REMOVAL") };
        assert!(config.unwrap().learning.transitive_skeleton_removal);
    }

    #[test]
    fn test_load_reads_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let rcd_dir = tmp.path().join(".rcd");
        std::fs::create_dir_all(&rcd_dir).unwrap();
        std::fs::write(
            rcd_dir.join("config.toml"),
            r#"
[learning]
order_independent_skeleton = true
oracle_hop_threshold = 6
"#,
        )
        .unwrap();

        let config = RcdConfig::load(tmp.path()).unwrap();
        assert!(config.learning.order_independent_skeleton);
        assert_eq!(config.learning.oracle_hop_threshold(), 6);
    }
}
