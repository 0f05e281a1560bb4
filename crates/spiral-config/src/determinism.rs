// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use rand::{rngs::StdRng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Seeding policy for learner initialisation.
///
/// Every learning run draws its initial features and positions from a
/// generator that it owns. When determinism is enabled the generator seed is
/// derived from `base_seed` and a component label, otherwise it comes from
/// host entropy unless the caller pins an explicit seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterminismConfig {
    /// Whether deterministic seeding is enabled process-wide.
    pub enabled: bool,
    /// Base seed mixed into every derived seed.
    pub base_seed: u64,
}

impl Default for DeterminismConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_seed: 42,
        }
    }
}

impl DeterminismConfig {
    /// Builds a configuration snapshot from `SPIRAL_DETERMINISTIC` and
    /// `SPIRAL_DETERMINISTIC_SEED`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let enabled = std::env::var("SPIRAL_DETERMINISTIC")
            .ok()
            .map(|v| !matches!(v.trim(), "" | "0" | "false" | "False" | "off" | "OFF"))
            .unwrap_or(defaults.enabled);

        let base_seed = std::env::var("SPIRAL_DETERMINISTIC_SEED")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(defaults.base_seed);

        Self { enabled, base_seed }
    }

    /// Derives a deterministic seed for a component label.
    pub fn seed_for<L: Hash>(&self, label: L) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.base_seed.hash(&mut hasher);
        label.hash(&mut hasher);
        hasher.finish()
    }

    /// Derives the seed of run `run` within a sweep sharing `label`.
    pub fn seed_for_run<L: Hash>(&self, label: L, run: u64) -> u64 {
        split_seed(self.seed_for(label), run)
    }
}

static CONFIG: OnceLock<DeterminismConfig> = OnceLock::new();

/// Returns the process configuration, reading the environment on first use.
pub fn config() -> &'static DeterminismConfig {
    CONFIG.get_or_init(DeterminismConfig::from_env)
}

/// Installs `cfg` unless a configuration was already resolved. Returns the
/// configuration that is actually in effect.
pub fn configure(cfg: DeterminismConfig) -> &'static DeterminismConfig {
    CONFIG.get_or_init(|| cfg)
}

/// SplitMix64 finaliser over `seed + run`; distinct runs land far apart in
/// seed space even for neighbouring indices.
fn split_seed(seed: u64, run: u64) -> u64 {
    let mut z = seed.wrapping_add(run.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Returns a generator derived from `label`, or seeded from host entropy
/// when determinism is disabled.
pub fn rng_from_label(label: &str) -> StdRng {
    let cfg = config();
    if cfg.enabled {
        StdRng::seed_from_u64(cfg.seed_for(label))
    } else {
        StdRng::from_entropy()
    }
}

/// Returns a generator for an optional explicit seed, falling back to
/// [`rng_from_label`].
pub fn rng_from_optional(seed: Option<u64>, label: &str) -> StdRng {
    match seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => rng_from_label(label),
    }
}

/// Returns the generator for run `run` of a sweep. Runs never share a
/// generator, so concurrent sweeps stay independent and reproducible.
pub fn rng_for_run(seed: Option<u64>, label: &str, run: u64) -> StdRng {
    match seed {
        Some(value) => StdRng::seed_from_u64(split_seed(value, run)),
        None => {
            let cfg = config();
            if cfg.enabled {
                StdRng::seed_from_u64(cfg.seed_for_run(label, run))
            } else {
                StdRng::from_entropy()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
    use std::sync::Mutex;

    fn with_env(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let _lock = GUARD
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let previous = std::env::var(key).ok();
                match value {
                    Some(val) => std::env::set_var(key, val),
                    None => std::env::remove_var(key),
                }
                ((*key).to_string(), previous)
            })
            .collect();

        let result = catch_unwind(AssertUnwindSafe(test));

        for (key, value) in snapshot {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }

        if let Err(err) = result {
            resume_unwind(err);
        }
    }

    #[test]
    fn defaults_disable_determinism() {
        with_env(
            &[
                ("SPIRAL_DETERMINISTIC", None),
                ("SPIRAL_DETERMINISTIC_SEED", None),
            ],
            || {
                let cfg = DeterminismConfig::from_env();
                assert_eq!(cfg, DeterminismConfig::default());
            },
        );
    }

    #[test]
    fn environment_overrides_seed() {
        with_env(
            &[
                ("SPIRAL_DETERMINISTIC", Some("1")),
                ("SPIRAL_DETERMINISTIC_SEED", Some("1337")),
            ],
            || {
                let cfg = DeterminismConfig::from_env();
                assert!(cfg.enabled);
                assert_eq!(cfg.base_seed, 1337);
            },
        );
    }

    #[test]
    fn textual_false_values_disable_flag() {
        with_env(&[("SPIRAL_DETERMINISTIC", Some("off"))], || {
            assert!(!DeterminismConfig::from_env().enabled);
        });
    }

    #[test]
    fn run_seeds_are_stable_and_distinct() {
        let cfg = DeterminismConfig {
            enabled: true,
            base_seed: 99,
        };
        assert_eq!(cfg.seed_for_run("sweep", 3), cfg.seed_for_run("sweep", 3));
        assert_ne!(cfg.seed_for_run("sweep", 3), cfg.seed_for_run("sweep", 4));
        assert_ne!(cfg.seed_for("alpha"), cfg.seed_for("beta"));
    }

    #[test]
    fn explicit_seed_reproduces_stream() {
        let mut first = rng_from_optional(Some(7), "learner");
        let mut second = rng_from_optional(Some(7), "other-label");
        let a: [u64; 4] = first.gen();
        let b: [u64; 4] = second.gen();
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_seed_runs_do_not_share_streams() {
        let mut run0 = rng_for_run(Some(7), "sweep", 0);
        let mut run1 = rng_for_run(Some(7), "sweep", 1);
        let a: u64 = run0.gen();
        let b: u64 = run1.gen();
        assert_ne!(a, b);
    }
}
