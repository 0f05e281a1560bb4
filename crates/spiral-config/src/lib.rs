// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Process-level configuration shared by the sparse coding crates: seeded
//! random generators for reproducible runs and the tracing subscriber
//! bootstrap.

pub mod determinism;
pub mod tracing;

pub use self::determinism::{rng_for_run, rng_from_label, rng_from_optional, DeterminismConfig};
pub use self::tracing::{flush_chrome_trace, init_tracing, InitError};
