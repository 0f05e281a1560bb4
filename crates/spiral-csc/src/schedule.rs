// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

/// Step-size policy for the projected gradient loop.
///
/// Every schedule is a function of `gamma_0` and the iteration index only and
/// never increases from one iteration to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepSchedule {
    /// `gamma_0` at every iteration.
    Constant,
    /// `gamma_0 / sqrt(t + 1)`.
    #[default]
    InverseSqrt,
    /// `gamma_0 / (t + 1)`.
    InverseTime,
}

impl StepSchedule {
    /// Step size used at 0-based iteration `iteration`.
    pub fn step_size(self, gamma_0: f64, iteration: usize) -> f64 {
        let t = iteration as f64 + 1.0;
        match self {
            StepSchedule::Constant => gamma_0,
            StepSchedule::InverseSqrt => gamma_0 / t.sqrt(),
            StepSchedule::InverseTime => gamma_0 / t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedules_start_at_gamma_0_and_never_increase() {
        for schedule in [
            StepSchedule::Constant,
            StepSchedule::InverseSqrt,
            StepSchedule::InverseTime,
        ] {
            assert_eq!(schedule.step_size(0.02, 0), 0.02);
            let mut previous = f64::INFINITY;
            for t in 0..500 {
                let step = schedule.step_size(0.02, t);
                assert!(step <= previous, "{schedule:?} increased at {t}");
                assert!(step >= 0.0);
                previous = step;
            }
        }
    }

    #[test]
    fn inverse_sqrt_is_the_default() {
        assert_eq!(StepSchedule::default(), StepSchedule::InverseSqrt);
        assert_eq!(StepSchedule::InverseSqrt.step_size(1.0, 3), 0.5);
    }
}
