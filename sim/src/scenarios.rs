//! Scenario definitions.
//!
//! Each scenario is a named configuration of storms on a cartesian domain.
//! All scenarios are deterministic given the same seed.

use crate::storm::{MotionSpec, Storm};
use grid_models::GridOptions;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// 3 storms on straight tracks, no noise
    Simple,
    /// 2 storms converging into one
    Merger,
    /// A line of 8 cells with an embedded stratiform region
    SquallLine,
    /// 60 randomly placed short-lived storms on a large domain
    Stress,
}

/// A fully configured scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    /// Seconds
    pub duration: f64,
    /// Seconds between frames
    pub frame_interval: f64,
    pub grid: GridOptions,
    pub storms: Vec<Storm>,
    /// Uniform stratiform background (dBZ); `None` leaves the background clear
    pub background: Option<f64>,
    /// Standard deviation (dB) of additive measurement noise
    pub noise_std: f64,
    /// Radius (m) of valid data around the domain centre; cells outside are NaN
    pub coverage_radius: Option<f64>,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Simple => Self::simple(seed),
            ScenarioKind::Merger => Self::merger(seed),
            ScenarioKind::SquallLine => Self::squall_line(seed),
            ScenarioKind::Stress => Self::stress(seed),
        }
    }

    /// Frame times from 0 to `duration` inclusive.
    pub fn frame_times(&self) -> Vec<f64> {
        let n = (self.duration / self.frame_interval).floor() as usize;
        (0..=n).map(|k| k as f64 * self.frame_interval).collect()
    }

    // -----------------------------------------------------------------------
    // Scenario 1: Simple
    // -----------------------------------------------------------------------
    fn simple(seed: u64) -> Self {
        let storms = vec![
            storm(0, [60e3, 40e3], [0.0, 12.0], 52.0, 6e3, MotionSpec::ConstantVelocity),
            storm(1, [160e3, 60e3], [-5.0, 10.0], 48.0, 5e3, MotionSpec::ConstantVelocity),
            storm(
                2,
                [120e3, 180e3],
                [8.0, -6.0],
                55.0,
                7e3,
                MotionSpec::ConstantTurn { omega: 2e-4 },
            ),
        ];
        Scenario {
            name: "simple".into(),
            seed,
            duration: 3.0 * 3600.0,
            frame_interval: 600.0,
            grid: GridOptions::cartesian((100, 100), (0.0, 0.0), [2500.0, 2500.0]),
            storms,
            background: None,
            noise_std: 0.0,
            coverage_radius: None,
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 2: Merger
    // -----------------------------------------------------------------------
    fn merger(seed: u64) -> Self {
        let storms = vec![
            storm(0, [100e3, 50e3], [0.0, 10.0], 50.0, 6e3, MotionSpec::ConstantVelocity),
            storm(1, [150e3, 60e3], [-8.0, 8.0], 50.0, 6e3, MotionSpec::ConstantVelocity),
        ];
        Scenario {
            name: "merger".into(),
            seed,
            duration: 2.0 * 3600.0,
            frame_interval: 600.0,
            grid: GridOptions::cartesian((100, 100), (0.0, 0.0), [2500.0, 2500.0]),
            storms,
            background: None,
            noise_std: 0.5,
            coverage_radius: None,
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 3: Squall line
    // -----------------------------------------------------------------------
    fn squall_line(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));
        let storms = (0..8)
            .map(|i| {
                let y = 40e3 + i as f64 * 22e3 + rng.gen_range(-3e3..3e3);
                let peak = 46.0 + rng.gen::<f64>() * 10.0;
                let motion = MotionSpec::Evolving {
                    rate: rng.gen_range(-5e-4..5e-4),
                    radius_rate: 0.0,
                };
                storm(i, [y, 40e3], [2.0, 15.0], peak, 5e3, motion)
            })
            .collect();
        Scenario {
            name: "squall_line".into(),
            seed,
            duration: 3.0 * 3600.0,
            frame_interval: 600.0,
            grid: GridOptions::cartesian((100, 120), (0.0, 0.0), [2500.0, 2500.0]),
            storms,
            background: Some(22.0),
            noise_std: 1.0,
            coverage_radius: Some(140e3),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 4: Stress
    // -----------------------------------------------------------------------
    fn stress(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(4));
        let extent = 500e3;
        let duration = 4.0 * 3600.0;
        let storms = (0..60)
            .map(|i| {
                let heading = rng.gen::<f64>() * std::f64::consts::TAU;
                let speed = 5.0 + rng.gen::<f64>() * 15.0;
                let appear = rng.gen::<f64>() * duration * 0.5;
                let mut s = storm(
                    i,
                    [rng.gen::<f64>() * extent, rng.gen::<f64>() * extent],
                    [speed * heading.sin(), speed * heading.cos()],
                    44.0 + rng.gen::<f64>() * 14.0,
                    3e3 + rng.gen::<f64>() * 6e3,
                    MotionSpec::ConstantVelocity,
                );
                s.appear_at = Some(appear);
                s.disappear_at = Some(appear + 3600.0 + rng.gen::<f64>() * 3600.0);
                s
            })
            .collect();
        Scenario {
            name: "stress".into(),
            seed,
            duration,
            frame_interval: 600.0,
            grid: GridOptions::cartesian((200, 200), (0.0, 0.0), [2500.0, 2500.0]),
            storms,
            background: None,
            noise_std: 1.0,
            coverage_radius: None,
        }
    }
}

fn storm(id: u64, position: [f64; 2], velocity: [f64; 2], peak: f64, radius: f64, motion: MotionSpec) -> Storm {
    Storm {
        id,
        position,
        velocity,
        peak,
        radius,
        motion,
        appear_at: None,
        disappear_at: None,
    }
}
