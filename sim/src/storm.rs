//! Synthetic storm cells and their evolution.
//!
//! Each storm is a Gaussian reflectivity core with a position (metres, y then
//! x), a velocity (m/s) and a [`MotionSpec`] describing how the velocity and
//! intensity change over time.

use serde::{Deserialize, Serialize};

/// How a storm evolves between time steps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Constant velocity and intensity.
    ConstantVelocity,
    /// Velocity rotates at `omega` rad/s.
    ConstantTurn { omega: f64 },
    /// Peak reflectivity changes at `rate` dBZ/s and the radius at
    /// `radius_rate` m/s (negative values decay).
    Evolving { rate: f64, radius_rate: f64 },
}

/// A synthetic storm cell with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Storm {
    /// Ground-truth id
    pub id: u64,
    /// Centre [y, x] in metres
    pub position: [f64; 2],
    /// [vy, vx] in m/s
    pub velocity: [f64; 2],
    /// Peak reflectivity (dBZ)
    pub peak: f64,
    /// e-folding radius of the core (m)
    pub radius: f64,
    pub motion: MotionSpec,
    pub appear_at: Option<f64>,
    pub disappear_at: Option<f64>,
}

impl Storm {
    /// Propagate the storm by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        match self.motion {
            MotionSpec::ConstantVelocity => {}
            MotionSpec::ConstantTurn { omega } => {
                let speed = (self.velocity[0].powi(2) + self.velocity[1].powi(2)).sqrt();
                let heading = self.velocity[0].atan2(self.velocity[1]) + omega * dt;
                self.velocity = [speed * heading.sin(), speed * heading.cos()];
            }
            MotionSpec::Evolving { rate, radius_rate } => {
                self.peak += rate * dt;
                self.radius = (self.radius + radius_rate * dt).max(0.0);
            }
        }
        self.position[0] += self.velocity[0] * dt;
        self.position[1] += self.velocity[1] * dt;
    }

    /// True if the storm exists at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if self.appear_at.is_some_and(|appear| t < appear) {
            return false;
        }
        if self.disappear_at.is_some_and(|disappear| t >= disappear) {
            return false;
        }
        self.radius > 0.0
    }

    /// Reflectivity (dBZ) contributed at point `(y, x)` (metres).
    pub fn reflectivity_at(&self, y: f64, x: f64) -> f64 {
        let d2 = (y - self.position[0]).powi(2) + (x - self.position[1]).powi(2);
        self.peak * (-d2 / (self.radius * self.radius)).exp()
    }
}
