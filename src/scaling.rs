//! Non-dimensional reference quantities
//!
//! The aerodynamic model is written in terms of a reference `length`, `speed` and `density`, the
//! derived references are
//!  - time: $`t = L/U`$
//!  - force: $`F = \rho U^2 L^2`$
//!  - circulation: $`\Gamma = U L`$

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingFactors {
    pub length: f64,
    pub speed: f64,
    pub density: f64,
    pub time: f64,
    pub force: f64,
    pub circulation: f64,
}
impl ScalingFactors {
    pub fn new(length: f64, speed: f64, density: f64) -> Self {
        Self {
            length,
            speed,
            density,
            time: length / speed,
            force: density * speed * speed * length * length,
            circulation: speed * length,
        }
    }
    /// Dimensional model: all factors are 1
    pub fn unit() -> Self {
        Self::new(1f64, 1f64, 1f64)
    }
    /// Returns the factors for a new reference speed
    pub fn with_speed(&self, speed: f64) -> Self {
        Self::new(self.length, speed, self.density)
    }
    /// Returns `true` if the references are strictly positive and finite
    pub fn is_valid(&self) -> bool {
        [self.length, self.speed, self.density]
            .iter()
            .all(|x| x.is_finite() && *x > 0f64)
    }
}
impl Default for ScalingFactors {
    fn default() -> Self {
        Self::unit()
    }
}
