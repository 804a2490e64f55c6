//! Constant-acceleration Kalman filter backing one leg track.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::geometry::Point;

/// Spectral density of the white-acceleration process noise.
const PROCESS_NOISE_DENSITY: f64 = 1.0;

/// Variance assigned to the unobserved kinematic states at birth.
const INITIAL_KINEMATIC_VARIANCE: f64 = 1.0;

/// Position-only measurements, both axes.
const MEASUREMENT_DIM: usize = 2;

/// Kalman filter over `[px, py, vx, vy, ax, ay]`.
///
/// The transition advances position, velocity and acceleration by one
/// scan period; the measurement model observes position only.
#[derive(Debug, Clone)]
pub struct LegFilter {
    state: DVector<f64>,
    covariance: DMatrix<f64>,
    transition: DMatrix<f64>,
    process_noise: DMatrix<f64>,
    measurement: DMatrix<f64>,
    measurement_noise: DMatrix<f64>,
    dim: usize,
    variance_observation: f64,
}

impl LegFilter {
    /// Creates a filter at a measured position with unknown kinematics.
    pub fn new(initial: Point, dt: f64, dim: usize, variance_observation: f64) -> Self {
        let mut state = DVector::zeros(dim);
        state[0] = initial.x;
        state[1] = initial.y;

        Self {
            state,
            covariance: Self::birth_covariance(dim, variance_observation),
            transition: Self::transition_matrix(dim, dt),
            process_noise: Self::process_noise_matrix(dim, dt),
            measurement: Self::measurement_matrix(dim),
            measurement_noise: DMatrix::identity(MEASUREMENT_DIM, MEASUREMENT_DIM)
                * variance_observation,
            dim,
            variance_observation,
        }
    }

    /// Advances state and covariance by one scan period.
    pub fn predict(&mut self) {
        self.state = &self.transition * &self.state;
        self.covariance =
            &self.transition * &self.covariance * self.transition.transpose() + &self.process_noise;
    }

    /// Folds a position measurement into the state.
    ///
    /// Returns the length of the position correction, which the track
    /// accumulates as distance travelled.
    pub fn update(&mut self, z: Point) -> f64 {
        let measurement = DVector::from_vec(vec![z.x, z.y]);
        let innovation = measurement - &self.measurement * &self.state;

        let s = &self.measurement * &self.covariance * self.measurement.transpose()
            + &self.measurement_noise;
        let s_inv = match s.try_inverse() {
            Some(inv) => inv,
            None => {
                // Degenerate innovation covariance, recover like a fresh track.
                trace!("innovation covariance singular, resetting");
                self.covariance = Self::birth_covariance(self.dim, self.variance_observation);
                return 0.0;
            }
        };
        let gain = &self.covariance * self.measurement.transpose() * s_inv;

        let correction = &gain * innovation;
        let step = (correction[0] * correction[0] + correction[1] * correction[1]).sqrt();
        self.state += &correction;

        // Joseph form keeps the covariance symmetric positive definite.
        let identity = DMatrix::identity(self.dim, self.dim);
        let ikh = identity - &gain * &self.measurement;
        self.covariance = &ikh * &self.covariance * ikh.transpose()
            + &gain * &self.measurement_noise * gain.transpose();

        step
    }

    /// Restores the birth covariance and zeroes velocity and acceleration.
    ///
    /// Used when a step change in motion is anticipated.
    pub fn reset(&mut self) {
        for k in MEASUREMENT_DIM..self.dim {
            self.state[k] = 0.0;
        }
        self.covariance = Self::birth_covariance(self.dim, self.variance_observation);
    }

    pub fn position(&self) -> Point {
        Point::new(self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> Point {
        Point::new(self.state[2], self.state[3])
    }

    pub fn acceleration(&self) -> Point {
        Point::new(self.state[4], self.state[5])
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }

    /// Scalar surrogate for measurement-to-track gating: the sum of the
    /// two position variances.
    pub fn matching_covariance(&self) -> f64 {
        self.covariance[(0, 0)] + self.covariance[(1, 1)]
    }

    /// Sum of the position variances, used by the lifecycle check.
    pub fn position_covariance_trace(&self) -> f64 {
        self.matching_covariance()
    }

    fn transition_matrix(dim: usize, dt: f64) -> DMatrix<f64> {
        let mut f = DMatrix::identity(dim, dim);
        // position from velocity and acceleration
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;
        f[(0, 4)] = 0.5 * dt * dt;
        f[(1, 5)] = 0.5 * dt * dt;
        // velocity from acceleration
        f[(2, 4)] = dt;
        f[(3, 5)] = dt;
        f
    }

    fn process_noise_matrix(dim: usize, dt: f64) -> DMatrix<f64> {
        // White-acceleration impulse per axis: g = [dt^2/2, dt, 1].
        let g = [0.5 * dt * dt, dt, 1.0];
        let mut q = DMatrix::zeros(dim, dim);
        for axis in 0..2 {
            for i in 0..3 {
                for j in 0..3 {
                    q[(axis + 2 * i, axis + 2 * j)] = PROCESS_NOISE_DENSITY * g[i] * g[j];
                }
            }
        }
        q
    }

    fn measurement_matrix(dim: usize) -> DMatrix<f64> {
        let mut h = DMatrix::zeros(MEASUREMENT_DIM, dim);
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h
    }

    fn birth_covariance(dim: usize, variance_observation: f64) -> DMatrix<f64> {
        let mut p = DMatrix::identity(dim, dim) * INITIAL_KINEMATIC_VARIANCE;
        p[(0, 0)] = variance_observation;
        p[(1, 1)] = variance_observation;
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filter_at(x: f64, y: f64) -> LegFilter {
        LegFilter::new(Point::new(x, y), 0.1, 6, 0.01)
    }

    #[test]
    fn starts_at_the_measured_position() {
        let f = filter_at(0.3, -0.15);
        let p = f.position();
        assert_relative_eq!(p.x, 0.3);
        assert_relative_eq!(p.y, -0.15);
        assert_relative_eq!(f.velocity().x, 0.0);
    }

    #[test]
    fn predict_grows_uncertainty_and_update_shrinks_it() {
        let mut f = filter_at(0.3, 0.0);
        let at_birth = f.matching_covariance();
        f.predict();
        let after_predict = f.matching_covariance();
        assert!(after_predict > at_birth);
        f.update(Point::new(0.3, 0.0));
        assert!(f.matching_covariance() < after_predict);
    }

    #[test]
    fn confirming_the_prediction_leaves_position_unchanged() {
        let mut f = filter_at(0.3, 0.1);
        f.predict();
        let predicted = f.position();
        f.update(predicted);
        let updated = f.position();
        assert_relative_eq!(updated.x, predicted.x, epsilon = 1e-9);
        assert_relative_eq!(updated.y, predicted.y, epsilon = 1e-9);
    }

    #[test]
    fn repeated_identical_measurements_kill_velocity() {
        let mut f = filter_at(0.3, 0.0);
        for _ in 0..50 {
            f.predict();
            f.update(Point::new(0.3, 0.0));
        }
        assert!(f.velocity().norm() < 1e-3);
        // covariance settles at its steady-state minimum
        let settled = f.matching_covariance();
        f.predict();
        f.update(Point::new(0.3, 0.0));
        assert_relative_eq!(f.matching_covariance(), settled, epsilon = 1e-6);
    }

    #[test]
    fn velocity_estimate_follows_a_moving_target() {
        let mut f = filter_at(0.0, 0.0);
        // target moves along x at 0.5 m/s, one scan every 0.1 s
        for k in 1..=30 {
            f.predict();
            f.update(Point::new(0.05 * k as f64, 0.0));
        }
        assert!(f.velocity().x > 0.3, "vx = {}", f.velocity().x);
        assert!(f.velocity().y.abs() < 0.05);
    }

    #[test]
    fn reset_keeps_position_and_clears_kinematics() {
        let mut f = filter_at(0.0, 0.0);
        for k in 1..=20 {
            f.predict();
            f.update(Point::new(0.05 * k as f64, 0.0));
        }
        let before = f.position();
        f.reset();
        assert_relative_eq!(f.position().x, before.x);
        assert_relative_eq!(f.velocity().x, 0.0);
        assert_relative_eq!(f.acceleration().x, 0.0);
        assert_relative_eq!(f.matching_covariance(), 0.02, epsilon = 1e-12);
    }
}
