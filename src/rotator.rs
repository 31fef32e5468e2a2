//! Rotation of the whole ambisonic scene, used to compensate the listener's
//! head orientation.
//!
//! The rotation runs once on the summed bus, after every source has been
//! encoded, so an orientation update costs the same with one source or
//! fifty.
//!
//! Rotation matrices are obtained by projection: the harmonics of a set of
//! rotated directions are integrated against the unrotated harmonics with
//! a Gauss-Legendre x uniform-azimuth product rule, which is exact for the
//! polynomial degrees involved. Harmonics of different degree never mix,
//! so the matrix is block diagonal and only the blocks are computed.

use crate::bus::AmbisonicBus;
use crate::spherical_harmonics::{self, channel_count, Order, MAX_ORDER};

use std::f64::consts::PI;

/// Applies listener yaw/pitch compensation to an ambisonic bus.
///
/// Angles follow the installation convention. With a yaw of `y`, a source
/// encoded at azimuth `a` is heard at `a - y`; with a pitch of `p`, a source
/// at elevation `e` is heard at `e - p`.
#[derive(Debug, Clone)]
pub struct SceneRotator {
    order: Order,
    yaw: f64,
    pitch: f64,
    dirty: bool,
    matrix: Vec<f32>,
    previous: Vec<f32>,
    quadrature: Quadrature,
    frame: Vec<f32>,
}

impl SceneRotator {
    /// A rotator at yaw 0 and pitch 0.
    pub fn new(order: Order) -> Self {
        let n = channel_count(order);
        let mut identity = vec![0.0; n * n];
        for i in 0..n {
            identity[i * n + i] = 1.0;
        }
        Self {
            order,
            yaw: 0.0,
            pitch: 0.0,
            dirty: false,
            matrix: identity.clone(),
            previous: identity,
            quadrature: Quadrature::new(order),
            frame: vec![0.0; n],
        }
    }

    /// Ambisonic order.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Current yaw in degrees.
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Current pitch in degrees.
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Set the yaw. Takes effect at the next [`SceneRotator::update_rot_mtx`].
    pub fn set_yaw(&mut self, yaw: f64) {
        if yaw != self.yaw {
            self.yaw = yaw;
            self.dirty = true;
        }
    }

    /// Set the pitch. Takes effect at the next [`SceneRotator::update_rot_mtx`].
    pub fn set_pitch(&mut self, pitch: f64) {
        if pitch != self.pitch {
            self.pitch = pitch;
            self.dirty = true;
        }
    }

    /// Recompute the rotation matrix if yaw or pitch changed since the
    /// last call.
    pub fn update_rot_mtx(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let n = channel_count(self.order);
        let rotation = rotation_3x3(self.yaw, self.pitch);
        let mut acc = vec![0.0_f64; n * n];
        let mut rotated = [0.0; (MAX_ORDER + 1) * (MAX_ORDER + 1)];

        for (k, point) in self.quadrature.points.iter().enumerate() {
            spherical_harmonics::evaluate_vector(
                self.order,
                apply_3x3(&rotation, *point),
                &mut rotated,
            );
            let basis = &self.quadrature.basis[k * n..(k + 1) * n];
            let w = self.quadrature.weights[k];
            for l in 0..=self.order {
                let band = l * l..(l + 1) * (l + 1);
                for i in band.clone() {
                    for j in band.clone() {
                        acc[i * n + j] += w * rotated[i] * basis[j];
                    }
                }
            }
        }

        for i in 0..n {
            for j in 0..n {
                self.matrix[i * n + j] = (acc[i * n + j] / self.quadrature.norms[j]) as f32;
            }
        }
    }

    /// Row-major `(order+1)^2` square rotation matrix.
    pub fn matrix(&self) -> &[f32] {
        &self.matrix
    }

    /// Rotate `bus` in place. A matrix change is interpolated linearly over
    /// the block.
    pub fn process(&mut self, bus: &mut AmbisonicBus) {
        debug_assert_eq!(bus.channel_count(), channel_count(self.order));
        let n = channel_count(self.order);
        let frames = bus.block_size();
        let changing = self.previous != self.matrix;

        for s in 0..frames {
            for (acn, value) in self.frame.iter_mut().enumerate() {
                *value = bus.channel(acn)[s];
            }
            let t = (s + 1) as f32 / frames as f32;
            for l in 0..=self.order {
                let band = l * l..(l + 1) * (l + 1);
                for i in band.clone() {
                    let mut out = 0.0;
                    for j in band.clone() {
                        let m = if changing {
                            self.previous[i * n + j]
                                + t * (self.matrix[i * n + j] - self.previous[i * n + j])
                        } else {
                            self.matrix[i * n + j]
                        };
                        out += m * self.frame[j];
                    }
                    bus.channel_mut(i)[s] = out;
                }
            }
        }

        self.previous.copy_from_slice(&self.matrix);
    }
}

/// Cartesian rotation taking a world direction to the listener's frame:
/// undo the yaw around the vertical axis, then the pitch around the
/// lateral axis.
fn rotation_3x3(yaw: f64, pitch: f64) -> [[f64; 3]; 3] {
    // Positive yaw turns right, which is a negative mathematical angle, so
    // undoing it rotates the scene by +yaw.
    let (sy, cy) = yaw.to_radians().sin_cos();
    let (sp, cp) = pitch.to_radians().sin_cos();
    let rz = [[cy, -sy, 0.0], [sy, cy, 0.0], [0.0, 0.0, 1.0]];
    let ry = [[cp, 0.0, sp], [0.0, 1.0, 0.0], [-sp, 0.0, cp]];

    let mut r = [[0.0; 3]; 3];
    for (i, row) in r.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| ry[i][k] * rz[k][j]).sum();
        }
    }
    r
}

fn apply_3x3(r: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
        r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
        r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
    ]
}

/// Product quadrature over the sphere, exact for harmonics of degree up to
/// `2 * order + 1`, with the unrotated harmonics cached at every point.
#[derive(Debug, Clone)]
struct Quadrature {
    points: Vec<[f64; 3]>,
    weights: Vec<f64>,
    basis: Vec<f64>,
    norms: Vec<f64>,
}

impl Quadrature {
    fn new(order: Order) -> Self {
        let n = channel_count(order);
        let azimuths = 2 * order + 2;
        let mut points = Vec::new();
        let mut weights = Vec::new();

        for (z, w) in gauss_legendre(order + 1) {
            let ring = (1.0 - z * z).sqrt();
            for a in 0..azimuths {
                let phi = 2.0 * PI * a as f64 / azimuths as f64;
                points.push([ring * phi.cos(), ring * phi.sin(), z]);
                weights.push(w);
            }
        }

        let mut basis = vec![0.0; points.len() * n];
        let mut norms = vec![0.0; n];
        for (k, point) in points.iter().enumerate() {
            let row = &mut basis[k * n..(k + 1) * n];
            spherical_harmonics::evaluate_vector(order, *point, row);
            for (norm, y) in norms.iter_mut().zip(row.iter()) {
                *norm += weights[k] * y * y;
            }
        }

        Self {
            points,
            weights,
            basis,
            norms,
        }
    }
}

/// Nodes and weights of the `n`-point Gauss-Legendre rule on [-1, 1].
fn gauss_legendre(n: usize) -> Vec<(f64, f64)> {
    (0..n)
        .map(|i| {
            let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            for _ in 0..100 {
                let dx = legendre_value(n, x) / legendre_derivative(n, x);
                x -= dx;
                if dx.abs() < 1e-15 {
                    break;
                }
            }
            let derivative = legendre_derivative(n, x);
            (x, 2.0 / ((1.0 - x * x) * derivative * derivative))
        })
        .collect()
}

/// `(P_n(x), P_{n-1}(x))`.
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let next = ((2 * k - 1) as f64 * x * p - (k - 1) as f64 * p_prev) / k as f64;
        p_prev = p;
        p = next;
    }
    (p, p_prev)
}

fn legendre_value(n: usize, x: f64) -> f64 {
    legendre_pair(n, x).0
}

fn legendre_derivative(n: usize, x: f64) -> f64 {
    let (p, p_prev) = legendre_pair(n, x);
    n as f64 * (x * p - p_prev) / (x * x - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MonoEncoder;
    use approx::assert_abs_diff_eq;

    fn encode(order: Order, azimuth: f64, elevation: f64) -> AmbisonicBus {
        let mut bus = AmbisonicBus::new(order, 8);
        MonoEncoder::new(order, azimuth, elevation).process(&[1.0; 8], &mut bus);
        bus
    }

    fn assert_same_image(a: &AmbisonicBus, b: &AmbisonicBus) {
        for acn in 0..a.channel_count() {
            assert_abs_diff_eq!(a.channel(acn), b.channel(acn), epsilon = 1e-4);
        }
    }

    #[test]
    fn gauss_legendre_integrates_polynomials() {
        let rule = gauss_legendre(4);
        let total: f64 = rule.iter().map(|(_, w)| w).sum();
        assert_abs_diff_eq!(total, 2.0, epsilon = 1e-12);
        // Exact up to degree 7: integral of x^6 over [-1, 1] is 2/7.
        let x6: f64 = rule.iter().map(|(x, w)| w * x.powi(6)).sum();
        assert_abs_diff_eq!(x6, 2.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn starts_as_identity() {
        let mut rotator = SceneRotator::new(2);
        let mut bus = encode(2, 40.0, 20.0);
        let expected = bus.clone();
        rotator.update_rot_mtx();
        rotator.process(&mut bus);
        assert_same_image(&bus, &expected);
    }

    #[test]
    fn zero_rotation_matrix_is_identity() {
        let mut rotator = SceneRotator::new(3);
        rotator.set_yaw(10.0);
        rotator.update_rot_mtx();
        rotator.set_yaw(0.0);
        rotator.update_rot_mtx();
        let n = channel_count(3);
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(rotator.matrix()[i * n + j], expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn yaw_moves_sources_against_the_head() {
        for order in 1..=3 {
            let mut rotator = SceneRotator::new(order);
            rotator.set_yaw(30.0);
            rotator.update_rot_mtx();
            // Settle the interpolation from identity first.
            let mut bus = encode(order, 70.0, 15.0);
            rotator.process(&mut bus);

            let mut bus = encode(order, 70.0, 15.0);
            rotator.process(&mut bus);
            assert_same_image(&bus, &encode(order, 40.0, 15.0));
        }
    }

    #[test]
    fn pitch_lowers_sources() {
        let mut rotator = SceneRotator::new(3);
        rotator.set_pitch(20.0);
        rotator.update_rot_mtx();
        rotator.process(&mut encode(3, 0.0, 0.0));

        let mut bus = encode(3, 0.0, 35.0);
        rotator.process(&mut bus);
        assert_same_image(&bus, &encode(3, 0.0, 15.0));
    }

    #[test]
    fn faced_source_is_heard_straight_ahead() {
        let mut rotator = SceneRotator::new(2);
        rotator.set_yaw(-50.0);
        rotator.set_pitch(-10.0);
        rotator.update_rot_mtx();
        rotator.process(&mut encode(2, 0.0, 0.0));

        let mut bus = encode(2, -50.0, -10.0);
        rotator.process(&mut bus);
        assert_same_image(&bus, &encode(2, 0.0, 0.0));
    }

    #[test]
    fn matrix_matches_rotating_the_direction() {
        let mut rotator = SceneRotator::new(3);
        rotator.set_yaw(75.0);
        rotator.set_pitch(30.0);
        rotator.update_rot_mtx();

        let source = spherical_harmonics::direction_vector(-20.0, 45.0);
        let heard = apply_3x3(&rotation_3x3(75.0, 30.0), source);
        let mut before = [0.0; 16];
        let mut after = [0.0; 16];
        spherical_harmonics::evaluate_vector(3, source, &mut before);
        spherical_harmonics::evaluate_vector(3, heard, &mut after);

        let m = rotator.matrix();
        for i in 0..16 {
            let rotated: f64 = (0..16).map(|j| m[i * 16 + j] as f64 * before[j]).sum();
            assert_abs_diff_eq!(rotated, after[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn unchanged_angles_do_not_mark_dirty() {
        let mut rotator = SceneRotator::new(1);
        rotator.set_yaw(0.0);
        rotator.set_pitch(0.0);
        assert!(!rotator.dirty);
    }
}
