//! Real spherical harmonics in ACN channel order with SN3D normalisation.
//!
//! Directions use the installation convention: azimuth 0 is straight ahead
//! and grows clockwise, elevation 0 is ear level and grows upwards, both in
//! degrees. Internally the azimuth is mirrored into the counter-clockwise
//! mathematical convention, so the first order channels are proportional
//! to `(y, z, x)` with `x` pointing forward, `y` left and `z` up.

/// Ambisonic truncation order.
pub type Order = usize;

/// Highest order we evaluate. 64 channels is already far beyond what a
/// handheld client can convolve in real time.
pub const MAX_ORDER: Order = 7;

/// Number of ambisonic channels carried at `order`.
pub fn channel_count(order: Order) -> usize {
    (order + 1) * (order + 1)
}

/// Degree `l` and index `m` of an ACN channel, where `acn = l*l + l + m`.
pub fn degree_and_index(acn: usize) -> (usize, i64) {
    let mut l = 0;
    while (l + 1) * (l + 1) <= acn {
        l += 1;
    }
    (l, acn as i64 - (l * l + l) as i64)
}

/// Unit vector, in `(x, y, z)` coordinates, pointing at a direction given
/// in the installation convention.
pub fn direction_vector(azimuth: f64, elevation: f64) -> [f64; 3] {
    let phi = -azimuth.to_radians();
    let theta = elevation.to_radians();
    [
        theta.cos() * phi.cos(),
        theta.cos() * phi.sin(),
        theta.sin(),
    ]
}

/// Evaluate every harmonic up to `order` at a direction given in the
/// installation convention. `out` must hold `channel_count(order)` values.
pub fn evaluate(order: Order, azimuth: f64, elevation: f64, out: &mut [f64]) {
    let theta = elevation.to_radians();
    evaluate_polar(order, -azimuth.to_radians(), theta.sin(), theta.cos(), out);
}

/// Evaluate every harmonic up to `order` in the direction of `v`, which
/// does not need to be normalised but must not be the zero vector.
pub fn evaluate_vector(order: Order, v: [f64; 3], out: &mut [f64]) {
    let [x, y, z] = v;
    let norm = (x * x + y * y + z * z).sqrt();
    let horizontal = (x * x + y * y).sqrt();
    evaluate_polar(order, y.atan2(x), z / norm, horizontal / norm, out);
}

fn evaluate_polar(order: Order, phi: f64, sin_elev: f64, cos_elev: f64, out: &mut [f64]) {
    assert!(order <= MAX_ORDER, "ambisonic order {} above {}", order, MAX_ORDER);
    debug_assert!(out.len() >= channel_count(order));

    let legendre = associated_legendre(order, sin_elev, cos_elev);

    for l in 0..=order {
        for m in -(l as i64)..=(l as i64) {
            let abs_m = m.unsigned_abs() as usize;
            let trig = if m >= 0 {
                (m as f64 * phi).cos()
            } else {
                (abs_m as f64 * phi).sin()
            };
            let acn = (l * l + l) as i64 + m;
            out[acn as usize] = sn3d(l, abs_m) * legendre[l][abs_m] * trig;
        }
    }
}

/// `P_l^m(z)` without the Condon-Shortley phase, for `0 <= m <= l <= order`.
/// `s` is `sqrt(1 - z^2)`, passed in so it keeps its sign-free precision.
fn associated_legendre(order: Order, z: f64, s: f64) -> [[f64; MAX_ORDER + 1]; MAX_ORDER + 1] {
    let mut p = [[0.0; MAX_ORDER + 1]; MAX_ORDER + 1];
    p[0][0] = 1.0;
    for m in 1..=order {
        p[m][m] = p[m - 1][m - 1] * (2 * m - 1) as f64 * s;
    }
    for m in 0..order {
        p[m + 1][m] = z * (2 * m + 1) as f64 * p[m][m];
    }
    for m in 0..=order {
        for l in (m + 2)..=order {
            p[l][m] = ((2 * l - 1) as f64 * z * p[l - 1][m] - (l + m - 1) as f64 * p[l - 2][m])
                / (l - m) as f64;
        }
    }
    p
}

/// Schmidt semi-normalisation factor `sqrt((2 - δm0) (l-m)! / (l+m)!)`.
fn sn3d(l: usize, m: usize) -> f64 {
    let ratio: f64 = ((l - m + 1)..=(l + m)).map(|k| 1.0 / k as f64).product();
    let delta = if m == 0 { 1.0 } else { 2.0 };
    (delta * ratio).sqrt()
}
