//! Cubic interpolating splines, stored as knots plus second derivatives.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SplineError {
    #[error("need at least {needed} knots, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("knot abscissae must be strictly increasing")]
    NotIncreasing,
    #[error("non-finite knot value")]
    NonFinite,
    #[error("periodic spline needs matching first and last values")]
    NotPeriodic,
    #[error("singular spline system")]
    Singular,
}

const MIN_KNOTS: usize = 4;

#[derive(Clone, Debug)]
pub struct CubicSpline {
    xs: Vec<f32>,
    ys: Vec<f32>,
    second: Vec<f32>,
    periodic: bool,
}

impl CubicSpline {
    /// Natural spline (zero curvature at both ends).
    pub fn natural(xs: &[f32], ys: &[f32]) -> Result<Self, SplineError> {
        validate(xs, ys)?;
        let n = xs.len();
        let h: Vec<f32> = xs.windows(2).map(|w| w[1] - w[0]).collect();

        // Interior rows only; the ends are pinned to zero curvature
        let m = n - 2;
        let mut sub = vec![0.0; m];
        let mut diag = vec![0.0; m];
        let mut sup = vec![0.0; m];
        let mut rhs = vec![0.0; m];
        for i in 1..n - 1 {
            let row = i - 1;
            sub[row] = h[i - 1];
            diag[row] = 2.0 * (h[i - 1] + h[i]);
            sup[row] = h[i];
            rhs[row] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
        }
        let inner = solve_tridiagonal(&sub, &diag, &sup, &rhs)?;

        let mut second = Vec::with_capacity(n);
        second.push(0.0);
        second.extend(inner);
        second.push(0.0);
        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            second,
            periodic: false,
        })
    }

    /// Periodic spline; the first and last knot values must be equal, the
    /// curve then closes with continuous slope and curvature.
    pub fn periodic(xs: &[f32], ys: &[f32]) -> Result<Self, SplineError> {
        validate(xs, ys)?;
        let n = xs.len();
        if (ys[0] - ys[n - 1]).abs() > 1e-4 * ys[0].abs().max(1.0) {
            return Err(SplineError::NotPeriodic);
        }
        let h: Vec<f32> = xs.windows(2).map(|w| w[1] - w[0]).collect();

        // Unknowns M_0..M_{m-1}, with M_m == M_0
        let m = n - 1;
        let mut sub = vec![0.0; m];
        let mut diag = vec![0.0; m];
        let mut sup = vec![0.0; m];
        let mut rhs = vec![0.0; m];
        for i in 0..m {
            let prev = (i + m - 1) % m;
            let y_prev = ys[prev];
            sub[i] = h[prev];
            diag[i] = 2.0 * (h[prev] + h[i]);
            sup[i] = h[i];
            rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - y_prev) / h[prev]);
        }
        let corner = h[m - 1];
        let mut second = solve_cyclic(&sub, &diag, &sup, corner, corner, &rhs)?;
        second.push(second[0]);

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            second,
            periodic: true,
        })
    }

    pub fn eval(&self, x: f32) -> f32 {
        let n = self.xs.len();
        let (x0, xn) = (self.xs[0], self.xs[n - 1]);
        let x = if self.periodic {
            x0 + (x - x0).rem_euclid(xn - x0)
        } else {
            x.clamp(x0, xn)
        };

        let i = self.xs.partition_point(|&k| k <= x).clamp(1, n - 1) - 1;
        let (xa, xb) = (self.xs[i], self.xs[i + 1]);
        let h = xb - xa;
        let (ma, mb) = (self.second[i], self.second[i + 1]);
        let (a, b) = (xb - x, x - xa);
        ma * a * a * a / (6.0 * h)
            + mb * b * b * b / (6.0 * h)
            + (self.ys[i] / h - ma * h / 6.0) * a
            + (self.ys[i + 1] / h - mb * h / 6.0) * b
    }

    /// Evaluate at `count` evenly spaced abscissae spanning the knots.
    pub fn sample(&self, count: usize) -> Vec<(f32, f32)> {
        let n = self.xs.len();
        crate::viz::linspace(self.xs[0], self.xs[n - 1], count)
            .map(|x| (x, self.eval(x)))
            .collect()
    }
}

fn validate(xs: &[f32], ys: &[f32]) -> Result<(), SplineError> {
    let got = xs.len().min(ys.len());
    if got < MIN_KNOTS {
        return Err(SplineError::TooFewPoints { needed: MIN_KNOTS, got });
    }
    if xs.len() != ys.len() {
        return Err(SplineError::TooFewPoints { needed: xs.len(), got });
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(SplineError::NonFinite);
    }
    if xs.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SplineError::NotIncreasing);
    }
    Ok(())
}

/// Thomas algorithm; `sub[0]` and `sup[last]` are ignored.
fn solve_tridiagonal(sub: &[f32], diag: &[f32], sup: &[f32], rhs: &[f32]) -> Result<Vec<f32>, SplineError> {
    let n = diag.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut c = vec![0.0f32; n];
    let mut d = vec![0.0f32; n];
    let mut denom = diag[0];
    if denom.abs() < f32::EPSILON {
        return Err(SplineError::Singular);
    }
    c[0] = sup[0] / denom;
    d[0] = rhs[0] / denom;
    for i in 1..n {
        denom = diag[i] - sub[i] * c[i - 1];
        if denom.abs() < f32::EPSILON {
            return Err(SplineError::Singular);
        }
        c[i] = sup[i] / denom;
        d[i] = (rhs[i] - sub[i] * d[i - 1]) / denom;
    }
    let mut x = d;
    for i in (0..n - 1).rev() {
        x[i] -= c[i] * x[i + 1];
    }
    Ok(x)
}

/// Cyclic tridiagonal solve (Sherman-Morrison). `top_right` is the
/// coefficient of x[n-1] in row 0, `bottom_left` that of x[0] in row n-1.
fn solve_cyclic(
    sub: &[f32],
    diag: &[f32],
    sup: &[f32],
    top_right: f32,
    bottom_left: f32,
    rhs: &[f32],
) -> Result<Vec<f32>, SplineError> {
    let n = diag.len();
    if n < 3 {
        return Err(SplineError::TooFewPoints { needed: MIN_KNOTS, got: n + 1 });
    }
    let gamma = -diag[0];
    let mut modified = diag.to_vec();
    modified[0] = diag[0] - gamma;
    modified[n - 1] = diag[n - 1] - bottom_left * top_right / gamma;

    let x = solve_tridiagonal(sub, &modified, sup, rhs)?;
    let mut u = vec![0.0f32; n];
    u[0] = gamma;
    u[n - 1] = bottom_left;
    let z = solve_tridiagonal(sub, &modified, sup, &u)?;

    let denom = 1.0 + z[0] + top_right * z[n - 1] / gamma;
    if denom.abs() < f32::EPSILON {
        return Err(SplineError::Singular);
    }
    let fact = (x[0] + top_right * x[n - 1] / gamma) / denom;
    Ok(x.iter().zip(&z).map(|(&xi, &zi)| xi - fact * zi).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn natural_spline_passes_through_knots() {
        let xs = [0.0, 1.0, 2.5, 3.0, 5.0];
        let ys = [1.0, -2.0, 0.5, 4.0, 3.0];
        let spline = CubicSpline::natural(&xs, &ys).unwrap();
        for (x, y) in xs.iter().zip(ys) {
            assert!((spline.eval(*x) - y).abs() < 1e-4);
        }
    }

    #[test]
    fn natural_spline_reproduces_lines() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [1.0, 3.0, 5.0, 7.0, 9.0];
        let spline = CubicSpline::natural(&xs, &ys).unwrap();
        assert!((spline.eval(2.5) - 6.0).abs() < 1e-4);
        assert!((spline.eval(0.3) - 1.6).abs() < 1e-4);
    }

    #[test]
    fn periodic_spline_closes_smoothly() {
        let n = 19;
        let xs: Vec<f32> = (0..n).map(|i| TAU * i as f32 / (n - 1) as f32).collect();
        let ys: Vec<f32> = xs.iter().map(|x| 2.0 + x.cos()).collect();
        let spline = CubicSpline::periodic(&xs, &ys).unwrap();
        for x in [0.1, 1.0, 3.0, 5.5, 6.2] {
            assert!((spline.eval(x) - (2.0 + x.cos())).abs() < 5e-3);
        }
        assert!((spline.eval(-0.1) - spline.eval(TAU - 0.1)).abs() < 1e-4);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            CubicSpline::natural(&[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0]).unwrap_err(),
            SplineError::TooFewPoints { needed: 4, got: 3 }
        );
        assert_eq!(
            CubicSpline::natural(&[0.0, 1.0, 1.0, 2.0], &[0.0; 4]).unwrap_err(),
            SplineError::NotIncreasing
        );
        assert_eq!(
            CubicSpline::natural(&[0.0, 1.0, 2.0, 3.0], &[0.0, f32::NAN, 0.0, 0.0]).unwrap_err(),
            SplineError::NonFinite
        );
        assert_eq!(
            CubicSpline::periodic(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 2.0, 3.0]).unwrap_err(),
            SplineError::NotPeriodic
        );
    }

    #[test]
    fn sample_spans_knot_range() {
        let spline = CubicSpline::natural(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 0.0, 1.0]).unwrap();
        let points = spline.sample(300);
        assert_eq!(points.len(), 300);
        assert_eq!(points[0].0, 0.0);
        assert!((points[299].0 - 3.0).abs() < 1e-5);
    }
}
