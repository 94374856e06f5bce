//! Least-squares polynomial fits of `y` on `x` via the normal equations.
//!
//! Inputs are centered on their mean x before solving so that pixel
//! coordinates in the thousands do not swamp the quadratic terms.

/// Fitted coefficients (highest power first) and the RMS vertical residual.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyFit {
    pub coefficients: Vec<f64>,
    pub rms: f64,
}

/// `y = m*x + b`. `None` when the points are vertical or too few.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<PolyFit> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let sum_y = ys.iter().sum::<f64>();
    let sum_u2 = xs.iter().map(|&x| (x - mean_x) * (x - mean_x)).sum::<f64>();
    let sum_uy = xs
        .iter()
        .zip(ys.iter())
        .map(|(&x, &y)| (x - mean_x) * y)
        .sum::<f64>();

    // all x (nearly) equal: a vertical boundary has no y(x) form
    if sum_u2 / n < 1e-9 {
        return None;
    }

    let m = sum_uy / sum_u2;
    let b = sum_y / n - m * mean_x;
    finish(vec![m, b], xs, ys)
}

/// `y = a*x² + b*x + c`. `None` when fewer than three distinct x values exist
/// or the system is singular.
pub fn fit_quadratic(xs: &[f64], ys: &[f64]) -> Option<PolyFit> {
    if xs.len() < 3 || xs.len() != ys.len() || distinct_count(xs) < 3 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;

    let mut u_sum = 0.0;
    let mut u2_sum = 0.0;
    let mut u3_sum = 0.0;
    let mut u4_sum = 0.0;
    let mut y_sum = 0.0;
    let mut uy_sum = 0.0;
    let mut u2y_sum = 0.0;

    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let u = x - mean_x;
        let u2 = u * u;
        u_sum += u;
        u2_sum += u2;
        u3_sum += u2 * u;
        u4_sum += u2 * u2;
        y_sum += y;
        uy_sum += u * y;
        u2y_sum += u2 * y;
    }

    // normal equations
    let (a11, a12, a13) = (u4_sum, u3_sum, u2_sum);
    let (a21, a22, a23) = (u3_sum, u2_sum, u_sum);
    let (a31, a32, a33) = (u2_sum, u_sum, n);
    let (b1, b2, b3) = (u2y_sum, uy_sum, y_sum);

    let det3 = |a11: f64, a12: f64, a13: f64, a21: f64, a22: f64, a23: f64, a31: f64, a32: f64, a33: f64| {
        a11 * (a22 * a33 - a23 * a32) - a12 * (a21 * a33 - a23 * a31) + a13 * (a21 * a32 - a22 * a31)
    };

    let det = det3(a11, a12, a13, a21, a22, a23, a31, a32, a33);
    if !det.is_finite() || det.abs() < f64::EPSILON * (a11 * a22 * a33).abs() {
        return None;
    }

    // Cramer's rule in the centered variable
    let qa = det3(b1, a12, a13, b2, a22, a23, b3, a32, a33) / det;
    let qb = det3(a11, b1, a13, a21, b2, a23, a31, b3, a33) / det;
    let qc = det3(a11, a12, b1, a21, a22, b2, a31, a32, b3) / det;

    // back to raw x
    let a = qa;
    let b = qb - 2.0 * qa * mean_x;
    let c = qa * mean_x * mean_x - qb * mean_x + qc;
    finish(vec![a, b, c], xs, ys)
}

pub fn evaluate(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
}

fn finish(coefficients: Vec<f64>, xs: &[f64], ys: &[f64]) -> Option<PolyFit> {
    if !coefficients.iter().all(|c| c.is_finite()) {
        return None;
    }
    let sq = xs
        .iter()
        .zip(ys.iter())
        .map(|(&x, &y)| {
            let r = evaluate(&coefficients, x) - y;
            r * r
        })
        .sum::<f64>();
    let rms = (sq / xs.len() as f64).sqrt();
    rms.is_finite().then_some(PolyFit { coefficients, rms })
}

fn distinct_count(xs: &[f64]) -> usize {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    sorted.len()
}
