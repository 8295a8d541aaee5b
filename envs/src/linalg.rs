//! 3x3 symmetric matrix functions (exponential and logarithm) through a
//! Jacobi eigendecomposition.

pub type Matrix3 = [[f64; 3]; 3];

const MAX_SWEEPS: usize = 64;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-30;

pub const IDENTITY: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Eigenvalues and eigenvectors (as columns) of a symmetric matrix.
pub fn symmetric_eigen(m: &Matrix3) -> ([f64; 3], Matrix3) {
    let mut a = *m;
    let mut v = IDENTITY;

    for _ in 0..MAX_SWEEPS {
        let off = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
        if off < OFF_DIAGONAL_TOLERANCE {
            break;
        }
        for p in 0..2 {
            for q in (p + 1)..3 {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..3 {
                    let (akp, akq) = (a[k][p], a[k][q]);
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..3 {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in &mut v {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    ([a[0][0], a[1][1], a[2][2]], v)
}

/// `V f(L) V^T` for the eigendecomposition `m = V L V^T`.
pub fn map_symmetric(m: &Matrix3, f: impl Fn(f64) -> f64) -> Matrix3 {
    let (values, vectors) = symmetric_eigen(m);
    let mapped = values.map(f);
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3)
                .map(|k| vectors[i][k] * mapped[k] * vectors[j][k])
                .sum();
        }
    }
    out
}

pub fn expm_symmetric(m: &Matrix3) -> Matrix3 {
    map_symmetric(m, f64::exp)
}

/// Principal logarithm of a symmetric positive definite matrix; `None` when
/// an eigenvalue is not positive.
pub fn logm_spd(m: &Matrix3) -> Option<Matrix3> {
    let (values, _) = symmetric_eigen(m);
    if values.iter().any(|v| *v <= 0.0 || !v.is_finite()) {
        return None;
    }
    Some(map_symmetric(m, f64::ln))
}

pub fn scale(m: &Matrix3, factor: f64) -> Matrix3 {
    m.map(|row| row.map(|x| x * factor))
}

pub fn add(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = *a;
    for (row, other) in out.iter_mut().zip(b) {
        for (x, y) in row.iter_mut().zip(other) {
            *x += y;
        }
    }
    out
}
