//! Least-squares polynomial fitting on a normalised domain

use serde::{Deserialize, Serialize};

use crate::error::{TaxError, TaxResult};

/// Polynomial in `t`, where `t` maps `domain` onto `[-1, 1]`
///
/// `coefficients[k]` multiplies `t^k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub coefficients: Vec<f64>,
    pub domain: [f64; 2],
}

impl Polynomial {
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    fn normalise(&self, x: f64) -> f64 {
        let [lo, hi] = self.domain;
        (2.0 * x - (lo + hi)) / (hi - lo)
    }

    /// Evaluate at `x`; values outside the domain are extrapolated
    pub fn eval(&self, x: f64) -> f64 {
        let t = self.normalise(x);
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }

    /// Fit `ys ≈ p(xs)` of the given degree
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> TaxResult<Self> {
        if xs.len() != ys.len() {
            return Err(TaxError::SingularFit(format!(
                "{} inputs for {} outputs",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() <= degree {
            return Err(TaxError::SingularFit(format!(
                "{} samples cannot determine a degree {degree} polynomial",
                xs.len()
            )));
        }

        let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(hi > lo) {
            return Err(TaxError::SingularFit("sample inputs span no range".to_string()));
        }
        let mut poly = Polynomial {
            coefficients: Vec::new(),
            domain: [lo, hi],
        };

        // Normal equations: (VᵀV) c = Vᵀy with V the Vandermonde matrix in t
        let n = degree + 1;
        let mut gram = vec![vec![0.0; n]; n];
        let mut rhs = vec![0.0; n];
        let mut powers = vec![0.0; n];
        for (&x, &y) in xs.iter().zip(ys) {
            let t = poly.normalise(x);
            let mut p = 1.0;
            for power in powers.iter_mut() {
                *power = p;
                p *= t;
            }
            for i in 0..n {
                rhs[i] += powers[i] * y;
                for j in 0..n {
                    gram[i][j] += powers[i] * powers[j];
                }
            }
        }

        poly.coefficients = solve_linear(gram, rhs)?;
        Ok(poly)
    }
}

/// Gaussian elimination with partial pivoting
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> TaxResult<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() < 1e-12 {
            return Err(TaxError::SingularFit(format!("zero pivot in column {col}")));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recovers_exact_polynomial() {
        let xs: Vec<f64> = (0..50).map(|i| 1_000.0 + i as f64 * 2_000.0).collect();
        let f = |x: f64| 12.0 + 1.3 * x - 2e-6 * x * x + 4e-12 * x.powi(3);
        let ys: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
        let poly = Polynomial::fit(&xs, &ys, 5).unwrap();
        assert_eq!(poly.degree(), 5);
        for x in [1_000.0, 35_500.0, 99_000.0] {
            assert_relative_eq!(poly.eval(x), f(x), max_relative = 1e-8);
        }
    }

    #[test]
    fn test_linear_fit_of_noisy_line() {
        let xs: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs
            .iter()
            .enumerate()
            .map(|(i, x)| 2.0 * x + 1.0 + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let poly = Polynomial::fit(&xs, &ys, 1).unwrap();
        assert_relative_eq!(poly.eval(5.0), 11.0, epsilon = 0.05);
    }

    #[test]
    fn test_too_few_samples() {
        assert!(matches!(
            Polynomial::fit(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 5),
            Err(TaxError::SingularFit(_))
        ));
    }

    #[test]
    fn test_degenerate_domain() {
        let xs = vec![7.0; 10];
        let ys: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(Polynomial::fit(&xs, &ys, 2).is_err());
    }

    #[test]
    fn test_solve_linear_pivots() {
        let a = vec![vec![0.0, 1.0], vec![2.0, 1.0]];
        let x = solve_linear(a, vec![3.0, 5.0]).unwrap();
        assert_relative_eq!(x[0], 1.0);
        assert_relative_eq!(x[1], 3.0);
    }
}
