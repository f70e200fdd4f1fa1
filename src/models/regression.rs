// Fitting primitives for the online cost models
// Small dense problems (a handful of features, a bounded sample window), so
// the solvers are written out directly rather than pulled from a linear
// algebra stack.

use ndarray::{Array1, Array2};

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
/// Returns `None` when the system is singular.
fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();

    for col in 0..n {
        // Pivot on the largest remaining entry in this column
        let mut pivot = col;
        for row in (col + 1)..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                let tmp = a[[col, k]];
                a[[col, k]] = a[[pivot, k]];
                a[[pivot, k]] = tmp;
            }
            b.swap(col, pivot);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[[row, k]] * x[k];
        }
        x[row] = sum / a[[row, row]];
    }
    Some(x)
}

/// Least-squares linear regressor fitted via the normal equations with a
/// ridge term on the diagonal to keep near-collinear feature windows solvable.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    /// `weights[0]` is the intercept
    weights: Array1<f64>,
}

impl LinearRegressor {
    pub fn fit(features: &[Array1<f64>], targets: &[f64], ridge: f64) -> Option<Self> {
        let n = features.len();
        if n == 0 || n != targets.len() {
            return None;
        }
        let d = features[0].len() + 1;

        // Design matrix with a leading intercept column
        let mut x = Array2::zeros((n, d));
        for (i, row) in features.iter().enumerate() {
            if row.len() + 1 != d {
                return None;
            }
            x[[i, 0]] = 1.0;
            for (j, &v) in row.iter().enumerate() {
                x[[i, j + 1]] = v;
            }
        }
        let y = Array1::from_vec(targets.to_vec());

        let mut a = x.t().dot(&x);
        for j in 0..d {
            a[[j, j]] += ridge;
        }
        let b = x.t().dot(&y);

        let weights = solve_linear_system(a, b)?;
        if weights.iter().any(|w| !w.is_finite()) {
            return None;
        }
        Some(Self { weights })
    }

    pub fn predict(&self, features: &Array1<f64>) -> f64 {
        let mut out = self.weights[0];
        for (j, &v) in features.iter().enumerate() {
            out += self.weights[j + 1] * v;
        }
        out
    }
}

/// Binary logistic classifier fitted by batch gradient descent over
/// standardized features.
#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    /// `weights[0]` is the intercept over standardized features
    weights: Array1<f64>,
    means: Array1<f64>,
    stds: Array1<f64>,
}

const LOGISTIC_EPOCHS: usize = 300;
const LOGISTIC_LEARNING_RATE: f64 = 0.1;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticClassifier {
    pub fn fit(features: &[Array1<f64>], labels: &[f64]) -> Option<Self> {
        let n = features.len();
        if n == 0 || n != labels.len() {
            return None;
        }
        let d = features[0].len();

        // Column-wise standardization; constant columns keep scale 1
        let mut means = Array1::zeros(d);
        let mut stds = Array1::zeros(d);
        for j in 0..d {
            let mean = features.iter().map(|f| f[j]).sum::<f64>() / n as f64;
            let var = features.iter().map(|f| (f[j] - mean).powi(2)).sum::<f64>() / n as f64;
            means[j] = mean;
            stds[j] = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        }

        let mut standardized = Array2::zeros((n, d));
        for (i, row) in features.iter().enumerate() {
            if row.len() != d {
                return None;
            }
            for j in 0..d {
                standardized[[i, j]] = (row[j] - means[j]) / stds[j];
            }
        }

        let mut weights: Array1<f64> = Array1::zeros(d + 1);
        for _ in 0..LOGISTIC_EPOCHS {
            let mut grad: Array1<f64> = Array1::zeros(d + 1);
            for i in 0..n {
                let mut z = weights[0];
                for j in 0..d {
                    z += weights[j + 1] * standardized[[i, j]];
                }
                let err = sigmoid(z) - labels[i];
                grad[0] += err;
                for j in 0..d {
                    grad[j + 1] += err * standardized[[i, j]];
                }
            }
            let scale = LOGISTIC_LEARNING_RATE / n as f64;
            for j in 0..(d + 1) {
                weights[j] -= scale * grad[j];
            }
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return None;
        }
        Some(Self { weights, means, stds })
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, features: &Array1<f64>) -> f64 {
        let mut z = self.weights[0];
        for (j, &v) in features.iter().enumerate() {
            z += self.weights[j + 1] * (v - self.means[j]) / self.stds[j];
        }
        sigmoid(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_fit_recovers_line() {
        // y = 2 + 3x
        let features: Vec<Array1<f64>> = (0..20).map(|i| array![i as f64]).collect();
        let targets: Vec<f64> = (0..20).map(|i| 2.0 + 3.0 * i as f64).collect();

        let model = LinearRegressor::fit(&features, &targets, 1e-6).unwrap();
        let pred = model.predict(&array![10.0]);
        assert!((pred - 32.0).abs() < 0.01);
    }

    #[test]
    fn test_linear_fit_multifeature() {
        // y = 1 + 2a - b
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for a in 0..10 {
            for b in 0..10 {
                features.push(array![a as f64, b as f64]);
                targets.push(1.0 + 2.0 * a as f64 - b as f64);
            }
        }

        let model = LinearRegressor::fit(&features, &targets, 1e-6).unwrap();
        let pred = model.predict(&array![4.0, 7.0]);
        assert!((pred - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_linear_fit_rejects_empty() {
        assert!(LinearRegressor::fit(&[], &[], 1e-6).is_none());
    }

    #[test]
    fn test_logistic_separates_classes() {
        // Positive class clusters at x > 5
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..50 {
            let x = i as f64 / 5.0;
            features.push(array![x]);
            labels.push(if x > 5.0 { 1.0 } else { 0.0 });
        }

        let model = LogisticClassifier::fit(&features, &labels).unwrap();
        assert!(model.predict_proba(&array![9.0]) > 0.7);
        assert!(model.predict_proba(&array![1.0]) < 0.3);
    }

    #[test]
    fn test_logistic_constant_labels() {
        let features: Vec<Array1<f64>> = (0..30).map(|i| array![i as f64, 1.0]).collect();
        let labels = vec![1.0; 30];

        let model = LogisticClassifier::fit(&features, &labels).unwrap();
        // All-positive training data pushes probabilities toward 1
        assert!(model.predict_proba(&array![15.0, 1.0]) > 0.5);
    }
}
