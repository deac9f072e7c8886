//! Derivative-free minimisation with the Nelder-Mead simplex method

use crate::error::{Error, Result};

/// Standard reflection, expansion, contraction and shrink coefficients
const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Nelder-Mead settings
#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Relative tolerance on the spread of objective values across the simplex
    pub f_tolerance: f64,
    /// Relative tolerance on the spread of vertices around the best one
    pub x_tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            f_tolerance: 1e-10,
            x_tolerance: 1e-5,
        }
    }
}

/// A converged minimum
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

impl NelderMead {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Default::default()
        }
    }

    /// Minimise `f` starting from `start`
    ///
    /// `steps[i]` is the offset of the i-th initial simplex vertex along axis i.
    /// NaN objective values are treated as +infinity so the simplex moves away
    /// from them. Fails with `Error::ModelFit` if the iteration budget runs out
    /// or the best value found is not finite.
    pub fn minimize<F>(&self, f: F, start: &[f64], steps: &[f64]) -> Result<Minimum>
    where
        F: Fn(&[f64]) -> f64,
    {
        let eval = |x: &[f64]| {
            let v = f(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let n = start.len();
        if n == 0 {
            let value = eval(start);
            return finite(Minimum {
                point: Vec::new(),
                value,
                iterations: 0,
            });
        }

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(start.to_vec());
        for i in 0..n {
            let mut vertex = start.to_vec();
            let step = steps.get(i).copied().unwrap_or(0.1);
            vertex[i] += if step == 0.0 { 0.1 } else { step };
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();

        for iteration in 0..self.max_iterations {
            // Order vertices best to worst
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            if self.converged(&simplex, &values) {
                return finite(Minimum {
                    point: simplex[0].clone(),
                    value: values[0],
                    iterations: iteration,
                });
            }

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
                .collect();
            let toward = |from: &[f64], coef: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, x)| c + coef * (x - c))
                    .collect()
            };

            let reflected = toward(&simplex[n], -ALPHA);
            let f_reflected = eval(&reflected);

            if f_reflected < values[0] {
                let expanded = toward(&reflected, GAMMA);
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }

            if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            let (contracted, f_contracted, accept) = if f_reflected < values[n] {
                let outside = toward(&reflected, RHO);
                let f_outside = eval(&outside);
                (outside, f_outside, f_outside <= f_reflected)
            } else {
                let inside = toward(&simplex[n], RHO);
                let f_inside = eval(&inside);
                (inside, f_inside, f_inside < values[n])
            };

            if accept {
                simplex[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            // Shrink toward the best vertex
            let best = simplex[0].clone();
            for i in 1..=n {
                simplex[i] = best
                    .iter()
                    .zip(&simplex[i])
                    .map(|(b, x)| b + SIGMA * (x - b))
                    .collect();
                values[i] = eval(&simplex[i]);
            }
        }

        Err(Error::ModelFit(format!(
            "optimizer did not converge within {} iterations",
            self.max_iterations
        )))
    }

    /// Assumes `simplex` is sorted best first
    fn converged(&self, simplex: &[Vec<f64>], values: &[f64]) -> bool {
        let best = values[0];
        let worst = values[values.len() - 1];
        if !worst.is_finite() {
            return false;
        }
        if worst - best > self.f_tolerance * best.abs() + 1e-12 {
            return false;
        }
        let origin = &simplex[0];
        simplex[1..].iter().all(|vertex| {
            vertex
                .iter()
                .zip(origin)
                .all(|(x, o)| (x - o).abs() <= self.x_tolerance * (1.0 + o.abs()))
        })
    }
}

fn finite(minimum: Minimum) -> Result<Minimum> {
    if minimum.value.is_finite() {
        Ok(minimum)
    } else {
        Err(Error::ModelFit(
            "objective is not finite at the optimum".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_bowl() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);
        let min = NelderMead::default()
            .minimize(f, &[0.0, 0.0], &[0.5, 0.5])
            .unwrap();
        assert!((min.point[0] - 3.0).abs() < 1e-3);
        assert!((min.point[1] + 1.0).abs() < 1e-3);
        assert!(min.value < 1e-6);
    }

    #[test]
    fn test_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let min = NelderMead::default()
            .minimize(f, &[-1.2, 1.0], &[0.1, 0.1])
            .unwrap();
        assert!((min.point[0] - 1.0).abs() < 1e-2);
        assert!((min.point[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_zero_dimensional() {
        let min = NelderMead::default().minimize(|_| 4.0, &[], &[]).unwrap();
        assert_eq!(min.value, 4.0);
        assert!(min.point.is_empty());
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2);
        let result = NelderMead::new(3).minimize(f, &[0.0, 0.0], &[0.1, 0.1]);
        assert!(matches!(result, Err(Error::ModelFit(_))));
    }

    #[test]
    fn test_non_finite_objective() {
        let result = NelderMead::default().minimize(|_| f64::NAN, &[], &[]);
        assert!(matches!(result, Err(Error::ModelFit(_))));
    }

    #[test]
    fn test_avoids_infinite_region() {
        // Infinite for negative x, minimum at x = 0.5
        let f = |x: &[f64]| {
            if x[0] < 0.0 {
                f64::INFINITY
            } else {
                (x[0] - 0.5).powi(2)
            }
        };
        let min = NelderMead::default().minimize(f, &[0.05], &[-0.2]).unwrap();
        assert!((min.point[0] - 0.5).abs() < 1e-3);
    }
}
