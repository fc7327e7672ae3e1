/// A differentiable scalar function of flat coordinates.
///
/// Coordinates are laid out as `[x0, y0, z0, x1, y1, z1, ...]` and the gradient
/// uses the same layout.
pub trait Objective {
    /// Returns the value at `x` and writes `dE/dx` into `grad`.
    fn evaluate(&self, x: &[f64], grad: &mut [f64]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizerSettings {
    pub max_iterations: usize,
    /// Relative energy change below which the run counts as converged.
    pub energy_tolerance: f64,
    /// Largest gradient component below which the run counts as converged.
    pub gradient_tolerance: f64,
}

impl Default for MinimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            energy_tolerance: 1e-6,
            gradient_tolerance: 1e-4,
        }
    }
}

/// Result of a local minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationOutcome {
    pub energy: f64,
    pub iterations: usize,
    pub converged: bool,
}

const MAX_STEP: f64 = 0.3;
const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

/// Polak-Ribière conjugate gradient with a backtracking (Armijo) line search.
///
/// `x` is updated in place and always holds the lowest-energy point visited.
/// The search direction is reset to steepest descent whenever it stops being a
/// descent direction or a line search fails along it. Running out of
/// iterations is reported through `converged`, not as an error; a non-finite
/// starting energy returns immediately with that energy.
pub fn minimize(
    objective: &impl Objective,
    x: &mut [f64],
    settings: &MinimizerSettings,
) -> MinimizationOutcome {
    let n = x.len();
    let mut grad = vec![0.0; n];
    let mut energy = objective.evaluate(x, &mut grad);
    if n == 0 || !energy.is_finite() {
        return MinimizationOutcome {
            energy,
            iterations: 0,
            converged: n == 0,
        };
    }

    let mut direction: Vec<f64> = grad.iter().map(|g| -g).collect();
    let mut trial = vec![0.0; n];
    let mut trial_grad = vec![0.0; n];
    let mut is_steepest = true;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < settings.max_iterations {
        if max_abs(&grad) < settings.gradient_tolerance {
            converged = true;
            break;
        }
        iterations += 1;

        let mut slope = dot(&grad, &direction);
        if slope >= 0.0 {
            direction.iter_mut().zip(&grad).for_each(|(d, g)| *d = -g);
            slope = -dot(&grad, &grad);
            is_steepest = true;
        }

        let mut alpha = (MAX_STEP / max_abs(&direction)).min(1.0);
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            for i in 0..n {
                trial[i] = x[i] + alpha * direction[i];
            }
            let trial_energy = objective.evaluate(&trial, &mut trial_grad);
            if trial_energy.is_finite() && trial_energy <= energy + ARMIJO_C1 * alpha * slope {
                accepted = Some(trial_energy);
                break;
            }
            alpha *= 0.5;
        }

        let Some(new_energy) = accepted else {
            if is_steepest {
                // No downhill step exists along the gradient at this resolution.
                converged = max_abs(&grad) < settings.gradient_tolerance * 10.0;
                break;
            }
            direction.iter_mut().zip(&grad).for_each(|(d, g)| *d = -g);
            is_steepest = true;
            continue;
        };

        x.copy_from_slice(&trial);
        let g_old_sq = dot(&grad, &grad);
        let g_new_old = dot(&trial_grad, &grad);
        let g_new_sq = dot(&trial_grad, &trial_grad);
        let beta = if g_old_sq > 0.0 {
            ((g_new_sq - g_new_old) / g_old_sq).max(0.0)
        } else {
            0.0
        };
        for i in 0..n {
            direction[i] = -trial_grad[i] + beta * direction[i];
        }
        std::mem::swap(&mut grad, &mut trial_grad);
        is_steepest = beta == 0.0;

        let delta = energy - new_energy;
        energy = new_energy;
        if delta.abs() <= settings.energy_tolerance * energy.abs().max(1.0) {
            converged = true;
            break;
        }
    }

    MinimizationOutcome {
        energy,
        iterations,
        converged,
    }
}
