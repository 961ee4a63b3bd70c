//! Force / acceleration evaluation for the n-body engine
//!
//! Defines the [`Acceleration`] trait plus the direct pairwise kernel and
//! the Barnes–Hut variant, and the per-tick solver selection that the
//! integrators drive. Evaluation always runs over a caller-supplied
//! position array so integrator stages can pass provisional positions.

use crate::configuration::config::{EngineConfig, GravitySolver};
use crate::simulation::barnes_hut::QuadTree;
use crate::simulation::states::{Body, SolverMode, Vec2};

/// Trait for acceleration sources.
/// `positions[i]` pairs with `bodies[i]`; implementations add their
/// contribution into `out[i]`. Dead bodies neither exert nor receive force.
pub trait Acceleration {
    fn acceleration(&self, bodies: &[Body], positions: &[Vec2], out: &mut [Vec2]);
}

/// Direct Newtonian gravity with softening, O(N^2) over live pairs.
/// This is the reference kernel every other solver mode must match for
/// small N. Iteration order is pinned: i ascending, j > i.
pub struct PairwiseGravity {
    pub g: f64,    // gravitational constant
    pub eps2: f64, // softening epsilon squared
}

impl Acceleration for PairwiseGravity {
    fn acceleration(&self, bodies: &[Body], positions: &[Vec2], out: &mut [Vec2]) {
        let n = bodies.len();

        for i in 0..n {
            if !bodies[i].alive {
                continue;
            }
            for j in (i + 1)..n {
                if !bodies[j].alive {
                    continue;
                }

                // r points from i to j: i is pulled along +r, j along -r
                let r = positions[j] - positions[i];

                // Softened squared separation d^2 = |r|^2 + eps^2
                let d2 = r.norm_squared() + self.eps2;
                if d2 <= 0.0 {
                    continue;
                }

                let inv_r = d2.sqrt().recip();
                let inv_r3 = inv_r * inv_r * inv_r;
                let coef = self.g * inv_r3;

                // a_i +=  G * m_j * r / d^3
                // a_j += -G * m_i * r / d^3  (equal and opposite)
                out[i] += r * (coef * bodies[j].mass);
                out[j] -= r * (coef * bodies[i].mass);
            }
        }
    }
}

/// Newtonian gravity evaluated through a Barnes–Hut quadtree, approximate
/// O(N log N) controlled by `theta` (opening angle) and `eps2` (softening).
pub struct BarnesHutGravity {
    pub g: f64,
    pub eps2: f64,
    pub theta: f64,
}

impl Acceleration for BarnesHutGravity {
    fn acceleration(&self, bodies: &[Body], positions: &[Vec2], out: &mut [Vec2]) {
        let Some(tree) = QuadTree::build(bodies, positions) else {
            return;
        };
        for (i, body) in bodies.iter().enumerate() {
            if !body.alive {
                continue;
            }
            out[i] += tree.acceleration_on(i, bodies, positions, self.g, self.eps2, self.theta);
        }
    }
}

/// Push a warning once per step call.
pub(crate) fn push_warning(warnings: &mut Vec<String>, message: String) {
    if !warnings.iter().any(|existing| existing == &message) {
        warnings.push(message);
    }
}

/// Decide which solver runs for this force evaluation.
pub(crate) fn select_mode(
    alive_count: usize,
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> SolverMode {
    match config.gravity_solver {
        GravitySolver::Pairwise => SolverMode::Pairwise,
        GravitySolver::BarnesHut => {
            if alive_count >= 2 {
                SolverMode::BarnesHut
            } else {
                log::warn!("barnes-hut solver needs at least two live bodies, using pairwise");
                push_warning(
                    warnings,
                    "barnes-hut solver needs at least two live bodies, using pairwise"
                        .to_string(),
                );
                SolverMode::Pairwise
            }
        }
        GravitySolver::Auto => {
            if alive_count >= config.barnes_hut_threshold {
                SolverMode::BarnesHut
            } else {
                SolverMode::Pairwise
            }
        }
    }
}

/// Accelerations for every body at the given (possibly provisional)
/// positions. Returns the buffer together with the solver mode that ran.
pub(crate) fn compute_accelerations(
    bodies: &[Body],
    positions: &[Vec2],
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> (Vec<Vec2>, SolverMode) {
    let alive_count = bodies.iter().filter(|body| body.alive).count();
    let mode = select_mode(alive_count, config, warnings);

    let mut accelerations = vec![Vec2::zeros(); bodies.len()];
    let eps2 = config.softening_epsilon * config.softening_epsilon;

    match mode {
        SolverMode::Pairwise => PairwiseGravity {
            g: config.gravity_constant,
            eps2,
        }
        .acceleration(bodies, positions, &mut accelerations),
        SolverMode::BarnesHut => BarnesHutGravity {
            g: config.gravity_constant,
            eps2,
            theta: config.barnes_hut_theta,
        }
        .acceleration(bodies, positions, &mut accelerations),
    }

    (accelerations, mode)
}
