//! Time integrators for the N-body system
//!
//! Provides semi-implicit Euler, velocity Verlet, and classical RK4, all
//! driven by the shared force evaluation in [`crate::simulation::forces`],
//! plus the adaptive timestep policy. Every scheme computes the advanced
//! state into buffers and commits only after all live results are finite,
//! so a failed tick leaves the bodies untouched.

use crate::configuration::config::{DtPolicy, EngineConfig, IntegratorKind};
use crate::error::{EngineError, Result};
use crate::simulation::forces::{compute_accelerations, push_warning};
use crate::simulation::states::{vec2_is_finite, Body, SolverMode, Vec2};

/// Advanced positions and velocities, index-aligned with the body slice.
/// Entries for dead bodies carry their current values unchanged.
struct Advanced {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    used_barnes_hut: bool,
}

/// Advance all live bodies by one tick of length `dt`.
/// Returns the solver mode that ran (Barnes–Hut if any force evaluation of
/// the tick used the tree).
pub(crate) fn integrate_step(
    bodies: &mut [Body],
    config: &EngineConfig,
    dt: f64,
    warnings: &mut Vec<String>,
) -> Result<SolverMode> {
    let advanced = match config.integrator {
        IntegratorKind::SemiImplicitEuler => semi_implicit_euler(bodies, config, dt, warnings),
        IntegratorKind::VelocityVerlet => velocity_verlet(bodies, config, dt, warnings),
        IntegratorKind::Rk4 => rk4(bodies, config, dt, warnings),
    };

    for (index, body) in bodies.iter().enumerate() {
        if body.alive
            && !(vec2_is_finite(&advanced.positions[index])
                && vec2_is_finite(&advanced.velocities[index]))
        {
            return Err(EngineError::NumericalInstability(format!(
                "body '{}' produced non-finite state",
                body.id
            )));
        }
    }

    for (index, body) in bodies.iter_mut().enumerate() {
        if !body.alive {
            continue;
        }
        body.position = advanced.positions[index];
        body.velocity = advanced.velocities[index];
    }

    Ok(if advanced.used_barnes_hut {
        SolverMode::BarnesHut
    } else {
        SolverMode::Pairwise
    })
}

/// Timestep for the next tick under the configured policy.
///
/// Adaptive mode targets 5% of the closest approach per tick, clamped to
/// [0.05 * dt, dt]. Degenerate states (no live pair, zero speeds) fall
/// back to the configured dt.
pub(crate) fn effective_dt(
    bodies: &[Body],
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> f64 {
    if config.dt_policy != DtPolicy::Adaptive {
        return config.dt;
    }

    let mut max_speed = 0.0_f64;
    for body in bodies.iter().filter(|body| body.alive) {
        max_speed = max_speed.max(body.velocity.norm());
    }

    let mut min_distance = f64::INFINITY;
    for i in 0..bodies.len() {
        if !bodies[i].alive {
            continue;
        }
        for j in (i + 1)..bodies.len() {
            if !bodies[j].alive {
                continue;
            }
            let distance = (bodies[j].position - bodies[i].position).norm();
            if distance > 0.0 {
                min_distance = min_distance.min(distance);
            }
        }
    }

    if !min_distance.is_finite() || !max_speed.is_finite() || max_speed <= 0.0 {
        return config.dt;
    }

    let suggested = 0.05 * min_distance / max_speed;
    let floor = 0.05 * config.dt;
    if suggested < floor {
        log::warn!(
            "adaptive dt clamped at 5% floor (suggested {suggested:.3e}, floor {floor:.3e})"
        );
        push_warning(
            warnings,
            "adaptive dt clamped at 5% floor".to_string(),
        );
    }
    suggested.clamp(floor, config.dt)
}

fn semi_implicit_euler(
    bodies: &[Body],
    config: &EngineConfig,
    dt: f64,
    warnings: &mut Vec<String>,
) -> Advanced {
    let p0 = bodies.iter().map(|body| body.position).collect::<Vec<_>>();
    let (acc, mode) = compute_accelerations(bodies, &p0, config, warnings);

    let mut positions = p0;
    let mut velocities = bodies.iter().map(|body| body.velocity).collect::<Vec<_>>();
    for (index, body) in bodies.iter().enumerate() {
        if !body.alive {
            continue;
        }
        // v_{n+1} = v_n + a(p_n) dt, then drift with the updated velocity
        velocities[index] = body.velocity + acc[index] * dt;
        positions[index] = body.position + velocities[index] * dt;
    }

    Advanced {
        positions,
        velocities,
        used_barnes_hut: mode == SolverMode::BarnesHut,
    }
}

fn velocity_verlet(
    bodies: &[Body],
    config: &EngineConfig,
    dt: f64,
    warnings: &mut Vec<String>,
) -> Advanced {
    let p0 = bodies.iter().map(|body| body.position).collect::<Vec<_>>();
    let (a0, mode_0) = compute_accelerations(bodies, &p0, config, warnings);

    // Drift: p_{n+1} = p_n + v_n dt + a_n dt^2 / 2
    let mut positions = p0.clone();
    for (index, body) in bodies.iter().enumerate() {
        if !body.alive {
            continue;
        }
        positions[index] = body.position + body.velocity * dt + a0[index] * (0.5 * dt * dt);
    }

    // Second force evaluation at the advanced positions
    let (a1, mode_1) = compute_accelerations(bodies, &positions, config, warnings);

    // Kick: v_{n+1} = v_n + (a_n + a_{n+1}) dt / 2
    let mut velocities = bodies.iter().map(|body| body.velocity).collect::<Vec<_>>();
    for (index, body) in bodies.iter().enumerate() {
        if !body.alive {
            continue;
        }
        velocities[index] = body.velocity + (a0[index] + a1[index]) * (0.5 * dt);
    }

    Advanced {
        positions,
        velocities,
        used_barnes_hut: mode_0 == SolverMode::BarnesHut || mode_1 == SolverMode::BarnesHut,
    }
}

fn rk4(bodies: &[Body], config: &EngineConfig, dt: f64, warnings: &mut Vec<String>) -> Advanced {
    let count = bodies.len();
    let p0 = bodies.iter().map(|body| body.position).collect::<Vec<_>>();
    let v0 = bodies.iter().map(|body| body.velocity).collect::<Vec<_>>();

    // Stage 1 at (p0, v0)
    let (k1v, mode_1) = compute_accelerations(bodies, &p0, config, warnings);
    let k1p = v0.clone();

    // Stage 2 at the half step
    let mut p2 = p0.clone();
    let mut v2 = v0.clone();
    for i in 0..count {
        if !bodies[i].alive {
            continue;
        }
        p2[i] = p0[i] + k1p[i] * (0.5 * dt);
        v2[i] = v0[i] + k1v[i] * (0.5 * dt);
    }
    let (k2v, mode_2) = compute_accelerations(bodies, &p2, config, warnings);
    let k2p = v2;

    // Stage 3, half step from the stage-2 slope
    let mut p3 = p0.clone();
    let mut v3 = v0.clone();
    for i in 0..count {
        if !bodies[i].alive {
            continue;
        }
        p3[i] = p0[i] + k2p[i] * (0.5 * dt);
        v3[i] = v0[i] + k2v[i] * (0.5 * dt);
    }
    let (k3v, mode_3) = compute_accelerations(bodies, &p3, config, warnings);
    let k3p = v3;

    // Stage 4 at the full step
    let mut p4 = p0.clone();
    let mut v4 = v0.clone();
    for i in 0..count {
        if !bodies[i].alive {
            continue;
        }
        p4[i] = p0[i] + k3p[i] * dt;
        v4[i] = v0[i] + k3v[i] * dt;
    }
    let (k4v, mode_4) = compute_accelerations(bodies, &p4, config, warnings);
    let k4p = v4;

    // Combine with 1-2-2-1 weights
    let mut positions = p0.clone();
    let mut velocities = v0.clone();
    for i in 0..count {
        if !bodies[i].alive {
            continue;
        }
        positions[i] = p0[i] + (k1p[i] + k2p[i] * 2.0 + k3p[i] * 2.0 + k4p[i]) * (dt / 6.0);
        velocities[i] = v0[i] + (k1v[i] + k2v[i] * 2.0 + k3v[i] * 2.0 + k4v[i]) * (dt / 6.0);
    }

    Advanced {
        positions,
        velocities,
        used_barnes_hut: [mode_1, mode_2, mode_3, mode_4]
            .iter()
            .any(|mode| *mode == SolverMode::BarnesHut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::config::{DtPolicy, EngineConfig};

    fn adaptive_config(dt: f64) -> EngineConfig {
        EngineConfig {
            dt,
            dt_policy: DtPolicy::Adaptive,
            deterministic: false,
            ..EngineConfig::default()
        }
    }

    fn pair(distance: f64, speed: f64) -> Vec<Body> {
        vec![
            Body::new("a", 1.0, 0.01, Vec2::zeros(), Vec2::new(speed, 0.0)),
            Body::new("b", 1.0, 0.01, Vec2::new(distance, 0.0), Vec2::zeros()),
        ]
    }

    #[test]
    fn adaptive_dt_hits_ceiling_for_slow_wide_systems() {
        let config = adaptive_config(0.1);
        let bodies = pair(10.0, 1.0);
        let mut warnings = Vec::new();
        // Suggested 0.05 * 10 / 1 = 0.5, clamped to the configured dt.
        assert_eq!(effective_dt(&bodies, &config, &mut warnings), 0.1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn adaptive_dt_hits_floor_for_fast_close_systems() {
        let config = adaptive_config(0.1);
        let bodies = pair(0.1, 10.0);
        let mut warnings = Vec::new();
        // Suggested 0.05 * 0.1 / 10 = 5e-4, clamped to 0.05 * dt = 5e-3.
        let dt_used = effective_dt(&bodies, &config, &mut warnings);
        assert!((dt_used - 5e-3).abs() < 1e-15);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("adaptive"));
    }

    #[test]
    fn adaptive_dt_falls_back_when_degenerate() {
        let config = adaptive_config(0.02);
        let mut warnings = Vec::new();

        // Zero velocities: no meaningful speed scale.
        let still = vec![
            Body::new("a", 1.0, 0.01, Vec2::zeros(), Vec2::zeros()),
            Body::new("b", 1.0, 0.01, Vec2::new(1.0, 0.0), Vec2::zeros()),
        ];
        assert_eq!(effective_dt(&still, &config, &mut warnings), 0.02);

        // Single body: no pair distance.
        let lonely = vec![Body::new("a", 1.0, 0.01, Vec2::zeros(), Vec2::new(3.0, 0.0))];
        assert_eq!(effective_dt(&lonely, &config, &mut warnings), 0.02);
    }

    #[test]
    fn fixed_policy_always_returns_configured_dt() {
        let config = EngineConfig::default();
        let bodies = pair(0.001, 100.0);
        let mut warnings = Vec::new();
        assert_eq!(effective_dt(&bodies, &config, &mut warnings), config.dt);
    }

    #[test]
    fn dead_bodies_stay_frozen_through_every_scheme() {
        for integrator in [
            IntegratorKind::SemiImplicitEuler,
            IntegratorKind::VelocityVerlet,
            IntegratorKind::Rk4,
        ] {
            let config = EngineConfig {
                integrator,
                ..EngineConfig::default()
            };
            let mut bodies = pair(2.0, 0.5);
            bodies.push(Body::new(
                "ghost",
                5.0,
                0.1,
                Vec2::new(1.0, 1.0),
                Vec2::new(9.0, 9.0),
            ));
            bodies[2].alive = false;

            let mut warnings = Vec::new();
            integrate_step(&mut bodies, &config, config.dt, &mut warnings).unwrap();

            assert_eq!(bodies[2].position, Vec2::new(1.0, 1.0));
            assert_eq!(bodies[2].velocity, Vec2::new(9.0, 9.0));
        }
    }

    #[test]
    fn instability_aborts_without_mutating_bodies() {
        let config = EngineConfig {
            softening_epsilon: 0.0,
            gravity_constant: 1e300,
            dt: 1e300,
            ..EngineConfig::default()
        };
        let mut bodies = pair(1e-150, 0.0);
        let before = bodies.clone();

        let mut warnings = Vec::new();
        let result = integrate_step(&mut bodies, &config, config.dt, &mut warnings);
        assert!(matches!(
            result,
            Err(EngineError::NumericalInstability(_))
        ));
        assert_eq!(bodies, before);
    }
}
