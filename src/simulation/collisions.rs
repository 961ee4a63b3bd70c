//! Collision detection and response
//!
//! Runs after every integration tick: scans live pairs in ascending
//! (i, j) order and applies the configured response. Merges cascade left
//! to right within a single pass; bodies killed earlier in the pass are
//! skipped, and the dead are compacted out afterwards.

use crate::configuration::config::CollisionMode;
use crate::simulation::states::{normalize_or, Body, Vec2};

/// Extra separation applied after every contact so resolved pairs do not
/// re-enter on the next tick. Fixed contract constant.
const SEPARATION_PADDING: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CollisionStats {
    pub collisions: u64,
    pub merges: u64,
}

pub(crate) fn resolve_collisions(bodies: &mut Vec<Body>, mode: CollisionMode) -> CollisionStats {
    let mut stats = CollisionStats::default();
    let count = bodies.len();

    for i in 0..count {
        if !bodies[i].alive {
            continue;
        }
        for j in (i + 1)..count {
            if !bodies[j].alive {
                continue;
            }

            let delta = bodies[j].position - bodies[i].position;
            let distance = delta.norm();
            let contact_distance = bodies[i].radius + bodies[j].radius;
            if distance > contact_distance {
                continue;
            }

            stats.collisions += 1;

            match mode {
                CollisionMode::Ignore => {}
                CollisionMode::Elastic => {
                    apply_elastic_collision(bodies, i, j, delta, distance, contact_distance);
                }
                CollisionMode::InelasticMerge => {
                    apply_inelastic_merge(bodies, i, j);
                    stats.merges += 1;
                }
            }
        }
    }

    if mode == CollisionMode::InelasticMerge {
        bodies.retain(|body| body.alive);
    }

    stats
}

/// Combine j into i preserving linear momentum. The survivor keeps slot
/// i's id, label, kind, and color; radius grows area-additively.
fn apply_inelastic_merge(bodies: &mut [Body], i: usize, j: usize) {
    let (first, second) = pair_mut(bodies, i, j);

    let total_mass = first.mass + second.mass;
    let merged_position = (first.position * first.mass + second.position * second.mass) / total_mass;
    let merged_velocity = (first.velocity * first.mass + second.velocity * second.mass) / total_mass;
    let merged_radius = (first.radius * first.radius + second.radius * second.radius).sqrt();

    first.mass = total_mass;
    first.position = merged_position;
    first.velocity = merged_velocity;
    first.radius = merged_radius;

    second.alive = false;
}

/// Equal-and-opposite impulse along the contact normal, applied only when
/// the pair is approaching, followed by unconditional positional
/// separation. Mass, radius, momentum, and kinetic energy are preserved.
fn apply_elastic_collision(
    bodies: &mut [Body],
    i: usize,
    j: usize,
    delta: Vec2,
    distance: f64,
    contact_distance: f64,
) {
    let (first, second) = pair_mut(bodies, i, j);

    let normal = normalize_or(delta, Vec2::new(1.0, 0.0));

    let relative_velocity = second.velocity - first.velocity;
    let normal_speed = relative_velocity.dot(&normal);
    if normal_speed <= 0.0 {
        let inverse_mass_sum = 1.0 / first.mass + 1.0 / second.mass;
        let impulse = normal * (-2.0 * normal_speed / inverse_mass_sum);
        first.velocity -= impulse / first.mass;
        second.velocity += impulse / second.mass;
    }

    let overlap = (contact_distance - distance).max(0.0);
    let correction = normal * (0.5 * overlap + SEPARATION_PADDING);
    first.position -= correction;
    second.position += correction;
}

fn pair_mut<T>(slice: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert!(i < j);
    let (left, right) = slice.split_at_mut(j);
    (&mut left[i], &mut right[0])
}
