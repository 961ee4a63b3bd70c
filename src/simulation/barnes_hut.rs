//! Barnes–Hut quadtree for approximate gravity
//!
//! Replaces the naive O(N^2) all-pairs sum with an O(N log N)
//! approximation: distant groups of bodies are treated as a single point
//! mass at their center of mass. The tree is an index arena (`nodes`
//! vector, child links by index) built fresh for every force evaluation.
//!
//! Determinism: bodies are inserted in ascending index order, children are
//! visited in a fixed corner order (-x-y, +x-y, -x+y, +x+y), and the root
//! box is derived only from the live body extremes. Identical inputs
//! always produce identical trees and identical traversal sums.

use crate::simulation::states::{Body, Vec2};

/// A single quadtree node covering a square region.
///
/// A node is either a leaf (no children; `bodies` holds the occupants,
/// usually one) or internal (four children; `bodies` empty). Coincident or
/// sub-resolution bodies aggregate in one leaf instead of subdividing
/// forever.
pub struct QuadNode {
    pub center: Vec2,
    pub half_size: f64,
    pub mass: f64,
    pub com: Vec2,
    pub bodies: Vec<usize>,           // leaf occupants, indices into the body slice
    pub children: [Option<usize>; 4], // indices into QuadTree::nodes
}

impl QuadNode {
    fn new(center: Vec2, half_size: f64) -> Self {
        Self {
            center,
            half_size,
            mass: 0.0,
            com: Vec2::zeros(),
            bodies: Vec::new(),
            children: [None; 4],
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}

/// A complete quadtree over the live bodies of a system.
pub struct QuadTree {
    pub nodes: Vec<QuadNode>,
    root: usize,
    min_half: f64,
}

impl QuadTree {
    /// Build a quadtree over the live bodies at the given positions.
    /// Returns `None` when no body is alive.
    pub fn build(bodies: &[Body], positions: &[Vec2]) -> Option<Self> {
        let alive_indices = bodies
            .iter()
            .enumerate()
            .filter_map(|(index, body)| body.alive.then_some(index))
            .collect::<Vec<_>>();
        if alive_indices.is_empty() {
            return None;
        }

        // Square root box around the live extremes, padded so bodies on the
        // boundary still classify into a child.
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &index in &alive_indices {
            let p = positions[index];
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        let span = (max_x - min_x).max(max_y - min_y).max(1e-6);
        let half_size = 0.5 * span + 1e-6;
        let center = Vec2::new(0.5 * (min_x + max_x), 0.5 * (min_y + max_y));

        let mut tree = Self {
            nodes: vec![QuadNode::new(center, half_size)],
            root: 0,
            min_half: (half_size * 1e-6).max(1e-9),
        };

        for &index in &alive_indices {
            tree.insert(tree.root, index, positions);
        }
        tree.compute_mass_and_com(tree.root, bodies, positions);

        Some(tree)
    }

    /// Net acceleration on body `body_index` at `position` from the whole
    /// tree, using opening angle `theta` and softening `eps2`.
    pub fn acceleration_on(
        &self,
        body_index: usize,
        bodies: &[Body],
        positions: &[Vec2],
        g: f64,
        eps2: f64,
        theta: f64,
    ) -> Vec2 {
        let mut acc = Vec2::zeros();
        self.traverse(
            self.root,
            body_index,
            positions[body_index],
            bodies,
            positions,
            g,
            eps2,
            theta,
            &mut acc,
        );
        acc
    }

    // helpers ==============================================================

    fn insert(&mut self, node_index: usize, body_index: usize, positions: &[Vec2]) {
        if self.nodes[node_index].is_leaf() {
            if self.nodes[node_index].bodies.is_empty() {
                self.nodes[node_index].bodies.push(body_index);
                return;
            }

            // Occupied leaf: aggregate when the cell cannot subdivide any
            // further or the occupants coincide with the newcomer.
            let coincident = self.nodes[node_index].bodies.iter().all(|&occupant| {
                (positions[occupant] - positions[body_index]).norm_squared() <= 1e-18
            });
            if self.nodes[node_index].half_size <= self.min_half || coincident {
                self.nodes[node_index].bodies.push(body_index);
                return;
            }

            // Subdivide and push the existing occupants down first so
            // insertion order stays ascending.
            self.subdivide(node_index);
            let occupants = std::mem::take(&mut self.nodes[node_index].bodies);
            for occupant in occupants {
                self.insert_into_child(node_index, occupant, positions);
            }
        }

        self.insert_into_child(node_index, body_index, positions);
    }

    fn insert_into_child(&mut self, node_index: usize, body_index: usize, positions: &[Vec2]) {
        let quadrant = quadrant_for(&self.nodes[node_index].center, &positions[body_index]);
        // Children exist for every quadrant once a node is subdivided.
        if let Some(child_index) = self.nodes[node_index].children[quadrant] {
            self.insert(child_index, body_index, positions);
        }
    }

    /// Split a node into four equally sized child quadrants.
    fn subdivide(&mut self, node_index: usize) {
        let center = self.nodes[node_index].center;
        let child_half = self.nodes[node_index].half_size * 0.5;
        for quadrant in 0..4 {
            let child_index = self.nodes.len();
            self.nodes
                .push(QuadNode::new(child_center(center, child_half, quadrant), child_half));
            self.nodes[node_index].children[quadrant] = Some(child_index);
        }
    }

    /// Bottom-up pass filling total mass and center of mass per subtree.
    fn compute_mass_and_com(&mut self, node_index: usize, bodies: &[Body], positions: &[Vec2]) {
        let occupants = self.nodes[node_index].bodies.clone();
        let children = self.nodes[node_index].children;

        let mut mass = 0.0;
        let mut com = Vec2::zeros();

        for &occupant in &occupants {
            mass += bodies[occupant].mass;
            com += positions[occupant] * bodies[occupant].mass;
        }

        for child in children.iter().flatten() {
            self.compute_mass_and_com(*child, bodies, positions);
            let child_node = &self.nodes[*child];
            if child_node.mass > 0.0 {
                mass += child_node.mass;
                com += child_node.com * child_node.mass;
            }
        }

        if mass > 0.0 {
            com /= mass;
        }

        let node = &mut self.nodes[node_index];
        node.mass = mass;
        node.com = com;
    }

    #[allow(clippy::too_many_arguments)]
    fn traverse(
        &self,
        node_index: usize,
        body_index: usize,
        position: Vec2,
        bodies: &[Body],
        positions: &[Vec2],
        g: f64,
        eps2: f64,
        theta: f64,
        acc: &mut Vec2,
    ) {
        let node = &self.nodes[node_index];
        if node.mass <= 0.0 {
            return;
        }

        // Leaf: exact interaction with each occupant, skipping self.
        if node.is_leaf() {
            for &occupant in &node.bodies {
                if occupant == body_index {
                    continue;
                }
                let r = positions[occupant] - position;
                let d2 = r.norm_squared() + eps2;
                if d2 <= 0.0 {
                    continue;
                }
                let inv_r = d2.sqrt().recip();
                let inv_r3 = inv_r * inv_r * inv_r;
                *acc += r * (g * bodies[occupant].mass * inv_r3);
            }
            return;
        }

        // Internal node: open or approximate based on size/distance.
        let r = node.com - position;
        let dist = r.norm();
        if dist == 0.0 {
            return;
        }

        let size = node.half_size * 2.0;
        if size / dist < theta {
            // Far enough: whole subtree as one point mass at its COM.
            let d2 = r.norm_squared() + eps2;
            if d2 <= 0.0 {
                return;
            }
            let inv_r = d2.sqrt().recip();
            let inv_r3 = inv_r * inv_r * inv_r;
            *acc += r * (g * node.mass * inv_r3);
        } else {
            for child in node.children.iter().flatten() {
                self.traverse(
                    *child, body_index, position, bodies, positions, g, eps2, theta, acc,
                );
            }
        }
    }
}

/// Quadrant index for a point relative to a node center.
/// Bit 0: x half (0 left, 1 right). Bit 1: y half (0 bottom, 1 top).
fn quadrant_for(center: &Vec2, p: &Vec2) -> usize {
    let mut index = 0;
    if p.x >= center.x {
        index |= 1;
    }
    if p.y >= center.y {
        index |= 2;
    }
    index
}

fn child_center(center: Vec2, child_half: f64, quadrant: usize) -> Vec2 {
    let x_offset = if quadrant & 1 == 0 { -child_half } else { child_half };
    let y_offset = if quadrant & 2 == 0 { -child_half } else { child_half };
    Vec2::new(center.x + x_offset, center.y + y_offset)
}
