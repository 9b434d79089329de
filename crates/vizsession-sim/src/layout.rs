//! Force-directed layout state and vertex buffer encoding.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Spring rest length between connected points.
const REST_LENGTH: f32 = 0.2;
/// Spring stiffness.
const SPRING: f32 = 0.05;
/// Pairwise repulsion strength.
const REPULSION: f32 = 0.0005;
/// Per-step velocity damping.
const DAMPING: f32 = 0.85;
/// Pairwise repulsion is skipped above this point count.
const MAX_REPULSION_POINTS: usize = 2048;

/// Positions, velocities, and edges of one layout.
#[derive(Debug, Clone)]
pub struct ForceLayout {
    positions: Vec<[f32; 2]>,
    velocities: Vec<[f32; 2]>,
    edges: Vec<(u32, u32)>,
}

impl ForceLayout {
    /// Create a layout with `points` randomly placed points.
    ///
    /// Edges referencing points out of range are dropped.
    pub fn new(points: u32, edges: Vec<(u32, u32)>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let positions: Vec<[f32; 2]> = (0..points)
            .map(|_| [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)])
            .collect();
        let edges = edges
            .into_iter()
            .filter(|&(a, b)| a < points && b < points)
            .collect();
        Self {
            velocities: vec![[0.0, 0.0]; positions.len()],
            positions,
            edges,
        }
    }

    /// A ring of `points` points, each connected to its successor.
    pub fn ring(points: u32, seed: u64) -> Self {
        let edges = (0..points)
            .map(|i| (i, i.checked_add(1).filter(|&n| n < points).unwrap_or(0)))
            .filter(|&(a, b)| a != b)
            .collect();
        Self::new(points, edges, seed)
    }

    /// Number of points.
    pub fn point_count(&self) -> u32 {
        u32::try_from(self.positions.len()).unwrap_or(u32::MAX)
    }

    /// Number of edges.
    pub fn edge_count(&self) -> u32 {
        u32::try_from(self.edges.len()).unwrap_or(u32::MAX)
    }

    /// Position of one point.
    pub fn position(&self, point: u32) -> Option<[f32; 2]> {
        self.positions.get(usize::try_from(point).ok()?).copied()
    }

    /// Move one point by an offset. Unknown points are ignored.
    pub fn nudge(&mut self, point: u32, dx: f32, dy: f32) {
        if let Some(p) = usize::try_from(point)
            .ok()
            .and_then(|i| self.positions.get_mut(i))
        {
            p[0] += dx;
            p[1] += dy;
        }
    }

    /// Advance the layout by one step.
    pub fn step(&mut self) {
        let mut forces = vec![[0.0_f32, 0.0_f32]; self.positions.len()];

        for &(a, b) in &self.edges {
            let (Some(pa), Some(pb)) = (self.position(a), self.position(b)) else {
                continue;
            };
            let dx = pb[0] - pa[0];
            let dy = pb[1] - pa[1];
            let dist = dx.hypot(dy).max(f32::EPSILON);
            let pull = SPRING * (dist - REST_LENGTH) / dist;
            add_force(&mut forces, a, dx * pull, dy * pull);
            add_force(&mut forces, b, -dx * pull, -dy * pull);
        }

        if self.positions.len() <= MAX_REPULSION_POINTS {
            for (i, pi) in self.positions.iter().enumerate() {
                for (j, pj) in self.positions.iter().enumerate().skip(i.saturating_add(1)) {
                    let dx = pi[0] - pj[0];
                    let dy = pi[1] - pj[1];
                    let dist_sq = dx.mul_add(dx, dy * dy).max(1e-4);
                    let push = REPULSION / dist_sq;
                    if let Some(f) = forces.get_mut(i) {
                        f[0] += dx * push;
                        f[1] += dy * push;
                    }
                    if let Some(f) = forces.get_mut(j) {
                        f[0] -= dx * push;
                        f[1] -= dy * push;
                    }
                }
            }
        }

        for ((pos, vel), force) in self
            .positions
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .zip(forces)
        {
            vel[0] = (vel[0] + force[0]) * DAMPING;
            vel[1] = (vel[1] + force[1]) * DAMPING;
            pos[0] += vel[0];
            pos[1] += vel[1];
        }
    }

    /// Encode the layout as named little-endian vertex buffers.
    ///
    /// - `curPoints`: `f32` x/y per point
    /// - `springsPos`: `f32` x/y of both endpoints per edge
    /// - `logicalEdges`: `u32` source/destination per edge
    /// - `pointSizes`: one `u8` per point
    /// - `edgeColors`: one RGBA `u32` per edge endpoint
    pub fn buffers(&self) -> BTreeMap<String, Vec<u8>> {
        let mut cur_points = Vec::with_capacity(self.positions.len().saturating_mul(8));
        for p in &self.positions {
            cur_points.extend_from_slice(&p[0].to_le_bytes());
            cur_points.extend_from_slice(&p[1].to_le_bytes());
        }

        let mut springs = Vec::with_capacity(self.edges.len().saturating_mul(16));
        let mut logical = Vec::with_capacity(self.edges.len().saturating_mul(8));
        let mut colors = Vec::with_capacity(self.edges.len().saturating_mul(8));
        for &(a, b) in &self.edges {
            for endpoint in [a, b] {
                let p = self.position(endpoint).unwrap_or([0.0, 0.0]);
                springs.extend_from_slice(&p[0].to_le_bytes());
                springs.extend_from_slice(&p[1].to_le_bytes());
                colors.extend_from_slice(&0x9d9d_9dff_u32.to_le_bytes());
            }
            logical.extend_from_slice(&a.to_le_bytes());
            logical.extend_from_slice(&b.to_le_bytes());
        }

        let mut buffers = BTreeMap::new();
        buffers.insert(String::from("curPoints"), cur_points);
        buffers.insert(String::from("springsPos"), springs);
        buffers.insert(String::from("logicalEdges"), logical);
        buffers.insert(String::from("pointSizes"), vec![8_u8; self.positions.len()]);
        buffers.insert(String::from("edgeColors"), colors);
        buffers
    }
}

fn add_force(forces: &mut [[f32; 2]], point: u32, fx: f32, fy: f32) {
    if let Some(f) = usize::try_from(point).ok().and_then(|i| forces.get_mut(i)) {
        f[0] += fx;
        f[1] += fy;
    }
}
