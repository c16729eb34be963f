//! Connected clusters of points under a distance threshold.

use std::collections::{HashMap, VecDeque};

use super::PointWithNormal;

type Cell = (i64, i64, i64);

#[inline]
fn cell_of(p: &nalgebra::Vector3<f64>, inv_size: f64) -> Cell {
    (
        (p.x * inv_size).floor() as i64,
        (p.y * inv_size).floor() as i64,
        (p.z * inv_size).floor() as i64,
    )
}

/// Largest subset of `candidates` connected by links shorter than `epsilon`.
///
/// Ties go to the cluster found first, i.e. the one containing the earliest
/// candidate. The result keeps the order of `candidates`.
pub(super) fn largest_cluster(
    points: &[PointWithNormal],
    candidates: &[usize],
    epsilon: f64,
) -> Vec<usize> {
    if candidates.len() <= 1 {
        return candidates.to_vec();
    }
    let inv_size = 1.0 / epsilon;
    let eps_sq = epsilon * epsilon;

    let mut buckets: HashMap<Cell, Vec<usize>> = HashMap::new();
    for (slot, &idx) in candidates.iter().enumerate() {
        buckets
            .entry(cell_of(&points[idx].point, inv_size))
            .or_default()
            .push(slot);
    }

    let mut component = vec![usize::MAX; candidates.len()];
    let mut best_id = 0usize;
    let mut best_size = 0usize;
    let mut next_id = 0usize;
    let mut queue = VecDeque::new();

    for start in 0..candidates.len() {
        if component[start] != usize::MAX {
            continue;
        }
        let id = next_id;
        next_id += 1;
        component[start] = id;
        queue.push_back(start);
        let mut size = 0usize;

        while let Some(slot) = queue.pop_front() {
            size += 1;
            let p = &points[candidates[slot]].point;
            let (cx, cy, cz) = cell_of(p, inv_size);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(bucket) = buckets.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for &other in bucket {
                            if component[other] != usize::MAX {
                                continue;
                            }
                            let q = &points[candidates[other]].point;
                            if (p - q).norm_squared() <= eps_sq {
                                component[other] = id;
                                queue.push_back(other);
                            }
                        }
                    }
                }
            }
        }

        if size > best_size {
            best_size = size;
            best_id = id;
        }
    }

    candidates
        .iter()
        .zip(&component)
        .filter(|(_, &c)| c == best_id)
        .map(|(&idx, _)| idx)
        .collect()
}
