//! Per-region global plane fit and planarity test.

use image::Luma;
use nalgebra::Vector3;

use super::SlidingWindowPlaneExtractor;
use crate::config::ExtractorParams;
use crate::fit::{angle_between_unit_vectors_deg, inclination_deg, PointAccumulator};
use crate::grid::HeightGrid;
use crate::ransac::PointWithNormal;
use crate::result::{LabelImage, PlaneParameters};
use crate::sliding_window::NormalField;

impl SlidingWindowPlaneExtractor {
    /// Fit every label produced by the labelling pass. Labels minted during
    /// refinement are not revisited.
    pub(super) fn extract_plane_parameters_from_labeled_image(
        &mut self,
        grid: &HeightGrid,
        heights: &[f32],
    ) {
        let initial_highest = self.segmented_planes_map.highest_label;
        let regions = cells_by_label(&self.segmented_planes_map.labeled_image, initial_highest);

        let mut points = std::mem::take(&mut self.points_with_normal);
        for (label, cells) in regions.iter().enumerate().skip(1) {
            let acc = collect_region_points(grid, heights, &self.surface_normals, cells, &mut points);
            self.compute_plane_parameters_for_label(grid, label as u32, &acc, &points);
        }
        self.points_with_normal = points;
    }

    fn compute_plane_parameters_for_label(
        &mut self,
        grid: &HeightGrid,
        label: u32,
        acc: &PointAccumulator,
        points: &[PointWithNormal],
    ) {
        let params = &self.config.extractor;
        let min_points = params.min_number_points_per_label.max(3);
        if acc.count() < min_points {
            tracing::debug!("label {}: {} points, below minimum {}", label, acc.count(), min_points);
            return;
        }
        let Some(support) = acc.mean() else {
            return;
        };
        let normal = acc.fit().normal;

        if params.include_ransac_refinement && !is_globally_planar(&normal, &support, points, params)
        {
            tracing::debug!("label {}: not globally planar, refining", label);
            self.refine_label_with_ransac(grid, label, points);
            return;
        }
        match accept_plane(support, &normal, params) {
            Some(plane) => self
                .segmented_planes_map
                .label_plane_parameters
                .push((label, plane)),
            None => tracing::debug!(
                "label {}: inclination {:.1} deg rejected",
                label,
                inclination_deg(&normal)
            ),
        }
    }
}

/// Cells `(row, col)` of every label `0..=highest_label`, in row-major order.
fn cells_by_label(labels: &LabelImage, highest_label: u32) -> Vec<Vec<(usize, usize)>> {
    let mut regions = vec![Vec::new(); highest_label as usize + 1];
    for (col, row, &Luma([label])) in labels.enumerate_pixels() {
        if label > 0 && label <= highest_label {
            regions[label as usize].push((row as usize, col as usize));
        }
    }
    regions
}

/// World points and local normals of a region's cells.
///
/// Cells with a missing height or without a normal from the current
/// extraction are skipped. `points` is cleared first.
fn collect_region_points(
    grid: &HeightGrid,
    heights: &[f32],
    normals: &NormalField,
    cells: &[(usize, usize)],
    points: &mut Vec<PointWithNormal>,
) -> PointAccumulator {
    points.clear();
    let mut acc = PointAccumulator::default();
    for &(row, col) in cells {
        let index = grid.linear_index(row, col);
        let height = heights[index];
        if !height.is_finite() {
            continue;
        }
        let Some(normal) = normals.get(index) else {
            continue;
        };
        let xy = grid.position_of(row, col);
        let point = Vector3::new(xy.x, xy.y, height as f64);
        acc.add(&point);
        points.push(PointWithNormal::new(point, normal));
    }
    acc
}

/// Every point lies within the distance threshold of the plane and its local
/// normal within the angle threshold of the plane normal.
pub(super) fn is_globally_planar(
    normal: &Vector3<f64>,
    support: &Vector3<f64>,
    points: &[PointWithNormal],
    params: &ExtractorParams,
) -> bool {
    let offset = normal.dot(support);
    points.iter().all(|p| {
        (normal.dot(&p.point) - offset).abs() <= params.global_plane_fit_distance_error_threshold
            && angle_between_unit_vectors_deg(&p.normal, normal)
                <= params.global_plane_fit_angle_error_threshold_degrees
    })
}

/// Plane parameters if the normal is flat enough.
pub(super) fn accept_plane(
    support: Vector3<f64>,
    normal: &Vector3<f64>,
    params: &ExtractorParams,
) -> Option<PlaneParameters> {
    (inclination_deg(normal) < params.plane_inclination_threshold_degrees)
        .then(|| PlaneParameters::from_support_and_normal(support, normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::grid_from_fn;

    fn flat_points(offsets: &[f64]) -> Vec<PointWithNormal> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &dz)| {
                PointWithNormal::new(Vector3::new(i as f64 * 0.1, 0.0, dz), Vector3::z())
            })
            .collect()
    }

    #[test]
    fn distance_threshold_is_inclusive() {
        let params = ExtractorParams {
            global_plane_fit_distance_error_threshold: 0.025,
            ..Default::default()
        };
        let support = Vector3::zeros();
        let within = flat_points(&[0.0, 0.02, -0.02]);
        assert!(is_globally_planar(&Vector3::z(), &support, &within, &params));
        let beyond = flat_points(&[0.0, 0.03, 0.0]);
        assert!(!is_globally_planar(&Vector3::z(), &support, &beyond, &params));
        let below = flat_points(&[0.0, -0.03, 0.0]);
        assert!(!is_globally_planar(&Vector3::z(), &support, &below, &params));
    }

    #[test]
    fn diverging_local_normal_fails() {
        let params = ExtractorParams::default();
        let mut points = flat_points(&[0.0, 0.0, 0.0]);
        let tilt = 30.0f64.to_radians();
        points[1].normal = Vector3::new(tilt.sin(), 0.0, tilt.cos());
        assert!(!is_globally_planar(&Vector3::z(), &Vector3::zeros(), &points, &params));
        let tilt = 20.0f64.to_radians();
        points[1].normal = Vector3::new(tilt.sin(), 0.0, tilt.cos());
        assert!(is_globally_planar(&Vector3::z(), &Vector3::zeros(), &points, &params));
    }

    #[test]
    fn steep_planes_are_not_accepted() {
        let params = ExtractorParams::default();
        let steep = Vector3::new(1.0, 0.0, 1.0).normalize();
        assert!(accept_plane(Vector3::zeros(), &steep, &params).is_none());
        let plane = accept_plane(Vector3::new(1.0, 2.0, 3.0), &Vector3::z(), &params).unwrap();
        assert_eq!(plane.position_in_world, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn cells_without_height_or_normal_are_skipped() {
        let mut grid = grid_from_fn(3, 3, 0.1, [0.0, 0.0], |_, _| 1.0);
        let mut heights = grid.layer("elevation").unwrap().to_vec();
        heights[grid.linear_index(0, 1)] = f32::NAN;
        grid.add_layer("elevation", heights.clone()).unwrap();

        let mut normals = NormalField::new();
        normals.reset(grid.len());
        for index in 0..grid.len() {
            if index != grid.linear_index(2, 2) {
                normals.set(index, Vector3::z());
            }
        }

        let cells = [(0, 0), (0, 1), (1, 1), (2, 2)];
        let mut points = vec![PointWithNormal::new(Vector3::x(), Vector3::x())];
        let acc = collect_region_points(&grid, &heights, &normals, &cells, &mut points);
        assert_eq!(acc.count(), 2);
        assert_eq!(points.len(), 2);
        let p = grid.position_of(1, 1);
        assert_eq!(points[1].point, Vector3::new(p.x, p.y, 1.0));
    }

    #[test]
    fn cells_are_grouped_by_label() {
        let mut labels = LabelImage::new(3, 2);
        labels.put_pixel(0, 0, Luma([2]));
        labels.put_pixel(2, 1, Luma([2]));
        labels.put_pixel(1, 1, Luma([1]));
        let regions = cells_by_label(&labels, 2);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[1], vec![(1, 1)]);
        assert_eq!(regions[2], vec![(0, 0), (1, 2)]);
    }
}
