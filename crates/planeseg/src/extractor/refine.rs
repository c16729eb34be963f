//! Splitting a non-planar region with the region detector and relabelling
//! its cells.

use nalgebra::Vector3;

use super::global_fit::accept_plane;
use super::SlidingWindowPlaneExtractor;
use crate::fit::PointAccumulator;
use crate::grid::HeightGrid;
use crate::ransac::{region_seed, PointWithNormal};
use crate::result::SegmentedPlanesMap;

impl SlidingWindowPlaneExtractor {
    /// Replace region `label` by the sub-planes found in `points`.
    ///
    /// The first sub-plane keeps `label`, each further one takes the next
    /// free label. Cells of every sub-plane are relabelled whether or not the
    /// sub-plane is accepted; unassigned cells become background.
    pub(super) fn refine_label_with_ransac(
        &mut self,
        grid: &HeightGrid,
        label: u32,
        points: &[PointWithNormal],
    ) {
        let seed = region_seed(self.config.ransac.seed, label);
        let detection = self.detector.detect(points, seed);
        let params = &self.config.extractor;
        let map = &mut self.segmented_planes_map;

        for (k, plane) in detection.planes.iter().enumerate() {
            let plane_label = if k == 0 {
                label
            } else {
                map.highest_label += 1;
                map.highest_label
            };

            let mut acc = PointAccumulator::default();
            for &i in &plane.indices {
                let point = &points[i].point;
                acc.add(point);
                if plane_label != label {
                    relabel_cell(grid, map, point, plane_label);
                }
            }

            let Some(support) = acc.mean() else {
                continue;
            };
            let normal = acc.fit().normal;
            match accept_plane(support, &normal, params) {
                Some(parameters) => map.label_plane_parameters.push((plane_label, parameters)),
                None => tracing::debug!(
                    "label {}: sub-plane {} of {} rejected",
                    label,
                    plane_label,
                    detection.planes.len()
                ),
            }
        }

        for &i in &detection.unassigned {
            relabel_cell(grid, map, &points[i].point, 0);
        }
        tracing::debug!(
            "label {} refined into {} sub-planes, {} cells demoted",
            label,
            detection.planes.len(),
            detection.unassigned.len()
        );
    }
}

fn relabel_cell(grid: &HeightGrid, map: &mut SegmentedPlanesMap, point: &Vector3<f64>, label: u32) {
    match grid.index_of(point.xy()) {
        Some((row, col)) => map.set_label(row, col, label),
        None => tracing::warn!(
            "point ({:.3}, {:.3}) maps outside the grid, not relabelled",
            point.x,
            point.y
        ),
    }
}
