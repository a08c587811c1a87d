#![warn(missing_docs)]

//! FDM slicing core.
//!
//! Turns a normalized triangle mesh plus job parameters into ordered
//! toolpath layers: bed placement, layer planning, plane cross-sections,
//! wall/skin/infill/support regions, pattern synthesis, and per-layer
//! ordering. G-code emission lives in `kasynel-slicer-gcode`.
//!
//! The pipeline is single-threaded and deterministic for a given input;
//! each stage produces immutable data consumed by the next. Progress is
//! reported through a cheap callback and cancellation is polled at layer
//! boundaries and inside the heavy inner loops.
//!
//! # Example
//!
//! ```ignore
//! use kasynel_slicer::{slice_layers, CancelToken, JobParams};
//!
//! let params = JobParams::default();
//! let cancel = CancelToken::new();
//! let (result, warnings) = slice_layers(&mesh, &params, &|_, _| {}, &cancel);
//! let job = result?;
//! println!("layers: {}", job.stats.layer_count);
//! ```

pub mod clip;
pub mod error;
pub mod infill;
pub mod order;
pub mod params;
pub mod path;
pub mod regions;
pub mod slice;
pub mod support;

pub use error::{Result, SlicerError, Warning};
pub use order::OrderedLayer;
pub use params::{InfillPattern, JobParams, SeamPosition, SupportPattern};
pub use path::{PathKind, Polygon, PolygonSet, Polyline, ToolPath};
pub use slice::LayerStep;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kasynel_math::{Point2, Tolerance};
use kasynel_mesh::TriangleMesh;
use serde::{Deserialize, Serialize};

/// Pipeline stages, as reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Mesh validation and bed placement.
    Prepare,
    /// Plane cross-sectioning.
    Section,
    /// Wall, skin, and support region derivation.
    Regions,
    /// Pattern synthesis and layer ordering.
    Paths,
    /// G-code emission.
    Emit,
}

/// Cooperative cancellation flag, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, un-fired token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the pipeline returns `Cancelled` at its next
    /// poll point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Aggregate statistics for a sliced job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintStats {
    /// Number of layers.
    pub layer_count: usize,
    /// Consumed filament length (mm).
    pub filament_mm: f64,
    /// Filament weight (grams, PLA density 1.24 g/cm^3).
    pub filament_grams: f64,
    /// Rough print time estimate (seconds), deposition only.
    pub print_time_seconds: f64,
    /// Placed object bounds, min corner.
    pub bounds_min: [f64; 3],
    /// Placed object bounds, max corner.
    pub bounds_max: [f64; 3],
}

/// Result of the geometry pipeline: ordered layers plus statistics.
#[derive(Debug, Clone)]
pub struct SlicedJob {
    /// Layers in print order.
    pub layers: Vec<OrderedLayer>,
    /// Job statistics.
    pub stats: PrintStats,
}

/// Run the geometry pipeline.
///
/// Warnings are collected and returned alongside the result, on success
/// and failure alike. The mesh is read-only; all intermediate memory is
/// owned by the call and released on return.
pub fn slice_layers(
    mesh: &TriangleMesh,
    params: &JobParams,
    progress: &dyn Fn(Stage, f64),
    cancel: &CancelToken,
) -> (Result<SlicedJob>, Vec<Warning>) {
    let mut warnings = Vec::new();
    let result = run_pipeline(mesh, params, progress, cancel, &mut warnings);
    (result, warnings)
}

fn run_pipeline(
    mesh: &TriangleMesh,
    params: &JobParams,
    progress: &dyn Fn(Stage, f64),
    cancel: &CancelToken,
    warnings: &mut Vec<Warning>,
) -> Result<SlicedJob> {
    params.validate(warnings)?;
    let tol = Tolerance::DEFAULT;

    let placed = kasynel_mesh::place_on_bed(mesh, params.bed_size)?;
    progress(Stage::Prepare, 1.0);
    log::debug!("placed mesh, z_max={:.3}mm", placed.z_max);

    let steps = slice::plan_layers(placed.z_max, params)?;
    let layer_count = steps.len();

    // Hold every outline in memory: skin windows look up to
    // max(top_layers, bottom_layers) neighbors both ways.
    let input = slice::SectionInput::from_mesh(&placed.mesh);
    let mut outlines: Vec<PolygonSet> = Vec::with_capacity(layer_count);
    for step in &steps {
        if cancel.is_cancelled() {
            return Err(SlicerError::Cancelled);
        }
        let outline =
            slice::cross_section(&input, step.slice_z, step.index, &tol, cancel, warnings)?;
        outlines.push(outline);
        progress(Stage::Section, (step.index + 1) as f64 / layer_count as f64);
    }
    if outlines.iter().all(|o| o.is_empty()) {
        return Err(SlicerError::EmptyJob);
    }
    log::debug!("sectioned {layer_count} layers");

    let support_plan = support::plan_support(&outlines, params);
    progress(Stage::Regions, 1.0);

    let mut layers: Vec<OrderedLayer> = Vec::with_capacity(layer_count);
    let mut cursor = Point2::origin();
    let mut deposited_mm = 0.0;
    let mut time_s = 0.0;
    let lw = params.line_width();

    for step in &steps {
        if cancel.is_cancelled() {
            return Err(SlicerError::Cancelled);
        }
        let regions = regions::build_regions(&outlines, step, params, &support_plan, warnings);

        let (skin, fill, sup) = if regions.spiral {
            (Vec::new(), Vec::new(), Vec::new())
        } else {
            (
                infill::skin_paths(&regions.skin, step.index, lw),
                infill::sparse_paths(&regions.fill, params, step.index),
                infill::support_paths(
                    &support_plan,
                    &regions.support_columns,
                    &outlines[step.index],
                    params,
                    step.index,
                ),
            )
        };

        let layer = order::order_layer(&regions, skin, fill, sup, step, params, &mut cursor);
        for path in &layer.paths {
            let len = path.length();
            deposited_mm += len;
            time_s += len / feed_estimate(path.kind, step.index, params);
        }
        layers.push(layer);
        progress(Stage::Paths, (step.index + 1) as f64 / layer_count as f64);
    }

    // Filament consumption from bead cross-section vs. filament
    // cross-section; weight assumes PLA.
    let filament_area = std::f64::consts::PI * (params.filament_diameter / 2.0).powi(2);
    let bead_area = lw * params.layer_height;
    let filament_mm = deposited_mm * bead_area / filament_area;
    let filament_grams = filament_area * filament_mm / 1000.0 * 1.24;

    let (bmin, bmax) = placed
        .mesh
        .bounds()
        .ok_or_else(|| SlicerError::InvalidMesh("mesh lost its bounds".into()))?;

    let stats = PrintStats {
        layer_count,
        filament_mm,
        filament_grams,
        print_time_seconds: time_s,
        bounds_min: [bmin.x, bmin.y, bmin.z],
        bounds_max: [bmax.x, bmax.y, bmax.z],
    };
    log::debug!(
        "pipeline done: {} layers, {:.0}mm filament",
        stats.layer_count,
        stats.filament_mm
    );

    Ok(SlicedJob { layers, stats })
}

/// Deposition feedrate used for the time estimate (mm/s).
fn feed_estimate(kind: PathKind, layer: usize, params: &JobParams) -> f64 {
    if layer == 0 {
        return params.first_layer_speed;
    }
    match kind {
        PathKind::WallOuter => params.outer_perimeter_speed,
        PathKind::WallInner => params.print_speed,
        PathKind::Skin => params.top_bottom_speed,
        PathKind::Fill | PathKind::Support => params.infill_speed,
        PathKind::Brim => params.first_layer_speed,
        PathKind::Travel => params.travel_speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasynel_mesh::make_box;

    fn cube_params() -> JobParams {
        JobParams::default()
    }

    #[test]
    fn test_cube_pipeline_end_to_end() {
        let mesh = make_box([0.0, 0.0, 0.0], [20.0, 20.0, 20.0]);
        let cancel = CancelToken::new();
        let (result, warnings) = slice_layers(&mesh, &cube_params(), &|_, _| {}, &cancel);
        let job = result.unwrap();

        assert_eq!(job.stats.layer_count, 100);
        assert_eq!(job.layers.len(), 100);
        assert!(warnings.is_empty());

        for layer in &job.layers {
            assert!(
                layer.paths.iter().any(|p| p.kind == PathKind::WallOuter),
                "layer {} missing outer wall",
                layer.index
            );
            assert!(layer.paths.iter().any(|p| p.kind == PathKind::WallInner));
        }

        // Skin on the first and last 4 layers, sparse fill in between.
        for layer in &job.layers[..4] {
            assert!(layer.paths.iter().any(|p| p.kind == PathKind::Skin));
        }
        for layer in &job.layers[96..] {
            assert!(layer.paths.iter().any(|p| p.kind == PathKind::Skin));
        }
        let mid = &job.layers[50];
        assert!(mid.paths.iter().any(|p| p.kind == PathKind::Fill));
        assert!(!mid.paths.iter().any(|p| p.kind == PathKind::Skin));

        assert!(job.stats.filament_mm > 0.0);
        assert!(job.stats.print_time_seconds > 0.0);
    }

    #[test]
    fn test_zero_infill_keeps_walls_and_skin() {
        let mesh = make_box([0.0, 0.0, 0.0], [10.0, 10.0, 10.0]);
        let params = JobParams {
            infill_density: 0.0,
            ..Default::default()
        };
        let cancel = CancelToken::new();
        let (result, _) = slice_layers(&mesh, &params, &|_, _| {}, &cancel);
        let job = result.unwrap();
        let mid = &job.layers[job.layers.len() / 2];
        assert!(!mid.paths.iter().any(|p| p.kind == PathKind::Fill));
        assert!(mid.paths.iter().any(|p| p.kind == PathKind::WallOuter));
    }

    #[test]
    fn test_wall_count_one_has_no_inner() {
        let mesh = make_box([0.0, 0.0, 0.0], [10.0, 10.0, 10.0]);
        let params = JobParams {
            wall_count: 1,
            ..Default::default()
        };
        let cancel = CancelToken::new();
        let (result, _) = slice_layers(&mesh, &params, &|_, _| {}, &cancel);
        let job = result.unwrap();
        for layer in &job.layers {
            assert!(!layer.paths.iter().any(|p| p.kind == PathKind::WallInner));
            assert!(layer.paths.iter().any(|p| p.kind == PathKind::WallOuter));
        }
    }

    #[test]
    fn test_thin_pillar_warns_and_skips_fill() {
        let mesh = make_box([0.0, 0.0, 0.0], [1.2, 1.2, 10.0]);
        let params = JobParams {
            wall_count: 3,
            ..Default::default()
        };
        let cancel = CancelToken::new();
        let (result, warnings) = slice_layers(&mesh, &params, &|_, _| {}, &cancel);
        let job = result.unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, Warning::WallOffsetEmpty { .. })));
        for layer in &job.layers {
            assert!(!layer.paths.iter().any(|p| p.kind == PathKind::Fill));
            assert!(!layer.paths.iter().any(|p| p.kind == PathKind::Skin));
        }
    }

    #[test]
    fn test_overhang_gets_support() {
        // T shape: narrow trunk, wide crossbar on top.
        let mut mesh = make_box([8.0, 8.0, 0.0], [4.0, 4.0, 10.0]);
        let bar = make_box([0.0, 8.0, 10.0], [20.0, 4.0, 3.0]);
        let offset = mesh.num_vertices() as u32;
        mesh.vertices.extend_from_slice(&bar.vertices);
        mesh.indices.extend(bar.indices.iter().map(|&i| i + offset));

        let params = JobParams {
            support_enabled: true,
            support_threshold: 45.0,
            support_density: 15.0,
            ..Default::default()
        };
        let cancel = CancelToken::new();
        let (result, _) = slice_layers(&mesh, &params, &|_, _| {}, &cancel);
        let job = result.unwrap();

        let overhang_start = job
            .layers
            .iter()
            .position(|l| l.paths.iter().any(|p| p.kind == PathKind::Support))
            .expect("no support emitted");
        // Support sits under the crossbar (z = 10), not above it.
        assert!(job.layers[overhang_start].z < 10.0 + 0.2);
        for layer in job.layers.iter().filter(|l| l.z > 10.5) {
            assert!(!layer.paths.iter().any(|p| p.kind == PathKind::Support));
        }
    }

    #[test]
    fn test_cancellation_mid_section() {
        let mesh = make_box([0.0, 0.0, 0.0], [20.0, 20.0, 20.0]);
        let cancel = CancelToken::new();
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_in_cb = fired.clone();
        let cancel_in_cb = cancel.clone();
        let progress = move |stage: Stage, frac: f64| {
            if stage == Stage::Section && frac >= 0.5 && !fired_in_cb.swap(true, Ordering::Relaxed)
            {
                cancel_in_cb.cancel();
            }
        };
        let (result, _) = slice_layers(&mesh, &cube_params(), &progress, &cancel);
        assert!(matches!(result, Err(SlicerError::Cancelled)));
    }

    #[test]
    fn test_progress_fractions_bounded() {
        let mesh = make_box([0.0, 0.0, 0.0], [10.0, 10.0, 10.0]);
        let cancel = CancelToken::new();
        let seen = std::sync::Mutex::new(Vec::new());
        let progress = |stage: Stage, frac: f64| {
            assert!((0.0..=1.0).contains(&frac), "{stage:?} frac {frac}");
            seen.lock().unwrap().push(stage);
        };
        let (result, _) = slice_layers(&mesh, &cube_params(), &progress, &cancel);
        result.unwrap();
        let seen = seen.into_inner().unwrap();
        assert!(seen.contains(&Stage::Prepare));
        assert!(seen.contains(&Stage::Section));
        assert!(seen.contains(&Stage::Paths));
    }
}
