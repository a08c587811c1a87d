//! The G-code emitter state machine.
//!
//! All machine side effects live in one owning state record; each
//! transition (travel, retract, prime, extrude, fan, temperature, layer
//! start) is one method mutating it. The retract/prime pairing invariant
//! is enforced structurally: priming happens inside `travel_to`, the only
//! place a retraction can be left pending.

use kasynel_math::Point2;
use kasynel_slicer::{
    CancelToken, JobParams, OrderedLayer, PathKind, Result, SlicedJob, SlicerError, Stage,
    ToolPath,
};

use crate::template::render;

/// Millimetres of filament consumed per millimetre of bead.
///
/// Bead cross-section `line_width * layer_height` over the filament
/// cross-section `pi * (d/2)^2`.
pub fn extrusion_per_mm(line_width: f64, layer_height: f64, filament_diameter: f64) -> f64 {
    line_width * layer_height / (std::f64::consts::PI * (filament_diameter / 2.0).powi(2))
}

/// Feedrate (mm/s) for a path kind, with the first-layer override.
fn feed_for(kind: PathKind, layer: usize, params: &JobParams) -> f64 {
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

/// Emitter state: current machine position, extruder, and peripherals.
#[derive(Debug)]
pub struct GcodeEmitter<'a> {
    params: &'a JobParams,
    out: String,
    x: f64,
    y: f64,
    z: f64,
    e: f64,
    retracted: bool,
    fan_pct: Option<u32>,
    positioned: bool,
}

impl<'a> GcodeEmitter<'a> {
    /// Fresh emitter at the machine origin with a reset extruder.
    pub fn new(params: &'a JobParams) -> Self {
        Self {
            params,
            out: String::new(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            e: 0.0,
            retracted: false,
            fan_pct: None,
            positioned: false,
        }
    }

    fn push(&mut self, line: String) {
        self.out.push_str(&line);
        self.out.push('\n');
    }

    /// Header comments, start template, first-layer heat-up, first fan.
    pub fn preamble(&mut self, layer_count: usize) {
        let p = self.params;
        self.push("; Generated by Kasynel_Slicer".into());
        self.push(format!("; LAYER_COUNT:{layer_count}"));
        self.push(format!("; LAYER_HEIGHT:{}", p.layer_height));
        self.out
            .push_str(&render(&p.start_gcode, p.print_temp_first_layer, p.bed_temp));
        self.push(format!("M104 S{} ; Set nozzle temperature", p.print_temp_first_layer));
        self.push(format!("M140 S{} ; Set bed temperature", p.bed_temp));
        self.push(format!("M109 S{} ; Wait for nozzle temperature", p.print_temp_first_layer));
        self.push(format!("M190 S{} ; Wait for bed temperature", p.bed_temp));
        self.set_fan(p.fan_first_layer);
    }

    /// Layer prologue: comments, fan kick-in, temperature switch, Z move.
    pub fn begin_layer(&mut self, layer: &OrderedLayer) {
        let p = self.params;
        self.push(format!("; LAYER:{}", layer.index));
        self.push(format!("; Z:{:.3}", layer.z));
        if layer.index == p.fan_kick_in_layer as usize {
            self.set_fan(p.fan_speed);
        }
        if layer.index == 1 {
            self.push(format!("M104 S{} ; Switch to print temperature", p.print_temp));
        }
        if !layer.spiral {
            self.push(format!("G0 Z{:.3} F{:.0}", layer.z, p.travel_speed * 60.0));
            self.z = layer.z;
        }
    }

    /// Switch the part-cooling fan, skipping no-op changes.
    pub fn set_fan(&mut self, pct: u32) {
        if self.fan_pct == Some(pct) {
            return;
        }
        if pct == 0 {
            self.push("M107 ; Fan off".into());
        } else {
            let duty = ((pct as f64) * 2.55).round() as u32;
            self.push(format!("M106 S{duty} ; Fan {pct}%"));
        }
        self.fan_pct = Some(pct);
    }

    fn retract(&mut self) {
        let p = self.params;
        self.e -= p.retraction_distance;
        self.push(format!("G1 E{:.5} F{:.0} ; Retract", self.e, p.retraction_speed * 60.0));
        self.retracted = true;
    }

    fn prime(&mut self) {
        let p = self.params;
        self.e += p.retraction_distance + p.retraction_extra_prime;
        self.push(format!("G1 E{:.5} F{:.0} ; Prime", self.e, p.retraction_speed * 60.0));
        self.retracted = false;
    }

    /// Travel to `to`, retracting and hopping per the job parameters.
    ///
    /// Spiral layers never retract. Any pending retraction is primed
    /// before the method returns, so the next extrusion always follows a
    /// prime.
    pub fn travel_to(&mut self, to: Point2, spiral: bool) {
        let p = self.params;
        let dist = ((to.x - self.x).powi(2) + (to.y - self.y).powi(2)).sqrt();
        if self.positioned && dist < 1e-6 {
            return;
        }

        let mut hopped = false;
        if self.positioned
            && !spiral
            && p.retraction_enabled
            && !self.retracted
            && dist >= p.retraction_min_distance
        {
            self.retract();
            if p.retraction_z_hop > 0.0 {
                self.push(format!(
                    "G1 Z{:.3} F{:.0} ; Hop",
                    self.z + p.retraction_z_hop,
                    p.travel_speed * 60.0
                ));
                hopped = true;
            }
        }

        self.push(format!(
            "G0 X{:.3} Y{:.3} F{:.0}",
            to.x,
            to.y,
            p.travel_speed * 60.0
        ));
        self.x = to.x;
        self.y = to.y;
        self.positioned = true;

        if hopped {
            self.push(format!("G1 Z{:.3} F{:.0}", self.z, p.travel_speed * 60.0));
        }
        if self.retracted {
            self.prime();
        }
    }

    /// Emit one toolpath: type comment, travel, then extrusion moves.
    pub fn emit_path(&mut self, path: &ToolPath, layer: &OrderedLayer) {
        if path.points.len() < 2 {
            return;
        }
        if let Some(tag) = path.kind.type_tag() {
            self.push(format!("; TYPE:{tag}"));
        }
        self.travel_to(path.points[0], layer.spiral);

        let feed = feed_for(path.kind, layer.index, self.params) * 60.0;
        let e_per_mm = extrusion_per_mm(
            self.params.line_width(),
            layer.height,
            self.params.filament_diameter,
        );

        if layer.spiral && path.closed {
            self.extrude_spiral(path, layer, feed, e_per_mm);
            return;
        }

        let n = path.points.len();
        let last = if path.closed { n + 1 } else { n };
        for k in 1..last {
            let to = path.points[k % n];
            self.extrude_to(to, feed, e_per_mm);
        }
    }

    fn extrude_to(&mut self, to: Point2, feed: f64, e_per_mm: f64) {
        let dist = ((to.x - self.x).powi(2) + (to.y - self.y).powi(2)).sqrt();
        if dist < 1e-9 {
            return;
        }
        self.e += dist * e_per_mm;
        self.push(format!(
            "G1 X{:.3} Y{:.3} E{:.5} F{feed:.0}",
            to.x, to.y, self.e
        ));
        self.x = to.x;
        self.y = to.y;
    }

    /// Extrude a closed ring while interpolating Z across its length, so
    /// the nozzle climbs one layer height per revolution.
    fn extrude_spiral(&mut self, path: &ToolPath, layer: &OrderedLayer, feed: f64, e_per_mm: f64) {
        let total = path.length();
        if total < 1e-9 {
            return;
        }
        let z_base = layer.z - layer.height;
        let n = path.points.len();
        let mut s = 0.0;
        for k in 1..=n {
            let to = path.points[k % n];
            let dist = ((to.x - self.x).powi(2) + (to.y - self.y).powi(2)).sqrt();
            if dist < 1e-9 {
                continue;
            }
            s += dist;
            let z = z_base + (s / total) * layer.height;
            self.e += dist * e_per_mm;
            self.push(format!(
                "G1 X{:.3} Y{:.3} Z{z:.3} E{:.5} F{feed:.0}",
                to.x, to.y, self.e
            ));
            self.x = to.x;
            self.y = to.y;
            self.z = z;
        }
    }

    /// End-of-job sequence: end template, then fan off.
    pub fn finish(mut self) -> String {
        self.push("; End of print".into());
        let p = self.params;
        self.out
            .push_str(&render(&p.end_gcode, p.print_temp, p.bed_temp));
        self.push("M107 ; Fan off".into());
        self.out
    }
}

/// Walk a sliced job and emit the complete G-code program.
///
/// Cancellation is polled at layer boundaries; on cancellation the
/// partial text is dropped and `Cancelled` returned, so callers never
/// observe a truncated program.
pub fn generate_gcode(
    job: &SlicedJob,
    params: &JobParams,
    progress: &dyn Fn(Stage, f64),
    cancel: &CancelToken,
) -> Result<String> {
    let mut emitter = GcodeEmitter::new(params);
    emitter.preamble(job.stats.layer_count);

    let count = job.layers.len().max(1);
    for (i, layer) in job.layers.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(SlicerError::Cancelled);
        }
        emitter.begin_layer(layer);
        for path in &layer.paths {
            emitter.emit_path(path, layer);
        }
        progress(Stage::Emit, (i + 1) as f64 / count as f64);
    }

    log::debug!("emitted {} layers of G-code", job.layers.len());
    Ok(emitter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kasynel_slicer::Polyline;

    fn layer(index: usize, spiral: bool) -> OrderedLayer {
        OrderedLayer {
            index,
            z: 0.3 + index as f64 * 0.2,
            height: if index == 0 { 0.3 } else { 0.2 },
            spiral,
            paths: Vec::new(),
        }
    }

    fn line_path(x0: f64, x1: f64, y: f64, kind: PathKind) -> ToolPath {
        ToolPath::from_line(
            Polyline::new(vec![Point2::new(x0, y), Point2::new(x1, y)]),
            kind,
        )
    }

    #[test]
    fn test_extrusion_per_mm_formula() {
        let e = extrusion_per_mm(0.4, 0.2, 1.75);
        let expected = 0.4 * 0.2 / (std::f64::consts::PI * 0.875 * 0.875);
        assert_relative_eq!(e, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_travel_retracts_and_primes() {
        let params = JobParams::default();
        let mut em = GcodeEmitter::new(&params);
        let l = layer(1, false);

        em.emit_path(&line_path(0.0, 10.0, 0.0, PathKind::Fill), &l);
        let e_after_first = em.e;
        // Far jump: retract, travel, prime.
        em.emit_path(&line_path(100.0, 110.0, 0.0, PathKind::Fill), &l);

        let text = em.finish();
        assert!(text.contains("; Retract"));
        assert!(text.contains("; Prime"));
        let retract_line = text
            .lines()
            .find(|l| l.ends_with("; Retract"))
            .unwrap();
        let e_val: f64 = retract_line
            .split_whitespace()
            .find_map(|t| t.strip_prefix('E').and_then(|v| v.parse().ok()))
            .unwrap();
        assert_relative_eq!(e_val, e_after_first - params.retraction_distance, epsilon = 1e-4);
    }

    #[test]
    fn test_short_travel_skips_retraction() {
        let params = JobParams::default();
        let mut em = GcodeEmitter::new(&params);
        let l = layer(1, false);
        em.emit_path(&line_path(0.0, 10.0, 0.0, PathKind::Fill), &l);
        // 0.5mm jump is under retraction_min_distance (1.5mm).
        em.emit_path(&line_path(10.5, 20.0, 0.0, PathKind::Fill), &l);
        let text = em.finish();
        assert!(!text.contains("; Retract"));
    }

    #[test]
    fn test_z_hop_brackets_travel() {
        let params = JobParams {
            retraction_z_hop: 0.4,
            ..Default::default()
        };
        let mut em = GcodeEmitter::new(&params);
        let l = layer(1, false);
        em.begin_layer(&l);
        em.emit_path(&line_path(0.0, 10.0, 0.0, PathKind::Fill), &l);
        em.emit_path(&line_path(100.0, 110.0, 0.0, PathKind::Fill), &l);
        let text = em.finish();
        assert!(text.contains("Z0.900 F7200 ; Hop"));
        let hop_at = text.find("; Hop").unwrap();
        let back_at = text[hop_at..].find("G1 Z0.500").unwrap();
        assert!(back_at > 0);
    }

    #[test]
    fn test_first_layer_speed_override() {
        let params = JobParams::default();
        let mut em = GcodeEmitter::new(&params);
        em.emit_path(&line_path(0.0, 10.0, 0.0, PathKind::Fill), &layer(0, false));
        let text = em.finish();
        // 20mm/s * 60 = 1200 on layer 0, not the 60mm/s infill speed.
        assert!(text.contains("F1200"));
        assert!(!text.contains("F3600"));
    }

    #[test]
    fn test_type_comments_emitted() {
        let params = JobParams::default();
        let mut em = GcodeEmitter::new(&params);
        let l = layer(1, false);
        em.emit_path(&line_path(0.0, 10.0, 0.0, PathKind::Skin), &l);
        em.emit_path(&line_path(0.0, 10.0, 5.0, PathKind::Support), &l);
        let text = em.finish();
        assert!(text.contains("; TYPE:SKIN"));
        assert!(text.contains("; TYPE:SUPPORT"));
    }

    #[test]
    fn test_spiral_interpolates_z() {
        let params = JobParams::default();
        let mut em = GcodeEmitter::new(&params);
        let l = OrderedLayer {
            index: 5,
            z: 1.3,
            height: 0.2,
            spiral: true,
            paths: Vec::new(),
        };
        let ring = kasynel_slicer::Polygon::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]);
        let path = ToolPath::from_ring(&ring, 0, PathKind::WallOuter);
        em.emit_path(&path, &l);
        let text = em.finish();

        // Quarter revolution: z has risen a quarter layer from the base.
        assert!(text.contains("Z1.150"));
        // Full revolution lands on the layer top.
        assert!(text.contains("Z1.300"));
        assert!(!text.contains("; Retract"));
    }
}
