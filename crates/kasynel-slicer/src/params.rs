//! Job parameters: the flat, validated configuration for one slicing job.
//!
//! Printer and material profiles are merged into this structure by the
//! host before the core is invoked; the core never reads profile files.

use serde::{Deserialize, Serialize};

use crate::error::{warn, Result, SlicerError, Warning};

/// Sparse infill pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfillPattern {
    /// Two superimposed line sets at 0 and 90 degrees.
    #[default]
    Grid,
    /// Single-direction parallel lines, alternating 90 degrees per layer.
    Lines,
    /// Hexagonal tessellation; only cell perimeters are printed.
    Honeycomb,
}

/// Support fill pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportPattern {
    /// Parallel lines.
    #[default]
    Lines,
    /// Crossed lines.
    Grid,
    /// Connected boustrophedon lines.
    Zigzag,
}

/// Seam placement policy for closed wall rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeamPosition {
    /// Start each ring at its rearmost (+Y) vertex.
    #[default]
    Back,
    /// Accepted; behaves as `Back`.
    Random,
    /// Accepted; behaves as `Back`.
    Sharpest,
}

/// Flat job configuration, immutable for the duration of one slicing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParams {
    // Print
    /// Layer height for non-first layers (mm).
    pub layer_height: f64,
    /// First layer height (mm).
    pub first_layer_height: f64,
    /// Number of perimeter walls.
    pub wall_count: u32,
    /// Print the outer wall before the inner walls.
    pub outer_before_inner: bool,
    /// Sparse infill density (percent, 0..=100).
    pub infill_density: f64,
    /// Sparse infill pattern.
    pub infill_pattern: InfillPattern,
    /// Infill rotation base (degrees). Accepted but not applied.
    pub infill_angle: f64,
    /// Solid layers at the top of the part.
    pub top_layers: u32,
    /// Solid layers at the bottom of the part.
    pub bottom_layers: u32,
    /// Print a brim around the first layer.
    pub brim_enabled: bool,
    /// Brim width (mm).
    pub brim_width: f64,
    /// Vase mode: single continuous wall with rising Z.
    pub spiralize: bool,

    // Quality
    /// Line width as a percentage of the nozzle diameter.
    pub line_width_pct: f64,
    /// Seam placement policy.
    pub seam_position: SeamPosition,
    /// Sparse infill overlap into the innermost wall (percent of line width).
    pub infill_overlap: f64,
    /// Skin overlap into the innermost wall (percent of line width).
    pub skin_overlap: f64,
    /// Retract filament on long travels.
    pub retraction_enabled: bool,
    /// Retraction distance (mm of filament).
    pub retraction_distance: f64,
    /// Retraction feedrate (mm/s).
    pub retraction_speed: f64,
    /// Minimum travel distance that triggers a retraction (mm).
    pub retraction_min_distance: f64,
    /// Extra filament pushed when priming after a retraction (mm).
    pub retraction_extra_prime: f64,
    /// Nozzle lift during retracted travels (mm, 0 disables).
    pub retraction_z_hop: f64,

    // Speed (mm/s)
    /// Outer perimeter speed.
    pub outer_perimeter_speed: f64,
    /// Inner perimeter speed.
    pub print_speed: f64,
    /// Top/bottom skin speed.
    pub top_bottom_speed: f64,
    /// Sparse infill speed (also used for support).
    pub infill_speed: f64,
    /// Bridge speed. Defined but never selected (no bridge detector).
    pub bridge_speed: f64,
    /// Speed for everything on the first layer.
    pub first_layer_speed: f64,
    /// Travel (non-extruding) speed.
    pub travel_speed: f64,
    /// Minimum layer time (s). Accepted; no feedrate clamp is emitted.
    pub min_layer_time: f64,

    // Support
    /// Generate support structures.
    pub support_enabled: bool,
    /// Overhang threshold angle (degrees from vertical).
    pub support_threshold: f64,
    /// Support fill pattern.
    pub support_pattern: SupportPattern,
    /// Support fill density (percent).
    pub support_density: f64,
    /// Vertical clearance between support and model (mm). Accepted, unapplied.
    pub support_z_distance: f64,
    /// Horizontal clearance between support and model (mm). Accepted, unapplied.
    pub support_xy_distance: f64,
    /// Generate dense interface layers. Accepted, unapplied.
    pub support_interface_enabled: bool,
    /// Number of interface layers. Accepted, unapplied.
    pub support_interface_layers: u32,

    // Temperature and cooling
    /// Nozzle temperature after the first layer (C).
    pub print_temp: u32,
    /// Nozzle temperature on the first layer (C).
    pub print_temp_first_layer: u32,
    /// Bed temperature (C).
    pub bed_temp: u32,
    /// Part-cooling fan duty after kick-in (percent).
    pub fan_speed: u32,
    /// Fan duty on the first layer (percent).
    pub fan_first_layer: u32,
    /// Layer index at which the fan switches to `fan_speed`.
    pub fan_kick_in_layer: u32,

    // Machine (merged from the printer profile)
    /// Build volume `[x, y, z]` (mm).
    pub bed_size: [f64; 3],
    /// Maximum bed temperature the machine allows (C).
    pub bed_temp_max: u32,
    /// Nozzle diameter (mm).
    pub nozzle_diameter: f64,
    /// Filament diameter (mm).
    pub filament_diameter: f64,
    /// Maximum print feedrate the machine allows (mm/s).
    pub max_print_speed: f64,
    /// Start G-code template (`{print_temp}`/`{bed_temp}` placeholders).
    pub start_gcode: String,
    /// End G-code template.
    pub end_gcode: String,
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            first_layer_height: 0.3,
            wall_count: 2,
            outer_before_inner: true,
            infill_density: 20.0,
            infill_pattern: InfillPattern::Grid,
            infill_angle: 0.0,
            top_layers: 4,
            bottom_layers: 4,
            brim_enabled: false,
            brim_width: 8.0,
            spiralize: false,

            line_width_pct: 100.0,
            seam_position: SeamPosition::Back,
            infill_overlap: 10.0,
            skin_overlap: 5.0,
            retraction_enabled: true,
            retraction_distance: 5.0,
            retraction_speed: 45.0,
            retraction_min_distance: 1.5,
            retraction_extra_prime: 0.0,
            retraction_z_hop: 0.0,

            outer_perimeter_speed: 30.0,
            print_speed: 50.0,
            top_bottom_speed: 30.0,
            infill_speed: 60.0,
            bridge_speed: 25.0,
            first_layer_speed: 20.0,
            travel_speed: 120.0,
            min_layer_time: 0.0,

            support_enabled: false,
            support_threshold: 45.0,
            support_pattern: SupportPattern::Lines,
            support_density: 15.0,
            support_z_distance: 0.0,
            support_xy_distance: 0.0,
            support_interface_enabled: false,
            support_interface_layers: 0,

            print_temp: 200,
            print_temp_first_layer: 205,
            bed_temp: 60,
            fan_speed: 100,
            fan_first_layer: 0,
            fan_kick_in_layer: 2,

            bed_size: [220.0, 220.0, 250.0],
            bed_temp_max: 110,
            nozzle_diameter: 0.4,
            filament_diameter: 1.75,
            max_print_speed: 150.0,
            start_gcode: String::new(),
            end_gcode: String::new(),
        }
    }
}

impl JobParams {
    /// Extrusion line width (mm), derived from the nozzle diameter.
    pub fn line_width(&self) -> f64 {
        self.nozzle_diameter * self.line_width_pct / 100.0
    }

    /// Validate ranges, recording warnings for accepted-but-unapplied fields.
    pub fn validate(&self, warnings: &mut Vec<Warning>) -> Result<()> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> SlicerError {
            SlicerError::ParameterInvalid {
                field,
                reason: reason.into(),
            }
        }

        let positive: [(&'static str, f64); 6] = [
            ("layer_height", self.layer_height),
            ("first_layer_height", self.first_layer_height),
            ("line_width_pct", self.line_width_pct),
            ("nozzle_diameter", self.nozzle_diameter),
            ("filament_diameter", self.filament_diameter),
            ("travel_speed", self.travel_speed),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, format!("must be positive, got {value}")));
            }
        }

        if self.layer_height > 1.0 {
            return Err(invalid("layer_height", "must be at most 1mm"));
        }
        if !(0.0..=100.0).contains(&self.infill_density) {
            return Err(invalid("infill_density", "must be within 0..=100 percent"));
        }
        if !(0.0..=100.0).contains(&self.support_density) {
            return Err(invalid("support_density", "must be within 0..=100 percent"));
        }
        if !(0.0..=100.0).contains(&self.infill_overlap) {
            return Err(invalid("infill_overlap", "must be within 0..=100 percent"));
        }
        if !(0.0..=100.0).contains(&self.skin_overlap) {
            return Err(invalid("skin_overlap", "must be within 0..=100 percent"));
        }
        if self.brim_enabled && self.brim_width <= 0.0 {
            return Err(invalid("brim_width", "must be positive when brim is enabled"));
        }
        if !(1.0..=90.0).contains(&self.support_threshold) {
            return Err(invalid("support_threshold", "must be within 1..=90 degrees"));
        }
        if self.retraction_enabled {
            if self.retraction_distance <= 0.0 {
                return Err(invalid("retraction_distance", "must be positive"));
            }
            if self.retraction_speed <= 0.0 {
                return Err(invalid("retraction_speed", "must be positive"));
            }
            if self.retraction_min_distance < 0.0 || self.retraction_extra_prime < 0.0 {
                return Err(invalid("retraction_min_distance", "must not be negative"));
            }
            if self.retraction_z_hop < 0.0 {
                return Err(invalid("retraction_z_hop", "must not be negative"));
            }
        }

        let print_speeds: [(&'static str, f64); 6] = [
            ("outer_perimeter_speed", self.outer_perimeter_speed),
            ("print_speed", self.print_speed),
            ("top_bottom_speed", self.top_bottom_speed),
            ("infill_speed", self.infill_speed),
            ("bridge_speed", self.bridge_speed),
            ("first_layer_speed", self.first_layer_speed),
        ];
        for (field, value) in print_speeds {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, format!("must be positive, got {value}")));
            }
            if value > self.max_print_speed {
                return Err(invalid(
                    field,
                    format!("{value}mm/s exceeds machine limit {}mm/s", self.max_print_speed),
                ));
            }
        }

        if self.bed_temp > self.bed_temp_max {
            return Err(invalid(
                "bed_temp",
                format!("{}C exceeds machine limit {}C", self.bed_temp, self.bed_temp_max),
            ));
        }
        if self.print_temp > 350 || self.print_temp_first_layer > 350 {
            return Err(invalid("print_temp", "must be at most 350C"));
        }
        if self.fan_speed > 100 || self.fan_first_layer > 100 {
            return Err(invalid("fan_speed", "must be within 0..=100 percent"));
        }
        if self.bed_size.iter().any(|&d| !d.is_finite() || d <= 0.0) {
            return Err(invalid("bed_size", "all extents must be positive"));
        }
        if self.spiralize && self.wall_count == 0 {
            return Err(invalid("wall_count", "spiralize requires at least one wall"));
        }

        // Accepted-but-unapplied fields become warnings when set away from
        // their defaults, so the caller learns the value had no effect.
        if self.infill_angle != 0.0 {
            warn(warnings, Warning::ParameterIgnored { name: "infill_angle" });
        }
        if self.min_layer_time > 0.0 {
            warn(warnings, Warning::ParameterIgnored { name: "min_layer_time" });
        }
        if self.support_enabled {
            if self.support_z_distance > 0.0 {
                warn(warnings, Warning::ParameterIgnored { name: "support_z_distance" });
            }
            if self.support_xy_distance > 0.0 {
                warn(warnings, Warning::ParameterIgnored { name: "support_xy_distance" });
            }
            if self.support_interface_enabled {
                warn(warnings, Warning::ParameterIgnored { name: "support_interface_layers" });
            }
        }
        if self.seam_position != SeamPosition::Back {
            warn(
                warnings,
                Warning::SeamFallback {
                    requested: self.seam_position,
                },
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate_clean() {
        let params = JobParams::default();
        let mut warnings = Vec::new();
        params.validate(&mut warnings).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_line_width_derivation() {
        let params = JobParams {
            nozzle_diameter: 0.4,
            line_width_pct: 110.0,
            ..Default::default()
        };
        assert!((params.line_width() - 0.44).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_negative_layer_height() {
        let params = JobParams {
            layer_height: -0.1,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let err = params.validate(&mut warnings).unwrap_err();
        assert!(matches!(
            err,
            SlicerError::ParameterInvalid { field: "layer_height", .. }
        ));
    }

    #[test]
    fn test_rejects_speed_over_machine_limit() {
        let params = JobParams {
            infill_speed: 200.0,
            max_print_speed: 150.0,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        assert!(params.validate(&mut warnings).is_err());
    }

    #[test]
    fn test_ignored_parameters_warn() {
        let params = JobParams {
            infill_angle: 45.0,
            min_layer_time: 10.0,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        params.validate(&mut warnings).unwrap();
        assert!(warnings.contains(&Warning::ParameterIgnored { name: "infill_angle" }));
        assert!(warnings.contains(&Warning::ParameterIgnored { name: "min_layer_time" }));
    }

    #[test]
    fn test_seam_fallback_warns() {
        let params = JobParams {
            seam_position: SeamPosition::Random,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        params.validate(&mut warnings).unwrap();
        assert!(warnings.contains(&Warning::SeamFallback {
            requested: SeamPosition::Random
        }));
    }

    #[test]
    fn test_partial_preset_deserializes_with_defaults() {
        let json = r#"{ "layer_height": 0.12, "infill_pattern": "honeycomb" }"#;
        let params: JobParams = serde_json::from_str(json).unwrap();
        assert!((params.layer_height - 0.12).abs() < 1e-12);
        assert_eq!(params.infill_pattern, InfillPattern::Honeycomb);
        assert_eq!(params.wall_count, 2);
    }
}
