//! Printer profile definitions.

use kasynel_slicer::JobParams;
use serde::{Deserialize, Serialize};

use crate::template::{DEFAULT_END_GCODE, DEFAULT_START_GCODE};

/// Printer profile with machine-specific settings.
///
/// Profiles are merged into [`JobParams`] by the host before slicing; the
/// core never reads them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterProfile {
    /// Profile name.
    pub name: String,
    /// Build volume `[x, y, z]` (mm).
    pub bed_size: [f64; 3],
    /// Maximum bed temperature (C).
    pub bed_temp_max: u32,
    /// Nozzle diameter (mm).
    pub nozzle_diameter: f64,
    /// Filament diameter (mm).
    pub filament_diameter: f64,
    /// Maximum print feedrate (mm/s).
    pub max_print_speed: f64,
    /// Start G-code template.
    pub start_gcode: String,
    /// End G-code template.
    pub end_gcode: String,
}

impl Default for PrinterProfile {
    fn default() -> Self {
        Self::generic()
    }
}

impl PrinterProfile {
    /// Generic Marlin-class machine.
    pub fn generic() -> Self {
        Self {
            name: "Generic".into(),
            bed_size: [220.0, 220.0, 250.0],
            bed_temp_max: 110,
            nozzle_diameter: 0.4,
            filament_diameter: 1.75,
            max_print_speed: 150.0,
            start_gcode: DEFAULT_START_GCODE.into(),
            end_gcode: DEFAULT_END_GCODE.into(),
        }
    }

    /// Creality Ender 3 profile.
    pub fn ender3() -> Self {
        Self {
            name: "Creality Ender 3".into(),
            bed_size: [220.0, 220.0, 250.0],
            bed_temp_max: 100,
            max_print_speed: 120.0,
            ..Self::generic()
        }
    }

    /// Prusa MK4 profile.
    pub fn prusa_mk4() -> Self {
        Self {
            name: "Prusa MK4".into(),
            bed_size: [250.0, 210.0, 220.0],
            bed_temp_max: 120,
            max_print_speed: 200.0,
            ..Self::generic()
        }
    }

    /// All built-in profiles.
    pub fn all_profiles() -> Vec<Self> {
        vec![Self::generic(), Self::ender3(), Self::prusa_mk4()]
    }

    /// Merge the machine fields into job parameters.
    pub fn apply_to(&self, params: &mut JobParams) {
        params.bed_size = self.bed_size;
        params.bed_temp_max = self.bed_temp_max;
        params.nozzle_diameter = self.nozzle_diameter;
        params.filament_diameter = self.filament_diameter;
        params.max_print_speed = self.max_print_speed;
        params.start_gcode = self.start_gcode.clone();
        params.end_gcode = self.end_gcode.clone();
    }
}
