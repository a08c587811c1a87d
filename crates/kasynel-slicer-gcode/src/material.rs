//! Material profile definitions.

use kasynel_slicer::JobParams;
use serde::{Deserialize, Serialize};

/// Material profile: temperatures, cooling, and retraction defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialProfile {
    /// Profile name.
    pub name: String,
    /// Nozzle temperature after the first layer (C).
    pub print_temp: u32,
    /// Nozzle temperature on the first layer (C).
    pub print_temp_first_layer: u32,
    /// Bed temperature (C).
    pub bed_temp: u32,
    /// Part-cooling fan duty (percent).
    pub fan_speed: u32,
    /// Retraction distance (mm of filament).
    pub retraction_distance: f64,
}

impl Default for MaterialProfile {
    fn default() -> Self {
        Self::pla()
    }
}

impl MaterialProfile {
    /// Standard PLA.
    pub fn pla() -> Self {
        Self {
            name: "PLA".into(),
            print_temp: 200,
            print_temp_first_layer: 205,
            bed_temp: 60,
            fan_speed: 100,
            retraction_distance: 5.0,
        }
    }

    /// Standard PETG.
    pub fn petg() -> Self {
        Self {
            name: "PETG".into(),
            print_temp: 235,
            print_temp_first_layer: 240,
            bed_temp: 80,
            fan_speed: 50,
            retraction_distance: 6.0,
        }
    }

    /// All built-in materials.
    pub fn all_profiles() -> Vec<Self> {
        vec![Self::pla(), Self::petg()]
    }

    /// Merge the material fields into job parameters.
    pub fn apply_to(&self, params: &mut JobParams) {
        params.print_temp = self.print_temp;
        params.print_temp_first_layer = self.print_temp_first_layer;
        params.bed_temp = self.bed_temp;
        params.fan_speed = self.fan_speed;
        params.retraction_distance = self.retraction_distance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materials_apply() {
        let mut params = JobParams::default();
        MaterialProfile::petg().apply_to(&mut params);
        assert_eq!(params.print_temp, 235);
        assert_eq!(params.bed_temp, 80);
        assert_eq!(params.fan_speed, 50);
    }
}
