//! Start/end G-code templates.
//!
//! Templates come from the printer profile and may reference
//! `{print_temp}` and `{bed_temp}`; temperatures the emitter manages
//! itself (first-layer heat-up, layer-1 switch) are issued as explicit
//! commands after the start template runs.

/// Default start sequence for a Marlin-class machine.
pub const DEFAULT_START_GCODE: &str = "\
G21 ; Millimetre units
G90 ; Absolute positioning
M82 ; Absolute extrusion
G28 ; Home all axes
G92 E0 ; Reset extruder
G1 Z5 F3000 ; Lift before first travel
";

/// Default end sequence for a Marlin-class machine.
pub const DEFAULT_END_GCODE: &str = "\
M104 S0 ; Turn off nozzle
M140 S0 ; Turn off bed
G91 ; Relative positioning
G1 E-2 F2700 ; Retract
G1 Z10 F3000 ; Move Z up
G90 ; Absolute positioning
G1 X0 Y200 F3000 ; Present print
M84 ; Disable motors
";

/// Substitute `{print_temp}` / `{bed_temp}` placeholders.
pub fn render(template: &str, print_temp: u32, bed_temp: u32) -> String {
    template
        .replace("{print_temp}", &print_temp.to_string())
        .replace("{bed_temp}", &bed_temp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes() {
        let out = render("M104 S{print_temp}\nM140 S{bed_temp}\n", 205, 60);
        assert_eq!(out, "M104 S205\nM140 S60\n");
    }

    #[test]
    fn test_render_passthrough() {
        let out = render(DEFAULT_END_GCODE, 200, 60);
        assert_eq!(out, DEFAULT_END_GCODE);
    }
}
