#![warn(missing_docs)]

//! G-code generation for the Kasynel slicer.
//!
//! Consumes the ordered layers produced by `kasynel-slicer` and emits a
//! complete UTF-8 G-code program: header, start template, per-layer
//! motion with extrusion/retraction/z-hop state tracking, and the end
//! template. Printer and material profiles live here too, as the host's
//! source for merged job parameters.
//!
//! # Example
//!
//! ```ignore
//! use kasynel_slicer::{CancelToken, JobParams};
//! use kasynel_slicer_gcode::{slice_to_gcode, MaterialProfile, PrinterProfile};
//!
//! let mut params = JobParams::default();
//! PrinterProfile::generic().apply_to(&mut params);
//! MaterialProfile::pla().apply_to(&mut params);
//!
//! let cancel = CancelToken::new();
//! let (result, warnings) = slice_to_gcode(&mesh, &params, &|_, _| {}, &cancel);
//! std::fs::write("output.gcode", result?)?;
//! ```

pub mod emit;
pub mod material;
pub mod printer;
pub mod template;

pub use emit::{extrusion_per_mm, generate_gcode, GcodeEmitter};
pub use material::MaterialProfile;
pub use printer::PrinterProfile;

use kasynel_mesh::TriangleMesh;
use kasynel_slicer::{slice_layers, CancelToken, JobParams, Result, Stage, Warning};

/// Single entry point: slice a mesh and emit its G-code program.
///
/// Runs the whole pipeline of the core crate and then the emitter.
/// Warnings are returned alongside the result in both the success and
/// failure cases; on any fatal error (including cancellation) no partial
/// G-code is returned.
pub fn slice_to_gcode(
    mesh: &TriangleMesh,
    params: &JobParams,
    progress: &dyn Fn(Stage, f64),
    cancel: &CancelToken,
) -> (Result<String>, Vec<Warning>) {
    let (sliced, warnings) = slice_layers(mesh, params, progress, cancel);
    let job = match sliced {
        Ok(job) => job,
        Err(e) => return (Err(e), warnings),
    };
    (generate_gcode(&job, params, progress, cancel), warnings)
}
