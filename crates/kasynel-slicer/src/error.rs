//! Error taxonomy and recoverable warnings for the slicing core.

use kasynel_mesh::MeshError;
use std::fmt;
use thiserror::Error;

use crate::params::SeamPosition;

/// Fatal errors: the pipeline short-circuits and no G-code is produced.
#[derive(Error, Debug)]
pub enum SlicerError {
    /// Mesh is empty, degenerate, or carries non-finite coordinates.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Object bounds exceed the printer bed after centering.
    #[error("object exceeds build volume along {axis}: {extent:.2}mm > {limit:.2}mm")]
    OutOfVolume {
        /// Axis that overflows.
        axis: char,
        /// Object extent along that axis (mm).
        extent: f64,
        /// Printer limit along that axis (mm).
        limit: f64,
    },

    /// A numeric job parameter is out of its documented range.
    #[error("parameter `{field}` invalid: {reason}")]
    ParameterInvalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// No printable layers (object shorter than the first layer).
    #[error("no printable layers")]
    EmptyJob,

    /// Job cancelled cooperatively via the cancel token.
    #[error("job cancelled")]
    Cancelled,

    /// Non-recoverable offset or boolean failure.
    #[error("geometry operation failed: {0}")]
    InternalGeometry(String),
}

impl From<MeshError> for SlicerError {
    fn from(e: MeshError) -> Self {
        match e {
            MeshError::OutOfVolume {
                axis,
                extent,
                limit,
            } => SlicerError::OutOfVolume {
                axis,
                extent,
                limit,
            },
            other => SlicerError::InvalidMesh(other.to_string()),
        }
    }
}

/// Result type for slicer operations.
pub type Result<T> = std::result::Result<T, SlicerError>;

/// Recoverable conditions, collected and returned alongside the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A layer had unstitchable segments; the open chains were discarded.
    OpenContourDiscarded {
        /// Layer index.
        layer: usize,
    },
    /// An inward offset produced empty geometry; remaining walls skipped.
    WallOffsetEmpty {
        /// Layer index.
        layer: usize,
        /// Wall level at which the offset collapsed.
        wall: usize,
    },
    /// A parameter is accepted but not applied by the current pipeline.
    ParameterIgnored {
        /// Field name.
        name: &'static str,
    },
    /// Requested seam policy fell back to `back`.
    SeamFallback {
        /// The policy the job asked for.
        requested: SeamPosition,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::OpenContourDiscarded { layer } => {
                write!(f, "layer {layer}: open contour discarded")
            }
            Warning::WallOffsetEmpty { layer, wall } => {
                write!(f, "layer {layer}: wall {wall} offset collapsed, remaining walls skipped")
            }
            Warning::ParameterIgnored { name } => {
                write!(f, "parameter `{name}` accepted but not applied")
            }
            Warning::SeamFallback { requested } => {
                write!(f, "seam position {requested:?} not implemented, using back")
            }
        }
    }
}

/// Push a warning, mirroring it to the log facade.
pub(crate) fn warn(warnings: &mut Vec<Warning>, w: Warning) {
    log::warn!("{w}");
    warnings.push(w);
}
