//! stroke2bez: freehand strokes → fitted cubic bezier curves.
//!
//! Captures an input-event stream as screen-space samples, projects
//! them into the scene (view plane, object plane or depth buffer),
//! and fits the result into a bezier or poly spline.
//!
//! # Example
//!
//! ```no_run
//! use stroke2bez::{draw, DrawContext, DrawSettings, EventKind, FitOptions, InputEvent, NdCubicFitter};
//!
//! let ctx = DrawContext::default();
//! let events = vec![
//!     InputEvent::new(EventKind::Press, 100.0, 100.0),
//!     InputEvent::new(EventKind::Move, 140.0, 120.0),
//!     InputEvent::new(EventKind::Move, 180.0, 100.0),
//!     InputEvent::new(EventKind::Release, 180.0, 100.0),
//! ];
//! let mut curve = ctx.new_curve();
//! let report = draw(&ctx, DrawSettings::default(), FitOptions::default(), None, &events, &mut curve, &NdCubicFitter)?;
//! assert_eq!(report.spline_points, curve.splines[0].len());
//! # Ok::<(), stroke2bez::DrawError>(())
//! ```

#![forbid(unsafe_code)]

mod build;
mod substep;
mod taper;

pub mod config;
pub mod curve;
pub mod depth;
pub mod error;
pub mod fit;
pub mod geom;
pub mod geometry;
pub mod output;
pub mod project;
pub mod radius;
pub mod session;
pub mod stroke;
pub mod transform;
pub mod view;

// Re-export kurbo so downstream users get the same version used for
// window positions and SVG paths.
pub use kurbo;
pub use nalgebra;

pub use build::interior_corners;
pub use config::{CurveType, DepthMode, DrawSettings, FitMethod, FitOptions, SurfacePlane};
pub use curve::{Curve, Spline, SplinePoints};
pub use depth::DepthSnapshot;
pub use error::DrawError;
pub use fit::{CurveFitter, NdCubicFitter};
pub use session::{exec_records, DrawContext, DrawSession, EventKind, InputEvent, SessionStatus};
pub use stroke::StrokeRecord;
pub use substep::substep_divisions;

/// Outcome of [`draw`].
#[derive(Debug, Clone)]
pub struct DrawReport {
    pub status: SessionStatus,
    /// Samples captured, substeps included.
    pub samples: usize,
    /// Points in the added spline; 0 when nothing was added.
    pub spline_points: usize,
    /// Fit options as resolved on release.
    pub options: FitOptions,
    pub records: Vec<StrokeRecord>,
    pub uses_substeps: bool,
}

/// Full pipeline: event stream → one spline added to `curve`.
///
/// The first event starts the session and counts as the press. A stream
/// that ends without release or cancel is released at its last position.
pub fn draw(
    ctx: &DrawContext,
    settings: DrawSettings,
    options: FitOptions,
    depths: Option<DepthSnapshot>,
    events: &[InputEvent],
    curve: &mut Curve,
    fitter: &dyn CurveFitter,
) -> Result<DrawReport, DrawError> {
    let Some((first, rest)) = events.split_first() else {
        return Err(DrawError::EmptyStroke);
    };
    let mut session = DrawSession::begin(ctx, settings, options, depths, first, false)?;
    let splines_before = curve.splines.len();

    let mut status = session.status();
    for event in rest {
        status = session.handle(event, curve, fitter)?;
        if status != SessionStatus::Running {
            break;
        }
    }
    if status == SessionStatus::Running {
        let last = events.last().unwrap_or(first);
        let release = InputEvent {
            kind: EventKind::Release,
            ..*last
        };
        status = session.handle(&release, curve, fitter)?;
    }

    let spline_points = if curve.splines.len() > splines_before {
        curve.splines.last().map_or(0, Spline::len)
    } else {
        0
    };
    log::info!(
        "stroke {:?}: {} samples, {} spline points",
        status,
        session.stroke().len(),
        spline_points
    );
    Ok(DrawReport {
        status,
        samples: session.stroke().len(),
        spline_points,
        options: *session.options(),
        records: session.records(),
        uses_substeps: session.uses_substeps(),
    })
}
