//! Interactive drawing session: input events in, one spline out.
//!
//! Lifecycle:
//! 1. `begin` resolves the projection once for the whole stroke
//! 2. Press starts painting (and may lock the stroke to a plane)
//! 3. Move events add samples, with substeps when projecting on depth
//! 4. Release resolves unset fit options from the stroke, tapers, and
//!    adds the fitted spline to the curve
//! 5. Cancel ends the session without touching the curve

use kurbo::Point;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::build::build_spline;
use crate::config::{
    CurveType, DepthMode, DrawSettings, FitOptions, ResolvedFitOptions, SurfacePlane,
    STROKE_CYCLIC_DIST_PX, STROKE_SAMPLE_DIST_MAX_PX, STROKE_SAMPLE_DIST_MIN_PX,
};
use crate::curve::Curve;
use crate::depth::DepthSnapshot;
use crate::error::DrawError;
use crate::fit::CurveFitter;
use crate::geom::{is_zero, normalize_or_zero, ObjectTransform, Plane};
use crate::project::{pixel, ProjectionMode, ProjectionState, Projector};
use crate::radius::RadiusResolver;
use crate::stroke::{StrokeRecord, StrokeSequence};
use crate::substep::add_sample;
use crate::taper;
use crate::view::{View, ViewParams};

// ── Scene and events ─────────────────────────────────────

/// The scene a stroke is drawn into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawContext {
    pub view: ViewParams,
    pub object_to_world: Matrix4<f64>,
    /// 3D cursor; the default drawing plane passes through it.
    pub cursor: Point3<f64>,
    /// 2D curves are drawn on the object's local XY plane.
    pub is_3d: bool,
    pub bevel_radius: f64,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self {
            view: ViewParams::default(),
            object_to_world: Matrix4::identity(),
            cursor: Point3::origin(),
            is_3d: true,
            bevel_radius: 1.0,
        }
    }
}

impl DrawContext {
    pub fn transform(&self) -> Result<ObjectTransform, DrawError> {
        ObjectTransform::new(self.object_to_world)
    }

    /// An empty curve matching this object's settings.
    pub fn new_curve(&self) -> Curve {
        Curve::new(self.bevel_radius, self.is_3d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Press,
    Move,
    Release,
    Cancel,
}

/// One input event in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: EventKind,
    pub mval: [f64; 2],
    /// Tablet pressure; 1.0 for devices without one.
    #[serde(default = "default_pressure")]
    pub pressure: f64,
}

fn default_pressure() -> f64 {
    1.0
}

impl InputEvent {
    pub fn new(kind: EventKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            mval: [x, y],
            pressure: 1.0,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.mval[0], self.mval[1])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished,
    Cancelled,
}

// ── Session ──────────────────────────────────────────────

/// State of one stroke, from first event to commit or cancel.
#[derive(Debug)]
pub struct DrawSession {
    settings: DrawSettings,
    options: FitOptions,
    projector: Projector,
    stroke: StrokeSequence,
    use_substeps: bool,
    painting: bool,
    status: SessionStatus,
}

impl DrawSession {
    /// Start a session at `event`.
    ///
    /// `depths` is the depth snapshot for surface projection, captured
    /// now and used unchanged for the whole stroke. With
    /// `wait_for_input = false` the first sample is added immediately.
    pub fn begin(
        ctx: &DrawContext,
        settings: DrawSettings,
        options: FitOptions,
        depths: Option<DepthSnapshot>,
        event: &InputEvent,
        wait_for_input: bool,
    ) -> Result<Self, DrawError> {
        let view = View::from_params(&ctx.view)?;
        let transform = ctx.transform()?;
        let radius = RadiusResolver::new(&settings, ctx.bevel_radius);

        // Fallback depth in case the first sample finds none.
        let fallback = view.win_to_3d(&view.pivot(), event.position());

        let mut use_substeps = false;
        let (mode, depths) = if !ctx.is_3d {
            let plane = Plane::from_point_normal(&transform.location(), &transform.z_axis());
            (ProjectionMode::Plane(plane), None)
        } else if settings.depth_mode == DepthMode::Surface && depths.is_some() {
            use_substeps = settings.curve_type != CurveType::Poly;
            (ProjectionMode::Depth, depths)
        } else {
            if settings.depth_mode == DepthMode::Surface {
                log::warn!("unable to access depth buffer, using view plane");
            }
            let plane = Plane::from_point_normal(&ctx.cursor, &view.view_axis());
            (ProjectionMode::Plane(plane), None)
        };
        log::debug!(
            "session: {} projection, substeps {}",
            if matches!(mode, ProjectionMode::Depth) { "depth" } else { "plane" },
            use_substeps
        );

        let projector = Projector {
            view,
            depths,
            transform,
            radius,
            state: ProjectionState {
                mode,
                offset: None,
                surface_offset: settings.surface_offset,
                use_surface_offset_absolute: settings.use_surface_offset_absolute,
            },
        };
        let mut session = Self {
            settings,
            options,
            projector,
            stroke: StrokeSequence::new(fallback),
            use_substeps,
            painting: false,
            status: SessionStatus::Running,
        };
        if !wait_for_input {
            session.add_first(event);
        }
        Ok(session)
    }

    /// Feed one event. On release the fitted spline is added to `curve`;
    /// an empty stroke or a failed fit leaves `curve` untouched and is
    /// returned as an error.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        curve: &mut Curve,
        fitter: &dyn CurveFitter,
    ) -> Result<SessionStatus, DrawError> {
        if self.status != SessionStatus::Running {
            return Ok(self.status);
        }
        match event.kind {
            EventKind::Press => self.add_first(event),
            EventKind::Move => {
                let min_sq = STROKE_SAMPLE_DIST_MIN_PX * STROKE_SAMPLE_DIST_MIN_PX;
                if self.painting && self.stroke.prev.mval.distance_squared(event.position()) > min_sq {
                    self.add(event);
                }
            }
            EventKind::Release => {
                self.status = SessionStatus::Finished;
                self.precalc();
                let options = self.options.resolve_defaults();
                exec(&self.stroke, &self.settings, &options, &self.projector.radius, curve, fitter)?;
            }
            EventKind::Cancel => {
                log::debug!("stroke cancelled after {} samples", self.stroke.len());
                self.status = SessionStatus::Cancelled;
            }
        }
        Ok(self.status)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn stroke(&self) -> &StrokeSequence {
        &self.stroke
    }

    /// Fit options, with unset values filled in once the stroke is released.
    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    pub fn projection(&self) -> &ProjectionState {
        &self.projector.state
    }

    pub fn uses_substeps(&self) -> bool {
        self.use_substeps
    }

    /// The stroke as replayable records.
    pub fn records(&self) -> Vec<StrokeRecord> {
        self.stroke.to_records()
    }

    fn add(&mut self, event: &InputEvent) {
        add_sample(
            &self.projector,
            &mut self.stroke,
            event.position(),
            event.pressure,
            self.use_substeps,
            STROKE_SAMPLE_DIST_MAX_PX,
        );
    }

    fn add_first(&mut self, event: &InputEvent) {
        self.add(event);
        if self.settings.depth_mode == DepthMode::Surface
            && self.projector.state.uses_depth()
            && self.settings.depth_stroke_endpoints
        {
            self.lock_to_first_hit(event.position());
        }
        self.painting = true;
    }

    /// Continue the stroke on a plane through the first surface hit.
    fn lock_to_first_hit(&mut self, mval: Point) {
        let view_axis = self.projector.view.view_axis();
        let mut normal = Vector3::zeros();
        if matches!(
            self.settings.surface_plane,
            SurfacePlane::NormalView | SurfacePlane::NormalSurface
        ) {
            let (x, y) = pixel(mval);
            let surface = self
                .projector
                .depths
                .as_ref()
                .and_then(|depths| depths.normal_at(&self.projector.view, x, y));
            if let Some(surface) = surface {
                normal = match self.settings.surface_plane {
                    SurfacePlane::NormalView => surface.cross(&view_axis.cross(&surface)),
                    _ => surface,
                };
            }
        }
        normal = normalize_or_zero(&normal);
        if is_zero(&normal) {
            normal = view_axis;
        }
        let anchor = self.stroke.prev.location_world_valid;
        self.projector.state.mode = ProjectionMode::Plane(Plane::from_point_normal(&anchor, &normal));

        // Only the first hit carries the surface offset; carry it to the rest.
        if self.projector.state.surface_offset != 0.0 {
            if let Some(plain) = self.projector.project(mval, 0.0, 0.0) {
                let offset = anchor - plain.location_world;
                if !is_zero(&offset) {
                    self.projector.state.offset = Some(offset);
                }
            }
        }
        log::debug!("stroke locked to plane through {:?}", anchor);
    }

    /// Fill unset fit options from the captured stroke and apply taper.
    fn precalc(&mut self) {
        let settings = &self.settings;
        let options = &mut self.options;
        options.fit_method.get_or_insert(settings.fit_method);
        options.corner_angle.get_or_insert(settings.effective_corner_angle());
        if options.error_threshold.is_none() {
            let len_3d = self.stroke.length_3d();
            let len_2d = self.stroke.length_2d();
            let scale_px = if len_3d > 0.0 && len_2d > 0.0 {
                len_3d / len_2d
            } else {
                0.0
            };
            options.error_threshold = Some(settings.error_threshold_px * settings.ui_scale * scale_px);
        }
        if options.use_cyclic.is_none() {
            let samples = self.stroke.samples();
            let snap = STROKE_CYCLIC_DIST_PX * settings.ui_scale;
            let closed = samples.len() > 2
                && match (samples.first(), samples.last()) {
                    (Some(first), Some(last)) => first.mval.distance_squared(last.mval) <= snap * snap,
                    _ => false,
                };
            options.use_cyclic = Some(closed);
        }
        log::debug!("release: {} samples, {:?}", self.stroke.len(), options);

        if settings.has_taper() {
            taper::apply(
                &mut self.stroke,
                settings.radius_taper_start,
                settings.radius_taper_end,
                &self.projector.radius,
                &self.projector.transform,
            );
        }
    }
}

// ── Non-interactive entry points ─────────────────────────

/// Fit `stroke` and append it to `curve`. Returns the number of points
/// in the new spline.
pub fn exec(
    stroke: &StrokeSequence,
    settings: &DrawSettings,
    options: &ResolvedFitOptions,
    radius: &RadiusResolver,
    curve: &mut Curve,
    fitter: &dyn CurveFitter,
) -> Result<usize, DrawError> {
    let spline = build_spline(stroke, settings, options, radius, curve.is_3d, fitter)?;
    let len = spline.len();
    curve.add_spline(spline);
    Ok(len)
}

/// Replay stored stroke records without interaction. Unset options take
/// their defaults; no taper is applied.
pub fn exec_records(
    ctx: &DrawContext,
    settings: &DrawSettings,
    options: &FitOptions,
    records: &[StrokeRecord],
    curve: &mut Curve,
    fitter: &dyn CurveFitter,
) -> Result<usize, DrawError> {
    if records.is_empty() {
        return Err(DrawError::EmptyStroke);
    }
    let transform = ctx.transform()?;
    let stroke = StrokeSequence::from_records(records, &transform);
    let radius = RadiusResolver::new(settings, ctx.bevel_radius);
    exec(&stroke, settings, &options.resolve_defaults(), &radius, curve, fitter)
}
