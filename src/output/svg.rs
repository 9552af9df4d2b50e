//! SVG preview of a curve's XY projection.

use kurbo::{Affine, BezPath, Point, Rect, Shape};
use nalgebra::Point3;

use crate::curve::{Curve, Spline, SplinePoints};

const MARGIN: f64 = 0.05;

fn xy(p: &Point3<f64>) -> Point {
    Point::new(p.x, p.y)
}

/// Spline as a kurbo path in curve space (Y up).
pub fn spline_to_bezpath(spline: &Spline) -> BezPath {
    let mut path = BezPath::new();
    match &spline.points {
        SplinePoints::Bezier(points) => {
            let Some(first) = points.first() else {
                return path;
            };
            path.move_to(xy(&first.anchor));
            for pair in points.windows(2) {
                path.curve_to(xy(&pair[0].handle_right), xy(&pair[1].handle_left), xy(&pair[1].anchor));
            }
            if spline.cyclic && points.len() > 1 {
                let last = &points[points.len() - 1];
                path.curve_to(xy(&last.handle_right), xy(&first.handle_left), xy(&first.anchor));
                path.close_path();
            }
        }
        SplinePoints::Poly(points) => {
            let Some(first) = points.first() else {
                return path;
            };
            path.move_to(xy(&first.xyz()));
            for p in &points[1..] {
                path.line_to(xy(&p.xyz()));
            }
            if spline.cyclic && points.len() > 1 {
                path.close_path();
            }
        }
    }
    path
}

/// Standalone SVG document of every spline, flipped to SVG's Y-down
/// convention and framed by the curve bounds.
pub fn curve_to_svg(curve: &Curve) -> String {
    let mut paths: Vec<BezPath> = curve.splines.iter().map(spline_to_bezpath).collect();
    for path in &mut paths {
        path.apply_affine(Affine::FLIP_Y);
    }
    let bounds = paths
        .iter()
        .filter(|p| !p.elements().is_empty())
        .map(|p| p.bounding_box())
        .reduce(|a, b| a.union(b))
        .unwrap_or(Rect::new(0.0, 0.0, 1.0, 1.0));
    let pad = bounds.width().max(bounds.height()).max(1e-9) * MARGIN;
    let view = bounds.inflate(pad, pad);

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{} {} {} {}\">\n",
        view.x0,
        view.y0,
        view.width(),
        view.height()
    );
    let stroke_width = pad / 2.0;
    for path in &paths {
        svg.push_str(&format!(
            "  <path d=\"{}\" fill=\"none\" stroke=\"black\" stroke-width=\"{}\"/>\n",
            path.to_svg(),
            stroke_width
        ));
    }
    svg.push_str("</svg>\n");
    svg
}
