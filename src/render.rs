use std::f64::consts::PI;

use opencv::{
    core::{self, Mat, Point, Point2d, Scalar, Vector},
    imgproc,
    prelude::*,
};

use crate::error::LaneDetectionResult;
use crate::lane::{Lane, MarkingColor};
use crate::threshold::ensure_not_empty;

const YELLOW: Scalar = Scalar::new(0.0, 220.0, 255.0, 0.0);
const WHITE: Scalar = Scalar::new(255.0, 255.0, 255.0, 0.0);
const LANE_FILL: Scalar = Scalar::new(0.0, 160.0, 0.0, 0.0);
const HEADING: Scalar = Scalar::new(0.0, 255.0, 0.0, 0.0);
const LANE_FILL_ALPHA: f64 = 0.3;

/// Draws the fitted lanes and the heading onto a copy of the frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputRenderer;

impl OutputRenderer {
    /// # Arguments
    /// * `frame` - rectified BGR frame; it is not modified
    /// * `left`, `right` - fitted boundaries; invalid ones are not drawn
    /// * `heading` - degrees, drawn as a line from the bottom center
    /// * `fps` - shown in the top-right corner when given
    ///
    /// # Returns
    /// * annotated copy of `frame`
    pub fn render(&self, frame: &Mat, left: &Lane, right: &Lane, heading: f64, fps: Option<f64>) -> LaneDetectionResult<Mat> {
        ensure_not_empty(frame)?;
        let mut out = frame.try_clone()?;

        // shade the lane between the two boundaries
        if left.is_valid() && right.is_valid() {
            let mut polygon: Vec<Point> = left.reference_points().iter().map(to_pixel).collect();
            polygon.extend(right.reference_points().iter().rev().map(to_pixel));

            let mut fill = Mat::zeros(out.rows(), out.cols(), out.typ())?.to_mat()?;
            let mut contours: Vector<Vector<Point>> = Vector::new();
            contours.push(Vector::from_iter(polygon));
            imgproc::fill_poly(&mut fill, &contours, LANE_FILL, imgproc::LINE_8, 0, Point::new(0, 0))?;

            let mut blended = Mat::default();
            core::add_weighted(&out, 1.0, &fill, LANE_FILL_ALPHA, 0.0, &mut blended, -1)?;
            out = blended;
        }

        for lane in [left, right] {
            if !lane.is_valid() {
                continue;
            }
            let color = match lane.color() {
                MarkingColor::Yellow => YELLOW,
                _ => WHITE,
            };
            let pts: Vector<Point> = lane.reference_points().iter().map(to_pixel).collect();
            imgproc::polylines(&mut out, &pts, false, color, 6, imgproc::LINE_8, 0)?;
        }

        draw_heading_line(&mut out, heading)?;

        let heading_text = format!("Heading: {:.1}", heading);
        imgproc::put_text(
            &mut out,
            &heading_text,
            Point::new(20, 50),
            imgproc::FONT_HERSHEY_SIMPLEX,
            1.2,
            WHITE,
            2,
            imgproc::LINE_8,
            false,
        )?;

        if let Some(fps) = fps {
            let fps_text = format!("FPS: {:.2}", fps);
            imgproc::put_text(
                &mut out,
                &fps_text,
                Point::new((out.cols() - 260).max(0), 50),
                imgproc::FONT_HERSHEY_SIMPLEX,
                1.2,
                WHITE,
                2,
                imgproc::LINE_8,
                false,
            )?;
        }

        Ok(out)
    }
}

/// Line from the bottom center, tilted by `heading` degrees from vertical.
fn draw_heading_line(img: &mut Mat, heading: f64) -> LaneDetectionResult<()> {
    let (height, width) = (img.rows(), img.cols());
    let rad = heading * PI / 180.0;
    let length = height as f64 * 0.3;

    let x1 = width / 2;
    let y1 = height - 1;
    let x2 = (x1 as f64 + length * rad.sin()) as i32;
    let y2 = (y1 as f64 - length * rad.cos()) as i32;

    imgproc::line(
        img,
        Point::new(x1, y1),
        Point::new(x2, y2),
        HEADING,
        5,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}

fn to_pixel(p: &Point2d) -> Point {
    Point::new(p.x.round() as i32, p.y.round() as i32)
}
