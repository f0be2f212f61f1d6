//! Frame preprocessing and overlay drawing.

use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Point, Rect, Scalar, Size},
    imgproc,
    prelude::*,
};

/// BGR red.
pub const POSITIVE_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);
/// BGR green.
pub const NEGATIVE_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);

#[derive(Clone, Debug)]
pub struct Overlay {
    pub positive_label: String,
    pub negative_label: String,
    pub label_origin: Point,
    pub font_scale: f64,
    pub thickness: i32,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            positive_label: String::from("GUN DETECTED!"),
            negative_label: String::from("NO GUN"),
            label_origin: Point::new(10, 50),
            font_scale: 1.0,
            thickness: 2,
        }
    }
}

fn bgr((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

impl Overlay {
    /// Draws a border per rectangle and the status label for the frame.
    pub fn draw(&self, frame: &mut Mat, rects: &[Rect]) -> Result<()> {
        let (label, color) = if rects.is_empty() {
            (&self.negative_label, bgr(NEGATIVE_COLOR))
        } else {
            (&self.positive_label, bgr(POSITIVE_COLOR))
        };

        imgproc::put_text(
            frame,
            label,
            self.label_origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            self.font_scale,
            color,
            self.thickness,
            imgproc::LINE_8,
            false,
        )
        .context("failed to draw status label")?;

        for rect in rects {
            imgproc::rectangle(
                frame,
                *rect,
                bgr(POSITIVE_COLOR),
                self.thickness,
                imgproc::LINE_8,
                0,
            )
            .context("failed to draw detection box")?;
        }
        Ok(())
    }
}

/// Scales `frame` to `width` pixels wide keeping its aspect ratio.
/// A `width` of zero, or one equal to the current width, leaves it untouched.
pub fn resize_to_width(frame: &Mat, width: u32, out: &mut Mat) -> Result<bool> {
    let cols = frame.cols();
    let rows = frame.rows();
    let width =
        i32::try_from(width).with_context(|| format!("resize width {width} out of range"))?;
    if width == 0 || cols <= 0 || rows <= 0 || cols == width {
        return Ok(false);
    }

    let height = ((rows as f64) * (width as f64) / (cols as f64)).round().max(1.0) as i32;
    let interpolation = if width < cols {
        imgproc::INTER_AREA
    } else {
        imgproc::INTER_LINEAR
    };
    imgproc::resize(
        frame,
        out,
        Size::new(width, height),
        0.0,
        0.0,
        interpolation,
    )
    .context("failed to resize frame")?;
    Ok(true)
}

/// Single-channel intensity copy used as detection input.
pub fn to_gray(frame: &Mat, gray: &mut Mat) -> Result<()> {
    if frame.channels() == 1 {
        frame.copy_to(gray).context("failed to copy gray frame")?;
        return Ok(());
    }
    imgproc::cvt_color(frame, gray, imgproc::COLOR_BGR2GRAY, 0)
        .context("failed to convert frame to grayscale")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Vec3b};

    fn black(rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, core::CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn pixel(frame: &Mat, x: i32, y: i32) -> [u8; 3] {
        let v: &Vec3b = frame.at_2d::<Vec3b>(y, x).unwrap();
        [v[0], v[1], v[2]]
    }

    fn has_color(frame: &Mat, color: [u8; 3]) -> bool {
        (0..frame.rows()).any(|y| (0..frame.cols()).any(|x| pixel(frame, x, y) == color))
    }

    #[test]
    fn boxes_are_drawn_in_red() {
        let mut frame = black(200, 300);
        let rect = Rect::new(100, 80, 60, 40);
        Overlay::default().draw(&mut frame, &[rect]).unwrap();

        assert_eq!(pixel(&frame, 100, 80), [0, 0, 255]);
        assert_eq!(pixel(&frame, 130, 80), [0, 0, 255]);
        assert_eq!(pixel(&frame, 100, 100), [0, 0, 255]);
        // Interior is untouched.
        assert_eq!(pixel(&frame, 130, 100), [0, 0, 0]);
    }

    #[test]
    fn negative_label_is_green_and_positive_is_red() {
        let mut frame = black(120, 400);
        Overlay::default().draw(&mut frame, &[]).unwrap();
        assert!(has_color(&frame, [0, 255, 0]));
        assert!(!has_color(&frame, [0, 0, 255]));

        let mut frame = black(120, 400);
        let far = Rect::new(350, 100, 10, 10);
        Overlay::default().draw(&mut frame, &[far]).unwrap();
        assert!(has_color(&frame, [0, 0, 255]));
        assert!(!has_color(&frame, [0, 255, 0]));
    }

    #[test]
    fn drawing_is_deterministic() {
        let rects = [Rect::new(10, 10, 50, 50), Rect::new(40, 60, 30, 20)];
        let mut a = black(100, 100);
        let mut b = black(100, 100);
        Overlay::default().draw(&mut a, &rects).unwrap();
        Overlay::default().draw(&mut b, &rects).unwrap();
        assert_eq!(a.data_bytes().unwrap(), b.data_bytes().unwrap());
    }

    #[test]
    fn resize_keeps_aspect_ratio() {
        let frame = black(480, 640);
        let mut out = Mat::default();
        assert!(resize_to_width(&frame, 500, &mut out).unwrap());
        assert_eq!(out.cols(), 500);
        assert_eq!(out.rows(), 375);
    }

    #[test]
    fn resize_disabled_or_noop() {
        let frame = black(480, 640);
        let mut out = Mat::default();
        assert!(!resize_to_width(&frame, 0, &mut out).unwrap());
        assert!(!resize_to_width(&frame, 640, &mut out).unwrap());
        assert!(out.empty());
    }

    #[test]
    fn out_of_range_width_is_an_error() {
        let frame = black(48, 64);
        let mut out = Mat::default();
        assert!(resize_to_width(&frame, u32::MAX, &mut out).is_err());
        assert!(out.empty());
    }

    #[test]
    fn gray_conversion_is_single_channel() {
        let frame = Mat::new_rows_cols_with_default(
            10,
            20,
            core::CV_8UC3,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
        )
        .unwrap();
        let mut gray = Mat::default();
        to_gray(&frame, &mut gray).unwrap();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.size().unwrap(), Size::new(20, 10));
        assert_eq!(*gray.at_2d::<u8>(5, 5).unwrap(), 255);
    }
}
