use crate::dvh::PlotSeries;

use image::{Rgb, RgbImage};

pub const DEFAULT_SIZE: (u32, u32) = (640, 480);

const MARGIN: u32 = 40;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
];

/// Render DVH curves as line plots sharing one pair of axes.
///
/// Both axes start at zero and extend to the largest dose and volume of all
/// series. Labels are not drawn.
pub fn render(series: &[PlotSeries], size: (u32, u32)) -> RgbImage {
    let (width, height) = (size.0.max(2 * MARGIN + 1), size.1.max(2 * MARGIN + 1));
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);

    let x_max = max_finite(series.iter().flat_map(|s| s.x.iter().copied()));
    let y_max = max_finite(series.iter().flat_map(|s| s.y.iter().copied()));

    let plot_width = (width - 2 * MARGIN) as f64;
    let plot_height = (height - 2 * MARGIN) as f64;
    let to_pixel = |x: f64, y: f64| -> (i64, i64) {
        let px = if x_max > 0.0 { x / x_max * plot_width } else { 0.0 };
        let py = if y_max > 0.0 { y / y_max * plot_height } else { 0.0 };
        (
            MARGIN as i64 + px.round() as i64,
            (height - MARGIN) as i64 - py.round() as i64,
        )
    };

    let origin = to_pixel(0.0, 0.0);
    draw_line(&mut image, origin, ((width - MARGIN) as i64, origin.1), AXIS);
    draw_line(&mut image, origin, (origin.0, MARGIN as i64), AXIS);

    for (curve, color) in series.iter().zip(PALETTE.iter().cycle()) {
        let points: Vec<(i64, i64)> = curve
            .x
            .iter()
            .zip(curve.y.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(&x, &y)| to_pixel(x, y))
            .collect();
        for segment in points.windows(2) {
            draw_line(&mut image, segment[0], segment[1], *color);
        }
    }

    image
}

fn max_finite(values: impl Iterator<Item = f64>) -> f64 {
    values.filter(|v| v.is_finite()).fold(0.0, f64::max)
}

// Bresenham, clipped to the image bounds
fn draw_line(image: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
            image.put_pixel(x as u32, y as u32, color);
        }
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
