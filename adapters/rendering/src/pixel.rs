use glam::Vec2;
use gridstage_core::{Color, Surface, SurfaceSnapshot};

const CHANNELS: usize = 4;

/// Software RGBA8 surface used headless and as the macroquad backend's frame buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelSurface {
    /// Creates an opaque black surface of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let count = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        let mut surface = Self {
            width,
            height,
            pixels: vec![0; count * CHANNELS],
        };
        surface.clear(Color::BLACK);
        surface
    }

    /// Raw RGBA8 pixels in row-major order.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Color of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let start = self.index(i64::from(x), i64::from(y))?;
        let rgba = self.pixels.get(start..start + CHANNELS)?;
        Some(Color::from_rgba(rgba[0], rgba[1], rgba[2], rgba[3]))
    }

    /// Number of pixels that exactly match `color`.
    #[must_use]
    pub fn count(&self, color: Color) -> usize {
        let rgba = color.to_rgba();
        self.pixels
            .chunks_exact(CHANNELS)
            .filter(|pixel| *pixel == rgba)
            .count()
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        let offset = y * i64::from(self.width) + x;
        usize::try_from(offset).ok().map(|offset| offset * CHANNELS)
    }

    fn blend(&mut self, x: i64, y: i64, color: Color) {
        let Some(start) = self.index(x, y) else {
            return;
        };
        let Some(pixel) = self.pixels.get_mut(start..start + CHANNELS) else {
            return;
        };

        let source = color.to_rgba();
        let alpha = u32::from(source[3]);
        if alpha == 255 {
            pixel.copy_from_slice(&source);
            return;
        }
        if alpha == 0 {
            return;
        }

        let inverse = 255 - alpha;
        for (target, value) in pixel.iter_mut().zip(source).take(3) {
            let mixed = (u32::from(value) * alpha + u32::from(*target) * inverse) / 255;
            *target = u8::try_from(mixed).unwrap_or(u8::MAX);
        }
        let covered = alpha + u32::from(pixel[3]) * inverse / 255;
        pixel[3] = u8::try_from(covered).unwrap_or(u8::MAX);
    }

    /// Pixel rows and columns overlapping the rectangle `min..max`.
    fn span(&self, min: Vec2, max: Vec2) -> (std::ops::Range<i64>, std::ops::Range<i64>) {
        let clamp_x = |value: f32| (value.floor() as i64).clamp(0, i64::from(self.width));
        let clamp_y = |value: f32| (value.floor() as i64).clamp(0, i64::from(self.height));
        (
            clamp_x(min.x)..clamp_x(max.x.ceil()),
            clamp_y(min.y)..clamp_y(max.y.ceil()),
        )
    }
}

impl Surface for PixelSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Color) {
        let rgba = color.to_rgba();
        for pixel in self.pixels.chunks_exact_mut(CHANNELS) {
            pixel.copy_from_slice(&rgba);
        }
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        let corner = origin + size;
        let min = origin.min(corner);
        let max = origin.max(corner);
        let (columns, rows) = self.span(min.round(), max.round());
        for y in rows {
            for x in columns.clone() {
                self.blend(x, y, color);
            }
        }
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        let radius = radius.abs();
        let (columns, rows) = self.span(center - radius, center + radius);
        for y in rows {
            for x in columns.clone() {
                let sample = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if sample.distance(center) <= radius {
                    self.blend(x, y, color);
                }
            }
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, thickness: f32, color: Color) {
        let half = thickness.abs().max(1.0) / 2.0;
        let (columns, rows) = self.span(from.min(to) - half, from.max(to) + half);
        let segment = to - from;
        let length_squared = segment.length_squared();
        for y in rows {
            for x in columns.clone() {
                let sample = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let along = if length_squared <= f32::EPSILON {
                    0.0
                } else {
                    ((sample - from).dot(segment) / length_squared).clamp(0.0, 1.0)
                };
                if sample.distance(from + segment * along) <= half {
                    self.blend(x, y, color);
                }
            }
        }
    }

    fn snapshot(&mut self) -> SurfaceSnapshot {
        SurfaceSnapshot::new(self.width, self.height, self.pixels.clone())
    }

    fn restore(&mut self, snapshot: &SurfaceSnapshot) {
        if snapshot.width() == self.width && snapshot.height() == self.height {
            if snapshot.pixels().len() == self.pixels.len() {
                self.pixels.copy_from_slice(snapshot.pixels());
            }
            return;
        }

        let columns = usize::try_from(snapshot.width().min(self.width)).unwrap_or(0);
        let rows = snapshot.height().min(self.height);
        let source_stride = usize::try_from(snapshot.width()).unwrap_or(0) * CHANNELS;
        let target_stride = usize::try_from(self.width).unwrap_or(0) * CHANNELS;
        for row in 0..usize::try_from(rows).unwrap_or(0) {
            let source = snapshot
                .pixels()
                .get(row * source_stride..row * source_stride + columns * CHANNELS);
            let target = self
                .pixels
                .get_mut(row * target_stride..row * target_stride + columns * CHANNELS);
            if let (Some(source), Some(target)) = (source, target) {
                target.copy_from_slice(source);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surfaces_are_opaque_black() {
        let surface = PixelSurface::new(4, 3);
        assert_eq!(surface.size(), (4, 3));
        assert_eq!(surface.count(Color::BLACK), 12);
    }

    #[test]
    fn fill_rect_clips_to_the_surface() {
        let mut surface = PixelSurface::new(10, 10);
        surface.fill_rect(Vec2::new(8.0, -2.0), Vec2::new(5.0, 4.0), Color::RED);
        assert_eq!(surface.count(Color::RED), 2 * 2);
        assert_eq!(surface.pixel(9, 1), Some(Color::RED));
        assert_eq!(surface.pixel(7, 1), Some(Color::BLACK));
    }

    #[test]
    fn fill_circle_covers_pixels_within_radius() {
        let mut surface = PixelSurface::new(20, 20);
        surface.fill_circle(Vec2::new(10.0, 10.0), 3.0, Color::RED);
        assert_eq!(surface.pixel(10, 10), Some(Color::RED));
        assert_eq!(surface.pixel(14, 10), Some(Color::BLACK));
        let covered = surface.count(Color::RED);
        assert!((24..=32).contains(&covered), "covered {covered} pixels");
    }

    #[test]
    fn stroke_line_draws_between_endpoints() {
        let mut surface = PixelSurface::new(10, 5);
        surface.stroke_line(Vec2::new(0.0, 2.5), Vec2::new(10.0, 2.5), 1.0, Color::RED);
        assert_eq!(surface.count(Color::RED), 10);
        assert!((0..10).all(|x| surface.pixel(x, 2) == Some(Color::RED)));
    }

    #[test]
    fn translucent_fills_blend_with_the_background() {
        let mut surface = PixelSurface::new(1, 1);
        surface.clear(Color::from_rgb(0, 0, 200));
        surface.fill_rect(
            Vec2::ZERO,
            Vec2::ONE,
            Color::from_rgba(255, 0, 0, 0),
        );
        assert_eq!(surface.pixel(0, 0), Some(Color::from_rgb(0, 0, 200)));

        surface.fill_rect(Vec2::ZERO, Vec2::ONE, Color::from_rgba(255, 0, 0, 51));
        assert_eq!(surface.pixel(0, 0), Some(Color::from_rgb(51, 0, 160)));
    }

    #[test]
    fn restore_replays_a_snapshot() {
        let mut surface = PixelSurface::new(6, 6);
        surface.fill_rect(Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0), Color::RED);
        let snapshot = surface.snapshot();

        surface.clear(Color::BLACK);
        surface.restore(&snapshot);

        assert_eq!(surface.count(Color::RED), 4);
        assert_eq!(surface.snapshot(), snapshot);
    }

    #[test]
    fn restore_copies_the_overlap_of_differently_sized_snapshots() {
        let mut small = PixelSurface::new(2, 2);
        small.clear(Color::RED);
        let snapshot = small.snapshot();

        let mut surface = PixelSurface::new(4, 3);
        surface.restore(&snapshot);
        assert_eq!(surface.count(Color::RED), 4);
        assert_eq!(surface.pixel(2, 0), Some(Color::BLACK));
    }
}
