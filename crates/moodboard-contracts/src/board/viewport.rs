use serde::{Deserialize, Serialize};

use super::item::Point;

pub const MIN_SCALE: f64 = 0.3;
pub const MAX_SCALE: f64 = 3.0;
const WHEEL_ZOOM_STEP: f64 = 0.0015;

/// Pan/zoom state of the visible canvas area.
///
/// `screen = board * scale + offset`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub offset: Point,
    pub scale: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            offset: Point::default(),
            scale: 1.0,
            width,
            height,
        }
    }

    pub fn to_screen(&self, board: Point) -> Point {
        Point::new(
            board.x * self.scale + self.offset.x,
            board.y * self.scale + self.offset.y,
        )
    }

    pub fn to_board(&self, screen: Point) -> Point {
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        Point::new(
            (screen.x - self.offset.x) / scale,
            (screen.y - self.offset.y) / scale,
        )
    }

    /// Board coordinate currently under the middle of the viewport.
    pub fn center(&self) -> Point {
        self.to_board(Point::new(self.width / 2.0, self.height / 2.0))
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset.x += dx;
        self.offset.y += dy;
    }

    /// Applies a wheel delta (positive `delta_y` zooms out).
    pub fn zoom_by_wheel(&mut self, delta_y: f64) {
        let next = (self.scale - delta_y * WHEEL_ZOOM_STEP).clamp(MIN_SCALE, MAX_SCALE);
        self.scale = (next * 100.0).round() / 100.0;
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::{Viewport, MAX_SCALE, MIN_SCALE};
    use crate::board::Point;

    #[test]
    fn unpanned_unzoomed_center_is_half_the_size() {
        let viewport = Viewport::new(1200.0, 800.0);
        assert_eq!(viewport.center(), Point::new(600.0, 400.0));
    }

    #[test]
    fn center_follows_pan_and_zoom() {
        let mut viewport = Viewport::new(1000.0, 600.0);
        viewport.pan_by(100.0, -50.0);
        viewport.scale = 2.0;
        // (500 - 100) / 2, (300 + 50) / 2
        assert_eq!(viewport.center(), Point::new(200.0, 175.0));
    }

    #[test]
    fn screen_and_board_mappings_are_inverse() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.pan_by(37.0, 12.0);
        viewport.scale = 1.5;
        let board = Point::new(-40.0, 250.0);
        let screen = viewport.to_screen(board);
        assert_eq!(screen, Point::new(-23.0, 387.0));
        assert_eq!(viewport.to_board(screen), board);
    }

    #[test]
    fn wheel_zoom_clamps_and_rounds() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.zoom_by_wheel(-100.0);
        assert_eq!(viewport.scale, 1.15);
        assert_eq!(viewport.zoom_percent(), 115);

        viewport.zoom_by_wheel(100_000.0);
        assert_eq!(viewport.scale, MIN_SCALE);
        viewport.zoom_by_wheel(-100_000.0);
        assert_eq!(viewport.scale, MAX_SCALE);
    }
}
