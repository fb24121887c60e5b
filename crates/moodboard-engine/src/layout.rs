use moodboard_contracts::board::{BoardItem, ItemKind, Point};

use crate::validator::GeneratedImage;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub tile_width: f64,
    pub tile_height: f64,
    pub padding: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            tile_width: 400.0,
            tile_height: 300.0,
            padding: 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub columns: usize,
    pub rows: usize,
}

impl GridShape {
    /// Near-square grid: `columns = ceil(sqrt(n))`, `rows = ceil(n / columns)`.
    pub fn for_count(count: usize) -> Self {
        if count == 0 {
            return Self {
                columns: 0,
                rows: 0,
            };
        }
        let mut columns = (count as f64).sqrt().ceil() as usize;
        while columns * columns < count {
            columns += 1;
        }
        while columns > 1 && (columns - 1) * (columns - 1) >= count {
            columns -= 1;
        }
        Self {
            columns,
            rows: count.div_ceil(columns),
        }
    }
}

impl GridLayout {
    pub fn extent(&self, shape: GridShape) -> (f64, f64) {
        let span = |cells: usize, tile: f64| {
            if cells == 0 {
                0.0
            } else {
                cells as f64 * tile + (cells - 1) as f64 * self.padding
            }
        };
        (
            span(shape.columns, self.tile_width),
            span(shape.rows, self.tile_height),
        )
    }

    /// Top-left board position of every tile, row-major, grid centered on `center`.
    pub fn positions(&self, count: usize, center: Point) -> Vec<Point> {
        let shape = GridShape::for_count(count);
        let (width, height) = self.extent(shape);
        let origin = Point::new(center.x - width / 2.0, center.y - height / 2.0);
        (0..count)
            .map(|idx| {
                let row = idx / shape.columns;
                let col = idx % shape.columns;
                Point::new(
                    origin.x + col as f64 * (self.tile_width + self.padding),
                    origin.y + row as f64 * (self.tile_height + self.padding),
                )
            })
            .collect()
    }

    /// One image item per generated image. `request_stamp` keeps ids unique
    /// when the same image id comes back in a later request.
    pub fn place(
        &self,
        images: &[GeneratedImage],
        center: Point,
        request_stamp: u64,
    ) -> Vec<BoardItem> {
        images
            .iter()
            .zip(self.positions(images.len(), center))
            .map(|(image, position)| {
                BoardItem::with_id(
                    format!("{}-{request_stamp}", image.id),
                    ItemKind::Image,
                    image.url.clone(),
                    position,
                )
            })
            .collect()
    }
}
