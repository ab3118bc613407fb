use serde::{Deserialize, Serialize};

/// Rectangular region of an image, signed so that authoring tools may hand
/// us rectangles that hang off the edge of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ImageRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// Returns `(x, y, width, height)` in unsigned image coordinates, or
    /// `None` when nothing of the region lies inside the image.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let left = (self.x as i64).max(0);
        let top = (self.y as i64).max(0);
        let right = (self.x as i64 + self.width as i64).min(width as i64);
        let bottom = (self.y as i64 + self.height as i64).min(height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some((
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// One authored region of a scene, the index keeps the authoring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapInfo {
    pub index: usize,
    pub area: ImageRegion,
}

impl ScrapInfo {
    pub fn new(index: usize, area: ImageRegion) -> Self {
        Self { index, area }
    }
}
