use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::sync::Arc;
use uuid::Uuid;

/// An immutable snapshot of the captured window.
///
/// Cloning shares the pixel buffer, the pipeline never writes to it.
#[derive(Clone)]
pub struct CapturedFrame {
    image: Arc<DynamicImage>,
    captured_at: DateTime<Utc>,
    frame_id: Uuid,
}

impl CapturedFrame {
    pub fn new(image: DynamicImage, captured_at: DateTime<Utc>, frame_id: Uuid) -> Self {
        Self {
            image: Arc::new(image),
            captured_at,
            frame_id,
        }
    }

    pub fn now(image: DynamicImage) -> Self {
        Self::new(image, Utc::now(), Uuid::new_v4())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

impl std::fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("frame_id", &self.frame_id)
            .field("captured_at", &self.captured_at)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn cloning_frame_shares_image_buffer() {
        let img: DynamicImage = DynamicImage::ImageRgb8(
            ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(16, 16, Rgb([1, 2, 3])),
        );
        let f1 = CapturedFrame::new(img, Utc::now(), Uuid::new_v4());
        let f2 = f1.clone();
        assert!(Arc::ptr_eq(&f1.image, &f2.image));
        assert_eq!(f1.frame_id(), f2.frame_id());
    }
}
