use crate::common::ImageRegion;
use image::{GrayImage, ImageBuffer, Luma, Pixel};

const KEEP: u8 = u8::MAX;

/// Keeps only the configured regions of an image.
///
/// The mask is a black canvas with every region painted white, the masked
/// image is the bitwise AND of the source with that canvas. Overlapping
/// regions simply paint the same pixels twice.
#[derive(Debug, Clone, Default)]
pub struct RegionMask {
    regions: Vec<ImageRegion>,
}

impl RegionMask {
    pub fn new(regions: impl IntoIterator<Item = ImageRegion>) -> Self {
        Self {
            regions: regions.into_iter().collect(),
        }
    }

    /// Build the binary keep-mask for a `width` x `height` image.
    pub fn canvas(&self, width: u32, height: u32) -> GrayImage {
        let mut canvas = GrayImage::new(width, height);
        for region in &self.regions {
            let Some((x, y, w, h)) = region.clip_to(width, height) else {
                continue;
            };
            for py in y..y + h {
                for px in x..x + w {
                    canvas.put_pixel(px, py, Luma([KEEP]));
                }
            }
        }
        canvas
    }

    /// Number of pixels the mask keeps for a `width` x `height` image.
    pub fn keep_pixel_count(&self, width: u32, height: u32) -> usize {
        self.canvas(width, height)
            .pixels()
            .filter(|p| p.0[0] == KEEP)
            .count()
    }

    /// Return a masked copy of `image`, the source is left untouched.
    pub fn apply<P>(&self, image: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8>,
    {
        let (width, height) = image.dimensions();
        let canvas = self.canvas(width, height);
        let mut masked = image.clone();

        for (x, y, pixel) in masked.enumerate_pixels_mut() {
            let keep = canvas.get_pixel(x, y).0[0];
            pixel.apply(|channel| channel & keep);
        }

        masked
    }
}
