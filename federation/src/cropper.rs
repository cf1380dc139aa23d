//! The segmentation preprocessor: turns a bit-packed binary camera frame
//! into the fixed-size patch the classifier consumes. The engine depends on
//! nothing here but the patch shape.
//!
//! Images arrive 1 bit per pixel, most-significant bit first, row-major.
//! Pixel 1 is background (the card face), pixel 0 is foreground (the glyph).
//! The patch is the largest connected foreground component found inside the
//! largest connected background component, centered and background-filled.

use crate::{FederationErr, Result};

/// Side length of the incoming square image, in pixels.
pub const IMAGE_SIZE: usize = 128;
/// Side length of the produced square patch, in pixels.
pub const PATCH_SIZE: usize = 32;
/// Byte length of a packed image.
pub const IMAGE_BYTES: usize = IMAGE_SIZE * IMAGE_SIZE / 8;

const BACKGROUND: u8 = 1;
const FOREGROUND: u8 = 0;

/// Bounding box and population of one connected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
    pub size: usize,
}

impl ComponentBox {
    /// Search bounds covering the whole image.
    pub fn full_image() -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            max_x: IMAGE_SIZE - 1,
            max_y: IMAGE_SIZE - 1,
            size: IMAGE_SIZE * IMAGE_SIZE,
        }
    }
}

/// The preprocessor, with its scratch storage sized once at construction.
/// Flood fill is iterative; nothing allocates per call.
pub struct Cropper {
    image: Vec<u8>,
    visited: Vec<bool>,
    stack: Vec<(usize, usize)>,
}

impl Default for Cropper {
    fn default() -> Self {
        Self::new()
    }
}

impl Cropper {
    pub fn new() -> Self {
        Self {
            image: vec![0; IMAGE_SIZE * IMAGE_SIZE],
            visited: vec![false; IMAGE_SIZE * IMAGE_SIZE],
            stack: Vec::with_capacity(IMAGE_SIZE * IMAGE_SIZE),
        }
    }

    /// Unpacks `packed` and writes the centered glyph patch into `patch`.
    ///
    /// # Arguments
    /// * `packed` - `IMAGE_BYTES` of bit-packed pixels.
    /// * `patch` - `PATCH_SIZE * PATCH_SIZE` output pixels, one byte each.
    ///
    /// # Returns
    /// `Image` on a wrong input or output length. If the image holds no
    /// background or no foreground component the patch comes back all
    /// background.
    pub fn crop(&mut self, packed: &[u8], patch: &mut [u8]) -> Result<()> {
        if packed.len() != IMAGE_BYTES {
            return Err(FederationErr::Image {
                got: packed.len(),
                expected: IMAGE_BYTES,
            });
        }
        if patch.len() != PATCH_SIZE * PATCH_SIZE {
            return Err(FederationErr::Image {
                got: patch.len(),
                expected: PATCH_SIZE * PATCH_SIZE,
            });
        }

        self.unpack(packed);
        patch.fill(BACKGROUND);

        let Some(card) = self.find_largest_region(BACKGROUND, &ComponentBox::full_image()) else {
            return Ok(());
        };
        let Some(glyph) = self.find_largest_region(FOREGROUND, &card) else {
            return Ok(());
        };

        let crop_w = (glyph.max_x - glyph.min_x + 1).min(PATCH_SIZE);
        let crop_h = (glyph.max_y - glyph.min_y + 1).min(PATCH_SIZE);
        let offset_x = (PATCH_SIZE - crop_w) / 2;
        let offset_y = (PATCH_SIZE - crop_h) / 2;

        for y in 0..crop_h {
            for x in 0..crop_w {
                patch[(offset_y + y) * PATCH_SIZE + offset_x + x] =
                    self.image[(glyph.min_y + y) * IMAGE_SIZE + glyph.min_x + x];
            }
        }

        Ok(())
    }

    /// MSB-first, row-major bit unpacking.
    fn unpack(&mut self, packed: &[u8]) {
        for (i, pixel) in self.image.iter_mut().enumerate() {
            let bit = 7 - (i % 8);
            *pixel = (packed[i / 8] >> bit) & 1;
        }
    }

    /// Finds the most populous 4-connected component of `target`-colored
    /// pixels within `bounds` over the last unpacked image.
    pub fn find_largest_region(
        &mut self,
        target: u8,
        bounds: &ComponentBox,
    ) -> Option<ComponentBox> {
        self.visited.fill(false);
        let mut best: Option<ComponentBox> = None;

        for y in bounds.min_y..=bounds.max_y {
            for x in bounds.min_x..=bounds.max_x {
                let idx = y * IMAGE_SIZE + x;
                if self.image[idx] != target || self.visited[idx] {
                    continue;
                }

                let current = self.flood_fill(target, bounds, x, y);
                if best.is_none_or(|b| current.size > b.size) {
                    best = Some(current);
                }
            }
        }

        best
    }

    fn flood_fill(
        &mut self,
        target: u8,
        bounds: &ComponentBox,
        x: usize,
        y: usize,
    ) -> ComponentBox {
        let mut component = ComponentBox {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            size: 0,
        };

        self.stack.clear();
        self.stack.push((x, y));
        self.visited[y * IMAGE_SIZE + x] = true;

        while let Some((cx, cy)) = self.stack.pop() {
            component.size += 1;
            component.min_x = component.min_x.min(cx);
            component.max_x = component.max_x.max(cx);
            component.min_y = component.min_y.min(cy);
            component.max_y = component.max_y.max(cy);

            let neighbors = [
                (cx.wrapping_add(1), cy),
                (cx.wrapping_sub(1), cy),
                (cx, cy.wrapping_add(1)),
                (cx, cy.wrapping_sub(1)),
            ];

            for (nx, ny) in neighbors {
                if nx < bounds.min_x || ny < bounds.min_y || nx > bounds.max_x || ny > bounds.max_y
                {
                    continue;
                }

                let idx = ny * IMAGE_SIZE + nx;
                if self.image[idx] == target && !self.visited[idx] {
                    self.visited[idx] = true;
                    self.stack.push((nx, ny));
                }
            }
        }

        component
    }
}

/// Maps a patch to the classifier's raw input values.
pub fn patch_to_input(patch: &[u8]) -> Vec<f32> {
    patch.iter().map(|&p| p as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(pixels: &[u8]) -> Vec<u8> {
        let mut packed = vec![0u8; IMAGE_BYTES];
        for (i, &p) in pixels.iter().enumerate() {
            if p != 0 {
                packed[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        packed
    }

    /// Paints a background card with a foreground rectangle on it.
    fn card_with_glyph(
        card: (usize, usize, usize, usize),
        glyph: (usize, usize, usize, usize),
    ) -> Vec<u8> {
        let mut pixels = vec![FOREGROUND; IMAGE_SIZE * IMAGE_SIZE];
        let (cx, cy, cw, ch) = card;
        for y in cy..cy + ch {
            for x in cx..cx + cw {
                pixels[y * IMAGE_SIZE + x] = BACKGROUND;
            }
        }
        let (gx, gy, gw, gh) = glyph;
        for y in gy..gy + gh {
            for x in gx..gx + gw {
                pixels[y * IMAGE_SIZE + x] = FOREGROUND;
            }
        }
        pack(&pixels)
    }

    #[test]
    fn all_ones_image_is_one_component_spanning_it() {
        let mut cropper = Cropper::new();
        let mut patch = vec![0u8; PATCH_SIZE * PATCH_SIZE];
        cropper.crop(&vec![0xFF; IMAGE_BYTES], &mut patch).unwrap();

        let region = cropper
            .find_largest_region(BACKGROUND, &ComponentBox::full_image())
            .unwrap();

        assert_eq!(
            region,
            ComponentBox {
                min_x: 0,
                min_y: 0,
                max_x: IMAGE_SIZE - 1,
                max_y: IMAGE_SIZE - 1,
                size: IMAGE_SIZE * IMAGE_SIZE,
            }
        );
        // No glyph anywhere, so the patch is all background.
        assert!(patch.iter().all(|&p| p == BACKGROUND));
    }

    #[test]
    fn glyph_is_centered_in_the_patch() {
        let mut cropper = Cropper::new();
        let mut patch = vec![0u8; PATCH_SIZE * PATCH_SIZE];

        // 60x60 card at (20, 20) with a 10x10 glyph at (40, 40).
        let packed = card_with_glyph((20, 20, 60, 60), (40, 40, 10, 10));
        cropper.crop(&packed, &mut patch).unwrap();

        let offset = (PATCH_SIZE - 10) / 2;
        for y in 0..PATCH_SIZE {
            for x in 0..PATCH_SIZE {
                let inside = (offset..offset + 10).contains(&x)
                    && (offset..offset + 10).contains(&y);
                let expected = if inside { FOREGROUND } else { BACKGROUND };
                assert_eq!(patch[y * PATCH_SIZE + x], expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn picks_the_largest_glyph_inside_the_card() {
        let mut cropper = Cropper::new();
        let mut patch = vec![0u8; PATCH_SIZE * PATCH_SIZE];

        // Two glyphs; the 12x12 one must win over the 4x4 one.
        let mut pixels = vec![FOREGROUND; IMAGE_SIZE * IMAGE_SIZE];
        for y in 10..110 {
            for x in 10..110 {
                pixels[y * IMAGE_SIZE + x] = BACKGROUND;
            }
        }
        for y in 30..42 {
            for x in 30..42 {
                pixels[y * IMAGE_SIZE + x] = FOREGROUND;
            }
        }
        for y in 80..84 {
            for x in 80..84 {
                pixels[y * IMAGE_SIZE + x] = FOREGROUND;
            }
        }

        cropper.crop(&pack(&pixels), &mut patch).unwrap();

        let glyph_pixels = patch.iter().filter(|&&p| p == FOREGROUND).count();
        assert_eq!(glyph_pixels, 12 * 12);
    }

    #[test]
    fn oversized_glyph_is_clipped_to_the_patch() {
        let mut cropper = Cropper::new();
        let mut patch = vec![0u8; PATCH_SIZE * PATCH_SIZE];

        let packed = card_with_glyph((10, 10, 100, 100), (20, 20, 50, 50));
        cropper.crop(&packed, &mut patch).unwrap();

        // Clipped to the full patch.
        assert!(patch.iter().all(|&p| p == FOREGROUND));
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        let mut cropper = Cropper::new();
        let mut patch = vec![0u8; PATCH_SIZE * PATCH_SIZE];

        assert!(cropper.crop(&[0u8; 7], &mut patch).is_err());
        assert!(
            cropper
                .crop(&vec![0u8; IMAGE_BYTES], &mut [0u8; 3])
                .is_err()
        );
    }
}
