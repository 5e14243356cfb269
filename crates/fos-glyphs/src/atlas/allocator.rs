//! Free-rectangle atlas allocator
//!
//! First-fit over a list of disjoint free rectangles. A placement splits the
//! free rectangle it lands in into the strip to its right (glyph height) and
//! the full-width strip below. Free rectangles are never merged, so a long
//! session of resets and refills can fragment the atlas; callers treat a
//! failed allocation as "try again next pass".

use crate::{GlyphError, Result};

/// Axis aligned rectangle in atlas pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn can_contain(&self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }

    pub fn intersects(&self, other: &AtlasRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest rectangle covering both; an empty side is ignored
    pub fn union(&self, other: &AtlasRect) -> AtlasRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        AtlasRect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }
}

/// Free list allocator for one atlas texture
#[derive(Debug, Clone)]
pub struct AtlasAllocator {
    width: u32,
    height: u32,
    padding: u32,
    free_rects: Vec<AtlasRect>,
}

impl AtlasAllocator {
    /// Allocator for a `width x height` atlas keeping `padding` pixels clear at its border
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        let mut allocator = Self { width, height, padding, free_rects: Vec::new() };
        allocator.initialize(width, height);
        allocator
    }

    /// Forget every allocation and seed one free rectangle inset by the padding
    pub fn initialize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.free_rects.clear();

        let inset = AtlasRect::new(
            self.padding,
            self.padding,
            width.saturating_sub(2 * self.padding),
            height.saturating_sub(2 * self.padding),
        );
        if !inset.is_empty() {
            self.free_rects.push(inset);
        }
    }

    /// Place a `width x height` rectangle in the first free rectangle that fits
    pub fn allocate(&mut self, width: u32, height: u32) -> Result<AtlasRect> {
        if width == 0 || height == 0 {
            return Ok(AtlasRect::default());
        }

        let Some(index) = self.free_rects.iter().position(|free| free.can_contain(width, height)) else {
            return Err(GlyphError::AtlasAllocationFailed { width, height });
        };

        let free = self.free_rects.remove(index);
        let placed = AtlasRect::new(free.x, free.y, width, height);

        let right = AtlasRect::new(free.x + width, free.y, free.width - width, height);
        let below = AtlasRect::new(free.x, free.y + height, free.width, free.height - height);

        // Keep the leftover of this row ahead of the strip below it
        let mut at = index;
        for fragment in [right, below] {
            if !fragment.is_empty() {
                self.free_rects.insert(at, fragment);
                at += 1;
            }
        }

        Ok(placed)
    }

    /// Return a rectangle to the free list as is, without merging neighbours
    pub fn release(&mut self, rect: AtlasRect) {
        if !rect.is_empty() {
            self.free_rects.push(rect);
        }
    }

    pub fn free_rects(&self) -> &[AtlasRect] {
        &self.free_rects
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Total free pixels, fragmented or not
    pub fn free_area(&self) -> u64 {
        self.free_rects.iter().map(AtlasRect::area).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(rects: &[AtlasRect]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    fn assert_inside_border(rect: &AtlasRect, size: u32, padding: u32) {
        assert!(rect.x >= padding && rect.y >= padding, "{rect:?}");
        assert!(rect.right() <= size - padding && rect.bottom() <= size - padding, "{rect:?}");
    }

    #[test]
    fn test_initialize_insets_by_padding() {
        let allocator = AtlasAllocator::new(2048, 2048, 10);
        assert_eq!(allocator.free_rects(), &[AtlasRect::new(10, 10, 2028, 2028)]);
    }

    #[test]
    fn test_five_glyphs_fit() {
        let mut allocator = AtlasAllocator::new(2048, 2048, 10);
        let placed: Vec<_> = (0..5).map(|_| allocator.allocate(100, 100).unwrap()).collect();

        assert_disjoint(&placed);
        for rect in &placed {
            assert_inside_border(rect, 2048, 10);
        }
        assert_eq!(placed[0], AtlasRect::new(10, 10, 100, 100));
        assert_eq!(placed[1], AtlasRect::new(110, 10, 100, 100));
    }

    #[test]
    fn test_fill_until_full() {
        let mut allocator = AtlasAllocator::new(2048, 2048, 8);
        let mut placed = Vec::new();
        while let Ok(rect) = allocator.allocate(64, 64) {
            placed.push(rect);
        }

        assert_eq!(placed.len(), 31 * 31);
        assert_disjoint(&placed);
        for rect in &placed {
            assert_inside_border(rect, 2048, 8);
        }
        assert!(matches!(
            allocator.allocate(64, 64),
            Err(GlyphError::AtlasAllocationFailed { width: 64, height: 64 })
        ));
    }

    #[test]
    fn test_free_rects_stay_disjoint_with_mixed_sizes() {
        let mut allocator = AtlasAllocator::new(512, 512, 4);
        let mut placed = Vec::new();
        let sizes = [(37, 12), (5, 90), (120, 33), (64, 64), (1, 1), (200, 7), (33, 120)];
        for round in 0..40 {
            let (w, h) = sizes[round % sizes.len()];
            if let Ok(rect) = allocator.allocate(w, h) {
                placed.push(rect);
            }
            assert_disjoint(allocator.free_rects());
        }

        let mut everything = placed.clone();
        everything.extend_from_slice(allocator.free_rects());
        assert_disjoint(&everything);
        for rect in &placed {
            assert_inside_border(rect, 512, 4);
        }
    }

    #[test]
    fn test_oversized_request_fails_without_mutation() {
        let mut allocator = AtlasAllocator::new(128, 128, 8);
        let before = allocator.free_rects().to_vec();
        assert!(allocator.allocate(120, 10).is_err());
        assert_eq!(allocator.free_rects(), before.as_slice());
    }

    #[test]
    fn test_zero_size_takes_no_space() {
        let mut allocator = AtlasAllocator::new(64, 64, 0);
        assert_eq!(allocator.allocate(0, 10).unwrap(), AtlasRect::default());
        assert_eq!(allocator.free_area(), 64 * 64);
    }

    #[test]
    fn test_release_does_not_coalesce() {
        let mut allocator = AtlasAllocator::new(64, 64, 0);
        let a = allocator.allocate(64, 32).unwrap();
        let b = allocator.allocate(64, 32).unwrap();
        allocator.release(a);
        allocator.release(b);

        assert_eq!(allocator.free_rects().len(), 2);
        assert_eq!(allocator.free_area(), 64 * 64);
        assert!(allocator.allocate(64, 64).is_err());
    }

    #[test]
    fn test_union() {
        let a = AtlasRect::new(0, 0, 10, 10);
        let b = AtlasRect::new(20, 5, 5, 20);
        assert_eq!(a.union(&b), AtlasRect::new(0, 0, 25, 25));
        assert_eq!(AtlasRect::default().union(&b), b);
    }
}
