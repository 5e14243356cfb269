//! Signed distance field generation
//!
//! Exact Euclidean distance transform (Felzenszwalb-Huttenlocher, separable,
//! O(n) per row and column) over a thresholded coverage mask.

use crate::font::CoverageMask;

/// 1D squared distance transform of sampled function `f` into `d`
fn edt_1d(f: &[f32], d: &mut [f32], v: &mut [usize], z: &mut [f32]) {
    let n = f.len();
    if n == 0 {
        return;
    }

    let mut k = 0;
    v[0] = 0;
    z[0] = f32::NEG_INFINITY;
    z[1] = f32::INFINITY;

    for q in 1..n {
        let mut s;
        loop {
            let vk = v[k];
            // intersection of the parabolas rooted at v[k] and q
            s = ((f[q] + (q * q) as f32) - (f[vk] + (vk * vk) as f32)) / (2.0 * (q - vk) as f32);
            // z[0] is -inf, so this always stops by k == 0
            if s > z[k] {
                break;
            }
            k -= 1;
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f32::INFINITY;
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate().take(n) {
        while z[k + 1] < q as f32 {
            k += 1;
        }
        let vk = v[k];
        let diff = q as f32 - vk as f32;
        *out = diff * diff + f[vk];
    }
}

/// Distance from every pixel to the nearest `true` pixel
fn distance_transform(seeds: &[bool], width: usize, height: usize) -> Vec<f32> {
    let inf = ((width * width + height * height) as f32).max(1.0) * 4.0;
    let mut grid: Vec<f32> = seeds.iter().map(|&s| if s { 0.0 } else { inf }).collect();

    let longest = width.max(height);
    let mut f = vec![0.0f32; longest];
    let mut d = vec![0.0f32; longest];
    let mut v = vec![0usize; longest];
    let mut z = vec![0.0f32; longest + 1];

    for y in 0..height {
        let row = &mut grid[y * width..(y + 1) * width];
        f[..width].copy_from_slice(row);
        edt_1d(&f[..width], &mut d[..width], &mut v, &mut z);
        row.copy_from_slice(&d[..width]);
    }

    for x in 0..width {
        for y in 0..height {
            f[y] = grid[y * width + x];
        }
        edt_1d(&f[..height], &mut d[..height], &mut v, &mut z);
        for y in 0..height {
            grid[y * width + x] = d[y].sqrt();
        }
    }

    grid
}

/// Build the distance field of `mask` grown by `spread` pixels on every side.
///
/// Output is `(mask.width + 2 * spread) x (mask.height + 2 * spread)` bytes,
/// 128 on the outline, rising to 255 `spread` pixels inside and falling to 0
/// `spread` pixels outside.
pub fn coverage_to_sdf(mask: &CoverageMask, spread: u32) -> Vec<u8> {
    let width = (mask.width + 2 * spread) as usize;
    let height = (mask.height + 2 * spread) as usize;
    let pad = spread as usize;

    // texels past the end of a short mask count as outside
    let mut inside = vec![false; width * height];
    for y in 0..mask.height as usize {
        for x in 0..mask.width as usize {
            let coverage = mask.data.get(y * mask.width as usize + x).copied().unwrap_or(0);
            inside[(y + pad) * width + x + pad] = coverage > 127;
        }
    }
    let outside: Vec<bool> = inside.iter().map(|&b| !b).collect();

    let to_inside = distance_transform(&inside, width, height);
    let to_outside = distance_transform(&outside, width, height);

    let spread = spread.max(1) as f32;
    inside
        .iter()
        .enumerate()
        .map(|(i, &is_inside)| {
            let signed = if is_inside { to_outside[i] - 0.5 } else { -(to_inside[i] - 0.5) };
            let normalized = (signed / spread) * 0.5 + 0.5;
            (normalized.clamp(0.0, 1.0) * 255.0).round() as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_square(size: u32) -> CoverageMask {
        CoverageMask { width: size, height: size, data: vec![255; (size * size) as usize] }
    }

    #[test]
    fn test_distance_transform_single_seed() {
        let mut seeds = vec![false; 25];
        seeds[12] = true;
        let d = distance_transform(&seeds, 5, 5);
        assert_eq!(d[12], 0.0);
        assert_eq!(d[13], 1.0);
        assert!((d[0] - 8.0f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_sdf_dimensions() {
        let sdf = coverage_to_sdf(&filled_square(4), 3);
        assert_eq!(sdf.len(), 10 * 10);
    }

    #[test]
    fn test_sdf_gradient() {
        let spread = 4;
        let sdf = coverage_to_sdf(&filled_square(8), spread);
        let width = 16;

        let corner = sdf[0];
        let center = sdf[8 * width + 8];
        let edge_inside = sdf[4 * width + 8];
        let edge_outside = sdf[3 * width + 8];

        assert_eq!(corner, 0);
        assert!(center > 200, "center {center}");
        assert!(edge_inside > 128 && edge_inside < 180, "inside edge {edge_inside}");
        assert!(edge_outside < 128 && edge_outside > 76, "outside edge {edge_outside}");
    }

    #[test]
    fn test_short_mask_reads_as_outside() {
        let mask = CoverageMask { width: 8, height: 8, data: vec![255; 10] };
        let sdf = coverage_to_sdf(&mask, 2);
        assert_eq!(sdf.len(), 12 * 12);
        // first row of ink is covered, the bottom rows are not
        assert!(sdf[2 * 12 + 4] >= 128);
        assert!(sdf[8 * 12 + 4] < 128);
    }

    #[test]
    fn test_sdf_empty_mask() {
        let mask = CoverageMask::new(3, 3);
        let sdf = coverage_to_sdf(&mask, 2);
        assert!(sdf.iter().all(|&v| v == 0));
    }
}
