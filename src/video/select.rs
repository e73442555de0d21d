use rayon::prelude::*;

use crate::video::frame::{Block, Frame};

/// Top-left corners of every whole `block_size` tile, in raster order
/// (top-to-bottom, then left-to-right). Partial tiles at the right and bottom
/// edges are dropped.
pub fn block_origins(width: usize, height: usize, block_size: usize) -> Vec<(usize, usize)> {
    if block_size == 0 {
        return Vec::new();
    }
    let blocks_x = width / block_size;
    let blocks_y = height / block_size;
    let mut origins = Vec::with_capacity(blocks_x * blocks_y);
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            origins.push((bx * block_size, by * block_size));
        }
    }
    origins
}

/// Pick the `count` darkest blocks of `frame`.
///
/// Blocks are ranked by ascending mean intensity; the sort is stable, so equal
/// means keep raster order. Fewer than `count` blocks are returned when the
/// frame does not hold that many.
pub fn select_blocks(frame: &Frame, block_size: usize, count: usize) -> Vec<Block> {
    let origins = block_origins(frame.width(), frame.height(), block_size);

    let mut ranked: Vec<((usize, usize), u64)> = origins
        .par_iter()
        .map(|&(x, y)| ((x, y), tile_sum(frame, x, y, block_size)))
        .collect();
    ranked.sort_by_key(|&(_, sum)| sum);

    ranked
        .into_iter()
        .take(count)
        .map(|((x, y), _)| frame.block(x, y, block_size))
        .collect()
}

fn tile_sum(frame: &Frame, x: usize, y: usize, size: usize) -> u64 {
    let width = frame.width();
    let pixels = frame.pixels();
    (0..size)
        .map(|row| {
            let offset = (y + row) * width + x;
            pixels[offset..offset + size]
                .iter()
                .map(|&s| s as u64)
                .sum::<u64>()
        })
        .sum()
}
