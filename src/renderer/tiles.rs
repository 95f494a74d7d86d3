use std::num::NonZeroU32;

use itertools::iproduct;

use crate::geometry::{ScreenBlock, ScreenPoint, ScreenSize};

pub trait ScreenBlockExt {
    fn from_size(size: ScreenSize) -> Self;

    /// Iterator over pixels inside the block in C order (x changes first, then y)
    fn internal_points(&self) -> impl Iterator<Item = ScreenPoint>;

    /// Splits the block into square tiles, ordered from the center of the block outwards.
    /// Tiles on the right and bottom edge are clipped to the block.
    fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock>;
}

impl ScreenBlockExt for ScreenBlock {
    fn from_size(size: ScreenSize) -> Self {
        ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::from(size))
    }

    fn internal_points(&self) -> impl Iterator<Item = ScreenPoint> {
        iproduct!(self.min.y..self.max.y, self.min.x..self.max.x).map(|(y, x)| ScreenPoint::new(x, y))
    }

    fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock> {
        let tile_size = tile_size.get();
        let mut tiles: Vec<ScreenBlock> = iproduct!(
            (self.min.y..self.max.y).step_by(tile_size as usize),
            (self.min.x..self.max.x).step_by(tile_size as usize)
        )
        .map(|(y, x)| {
            ScreenBlock::new(
                ScreenPoint::new(x, y),
                ScreenPoint::new(
                    (x + tile_size).min(self.max.x),
                    (y + tile_size).min(self.max.y),
                ),
            )
        })
        .collect();

        // Doubled coordinates keep the centers integral
        let doubled_center = |block: &ScreenBlock| {
            (
                (block.min.x + block.max.x) as i64,
                (block.min.y + block.max.y) as i64,
            )
        };
        let block_center = doubled_center(self);
        tiles.sort_by_key(|tile| {
            let tile_center = doubled_center(tile);
            let dx = tile_center.0 - block_center.0;
            let dy = tile_center.1 - block_center.1;
            dx * dx + dy * dy
        });

        tiles
    }
}
