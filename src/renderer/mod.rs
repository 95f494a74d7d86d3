mod machinery;
mod tiles;
mod worker;

use std::num::NonZeroU32;

pub use machinery::{RenderProgress, render};

#[derive(Copy, Clone, Debug)]
pub struct RenderSettings {
    pub tile_size: NonZeroU32,
    pub sample_count: NonZeroU32,
    pub shading: Shading,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Shading {
    /// Material color lit from the camera direction
    #[default]
    Normals,
    /// Flat random color for every k-d tree leaf
    LeafIds,
}

/// Number of finished and total tiles
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub finished: usize,
    pub total: usize,
}
