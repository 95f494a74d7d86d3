use crate::{geometry::FloatType, util::Rgb};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    pub color: Rgb,
    /// Weight of the diffuse (cosine) term
    pub diffuse: FloatType,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            color: Rgb::new(0.5, 0.5, 0.5),
            diffuse: 0.8,
        }
    }
}
