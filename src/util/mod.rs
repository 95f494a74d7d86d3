mod stats;

pub use stats::Stats;

pub type Rgb = rgb::RGB<f32>;
pub type Rgba = rgb::RGBA<f32>;
