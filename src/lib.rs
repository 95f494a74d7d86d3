mod camera;
pub mod geometry;
mod renderer;
pub mod scene;
pub mod util;

pub use crate::renderer::{Progress, RenderProgress, RenderSettings, Shading, render};
pub use camera::Camera;
pub use scene::Scene;
