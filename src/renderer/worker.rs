use image::RgbaImage;
use rand::{Rng as _, SeedableRng, rngs::SmallRng};

use crate::{
    camera::Camera,
    geometry::{ScreenBlock, ScreenPoint},
    renderer::{RenderSettings, Shading, tiles::ScreenBlockExt as _},
    scene::{Scene, kd_tree::LeafId},
    util::Rgba,
};

const AMBIENT: f32 = 0.2;

pub struct Worker {
    rng: SmallRng,
}

impl Worker {
    pub fn new(_worker_id: usize) -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn render_tile(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        settings: &RenderSettings,
        tile: &ScreenBlock,
        buffer: &mut RgbaImage,
    ) {
        for point in tile.internal_points() {
            let mut pixel_sum = Rgba::new(0.0, 0.0, 0.0, 0.0);
            for _i in 0..settings.sample_count.get() {
                pixel_sum += self.render_sample(scene, camera, settings, &point);
            }
            let pixel = pixel_sum * (1.0 / settings.sample_count.get() as f32);

            let buffer_position = point - tile.min;
            buffer.put_pixel(buffer_position.x, buffer_position.y, color_to_image(pixel));
        }
    }

    fn render_sample(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        settings: &RenderSettings,
        point: &ScreenPoint,
    ) -> Rgba {
        let ray = camera.sample_ray(point, &mut self.rng);

        let Some(scene_hit) = scene.intersect(&ray) else {
            return Rgba::new(0.0, 0.0, 0.0, 0.0);
        };

        match settings.shading {
            Shading::Normals => {
                let material = scene.objects[scene_hit.object_index].material();
                let cos = ray.direction.dot(&scene_hit.hit.vertex.normal).abs();
                let color = material.color * (AMBIENT + material.diffuse * cos);
                Rgba::new(color.r, color.g, color.b, 1.0)
            }
            Shading::LeafIds => leaf_color(scene_hit.object_index, scene_hit.hit.leaf_id),
        }
    }
}

/// Random looking color that stays the same for the given leaf.
fn leaf_color(object_index: usize, leaf_id: LeafId) -> Rgba {
    let seed = ((object_index as u64) << 32) | (leaf_id.raw() as u64);
    let mut rng = SmallRng::seed_from_u64(seed);
    Rgba::new(
        rng.random_range(0.2..1.0),
        rng.random_range(0.2..1.0),
        rng.random_range(0.2..1.0),
        1.0,
    )
}

/// Maps a 0-1 f32 rgba pixel to pixel type compatible with module image.
pub fn color_to_image(color: Rgba) -> image::Rgba<u8> {
    image::Rgba([
        (color.r * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.g * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.b * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
