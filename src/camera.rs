use assert2::assert;
use bon::bon;
use nalgebra::Unit;

use crate::geometry::{
    EPSILON, FloatType, Ray, ScreenPoint, ScreenSize, WorldBox, WorldPoint, WorldVector,
};

/// 35mm film
pub const DEFAULT_FILM_WIDTH: FloatType = 36e-3;
pub const DEFAULT_FOCAL_LENGTH: FloatType = 50e-3;

/// Pinhole camera
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    center: WorldPoint,

    resolution: ScreenSize,

    up: Unit<WorldVector>,
    right: Unit<WorldVector>,
    film_origin_offset: WorldVector,

    /// Distance between pixels in meters
    pixel_pitch: FloatType,
}

#[bon]
impl Camera {
    #[builder]
    pub fn new(
        center: WorldPoint,
        forward: WorldVector,
        up: WorldVector,
        resolution: ScreenSize,
        #[builder(default = DEFAULT_FILM_WIDTH)] film_width: FloatType,
        #[builder(default = DEFAULT_FOCAL_LENGTH)] focal_length: FloatType,
    ) -> Self {
        let forward = Unit::try_new(forward, EPSILON).expect("Forward vector must be non-zero");
        let up = Unit::try_new(up, EPSILON).expect("Up vector must be non-zero");
        let right = Unit::try_new(forward.cross(&up), EPSILON)
            .expect("`up` and `forward` must be linearly independent");
        let up = Unit::new_normalize(right.cross(&forward));

        assert!(resolution.x > 0);
        assert!(resolution.y > 0);
        assert!(film_width > 0.0);
        assert!(focal_length > 0.0);

        let pixel_scale = film_width / (resolution.x as FloatType);
        let resolution_minus_one = ScreenSize::new(resolution.x - 1, resolution.y - 1);
        let film_origin_uv = resolution_minus_one.cast::<FloatType>() * pixel_scale / 2.0;
        let film_origin_offset = -forward.as_ref() * focal_length
            + right.as_ref() * film_origin_uv.x
            - up.as_ref() * film_origin_uv.y;

        Camera {
            center,

            resolution,

            up,
            right,
            film_origin_offset,
            pixel_pitch: pixel_scale,
        }
    }
}

impl Camera {
    /// Camera looking along +Y (Z is up) at the center of the box, far enough
    /// to see all of it.
    pub fn framing(bounding_box: &WorldBox, resolution: ScreenSize) -> Camera {
        let aspect = (resolution.y as FloatType / resolution.x as FloatType).min(1.0);
        let half_angle_tan = DEFAULT_FILM_WIDTH * aspect / (2.0 * DEFAULT_FOCAL_LENGTH);
        let radius = (bounding_box.diagonal() / 2.0).max(EPSILON);
        let distance = radius * (1.0 + 1.0 / half_angle_tan);

        Camera::builder()
            .center(bounding_box.center() - WorldVector::new(0.0, distance, 0.0))
            .forward(WorldVector::new(0.0, 1.0, 0.0))
            .up(WorldVector::new(0.0, 0.0, 1.0))
            .resolution(resolution)
            .build()
    }

    pub fn get_resolution(&self) -> ScreenSize {
        self.resolution
    }

    /// Samples a new ray from the camera for the given image pixel.
    pub fn sample_ray(&self, point: &ScreenPoint, rng: &mut impl rand::Rng) -> Ray {
        let film_u = point.x as FloatType + rng.random_range(-0.5..=0.5);
        let film_v = point.y as FloatType + rng.random_range(-0.5..=0.5);
        let film_point_offset = self.film_origin_offset
            + self.up.as_ref() * (film_v * self.pixel_pitch)
            - self.right.as_ref() * (film_u * self.pixel_pitch);

        Ray::new(self.center, -film_point_offset)
    }
}
