use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use anyhow::Context as _;
use image::{GenericImage, GenericImageView, RgbaImage};

use crate::{
    camera::Camera,
    geometry::ScreenBlock,
    renderer::{Progress, RenderSettings, tiles::ScreenBlockExt as _, worker::Worker},
    scene::Scene,
};

/// Starts rendering the scene in background threads, one per CPU core.
/// `started_tile_callback` and `finished_tile_callback` are called from the worker threads.
pub fn render<F1, F2>(
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,
    started_tile_callback: F1,
    finished_tile_callback: F2,
) -> anyhow::Result<RenderProgress>
where
    F1: Fn(ScreenBlock) + Send + Sync + 'static,
    F2: Fn(ScreenBlock, Progress) + Send + Sync + 'static,
{
    let resolution = camera.get_resolution();
    let image = RgbaImage::new(resolution.x, resolution.y);
    let state = Arc::new(RenderState {
        scene,
        camera,
        settings,

        image: Mutex::new(image),

        tile_ordering: ScreenBlock::from_size(resolution).tile_ordering(settings.tile_size),
        next_tile_index: AtomicUsize::new(0),
        finished_tile_count: AtomicUsize::new(0),
    });
    let started_tile_callback = Arc::new(started_tile_callback);
    let finished_tile_callback = Arc::new(finished_tile_callback);

    let cores = core_affinity::get_core_ids()
        .context("Failed to get the list of CPU cores")?
        .into_iter()
        .enumerate();

    tracing::debug!(
        tiles = state.tile_ordering.len(),
        threads = cores.len(),
        "Starting render"
    );

    let threads = cores
        .map(|(worker_id, core)| {
            let state = Arc::clone(&state);
            let started_tile_callback = Arc::clone(&started_tile_callback);
            let finished_tile_callback = Arc::clone(&finished_tile_callback);

            thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || {
                    core_affinity::set_for_current(core);

                    let mut worker = Worker::new(worker_id);
                    let mut buffer =
                        RgbaImage::new(settings.tile_size.into(), settings.tile_size.into());

                    while let Some(tile) = state.get_next_tile() {
                        (started_tile_callback)(tile.clone());

                        worker.render_tile(
                            &state.scene,
                            &state.camera,
                            &state.settings,
                            tile,
                            &mut buffer,
                        );
                        state
                            .image
                            .lock()
                            .expect("Poisoned lock!")
                            .copy_from(
                                buffer.view(0, 0, tile.width(), tile.height()).deref(),
                                tile.min.x,
                                tile.min.y,
                            )
                            .unwrap_or_else(|_| {
                                unreachable!("The buffer should always fit into the output")
                            });

                        let progress = state.finish_tile();
                        (finished_tile_callback)(tile.clone(), progress);
                    }
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to start worker threads")?;

    Ok(RenderProgress {
        render_state: state,
        threads,
    })
}

pub struct RenderProgress {
    render_state: Arc<RenderState>,
    threads: Vec<JoinHandle<()>>,
}

impl RenderProgress {
    pub fn progress(&self) -> Progress {
        Progress {
            finished: self
                .render_state
                .finished_tile_count
                .load(Ordering::Acquire),
            total: self.render_state.tile_ordering.len(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signal the workers to abort.
    /// Any running workers will still finish their tiles, but no new ones will be started.
    pub fn abort(&self) {
        self.render_state
            .next_tile_index
            .store(self.render_state.tile_ordering.len(), Ordering::Release);
    }

    /// Blocks until all workers are finished.
    pub fn wait(&mut self) {
        self.threads
            .drain(..)
            .for_each(|handle| handle.join().expect("Worker thread panicked!"));
    }

    pub fn image(&self) -> &Mutex<RgbaImage> {
        &self.render_state.image
    }
}

struct RenderState {
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,

    image: Mutex<RgbaImage>,

    tile_ordering: Vec<ScreenBlock>,
    next_tile_index: AtomicUsize,
    finished_tile_count: AtomicUsize,
}

impl RenderState {
    fn get_next_tile(&self) -> Option<&ScreenBlock> {
        let id = self.next_tile_index.fetch_add(1, Ordering::AcqRel);
        self.tile_ordering.get(id)
    }

    fn finish_tile(&self) -> Progress {
        let finished = self.finished_tile_count.fetch_add(1, Ordering::AcqRel) + 1;
        Progress {
            finished,
            total: self.tile_ordering.len(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{ScreenSize, WorldPoint, WorldVector},
        renderer::Shading,
        scene::{Material, Mesh, Object, kd_tree::KdTreeSettings},
    };

    use assert2::{assert, let_assert};
    use test_case::test_case;

    fn sphere_scene() -> Scene {
        let object = Object::new(
            Arc::new(Mesh::uv_sphere(1.0, 16, 8)),
            Material::default(),
            KdTreeSettings::default(),
        )
        .unwrap();
        Scene::new(vec![object])
    }

    fn camera() -> Camera {
        Camera::builder()
            .center(WorldPoint::new(0.0, -5.0, 0.0))
            .forward(WorldVector::new(0.0, 1.0, 0.0))
            .up(WorldVector::new(0.0, 0.0, 1.0))
            .resolution(ScreenSize::new(40, 30))
            .build()
    }

    #[test_case(Shading::Normals)]
    #[test_case(Shading::LeafIds)]
    fn render_sphere(shading: Shading) {
        let settings = RenderSettings {
            tile_size: 8.try_into().unwrap(),
            sample_count: 2.try_into().unwrap(),
            shading,
        };
        let started = Arc::new(AtomicUsize::new(0));

        let_assert!(
            Ok(mut progress) = render(
                sphere_scene(),
                camera(),
                settings,
                {
                    let started = Arc::clone(&started);
                    move |_| {
                        started.fetch_add(1, Ordering::Relaxed);
                    }
                },
                |_, _| {}
            )
        );
        progress.wait();

        assert!(progress.is_finished());
        // 40x30 in 8x8 tiles
        assert!(progress.progress() == Progress { finished: 20, total: 20 });
        assert!(started.load(Ordering::Relaxed) == 20);

        let image = progress.image().lock().unwrap();
        let center = image.get_pixel(20, 15);
        assert!(center[3] == 255);
        assert!(center[0] > 0);
        let corner = image.get_pixel(0, 0);
        assert!(*corner == image::Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn abort_stops_handing_out_tiles() {
        let settings = RenderSettings {
            tile_size: 1.try_into().unwrap(),
            sample_count: 1.try_into().unwrap(),
            shading: Shading::Normals,
        };
        let_assert!(Ok(mut progress) = render(sphere_scene(), camera(), settings, |_| {}, |_, _| {}));
        progress.abort();
        progress.wait();

        let Progress { finished, total } = progress.progress();
        assert!(total == 40 * 30);
        assert!(finished <= total);
    }
}
