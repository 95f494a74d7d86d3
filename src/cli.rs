use std::{num::NonZeroU32, path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use rand::{Rng as _, SeedableRng as _, rngs::SmallRng};
use tracing_subscriber::EnvFilter;

use kdtrace::{
    Camera, RenderSettings, Scene, Shading,
    geometry::{FloatType, Ray, ScreenSize, WorldPoint, WorldVector},
    render,
    scene::{
        Material, Mesh, Object,
        kd_tree::{DEFAULT_DEPTH_MAX, DEFAULT_MINIMAL_LEAF_SIZE, KdTree, KdTreeSettings},
    },
};

#[derive(Parser)]
#[command(name = "kdtrace")]
#[command(about = "Triangle mesh ray tracer built around a k-d tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render meshes to an image
    Render {
        /// Wavefront OBJ files, placed next to each other along X. A sphere is rendered if empty.
        meshes: Vec<PathBuf>,

        /// Output image, format determined by extension
        #[arg(short, long, default_value = "out.png")]
        output: PathBuf,

        #[arg(long, default_value_t = 800)]
        width: u32,

        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Samples per pixel
        #[arg(long, default_value_t = NonZeroU32::new(4).unwrap())]
        samples: NonZeroU32,

        #[arg(long, default_value_t = NonZeroU32::new(32).unwrap())]
        tile_size: NonZeroU32,

        #[arg(long, value_enum, default_value_t = ShadingArg::Normals)]
        shading: ShadingArg,

        #[command(flatten)]
        tree: TreeArgs,
    },
    /// Print k-d tree statistics for a mesh and check it against brute force intersection
    Stats {
        mesh: PathBuf,

        #[command(flatten)]
        tree: TreeArgs,

        /// Number of random rays to check
        #[arg(long, default_value_t = 10000)]
        rays: usize,

        /// Dump the whole tree
        #[arg(long)]
        print_tree: bool,
    },
}

#[derive(clap::Args)]
struct TreeArgs {
    #[arg(long, default_value_t = DEFAULT_DEPTH_MAX)]
    depth_max: u32,

    #[arg(long, default_value_t = DEFAULT_MINIMAL_LEAF_SIZE)]
    minimal_leaf_size: usize,
}

impl From<&TreeArgs> for KdTreeSettings {
    fn from(args: &TreeArgs) -> Self {
        KdTreeSettings::builder()
            .depth_max(args.depth_max)
            .minimal_leaf_size(args.minimal_leaf_size)
            .build()
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum ShadingArg {
    Normals,
    LeafIds,
}

impl From<ShadingArg> for Shading {
    fn from(value: ShadingArg) -> Self {
        match value {
            ShadingArg::Normals => Shading::Normals,
            ShadingArg::LeafIds => Shading::LeafIds,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            meshes,
            output,
            width,
            height,
            samples,
            tile_size,
            shading,
            tree,
        } => {
            let scene = load_scene(&meshes, (&tree).into())?;
            let settings = RenderSettings {
                tile_size,
                sample_count: samples,
                shading: shading.into(),
            };
            render_scene(scene, ScreenSize::new(width, height), settings, &output)?;
        }
        Commands::Stats {
            mesh,
            tree,
            rays,
            print_tree,
        } => {
            stats(&mesh, (&tree).into(), rays, print_tree)?;
        }
    }

    Ok(())
}

fn load_scene(paths: &[PathBuf], settings: KdTreeSettings) -> anyhow::Result<Scene> {
    let meshes = if paths.is_empty() {
        vec![Mesh::uv_sphere(1.0, 64, 32)]
    } else {
        paths
            .iter()
            .map(|path| {
                Mesh::with_obj(path).with_context(|| format!("Loading {}", path.display()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut objects = Vec::with_capacity(meshes.len());
    let mut next_x: FloatType = 0.0;
    for mesh in meshes {
        let object = Object::new(Arc::new(mesh), Material::default(), settings)?;
        let bounding_box = object.bounding_box();
        let translation = WorldVector::new(next_x - bounding_box.min.x, 0.0, 0.0);
        next_x += bounding_box.width() * 1.1;
        objects.push(object.with_translation(translation));
    }

    Ok(Scene::new(objects))
}

fn render_scene(
    scene: Scene,
    resolution: ScreenSize,
    settings: RenderSettings,
    output: &PathBuf,
) -> anyhow::Result<()> {
    let bounding_box = scene.bounding_box().context("Scene is empty")?;
    let camera = Camera::framing(&bounding_box, resolution);

    let start = Instant::now();
    let bar = ProgressBar::no_length();
    let mut render_progress = render(scene, camera, settings, |_| {}, {
        let bar = bar.clone();
        move |_, progress| {
            bar.update(|ps| {
                ps.set_len(progress.total as u64);
                ps.set_pos(progress.finished as u64)
            })
        }
    })?;
    bar.set_length(render_progress.progress().total as u64);

    render_progress.wait();
    bar.finish();
    tracing::info!(elapsed = ?start.elapsed(), "Rendering finished");

    render_progress
        .image()
        .lock()
        .expect("Poisoned lock!")
        .save(output)
        .with_context(|| format!("Saving {}", output.display()))?;

    Ok(())
}

fn stats(
    path: &PathBuf,
    settings: KdTreeSettings,
    ray_count: usize,
    print_tree: bool,
) -> anyhow::Result<()> {
    let mesh = Mesh::with_obj(path).with_context(|| format!("Loading {}", path.display()))?;

    let start = Instant::now();
    let tree = KdTree::build(&mesh, settings)?;
    println!("Build time: {:?}", start.elapsed());

    tree.print_statistics();
    if print_tree {
        tree.print_tree();
    }

    let bounding_box = tree.bounding_box();
    let center = bounding_box.center();
    let radius = bounding_box.diagonal();
    let mut rng = SmallRng::seed_from_u64(0);
    let rays: Vec<Ray> = (0..ray_count)
        .map(|_| {
            let mut random_point = || {
                center
                    + WorldVector::from_fn(|_, _| rng.random_range(-radius..=radius))
            };
            let origin: WorldPoint = random_point();
            let target = random_point();
            Ray::new(origin, target - origin)
        })
        .filter(|ray| ray.direction.iter().all(|x| x.is_finite()))
        .collect();

    let start = Instant::now();
    let tree_hits: Vec<_> = rays
        .iter()
        .map(|ray| tree.intersects_ray(&mesh, ray, FloatType::INFINITY))
        .collect();
    let tree_time = start.elapsed();

    let start = Instant::now();
    let brute_force_hits: Vec<_> = rays
        .iter()
        .map(|ray| mesh.intersect_ray_brute_force(ray, FloatType::INFINITY))
        .collect();
    let brute_force_time = start.elapsed();

    let mismatches = tree_hits
        .iter()
        .zip(&brute_force_hits)
        .filter(|(tree_hit, brute_force_hit)| match (tree_hit, brute_force_hit) {
            (None, None) => false,
            (Some(a), Some((_, b))) => (a.distance - b.t).abs() > 1e-4,
            _ => true,
        })
        .count();
    let hit_count = tree_hits.iter().filter(|hit| hit.is_some()).count();

    println!(
        "{} rays, {} hits: k-d tree {:?}, brute force {:?}",
        rays.len(),
        hit_count,
        tree_time,
        brute_force_time
    );
    if mismatches > 0 {
        anyhow::bail!("{mismatches} rays differ from brute force");
    }
    println!("All rays match brute force");

    Ok(())
}
