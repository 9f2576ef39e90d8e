//! Mesh viewer - main entry point.
//!
//! Loads a mesh and texture up front, brings up the Vulkan presentation
//! stack, and runs the poll/begin/record/end frame loop until the window
//! closes or a fatal error unwinds it.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use wsi_core::FrameTimer;
use wsi_frame::{FrameOrchestrator, VulkanBackend};
use wsi_platform::{KeyCode, Platform, WinitPlatform};
use wsi_resources::{MeshData, TextureData};
use wsi_rhi::device::Device;
use wsi_rhi::instance::Instance;
use wsi_rhi::physical_device::select_physical_device;
use wsi_rhi::rendering::RenderingConfig;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
const WINDOW_TITLE: &str = "Mesh Viewer";

const DEFAULT_MESH: &str = "model.obj";
const DEFAULT_TEXTURE: &str = "diffuse.png";

const CLEAR_COLOR: [f32; 4] = [0.1, 0.2, 0.3, 1.0];

struct Args {
    mesh: PathBuf,
    texture: PathBuf,
}

/// Two optional positional arguments: mesh path and texture path.
///
/// Both must be given to override the defaults; anything else falls back to
/// the built-in filenames. No flags, no environment variables.
fn parse_args(args: impl Iterator<Item = String>) -> Args {
    let positional: Vec<String> = args.skip(1).collect();

    match positional.as_slice() {
        [mesh, texture] => Args {
            mesh: PathBuf::from(mesh),
            texture: PathBuf::from(texture),
        },
        _ => Args {
            mesh: PathBuf::from(DEFAULT_MESH),
            texture: PathBuf::from(DEFAULT_TEXTURE),
        },
    }
}

fn main() -> ExitCode {
    wsi_core::init_logging();

    let args = parse_args(env::args());
    info!("Using mesh file {}", args.mesh.display());
    info!("Using texture file {}", args.texture.display());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    // Assets load once, before the frame loop; failures here are fatal and
    // never retried.
    let mesh = MeshData::load(&args.mesh)
        .with_context(|| format!("loading mesh '{}'", args.mesh.display()))?;
    info!(
        "Mesh has {} vertices and {} triangles",
        mesh.vertices.len(),
        mesh.triangle_count()
    );

    let texture = TextureData::load(&args.texture)
        .with_context(|| format!("loading texture '{}'", args.texture.display()))?;
    info!(
        "Texture has width {} and height {}",
        texture.width, texture.height
    );

    let mut platform = WinitPlatform::new(WINDOW_WIDTH, WINDOW_HEIGHT, WINDOW_TITLE)?;

    let instance = Instance::new(&platform.instance_extensions()?, cfg!(debug_assertions))?;
    let surface = platform.create_surface(instance.entry(), instance.handle())?;
    let physical = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
    let device = Device::new(&instance, &physical)?;

    let backend = VulkanBackend::new(instance, surface, device)?;
    let mut orchestrator = FrameOrchestrator::new(backend, &platform)?;

    info!("Initialization complete, entering main loop");

    let mut timer = FrameTimer::new();
    let loop_result = frame_loop(&mut platform, &mut orchestrator, &mut timer);

    // Orderly teardown on both the normal and the error path
    let shutdown_result = orchestrator.shutdown();
    loop_result?;
    shutdown_result?;

    info!(
        "Rendered {} frames in {:.1}s ({:.1} fps average)",
        timer.frames(),
        timer.elapsed().as_secs_f32(),
        timer.average_fps()
    );
    Ok(())
}

fn frame_loop(
    platform: &mut WinitPlatform,
    orchestrator: &mut FrameOrchestrator<VulkanBackend>,
    timer: &mut FrameTimer,
) -> Result<()> {
    while platform.alive() {
        platform.poll_input();
        if platform.input().just_pressed(KeyCode::Escape) {
            platform.request_close();
        }
        if !platform.alive() {
            break;
        }

        let _delta = timer.delta_secs();

        let frame = orchestrator.begin_frame(platform)?;

        // Just clear the backbuffer; mesh and texture draw recording would
        // go between begin_rendering and end_rendering.
        let target = frame.target();
        let pass = RenderingConfig::color_only(target.view, target.extent, CLEAR_COLOR);
        let cmd = frame.recording();
        cmd.begin_rendering(&pass);
        cmd.end_rendering();

        orchestrator.end_frame(frame)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_from(values: &[&str]) -> Args {
        parse_args(values.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_fall_back_to_defaults() {
        let args = args_from(&["mesh-viewer"]);
        assert_eq!(args.mesh, PathBuf::from(DEFAULT_MESH));
        assert_eq!(args.texture, PathBuf::from(DEFAULT_TEXTURE));
    }

    #[test]
    fn both_arguments_override_defaults() {
        let args = args_from(&["mesh-viewer", "teapot.obj", "teapot.png"]);
        assert_eq!(args.mesh, PathBuf::from("teapot.obj"));
        assert_eq!(args.texture, PathBuf::from("teapot.png"));
    }

    #[test]
    fn partial_arguments_fall_back_to_defaults() {
        let args = args_from(&["mesh-viewer", "teapot.obj"]);
        assert_eq!(args.mesh, PathBuf::from(DEFAULT_MESH));
        assert_eq!(args.texture, PathBuf::from(DEFAULT_TEXTURE));
    }
}
