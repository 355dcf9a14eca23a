//! vrshell headless driver: runs the frame loop over scripted device, host
//! and render doubles and logs every host event.

use std::f32::consts::PI;

use clap::Parser;
use tracing::info;

use vrshell::host::EventCategory;
use vrshell::scripted::{DeviceEvent, RecordingHost, RecordingRenderContext, ScriptedDevice};
use vrshell::vr::math::{Mat4, Quat, Vec3};
use vrshell::{World, WorldConfig};

#[derive(Parser, Debug)]
#[command(name = "vrshell-headless", about = "Headless VR browser shell frame loop")]
struct Cli {
    /// Number of frames to run
    #[arg(long, default_value = "90")]
    frames: u32,

    /// Number of tracked controllers
    #[arg(long, default_value = "2")]
    controllers: usize,

    /// Display density in dpi (scales the URL bar)
    #[arg(long)]
    density: Option<f32>,

    /// Touchpad-to-scroll multiplier
    #[arg(long, default_value = "20")]
    scroll_factor: f32,

    /// Skip head pose reporting
    #[arg(long)]
    no_head_pose: bool,
}

/// Per-frame script: controllers sweep left to right across the browser
/// widget while touching the pad; the first controller clicks halfway.
fn sweep_script(frames: u32, controllers: usize) -> Vec<Vec<DeviceEvent>> {
    (0..frames)
        .map(|frame| {
            let progress = if frames > 1 { frame as f32 / (frames - 1) as f32 } else { 0.0 };
            let yaw = (0.2 - 0.4 * progress) * PI / 4.0;
            let mut events: Vec<DeviceEvent> = (0..controllers)
                .flat_map(|controller| {
                    let height = 0.1 * controller as f32;
                    let pose = Mat4::from_pose(Vec3::new(0.0, height, 0.0), &Quat::from_euler(yaw, 0.05, 0.0));
                    [
                        DeviceEvent::Pose { controller, transform: pose },
                        DeviceEvent::Touchpad {
                            controller,
                            position: Some((0.5, progress)),
                        },
                    ]
                })
                .collect();
            if controllers > 0 && frame == frames / 2 {
                events.push(DeviceEvent::Button { controller: 0, pressed: true });
            }
            if controllers > 0 && frame == frames / 2 + 1 {
                events.push(DeviceEvent::Button { controller: 0, pressed: false });
            }
            events
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "vrshell=info".into()),
        )
        .init();

    info!("vrshell-headless v{} starting", env!("CARGO_PKG_VERSION"));

    let config = WorldConfig {
        scroll_factor: cli.scroll_factor,
        ..WorldConfig::default()
    };

    let render = RecordingRenderContext::new();
    let render_probe = render.probe();
    let mut world = World::new(Box::new(render), config);

    let mut host = RecordingHost::new();
    if let Some(density) = cli.density {
        host = host.with_density(density);
    }
    if cli.no_head_pose {
        host = host.without(EventCategory::HeadPose);
    }
    world.initialize_host(&mut host)?;

    for widget in world.widgets() {
        render_probe.create_surface(widget.surface_name());
    }

    let device = ScriptedDevice::new(cli.controllers).with_script(sweep_script(cli.frames, cli.controllers));
    let device_probe = device.probe();
    world.register_device(Some(Box::new(device)));
    world.resume();

    for _ in 0..cli.frames {
        world.draw();
        for event in host.take_events() {
            if event.category() == EventCategory::HeadPose {
                tracing::trace!("{:?}", event);
            } else {
                info!("frame {}: {:?}", world.frame_count(), event);
            }
        }
    }

    world.pause();
    world.register_device(None);
    world.shutdown_gl();
    world.shutdown_host();

    info!(
        "done: {} frame(s) drawn, {} device frame(s) started, {} draw call(s)",
        world.frame_count(),
        device_probe.frames_started(),
        render_probe.draws().len()
    );
    Ok(())
}
