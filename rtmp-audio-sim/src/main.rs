//! Drive one simulated streaming session from the command line and print
//! every state notification as JSON, then a JSON report of the session.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{unbounded, RecvTimeoutError};

use rtmp_audio_core::{ChannelObserver, ControllerOptions, StreamController, StreamState};
use rtmp_audio_sim::{sim_backends, SimOptions, SimTransportOptions};

#[derive(Parser, Debug)]
#[command(name = "rtmp-audio-sim", about = "Stream a simulated microphone through the RTMP audio core")]
struct Args {
    /// Destination, `rtmp://host[:port]/app/key`.
    #[arg(long, default_value = "rtmp://localhost/live/stream")]
    url: String,

    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    #[arg(long, default_value_t = 1)]
    channels: u16,

    #[arg(long, default_value_t = 128_000)]
    bitrate: u32,

    /// How long to stream before stopping.
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Simulated handshake duration in milliseconds.
    #[arg(long, default_value_t = 200)]
    connect_delay_ms: u64,

    #[arg(long)]
    deny_permission: bool,

    /// Make the microphone fail after this many 20 ms frames.
    #[arg(long)]
    fail_after_frames: Option<u64>,

    /// Stream key the simulated server rejects.
    #[arg(long)]
    reject_key: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let backends = sim_backends(SimOptions {
        transport: SimTransportOptions {
            connect_delay: Duration::from_millis(args.connect_delay_ms),
            reject_key: args.reject_key.clone(),
        },
        fail_after_frames: args.fail_after_frames,
        deny_permission: args.deny_permission,
    });

    let controller = match StreamController::new(backends, ControllerOptions::default()) {
        Ok(controller) => controller,
        Err(e) => {
            log::error!("failed to create controller: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (tx, rx) = unbounded();
    controller.set_observer(Arc::new(ChannelObserver::new(tx)));

    match controller.start(&args.url, args.sample_rate, args.channels, args.bitrate) {
        Ok(true) => {}
        Ok(false) => log::warn!("start refused"),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    }

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut failed = false;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(event) => {
                println!("{}", event.to_json());
                match event.state {
                    StreamState::Failed => failed = true,
                    StreamState::Disconnected => break,
                    _ => {}
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                controller.stop();
                if let Ok(event) = rx.recv_timeout(Duration::from_secs(1)) {
                    println!("{}", event.to_json());
                }
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(info) = controller.session_info() {
        log::info!("session {} to {} started {}", info.id, info.destination, info.started_at);
        match info.to_json() {
            Ok(report) => println!("{report}"),
            Err(e) => log::warn!("failed to serialize session report: {e}"),
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
