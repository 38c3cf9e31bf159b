//! # vpad-mapper
//!
//! Presents a physical gamepad as a configurable virtual controller.
//!
//! The binary reads a Linux evdev gamepad, maps it through a named mapper and
//! polls the resulting virtual controller, logging state changes as native
//! data packets.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use vpad_mapper::config::Config;
use vpad_mapper::controller::data_format::DataFormatSpec;
use vpad_mapper::controller::evdev_source::EvdevGamepad;
use vpad_mapper::controller::virtual_controller::VirtualController;
use vpad_mapper::mapper::MapperRegistry;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Number of polls between status log messages
const LOG_INTERVAL_POLLS: u64 = 1000;

/// Main entry point for vpad-mapper
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (defaults if the file does not exist)
///    - Build configured mappers into the global registry
///    - Open the physical gamepad and bind the native data format
///
/// 2. **Main Loop**
///    - Poll the gamepad at the configured rate
///    - Log each changed packet at debug level, a status line every 1000 polls
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - The configuration is invalid
/// - The selected mapper does not exist
/// - No gamepad can be opened
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug cargo run --release -- config.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("vpad-mapper v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = if Path::new(&config_path).exists() {
        info!("Loading configuration from {}", config_path);
        Config::load(&config_path).with_context(|| format!("invalid configuration {}", config_path))?
    } else {
        info!("No configuration at {}, using defaults", config_path);
        Config::default()
    };

    let registry = MapperRegistry::global();
    config.build_mappers(registry)?;

    let mapper = registry
        .lookup(&config.controller.mapper)
        .with_context(|| format!("unknown mapper '{}'", config.controller.mapper))?;
    let controller = VirtualController::with_axis_defaults(mapper, config.axis_properties()?);
    info!(
        "Using mapper {} ({} axes, {} buttons, POV: {})",
        controller.mapper().name(),
        controller.capabilities().num_axes(),
        controller.capabilities().num_buttons(),
        controller.capabilities().has_pov()
    );

    let calibration = config.calibration()?;
    let mut gamepad = if config.controller.device_path.is_empty() {
        EvdevGamepad::open(calibration)?
    } else {
        EvdevGamepad::open_path(&config.controller.device_path, calibration)?
    };
    info!("Reading {} at {}", gamepad.name(), gamepad.device_path());

    controller.set_data_format(&DataFormatSpec::native(controller.capabilities()))?;
    let mut packet = vec![0u8; controller.packet_size().unwrap_or_default() as usize];

    let period_ms = 1000 / u64::from(config.controller.polling_rate_hz);
    let mut poll_interval = interval(Duration::from_millis(period_ms));

    info!("Polling at {}Hz", config.controller.polling_rate_hz);
    info!("Press Ctrl+C to exit");

    let mut poll_count: u64 = 0;
    let mut change_count: u64 = 0;

    // Main polling loop
    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                poll_count += 1;

                match controller.poll(&mut gamepad) {
                    Ok(true) => {
                        change_count += 1;
                        controller.get_device_state(&mut packet)?;
                        debug!("State changed: {:02x?}", packet);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("{}", e);
                        break;
                    }
                }

                if poll_count % LOG_INTERVAL_POLLS == 0 {
                    let state = controller.state();
                    info!(
                        "{} polls, {} changes, POV: {:?}",
                        poll_count,
                        change_count,
                        state.pov_heading()
                    );
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Total polls: {}, state changes: {}", poll_count, change_count);
    Ok(())
}
