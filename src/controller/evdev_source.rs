//! # Physical Gamepad Source
//!
//! Reads the physical gamepad through the Linux evdev interface and
//! normalizes it into a [`PhysicalState`].
//!
//! ## Event Codes
//!
//! | Physical element | evdev code |
//! |------------------|------------|
//! | Left stick | ABS_X, ABS_Y |
//! | Right stick | ABS_RX, ABS_RY |
//! | Triggers | ABS_Z (LT), ABS_RZ (RT) |
//! | D-Pad | ABS_HAT0X, ABS_HAT0Y or BTN_DPAD_* |
//! | Face buttons | BTN_SOUTH (A), BTN_EAST (B), BTN_WEST (X), BTN_NORTH (Y) |
//! | Shoulders | BTN_TL, BTN_TR |
//! | Back / Start | BTN_SELECT, BTN_START |
//! | Stick clicks | BTN_THUMBL, BTN_THUMBR |
//!
//! Raw stick and trigger values are rescaled from their configured evdev
//! range into the physical domain.
//!
//! ## Threading
//!
//! `fetch_events` blocks, so [`EvdevGamepad`] moves the device into a reader
//! thread which keeps the latest sample behind a mutex. [`PhysicalSource::read_state`]
//! only copies that sample.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key};
use tracing::{debug, info, warn};

use crate::controller::types::{
    PhysicalButton, PhysicalState, ANALOG_VALUE_MAX, ANALOG_VALUE_MIN, TRIGGER_VALUE_MAX,
};
use crate::error::{MapperError, Result};

/// Source of physical gamepad samples.
#[cfg_attr(test, mockall::automock)]
pub trait PhysicalSource {
    /// Returns the current physical sample.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the gamepad is disconnected or unreadable.
    fn read_state(&mut self) -> Result<PhysicalState>;
}

/// Raw evdev value range of an input axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRange {
    pub min: i32,
    pub max: i32,
}

impl RawRange {
    /// Creates a raw range.
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless `min < max`.
    pub fn new(min: i32, max: i32) -> Result<Self> {
        if min >= max {
            return Err(MapperError::Validation(format!(
                "raw range minimum {} must be below maximum {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Linearly rescales `value` into `target_min..=target_max`.
    fn rescale(&self, value: i32, target_min: i32, target_max: i32) -> i32 {
        let value = i64::from(value.clamp(self.min, self.max));
        let span = i64::from(self.max) - i64::from(self.min);
        let target_span = i64::from(target_max) - i64::from(target_min);
        (i64::from(target_min) + (value - i64::from(self.min)) * target_span / span) as i32
    }
}

impl Default for RawRange {
    fn default() -> Self {
        Self { min: 0, max: 255 }
    }
}

/// Raw ranges of the evdev device's sticks and triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputCalibration {
    pub stick: RawRange,
    pub trigger: RawRange,
}

/// Folds evdev events into a [`PhysicalState`].
///
/// # Examples
///
/// ```
/// use evdev::{EventType, InputEvent, Key};
/// use vpad_mapper::controller::evdev_source::EventMapper;
/// use vpad_mapper::controller::types::PhysicalButton;
///
/// let mut mapper = EventMapper::default();
/// mapper.process_event(&InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 1));
/// assert!(mapper.state().is_pressed(PhysicalButton::A));
/// ```
#[derive(Debug, Default)]
pub struct EventMapper {
    state: PhysicalState,
    calibration: InputCalibration,
}

impl EventMapper {
    /// Creates an event mapper for a device with the given raw ranges.
    #[must_use]
    pub fn new(calibration: InputCalibration) -> Self {
        Self {
            state: PhysicalState::default(),
            calibration,
        }
    }

    /// Current physical sample.
    #[must_use]
    pub fn state(&self) -> PhysicalState {
        self.state
    }

    /// Processes one evdev event.
    pub fn process_event(&mut self, event: &InputEvent) {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            InputEventKind::Key(key) => self.process_key_event(key, event.value() != 0),
            _ => {}
        }
    }

    fn stick(&self, value: i32) -> i16 {
        self.calibration
            .stick
            .rescale(value, ANALOG_VALUE_MIN, ANALOG_VALUE_MAX) as i16
    }

    fn trigger(&self, value: i32) -> u8 {
        self.calibration
            .trigger
            .rescale(value, 0, i32::from(TRIGGER_VALUE_MAX)) as u8
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        match axis {
            AbsoluteAxisType::ABS_X => self.state.left_stick_x = self.stick(value),
            AbsoluteAxisType::ABS_Y => self.state.left_stick_y = self.stick(value),
            AbsoluteAxisType::ABS_RX => self.state.right_stick_x = self.stick(value),
            AbsoluteAxisType::ABS_RY => self.state.right_stick_y = self.stick(value),
            AbsoluteAxisType::ABS_Z => self.state.left_trigger = self.trigger(value),
            AbsoluteAxisType::ABS_RZ => self.state.right_trigger = self.trigger(value),
            AbsoluteAxisType::ABS_HAT0X => {
                self.state.set_button(PhysicalButton::DpadLeft, value < 0);
                self.state.set_button(PhysicalButton::DpadRight, value > 0);
            }
            AbsoluteAxisType::ABS_HAT0Y => {
                self.state.set_button(PhysicalButton::DpadUp, value < 0);
                self.state.set_button(PhysicalButton::DpadDown, value > 0);
            }
            _ => {}
        }
    }

    fn process_key_event(&mut self, key: Key, pressed: bool) {
        let button = match key {
            Key::BTN_SOUTH => PhysicalButton::A,
            Key::BTN_EAST => PhysicalButton::B,
            Key::BTN_WEST => PhysicalButton::X,
            Key::BTN_NORTH => PhysicalButton::Y,
            Key::BTN_TL => PhysicalButton::LeftShoulder,
            Key::BTN_TR => PhysicalButton::RightShoulder,
            Key::BTN_SELECT => PhysicalButton::Back,
            Key::BTN_START => PhysicalButton::Start,
            Key::BTN_THUMBL => PhysicalButton::LeftStick,
            Key::BTN_THUMBR => PhysicalButton::RightStick,
            Key::BTN_DPAD_UP => PhysicalButton::DpadUp,
            Key::BTN_DPAD_DOWN => PhysicalButton::DpadDown,
            Key::BTN_DPAD_LEFT => PhysicalButton::DpadLeft,
            Key::BTN_DPAD_RIGHT => PhysicalButton::DpadRight,
            _ => return,
        };
        self.state.set_button(button, pressed);
    }

    /// Resets to the neutral sample.
    pub fn reset(&mut self) {
        self.state = PhysicalState::default();
    }
}

/// Sample shared between the reader thread and [`EvdevGamepad`].
#[derive(Debug, Default)]
struct SharedSample {
    mapper: EventMapper,
    error: Option<String>,
}

/// Physical gamepad read through evdev.
pub struct EvdevGamepad {
    device_path: String,
    name: String,
    shared: Arc<Mutex<SharedSample>>,
}

impl EvdevGamepad {
    /// Detects and opens the first gamepad under `/dev/input`.
    ///
    /// A device qualifies if it reports `BTN_SOUTH` and `ABS_X`.
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: no qualifying device
    /// - `Device`: `/dev/input` unreadable or the reader thread failed to start
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vpad_mapper::controller::evdev_source::{EvdevGamepad, InputCalibration};
    ///
    /// let gamepad = EvdevGamepad::open(InputCalibration::default())?;
    /// println!("Reading gamepad at: {}", gamepad.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(calibration: InputCalibration) -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(MapperError::Device("/dev/input directory not found".to_string()));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| MapperError::Device(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MapperError::Device(format!("Failed to read directory entry: {}", e)))?;

        // Deterministic choice when several gamepads are connected
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_device = path
                .file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("event"));
            if !is_event_device {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    debug!(
                        "Found input device: {} ({})",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );

                    if Self::is_gamepad(&device) {
                        info!("Found gamepad at: {}", path.display());
                        return Self::start(device, path.to_string_lossy().to_string(), calibration);
                    }
                }
                Err(e) => debug!("Could not open {}: {}", path.display(), e),
            }
        }

        Err(MapperError::DeviceNotFound)
    }

    /// Opens the gamepad at a specific device path.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the device cannot be opened.
    pub fn open_path(path: &str, calibration: InputCalibration) -> Result<Self> {
        let device = Device::open(path)?;
        info!("Opened gamepad at: {}", path);
        Self::start(device, path.to_string(), calibration)
    }

    fn is_gamepad(device: &Device) -> bool {
        let has_south = device
            .supported_keys()
            .map_or(false, |keys| keys.contains(Key::BTN_SOUTH));
        let has_x = device
            .supported_absolute_axes()
            .map_or(false, |axes| axes.contains(AbsoluteAxisType::ABS_X));
        has_south && has_x
    }

    fn start(mut device: Device, device_path: String, calibration: InputCalibration) -> Result<Self> {
        let name = device.name().unwrap_or("unnamed").to_string();
        let shared = Arc::new(Mutex::new(SharedSample {
            mapper: EventMapper::new(calibration),
            error: None,
        }));

        let reader = Arc::clone(&shared);
        let thread_path = device_path.clone();
        thread::Builder::new()
            .name("evdev-reader".to_string())
            .spawn(move || loop {
                match device.fetch_events() {
                    Ok(events) => {
                        let events: Vec<InputEvent> = events.collect();
                        let mut sample = reader.lock().unwrap_or_else(PoisonError::into_inner);
                        for event in &events {
                            sample.mapper.process_event(event);
                        }
                    }
                    Err(e) => {
                        warn!("Gamepad at {} stopped: {}", thread_path, e);
                        let mut sample = reader.lock().unwrap_or_else(PoisonError::into_inner);
                        sample.mapper.reset();
                        sample.error = Some(e.to_string());
                        break;
                    }
                }
            })?;

        Ok(Self {
            device_path,
            name,
            shared,
        })
    }

    /// Path of the opened device.
    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Name reported by the device.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PhysicalSource for EvdevGamepad {
    fn read_state(&mut self) -> Result<PhysicalState> {
        let sample = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        match &sample.error {
            Some(error) => Err(MapperError::Device(format!(
                "Gamepad at {} disconnected: {}",
                self.device_path, error
            ))),
            None => Ok(sample.mapper.state()),
        }
    }
}
