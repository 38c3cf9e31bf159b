//! # Axis Transform Module
//!
//! Applies deadzone, saturation and output range to a raw virtual axis value.
//!
//! ## Regions
//!
//! The physical domain is split into five regions, mirrored around neutral:
//!
//! 1. Below the negative saturation cutoff: `range_min`
//! 2. Between negative saturation and deadzone cutoffs: interpolated towards `range_min`
//! 3. Within the deadzone (inclusive): `range_neutral`
//! 4. Between positive deadzone and saturation cutoffs: interpolated towards `range_max`
//! 5. Above the positive saturation cutoff: `range_max`
//!
//! Deadzone and saturation are parts per 10000 of the physical half-range.
//!
//! ## Usage
//!
//! ```
//! use vpad_mapper::controller::axis_transform::AxisProperties;
//!
//! let props = AxisProperties::new(1000, 9000, -100, 100)?;
//!
//! // Within the deadzone
//! assert_eq!(props.apply(1000), 0);
//!
//! // Beyond saturation
//! assert_eq!(props.apply(32000), 100);
//! # Ok::<(), vpad_mapper::error::MapperError>(())
//! ```

use crate::controller::types::{ANALOG_VALUE_MAX, ANALOG_VALUE_MIN, ANALOG_VALUE_NEUTRAL};
use crate::error::{MapperError, Result};

/// Minimum allowed deadzone.
pub const AXIS_DEADZONE_MIN: u32 = 0;
/// Maximum allowed deadzone.
pub const AXIS_DEADZONE_MAX: u32 = 10000;
/// Default deadzone.
pub const AXIS_DEADZONE_DEFAULT: u32 = AXIS_DEADZONE_MIN;

/// Minimum allowed saturation.
pub const AXIS_SATURATION_MIN: u32 = 0;
/// Maximum allowed saturation.
pub const AXIS_SATURATION_MAX: u32 = 10000;
/// Default saturation.
pub const AXIS_SATURATION_DEFAULT: u32 = AXIS_SATURATION_MAX;

/// Default minimum of the output range.
pub const AXIS_RANGE_MIN_DEFAULT: i32 = ANALOG_VALUE_MIN;
/// Default maximum of the output range.
pub const AXIS_RANGE_MAX_DEFAULT: i32 = ANALOG_VALUE_MAX;

/// Per-axis transform properties.
///
/// Every setter validates its input and leaves the properties untouched on
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisProperties {
    deadzone: u32,
    saturation: u32,
    range_min: i32,
    range_max: i32,
}

impl Default for AxisProperties {
    fn default() -> Self {
        Self {
            deadzone: AXIS_DEADZONE_DEFAULT,
            saturation: AXIS_SATURATION_DEFAULT,
            range_min: AXIS_RANGE_MIN_DEFAULT,
            range_max: AXIS_RANGE_MAX_DEFAULT,
        }
    }
}

impl AxisProperties {
    /// Creates validated axis properties.
    ///
    /// # Arguments
    ///
    /// * `deadzone` - Deadzone, 0 to 10000
    /// * `saturation` - Saturation, 0 to 10000
    /// * `range_min` - Output value at negative saturation
    /// * `range_max` - Output value at positive saturation
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a value is out of bounds or `range_min >= range_max`.
    pub fn new(deadzone: u32, saturation: u32, range_min: i32, range_max: i32) -> Result<Self> {
        let mut props = Self::default();
        props.set_deadzone(deadzone)?;
        props.set_saturation(saturation)?;
        props.set_range(range_min, range_max)?;
        Ok(props)
    }

    /// Deadzone in parts per 10000.
    #[must_use]
    pub fn deadzone(&self) -> u32 {
        self.deadzone
    }

    /// Saturation in parts per 10000.
    #[must_use]
    pub fn saturation(&self) -> u32 {
        self.saturation
    }

    /// Output range as `(min, max)`.
    #[must_use]
    pub fn range(&self) -> (i32, i32) {
        (self.range_min, self.range_max)
    }

    /// Midpoint of the output range, truncated towards zero.
    #[must_use]
    pub fn range_neutral(&self) -> i32 {
        ((i64::from(self.range_min) + i64::from(self.range_max)) / 2) as i32
    }

    /// Sets the deadzone.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `deadzone` exceeds 10000.
    pub fn set_deadzone(&mut self, deadzone: u32) -> Result<()> {
        if !(AXIS_DEADZONE_MIN..=AXIS_DEADZONE_MAX).contains(&deadzone) {
            return Err(MapperError::Validation(format!(
                "deadzone {} out of range ({}-{})",
                deadzone, AXIS_DEADZONE_MIN, AXIS_DEADZONE_MAX
            )));
        }
        self.deadzone = deadzone;
        Ok(())
    }

    /// Sets the saturation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `saturation` exceeds 10000.
    pub fn set_saturation(&mut self, saturation: u32) -> Result<()> {
        if !(AXIS_SATURATION_MIN..=AXIS_SATURATION_MAX).contains(&saturation) {
            return Err(MapperError::Validation(format!(
                "saturation {} out of range ({}-{})",
                saturation, AXIS_SATURATION_MIN, AXIS_SATURATION_MAX
            )));
        }
        self.saturation = saturation;
        Ok(())
    }

    /// Sets the output range.
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless `range_min < range_max`.
    pub fn set_range(&mut self, range_min: i32, range_max: i32) -> Result<()> {
        if range_min >= range_max {
            return Err(MapperError::Validation(format!(
                "range minimum {} must be below maximum {}",
                range_min, range_max
            )));
        }
        self.range_min = range_min;
        self.range_max = range_max;
        Ok(())
    }

    /// Transforms a raw axis value with these properties.
    #[must_use]
    pub fn apply(&self, raw: i32) -> i32 {
        transform(raw, self)
    }
}

/// Cutoff point for a proportion of the half-range towards `extreme`.
fn cutoff(extreme: i32, proportion: u32) -> i32 {
    ANALOG_VALUE_NEUTRAL
        + (f64::from(extreme - ANALOG_VALUE_NEUTRAL)
            * (f64::from(proportion) / f64::from(AXIS_SATURATION_MAX))) as i32
}

/// Transforms a raw axis value into the output range of `props`.
///
/// Inputs outside the physical domain are clamped into it first. The result
/// is monotonically non-decreasing in `raw` and always within the output range.
///
/// # Examples
///
/// ```
/// use vpad_mapper::controller::axis_transform::{transform, AxisProperties};
///
/// let props = AxisProperties::default();
/// assert_eq!(transform(-32768, &props), -32768);
/// assert_eq!(transform(0, &props), 0);
/// assert_eq!(transform(32767, &props), 32767);
/// ```
#[must_use]
pub fn transform(raw: i32, props: &AxisProperties) -> i32 {
    let raw = raw.clamp(ANALOG_VALUE_MIN, ANALOG_VALUE_MAX);

    let deadzone_negative = cutoff(ANALOG_VALUE_MIN, props.deadzone);
    let deadzone_positive = cutoff(ANALOG_VALUE_MAX, props.deadzone);
    let saturation_negative = cutoff(ANALOG_VALUE_MIN, props.saturation);
    let saturation_positive = cutoff(ANALOG_VALUE_MAX, props.saturation);

    let range_min = f64::from(props.range_min);
    let range_max = f64::from(props.range_max);
    let range_neutral = f64::from(props.range_neutral());

    let output = if raw >= deadzone_negative && raw <= deadzone_positive {
        range_neutral
    } else if raw < deadzone_negative {
        if raw < saturation_negative {
            range_min
        } else {
            let step = (range_neutral - range_min) / f64::from(deadzone_negative - saturation_negative);
            range_min + f64::from(raw - saturation_negative) * step
        }
    } else if raw > saturation_positive {
        range_max
    } else {
        let step = (range_max - range_neutral) / f64::from(saturation_positive - deadzone_positive);
        range_neutral + f64::from(raw - deadzone_positive) * step
    };

    (output.round() as i64).clamp(i64::from(props.range_min), i64::from(props.range_max)) as i32
}
