//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! ```toml
//! [controller]
//! mapper = "Custom"
//! device_path = ""
//! polling_rate_hz = 250
//!
//! [axis]
//! deadzone = 1000
//!
//! [[blueprint]]
//! name = "Custom"
//! template = "StandardGamepad"
//!
//! [blueprint.elements]
//! TriggerLT = { type = "button", button = 14 }
//! StickRightX = { type = "remove" }
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::controller::axis_transform::{
    AxisProperties, AXIS_DEADZONE_DEFAULT, AXIS_DEADZONE_MAX, AXIS_RANGE_MAX_DEFAULT,
    AXIS_RANGE_MIN_DEFAULT, AXIS_SATURATION_DEFAULT, AXIS_SATURATION_MAX,
};
use crate::controller::element_map::Slot;
use crate::controller::element_mapper::ElementMapper;
use crate::controller::evdev_source::{InputCalibration, RawRange};
use crate::controller::types::{AxisDirection, AxisKind, PovDirection};
use crate::error::{MapperError, Result};
use crate::mapper::builtin::DEFAULT_MAPPER;
use crate::mapper::{Mapper, MapperBuilder, MapperRegistry};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub axis: AxisConfig,

    #[serde(default, rename = "blueprint")]
    pub blueprints: Vec<BlueprintConfig>,
}

/// Physical controller and mapper selection
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    #[serde(default = "default_mapper")]
    pub mapper: String,

    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_polling_rate_hz")]
    pub polling_rate_hz: u32,

    #[serde(default = "default_raw_min")]
    pub stick_raw_min: i32,

    #[serde(default = "default_raw_max")]
    pub stick_raw_max: i32,

    #[serde(default = "default_raw_min")]
    pub trigger_raw_min: i32,

    #[serde(default = "default_raw_max")]
    pub trigger_raw_max: i32,
}

/// Default properties applied to every virtual axis
#[derive(Debug, Deserialize, Clone)]
pub struct AxisConfig {
    #[serde(default = "default_deadzone")]
    pub deadzone: u32,

    #[serde(default = "default_saturation")]
    pub saturation: u32,

    #[serde(default = "default_range_min")]
    pub range_min: i32,

    #[serde(default = "default_range_max")]
    pub range_max: i32,
}

/// A named mapper built from a template plus per-slot overrides
#[derive(Debug, Deserialize, Clone)]
pub struct BlueprintConfig {
    pub name: String,

    #[serde(default)]
    pub template: String,

    /// Overrides keyed by physical slot name
    #[serde(default)]
    pub elements: BTreeMap<String, ElementMapperConfig>,
}

/// Element mapper as written in the configuration file
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementMapperConfig {
    Axis {
        axis: AxisKind,
        #[serde(default)]
        direction: AxisDirection,
    },
    Button {
        button: u8,
    },
    Pov {
        direction: PovDirection,
    },
    Split {
        #[serde(default)]
        positive: Option<Box<ElementMapperConfig>>,
        #[serde(default)]
        negative: Option<Box<ElementMapperConfig>>,
    },
    Compound {
        mappers: Vec<ElementMapperConfig>,
    },
    Null,
    /// Forces the slot empty, overriding the template
    Remove,
}

// Default value functions
fn default_mapper() -> String { DEFAULT_MAPPER.to_string() }
fn default_polling_rate_hz() -> u32 { 250 }
fn default_raw_min() -> i32 { 0 }
fn default_raw_max() -> i32 { 255 }

fn default_deadzone() -> u32 { AXIS_DEADZONE_DEFAULT }
fn default_saturation() -> u32 { AXIS_SATURATION_DEFAULT }
fn default_range_min() -> i32 { AXIS_RANGE_MIN_DEFAULT }
fn default_range_max() -> i32 { AXIS_RANGE_MAX_DEFAULT }

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mapper: default_mapper(),
            device_path: String::new(),
            polling_rate_hz: default_polling_rate_hz(),
            stick_raw_min: default_raw_min(),
            stick_raw_max: default_raw_max(),
            trigger_raw_min: default_raw_min(),
            trigger_raw_max: default_raw_max(),
        }
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            deadzone: default_deadzone(),
            saturation: default_saturation(),
            range_min: default_range_min(),
            range_max: default_range_max(),
        }
    }
}

impl ElementMapperConfig {
    /// Converts a slot entry; `Remove` becomes `None`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid buttons, oversized compounds or a
    /// `remove` nested inside another mapper.
    pub fn to_element_mapper(&self) -> Result<Option<ElementMapper>> {
        match self {
            ElementMapperConfig::Remove => Ok(None),
            other => other.to_nested().map(Some),
        }
    }

    fn to_nested(&self) -> Result<ElementMapper> {
        match self {
            ElementMapperConfig::Axis { axis, direction } => Ok(ElementMapper::half_axis(*axis, *direction)),
            ElementMapperConfig::Button { button } => ElementMapper::button(*button),
            ElementMapperConfig::Pov { direction } => Ok(ElementMapper::Pov(*direction)),
            ElementMapperConfig::Split { positive, negative } => {
                let positive = positive.as_deref().map(Self::to_nested).transpose()?;
                let negative = negative.as_deref().map(Self::to_nested).transpose()?;
                Ok(ElementMapper::split(positive, negative))
            }
            ElementMapperConfig::Compound { mappers } => {
                let children = mappers.iter().map(Self::to_nested).collect::<Result<Vec<_>>>()?;
                ElementMapper::compound(children)
            }
            ElementMapperConfig::Null => Ok(ElementMapper::Null),
            ElementMapperConfig::Remove => Err(MapperError::Validation(
                "'remove' is only valid as a whole slot entry".to_string(),
            )),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vpad_mapper::config::Config;
    ///
    /// let config = Config::load("config.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `Config` if parsing or validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::config::Config;
    ///
    /// let config = Config::from_toml("[controller]\nmapper = \"XInputNative\"\n")?;
    /// assert_eq!(config.controller.mapper, "XInputNative");
    /// assert_eq!(config.controller.polling_rate_hz, 250);
    /// # Ok::<(), vpad_mapper::error::MapperError>(())
    /// ```
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.controller.mapper.is_empty() {
            return Err(MapperError::Config(
                toml::de::Error::custom("controller mapper cannot be empty")
            ));
        }

        if self.controller.polling_rate_hz == 0 || self.controller.polling_rate_hz > 1000 {
            return Err(MapperError::Config(
                toml::de::Error::custom("polling_rate_hz must be between 1 and 1000")
            ));
        }

        if self.controller.stick_raw_min >= self.controller.stick_raw_max {
            return Err(MapperError::Config(
                toml::de::Error::custom("stick_raw_min must be less than stick_raw_max")
            ));
        }

        if self.controller.trigger_raw_min >= self.controller.trigger_raw_max {
            return Err(MapperError::Config(
                toml::de::Error::custom("trigger_raw_min must be less than trigger_raw_max")
            ));
        }

        if self.axis.deadzone > AXIS_DEADZONE_MAX {
            return Err(MapperError::Config(
                toml::de::Error::custom(format!("deadzone must be between 0 and {}", AXIS_DEADZONE_MAX))
            ));
        }

        if self.axis.saturation > AXIS_SATURATION_MAX {
            return Err(MapperError::Config(
                toml::de::Error::custom(format!("saturation must be between 0 and {}", AXIS_SATURATION_MAX))
            ));
        }

        if self.axis.range_min >= self.axis.range_max {
            return Err(MapperError::Config(
                toml::de::Error::custom("range_min must be less than range_max")
            ));
        }

        let mut names = HashSet::new();
        for blueprint in &self.blueprints {
            if blueprint.name.is_empty() {
                return Err(MapperError::Config(
                    toml::de::Error::custom("blueprint name cannot be empty")
                ));
            }

            if !names.insert(blueprint.name.as_str()) {
                return Err(MapperError::Config(
                    toml::de::Error::custom(format!("duplicate blueprint '{}'", blueprint.name))
                ));
            }

            for (slot, element) in &blueprint.elements {
                if let Err(e) = slot.parse::<Slot>().and_then(|_| element.to_element_mapper()) {
                    return Err(MapperError::Config(
                        toml::de::Error::custom(format!("blueprint '{}' slot {}: {}", blueprint.name, slot, e))
                    ));
                }
            }
        }

        Ok(())
    }

    /// Default axis properties for every virtual controller
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis section is out of range.
    pub fn axis_properties(&self) -> Result<AxisProperties> {
        AxisProperties::new(
            self.axis.deadzone,
            self.axis.saturation,
            self.axis.range_min,
            self.axis.range_max,
        )
    }

    /// Raw evdev ranges of the physical gamepad
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a raw range is empty.
    pub fn calibration(&self) -> Result<InputCalibration> {
        Ok(InputCalibration {
            stick: RawRange::new(self.controller.stick_raw_min, self.controller.stick_raw_max)?,
            trigger: RawRange::new(self.controller.trigger_raw_min, self.controller.trigger_raw_max)?,
        })
    }

    /// Build every configured blueprint into `registry`
    ///
    /// Blueprints may use each other as templates in any order. A blueprint
    /// already built as another one's template is not built twice.
    ///
    /// # Errors
    ///
    /// Returns the first failing blueprint's error. Blueprints built before
    /// it stay registered.
    pub fn build_mappers(&self, registry: &MapperRegistry) -> Result<Vec<Arc<Mapper>>> {
        let mut builder = MapperBuilder::new(registry);

        for blueprint in &self.blueprints {
            builder.create_blueprint(&blueprint.name)?;
            builder.set_template(&blueprint.name, &blueprint.template)?;
            for (slot, element) in &blueprint.elements {
                let slot: Slot = slot.parse()?;
                builder.set_element_mapper(&blueprint.name, slot.index(), element.to_element_mapper()?)?;
            }
        }

        let mut mappers = Vec::with_capacity(self.blueprints.len());
        for blueprint in &self.blueprints {
            let mapper = match registry.lookup(&blueprint.name) {
                Some(mapper) => mapper,
                None => builder.build(&blueprint.name)?,
            };
            mappers.push(mapper);
        }

        info!("Built {} configured mappers", mappers.len());
        Ok(mappers)
    }
}
