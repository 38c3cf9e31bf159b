//! # Element Mappers
//!
//! An element mapper turns the value of one physical element into
//! contributions to one or more virtual elements. Mappers are stateless and
//! never mutated after construction.
//!
//! ## Variants
//!
//! | Variant | Targets | Behavior |
//! |---------|---------|----------|
//! | `Axis` | one virtual axis | drives the whole axis or one half of it |
//! | `Button` | one virtual button | pressed past the analog/trigger threshold |
//! | `Pov` | the virtual hat | presses one hat component |
//! | `Split` | up to two children | routes each half of the input range to a child |
//! | `Compound` | up to 8 children | forwards the input to every child |
//! | `Null` | nothing | slot intentionally empty |
//!
//! ## Usage
//!
//! ```
//! use vpad_mapper::controller::element_mapper::ElementMapper;
//! use vpad_mapper::controller::types::{AxisKind, VirtualState};
//!
//! let mapper = ElementMapper::axis(AxisKind::X);
//! let mut state = VirtualState::default();
//! mapper.contribute_from_analog(&mut state, 1000);
//! assert_eq!(state.axis_value(AxisKind::X), 1000);
//! ```

use crate::controller::types::{
    AxisDirection, AxisKind, ButtonIndex, ElementIdentifier, PovDirection, VirtualState,
    ANALOG_BUTTON_THRESHOLD, ANALOG_VALUE_MAX, ANALOG_VALUE_MIN, ANALOG_VALUE_NEUTRAL,
    TRIGGER_BUTTON_THRESHOLD, TRIGGER_VALUE_MAX, TRIGGER_VALUE_MIDPOINT,
};
use crate::error::{MapperError, Result};

/// Maximum number of children of a compound mapper.
pub const MAX_COMPOUND_MAPPERS: usize = 8;

/// Routes one physical element to virtual elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementMapper {
    /// Drives a virtual axis.
    Axis {
        axis: AxisKind,
        direction: AxisDirection,
    },
    /// Drives a virtual button.
    Button(ButtonIndex),
    /// Drives one component of the virtual hat.
    Pov(PovDirection),
    /// Sends the positive half of the input to one child and the negative
    /// half to the other. Either child may be absent.
    Split {
        positive: Option<Box<ElementMapper>>,
        negative: Option<Box<ElementMapper>>,
    },
    /// Sends the input to every child.
    Compound(Vec<ElementMapper>),
    /// Produces no contribution.
    Null,
}

impl ElementMapper {
    /// Axis mapper driving the whole axis.
    #[must_use]
    pub fn axis(axis: AxisKind) -> Self {
        ElementMapper::Axis {
            axis,
            direction: AxisDirection::Both,
        }
    }

    /// Axis mapper driving one half of the axis.
    #[must_use]
    pub fn half_axis(axis: AxisKind, direction: AxisDirection) -> Self {
        ElementMapper::Axis { axis, direction }
    }

    /// Button mapper for a zero-based button number.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `index` is not a valid virtual button.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::controller::element_mapper::ElementMapper;
    ///
    /// assert!(ElementMapper::button(15).is_ok());
    /// assert!(ElementMapper::button(16).is_err());
    /// ```
    pub fn button(index: u8) -> Result<Self> {
        ButtonIndex::new(index)
            .map(ElementMapper::Button)
            .ok_or_else(|| MapperError::Validation(format!("invalid button index {}", index)))
    }

    /// Split mapper from optional positive and negative children.
    #[must_use]
    pub fn split(positive: Option<ElementMapper>, negative: Option<ElementMapper>) -> Self {
        ElementMapper::Split {
            positive: positive.map(Box::new),
            negative: negative.map(Box::new),
        }
    }

    /// Compound mapper from 1 to [`MAX_COMPOUND_MAPPERS`] children.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `children` is empty or too long.
    pub fn compound(children: Vec<ElementMapper>) -> Result<Self> {
        if children.is_empty() || children.len() > MAX_COMPOUND_MAPPERS {
            return Err(MapperError::Validation(format!(
                "compound mapper needs 1 to {} children, got {}",
                MAX_COMPOUND_MAPPERS,
                children.len()
            )));
        }
        Ok(ElementMapper::Compound(children))
    }

    /// Virtual elements this mapper contributes to.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::controller::element_mapper::ElementMapper;
    /// use vpad_mapper::controller::types::{AxisKind, ElementIdentifier};
    ///
    /// let mapper = ElementMapper::split(Some(ElementMapper::axis(AxisKind::Z)), None);
    /// assert_eq!(mapper.targets(), vec![ElementIdentifier::Axis(AxisKind::Z)]);
    /// assert!(ElementMapper::Null.targets().is_empty());
    /// ```
    #[must_use]
    pub fn targets(&self) -> Vec<ElementIdentifier> {
        let mut targets = Vec::new();
        self.collect_targets(&mut targets);
        targets
    }

    fn collect_targets(&self, targets: &mut Vec<ElementIdentifier>) {
        match self {
            ElementMapper::Axis { axis, .. } => targets.push(ElementIdentifier::Axis(*axis)),
            ElementMapper::Button(button) => targets.push(ElementIdentifier::Button(*button)),
            ElementMapper::Pov(_) => targets.push(ElementIdentifier::Pov),
            ElementMapper::Split { positive, negative } => {
                for child in [positive, negative].into_iter().flatten() {
                    child.collect_targets(targets);
                }
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.collect_targets(targets);
                }
            }
            ElementMapper::Null => {}
        }
    }

    /// Checks the structural limits of this mapper and its children.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or oversized compound mapper.
    pub fn validate(&self) -> Result<()> {
        match self {
            ElementMapper::Split { positive, negative } => {
                for child in [positive, negative].into_iter().flatten() {
                    child.validate()?;
                }
                Ok(())
            }
            ElementMapper::Compound(children) => {
                if children.is_empty() || children.len() > MAX_COMPOUND_MAPPERS {
                    return Err(MapperError::Validation(format!(
                        "compound mapper needs 1 to {} children, got {}",
                        MAX_COMPOUND_MAPPERS,
                        children.len()
                    )));
                }
                children.iter().try_for_each(ElementMapper::validate)
            }
            _ => Ok(()),
        }
    }

    /// Contributes a physical analog stick value.
    pub fn contribute_from_analog(&self, state: &mut VirtualState, value: i16) {
        let value = i32::from(value);

        match self {
            ElementMapper::Axis { axis, direction } => {
                let contribution = match direction {
                    AxisDirection::Both => value - ANALOG_VALUE_NEUTRAL,
                    AxisDirection::Positive => (value - ANALOG_VALUE_MIN) / 2,
                    AxisDirection::Negative => -((value - ANALOG_VALUE_MIN + 1) / 2),
                };
                state.axis[axis.index()] += contribution;
            }
            ElementMapper::Button(button) => {
                state.button[button.get() as usize] |=
                    (value - ANALOG_VALUE_NEUTRAL).abs() > ANALOG_BUTTON_THRESHOLD;
            }
            ElementMapper::Pov(direction) => {
                state.pov[direction.index()] |=
                    (value - ANALOG_VALUE_NEUTRAL).abs() > ANALOG_BUTTON_THRESHOLD;
            }
            ElementMapper::Split { positive, negative } => {
                let half = if value >= ANALOG_VALUE_NEUTRAL { positive } else { negative };
                if let Some(child) = half {
                    child.contribute_from_analog(state, value as i16);
                }
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.contribute_from_analog(state, value as i16);
                }
            }
            ElementMapper::Null => {}
        }
    }

    /// Contributes a physical trigger value.
    pub fn contribute_from_trigger(&self, state: &mut VirtualState, value: u8) {
        match self {
            ElementMapper::Axis { axis, direction } => {
                let value = i32::from(value);
                let trigger_max = i32::from(TRIGGER_VALUE_MAX);
                let contribution = match direction {
                    AxisDirection::Both => {
                        ANALOG_VALUE_MIN + value * (ANALOG_VALUE_MAX - ANALOG_VALUE_MIN) / trigger_max
                            - ANALOG_VALUE_NEUTRAL
                    }
                    AxisDirection::Positive => value * (ANALOG_VALUE_MAX - ANALOG_VALUE_NEUTRAL) / trigger_max,
                    AxisDirection::Negative => -(value * (ANALOG_VALUE_NEUTRAL - ANALOG_VALUE_MIN) / trigger_max),
                };
                state.axis[axis.index()] += contribution;
            }
            ElementMapper::Button(button) => {
                state.button[button.get() as usize] |= value >= TRIGGER_BUTTON_THRESHOLD;
            }
            ElementMapper::Pov(direction) => {
                state.pov[direction.index()] |= value >= TRIGGER_BUTTON_THRESHOLD;
            }
            ElementMapper::Split { positive, negative } => {
                let half = if value >= TRIGGER_VALUE_MIDPOINT { positive } else { negative };
                if let Some(child) = half {
                    child.contribute_from_trigger(state, value);
                }
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.contribute_from_trigger(state, value);
                }
            }
            ElementMapper::Null => {}
        }
    }

    /// Contributes a physical button state.
    pub fn contribute_from_button(&self, state: &mut VirtualState, pressed: bool) {
        match self {
            ElementMapper::Axis { axis, direction } => {
                let value = match (direction, pressed) {
                    (AxisDirection::Both, true) | (AxisDirection::Positive, true) => ANALOG_VALUE_MAX,
                    (AxisDirection::Both, false) | (AxisDirection::Negative, true) => ANALOG_VALUE_MIN,
                    (_, false) => ANALOG_VALUE_NEUTRAL,
                };
                state.axis[axis.index()] += value - ANALOG_VALUE_NEUTRAL;
            }
            ElementMapper::Button(button) => state.button[button.get() as usize] |= pressed,
            ElementMapper::Pov(direction) => state.pov[direction.index()] |= pressed,
            ElementMapper::Split { positive, negative } => {
                let half = if pressed { positive } else { negative };
                if let Some(child) = half {
                    child.contribute_from_button(state, pressed);
                }
            }
            ElementMapper::Compound(children) => {
                for child in children {
                    child.contribute_from_button(state, pressed);
                }
            }
            ElementMapper::Null => {}
        }
    }
}
