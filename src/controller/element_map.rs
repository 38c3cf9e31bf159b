//! # Element Map Module
//!
//! An [`ElementMap`] holds at most one [`ElementMapper`] per physical
//! controller element ([`Slot`]) and turns a [`PhysicalState`] into a
//! [`VirtualState`].
//!
//! The capabilities of the resulting virtual controller are derived from the
//! virtual elements the occupied slots target, never stored separately.
//!
//! ## Slots
//!
//! | Slot | Physical input |
//! |------|----------------|
//! | `StickLeftX` .. `StickRightY` | analog stick axes |
//! | `DpadUp` .. `DpadRight` | d-pad buttons |
//! | `TriggerLT`, `TriggerRT` | analog triggers |
//! | `ButtonA` .. `ButtonRS` | digital buttons |

use std::fmt;
use std::str::FromStr;

use crate::controller::element_mapper::ElementMapper;
use crate::controller::types::{
    AxisKind, Capabilities, ElementIdentifier, PhysicalButton, PhysicalState, VirtualState,
};
use crate::error::{MapperError, Result};

/// Number of slots in an element map.
pub const SLOT_COUNT: usize = 20;

/// A physical controller element that can carry an element mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    StickLeftX,
    StickLeftY,
    StickRightX,
    StickRightY,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    TriggerLT,
    TriggerRT,
    ButtonA,
    ButtonB,
    ButtonX,
    ButtonY,
    ButtonLB,
    ButtonRB,
    ButtonBack,
    ButtonStart,
    ButtonLS,
    ButtonRS,
}

/// Where a slot reads its physical value from.
#[derive(Debug, Clone, Copy)]
enum SlotInput {
    Analog(fn(&PhysicalState) -> i16),
    Trigger(fn(&PhysicalState) -> u8),
    Button(PhysicalButton),
}

impl Slot {
    /// All slots in index order.
    pub const ALL: [Slot; SLOT_COUNT] = [
        Slot::StickLeftX,
        Slot::StickLeftY,
        Slot::StickRightX,
        Slot::StickRightY,
        Slot::DpadUp,
        Slot::DpadDown,
        Slot::DpadLeft,
        Slot::DpadRight,
        Slot::TriggerLT,
        Slot::TriggerRT,
        Slot::ButtonA,
        Slot::ButtonB,
        Slot::ButtonX,
        Slot::ButtonY,
        Slot::ButtonLB,
        Slot::ButtonRB,
        Slot::ButtonBack,
        Slot::ButtonStart,
        Slot::ButtonLS,
        Slot::ButtonRS,
    ];

    /// Index of this slot in an element map.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Slot for an index.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `index >= SLOT_COUNT`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::controller::element_map::Slot;
    ///
    /// assert_eq!(Slot::from_index(8)?, Slot::TriggerLT);
    /// assert!(Slot::from_index(20).is_err());
    /// # Ok::<(), vpad_mapper::error::MapperError>(())
    /// ```
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| MapperError::Validation(format!("invalid slot index {}", index)))
    }

    /// Name of this slot.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Slot::StickLeftX => "StickLeftX",
            Slot::StickLeftY => "StickLeftY",
            Slot::StickRightX => "StickRightX",
            Slot::StickRightY => "StickRightY",
            Slot::DpadUp => "DpadUp",
            Slot::DpadDown => "DpadDown",
            Slot::DpadLeft => "DpadLeft",
            Slot::DpadRight => "DpadRight",
            Slot::TriggerLT => "TriggerLT",
            Slot::TriggerRT => "TriggerRT",
            Slot::ButtonA => "ButtonA",
            Slot::ButtonB => "ButtonB",
            Slot::ButtonX => "ButtonX",
            Slot::ButtonY => "ButtonY",
            Slot::ButtonLB => "ButtonLB",
            Slot::ButtonRB => "ButtonRB",
            Slot::ButtonBack => "ButtonBack",
            Slot::ButtonStart => "ButtonStart",
            Slot::ButtonLS => "ButtonLS",
            Slot::ButtonRS => "ButtonRS",
        }
    }

    fn input(self) -> SlotInput {
        match self {
            Slot::StickLeftX => SlotInput::Analog(|s| s.left_stick_x),
            Slot::StickLeftY => SlotInput::Analog(|s| s.left_stick_y),
            Slot::StickRightX => SlotInput::Analog(|s| s.right_stick_x),
            Slot::StickRightY => SlotInput::Analog(|s| s.right_stick_y),
            Slot::DpadUp => SlotInput::Button(PhysicalButton::DpadUp),
            Slot::DpadDown => SlotInput::Button(PhysicalButton::DpadDown),
            Slot::DpadLeft => SlotInput::Button(PhysicalButton::DpadLeft),
            Slot::DpadRight => SlotInput::Button(PhysicalButton::DpadRight),
            Slot::TriggerLT => SlotInput::Trigger(|s| s.left_trigger),
            Slot::TriggerRT => SlotInput::Trigger(|s| s.right_trigger),
            Slot::ButtonA => SlotInput::Button(PhysicalButton::A),
            Slot::ButtonB => SlotInput::Button(PhysicalButton::B),
            Slot::ButtonX => SlotInput::Button(PhysicalButton::X),
            Slot::ButtonY => SlotInput::Button(PhysicalButton::Y),
            Slot::ButtonLB => SlotInput::Button(PhysicalButton::LeftShoulder),
            Slot::ButtonRB => SlotInput::Button(PhysicalButton::RightShoulder),
            Slot::ButtonBack => SlotInput::Button(PhysicalButton::Back),
            Slot::ButtonStart => SlotInput::Button(PhysicalButton::Start),
            Slot::ButtonLS => SlotInput::Button(PhysicalButton::LeftStick),
            Slot::ButtonRS => SlotInput::Button(PhysicalButton::RightStick),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|slot| slot.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| MapperError::Validation(format!("unknown slot '{}'", s)))
    }
}

/// Element mappers for every slot of a physical controller.
///
/// # Examples
///
/// ```
/// use vpad_mapper::controller::element_map::{ElementMap, Slot};
/// use vpad_mapper::controller::element_mapper::ElementMapper;
/// use vpad_mapper::controller::types::{AxisKind, PhysicalState};
///
/// let map = ElementMap::new().with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X));
///
/// let mut physical = PhysicalState::default();
/// physical.left_stick_x = -1234;
/// assert_eq!(map.apply(&physical).axis_value(AxisKind::X), -1234);
/// assert_eq!(map.capabilities().num_axes(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMap {
    slots: [Option<ElementMapper>; SLOT_COUNT],
}

impl Default for ElementMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementMap {
    /// Creates an element map with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Returns this map with `slot` set to `mapper`.
    #[must_use]
    pub fn with(mut self, slot: Slot, mapper: ElementMapper) -> Self {
        self.set(slot, Some(mapper));
        self
    }

    /// Mapper in `slot`, if any.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&ElementMapper> {
        self.slots[slot.index()].as_ref()
    }

    /// Replaces the content of `slot`; `None` empties it.
    pub fn set(&mut self, slot: Slot, mapper: Option<ElementMapper>) {
        self.slots[slot.index()] = mapper;
    }

    /// Whether every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Occupied slots with their mappers, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &ElementMapper)> {
        Slot::ALL
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(&slot, mapper)| mapper.as_ref().map(|m| (slot, m)))
    }

    /// Maps a physical sample to a virtual state.
    ///
    /// Contributions of all occupied slots are accumulated, then axes are
    /// clamped into the analog domain.
    #[must_use]
    pub fn apply(&self, physical: &PhysicalState) -> VirtualState {
        let mut state = VirtualState::default();

        for (slot, mapper) in self.iter() {
            match slot.input() {
                SlotInput::Analog(read) => mapper.contribute_from_analog(&mut state, read(physical)),
                SlotInput::Trigger(read) => mapper.contribute_from_trigger(&mut state, read(physical)),
                SlotInput::Button(button) => {
                    mapper.contribute_from_button(&mut state, physical.is_pressed(button))
                }
            }
        }

        state.clamp_axes();
        state
    }

    /// Capabilities derived from the targets of the occupied slots.
    ///
    /// Axes are listed in [`AxisKind`] order, the button count is the highest
    /// targeted button plus one and the POV is present iff targeted.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let mut axes: Vec<AxisKind> = Vec::new();
        let mut num_buttons = 0;
        let mut has_pov = false;

        for target in self.iter().flat_map(|(_, mapper)| mapper.targets()) {
            match target {
                ElementIdentifier::Axis(axis) => axes.push(axis),
                ElementIdentifier::Button(button) => {
                    num_buttons = num_buttons.max(button.get() as usize + 1);
                }
                ElementIdentifier::Pov => has_pov = true,
                ElementIdentifier::WholeController => {}
            }
        }

        Capabilities::new(axes, num_buttons, has_pov)
    }

    /// Whether two maps target the same virtual elements slot by slot.
    ///
    /// Mappers of different kinds that drive identical targets compare equal.
    #[must_use]
    pub fn is_equivalent(&self, other: &ElementMap) -> bool {
        self.slots
            .iter()
            .zip(other.slots.iter())
            .all(|(a, b)| match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.targets() == b.targets(),
                _ => false,
            })
    }
}
