//! # Built-in Mappers
//!
//! Element maps registered in every [`MapperRegistry::with_builtins`](super::MapperRegistry::with_builtins).
//!
//! | Mapper | Axes | Buttons | POV |
//! |--------|------|---------|-----|
//! | `StandardGamepad` | X, Y, Z, RotZ | 12 (triggers as buttons 7 and 8) | D-Pad |
//! | `DigitalGamepad` | X, Y, Z, RotZ | 12 (D-Pad drives X and Y) | none |
//! | `ExtendedGamepad` | X, Y, Z, RotX, RotY, RotZ (triggers on RotX, RotY) | 10 | D-Pad |
//! | `XInputNative` | X, Y, Z, RotX, RotY, RotZ (triggers on Z, RotZ) | 10 | D-Pad |
//! | `XInputSharedTriggers` | X, Y, Z, RotX, RotY (triggers share Z) | 10 | D-Pad |

use crate::controller::element_map::{ElementMap, Slot};
use crate::controller::element_mapper::ElementMapper;
use crate::controller::types::{AxisDirection, AxisKind, PovDirection};
use crate::error::Result;

pub const STANDARD_GAMEPAD: &str = "StandardGamepad";
pub const DIGITAL_GAMEPAD: &str = "DigitalGamepad";
pub const EXTENDED_GAMEPAD: &str = "ExtendedGamepad";
pub const XINPUT_NATIVE: &str = "XInputNative";
pub const XINPUT_SHARED_TRIGGERS: &str = "XInputSharedTriggers";

/// Names of all built-in mappers.
pub const BUILTIN_NAMES: [&str; 5] = [
    STANDARD_GAMEPAD,
    DIGITAL_GAMEPAD,
    EXTENDED_GAMEPAD,
    XINPUT_NATIVE,
    XINPUT_SHARED_TRIGGERS,
];

/// Mapper used when none is configured.
pub const DEFAULT_MAPPER: &str = STANDARD_GAMEPAD;

/// Adds button mappers for `(slot, button)` pairs.
fn with_buttons(mut map: ElementMap, buttons: &[(Slot, u8)]) -> Result<ElementMap> {
    for &(slot, button) in buttons {
        map.set(slot, Some(ElementMapper::button(button)?));
    }
    Ok(map)
}

fn with_dpad_pov(map: ElementMap) -> ElementMap {
    map.with(Slot::DpadUp, ElementMapper::Pov(PovDirection::Up))
        .with(Slot::DpadDown, ElementMapper::Pov(PovDirection::Down))
        .with(Slot::DpadLeft, ElementMapper::Pov(PovDirection::Left))
        .with(Slot::DpadRight, ElementMapper::Pov(PovDirection::Right))
}

/// Face, shoulder, system and stick buttons numbered in XInput order.
const XINPUT_BUTTONS: [(Slot, u8); 10] = [
    (Slot::ButtonA, 0),
    (Slot::ButtonB, 1),
    (Slot::ButtonX, 2),
    (Slot::ButtonY, 3),
    (Slot::ButtonLB, 4),
    (Slot::ButtonRB, 5),
    (Slot::ButtonBack, 6),
    (Slot::ButtonStart, 7),
    (Slot::ButtonLS, 8),
    (Slot::ButtonRS, 9),
];

/// Buttons of the DirectInput-style layouts, triggers included.
const STANDARD_BUTTONS: [(Slot, u8); 12] = [
    (Slot::ButtonX, 0),
    (Slot::ButtonA, 1),
    (Slot::ButtonB, 2),
    (Slot::ButtonY, 3),
    (Slot::ButtonLB, 4),
    (Slot::ButtonRB, 5),
    (Slot::TriggerLT, 6),
    (Slot::TriggerRT, 7),
    (Slot::ButtonBack, 8),
    (Slot::ButtonStart, 9),
    (Slot::ButtonLS, 10),
    (Slot::ButtonRS, 11),
];

/// Generic DirectInput gamepad layout.
pub fn standard_gamepad() -> Result<ElementMap> {
    let map = ElementMap::new()
        .with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X))
        .with(Slot::StickLeftY, ElementMapper::axis(AxisKind::Y))
        .with(Slot::StickRightX, ElementMapper::axis(AxisKind::Z))
        .with(Slot::StickRightY, ElementMapper::axis(AxisKind::RotZ));
    with_buttons(with_dpad_pov(map), &STANDARD_BUTTONS)
}

/// Standard layout with the D-Pad driving the left stick axes instead of a hat.
pub fn digital_gamepad() -> Result<ElementMap> {
    let map = ElementMap::new()
        .with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X))
        .with(Slot::StickLeftY, ElementMapper::axis(AxisKind::Y))
        .with(Slot::StickRightX, ElementMapper::axis(AxisKind::Z))
        .with(Slot::StickRightY, ElementMapper::axis(AxisKind::RotZ))
        .with(Slot::DpadUp, ElementMapper::half_axis(AxisKind::Y, AxisDirection::Negative))
        .with(Slot::DpadDown, ElementMapper::half_axis(AxisKind::Y, AxisDirection::Positive))
        .with(Slot::DpadLeft, ElementMapper::half_axis(AxisKind::X, AxisDirection::Negative))
        .with(Slot::DpadRight, ElementMapper::half_axis(AxisKind::X, AxisDirection::Positive));
    with_buttons(map, &STANDARD_BUTTONS)
}

/// Standard layout with analog triggers on their own rotation axes.
pub fn extended_gamepad() -> Result<ElementMap> {
    let map = ElementMap::new()
        .with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X))
        .with(Slot::StickLeftY, ElementMapper::axis(AxisKind::Y))
        .with(Slot::StickRightX, ElementMapper::axis(AxisKind::Z))
        .with(Slot::StickRightY, ElementMapper::axis(AxisKind::RotZ))
        .with(Slot::TriggerLT, ElementMapper::axis(AxisKind::RotX))
        .with(Slot::TriggerRT, ElementMapper::axis(AxisKind::RotY));
    with_buttons(
        with_dpad_pov(map),
        &[
            (Slot::ButtonX, 0),
            (Slot::ButtonA, 1),
            (Slot::ButtonB, 2),
            (Slot::ButtonY, 3),
            (Slot::ButtonLB, 4),
            (Slot::ButtonRB, 5),
            (Slot::ButtonBack, 6),
            (Slot::ButtonStart, 7),
            (Slot::ButtonLS, 8),
            (Slot::ButtonRS, 9),
        ],
    )
}

/// Layout matching an XInput controller seen through DirectInput's native mapping.
pub fn xinput_native() -> Result<ElementMap> {
    let map = ElementMap::new()
        .with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X))
        .with(Slot::StickLeftY, ElementMapper::axis(AxisKind::Y))
        .with(Slot::StickRightX, ElementMapper::axis(AxisKind::RotX))
        .with(Slot::StickRightY, ElementMapper::axis(AxisKind::RotY))
        .with(Slot::TriggerLT, ElementMapper::axis(AxisKind::Z))
        .with(Slot::TriggerRT, ElementMapper::axis(AxisKind::RotZ));
    with_buttons(with_dpad_pov(map), &XINPUT_BUTTONS)
}

/// XInput layout with both triggers sharing the Z axis in opposite directions.
pub fn xinput_shared_triggers() -> Result<ElementMap> {
    let map = ElementMap::new()
        .with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X))
        .with(Slot::StickLeftY, ElementMapper::axis(AxisKind::Y))
        .with(Slot::StickRightX, ElementMapper::axis(AxisKind::RotX))
        .with(Slot::StickRightY, ElementMapper::axis(AxisKind::RotY))
        .with(Slot::TriggerLT, ElementMapper::half_axis(AxisKind::Z, AxisDirection::Positive))
        .with(Slot::TriggerRT, ElementMapper::half_axis(AxisKind::Z, AxisDirection::Negative));
    with_buttons(with_dpad_pov(map), &XINPUT_BUTTONS)
}

/// All built-in mappers with their names.
///
/// # Errors
///
/// Returns `Validation` if a built-in layout is malformed.
pub fn all() -> Result<Vec<(&'static str, ElementMap)>> {
    Ok(vec![
        (STANDARD_GAMEPAD, standard_gamepad()?),
        (DIGITAL_GAMEPAD, digital_gamepad()?),
        (EXTENDED_GAMEPAD, extended_gamepad()?),
        (XINPUT_NATIVE, xinput_native()?),
        (XINPUT_SHARED_TRIGGERS, xinput_shared_triggers()?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::types::{ButtonIndex, PhysicalButton, PhysicalState, ANALOG_VALUE_MAX, ANALOG_VALUE_MIN};

    #[test]
    fn test_all_builtins_construct() {
        let mappers = all().unwrap();
        let names: Vec<&str> = mappers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, BUILTIN_NAMES.to_vec());
    }

    #[test]
    fn test_standard_gamepad_capabilities() {
        let caps = standard_gamepad().unwrap().capabilities();
        assert_eq!(caps.axes(), &[AxisKind::X, AxisKind::Y, AxisKind::Z, AxisKind::RotZ]);
        assert_eq!(caps.num_buttons(), 12);
        assert!(caps.has_pov());
    }

    #[test]
    fn test_digital_gamepad_dpad_drives_axes() {
        let map = digital_gamepad().unwrap();
        assert!(!map.capabilities().has_pov());

        let mut physical = PhysicalState::default();
        physical.set_button(PhysicalButton::DpadLeft, true);
        physical.set_button(PhysicalButton::DpadDown, true);
        let state = map.apply(&physical);
        assert_eq!(state.axis_value(AxisKind::X), ANALOG_VALUE_MIN);
        assert_eq!(state.axis_value(AxisKind::Y), ANALOG_VALUE_MAX);
    }

    #[test]
    fn test_extended_gamepad_triggers_on_rotation_axes() {
        let map = extended_gamepad().unwrap();
        assert_eq!(map.capabilities().num_axes(), 6);
        assert_eq!(map.capabilities().num_buttons(), 10);

        let mut physical = PhysicalState::default();
        physical.right_trigger = 255;
        assert_eq!(map.apply(&physical).axis_value(AxisKind::RotY), ANALOG_VALUE_MAX);
    }

    #[test]
    fn test_xinput_native_layout() {
        let map = xinput_native().unwrap();
        assert_eq!(map.capabilities().num_axes(), 6);

        let mut physical = PhysicalState::default();
        physical.set_button(PhysicalButton::Start, true);
        assert!(map.apply(&physical).is_button_pressed(ButtonIndex::new(7).unwrap()));
    }

    #[test]
    fn test_xinput_shared_triggers_cancel() {
        let map = xinput_shared_triggers().unwrap();
        assert_eq!(
            map.capabilities().axes(),
            &[AxisKind::X, AxisKind::Y, AxisKind::Z, AxisKind::RotX, AxisKind::RotY]
        );

        let mut physical = PhysicalState::default();
        physical.left_trigger = 255;
        assert_eq!(map.apply(&physical).axis_value(AxisKind::Z), ANALOG_VALUE_MAX);

        physical.right_trigger = 255;
        assert_eq!(map.apply(&physical).axis_value(AxisKind::Z), -1);
    }
}
