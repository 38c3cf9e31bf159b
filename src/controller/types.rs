//! # Controller Types
//!
//! Value types shared by the mapping core:
//!
//! - [`PhysicalState`]: one sample of the physical gamepad, already normalized
//!   into the fixed physical domain
//! - [`ElementIdentifier`]: the virtual elements an element mapper can target
//! - [`VirtualState`]: the accumulated virtual controller state
//! - [`Capabilities`]: the shape of a virtual controller, derived from its element map
//!
//! ## Physical Domain
//!
//! | Element | Range | Neutral |
//! |---------|-------|---------|
//! | Sticks | -32768..=32767 | 0 |
//! | Triggers | 0..=255 | 0 |
//! | Buttons | pressed / released | released |

use serde::Deserialize;
use std::fmt;

/// Minimum physical analog stick value.
pub const ANALOG_VALUE_MIN: i32 = -32768;
/// Maximum physical analog stick value.
pub const ANALOG_VALUE_MAX: i32 = 32767;
/// Neutral (centered) physical analog stick value.
pub const ANALOG_VALUE_NEUTRAL: i32 = 0;

/// Minimum physical trigger value.
pub const TRIGGER_VALUE_MIN: u8 = 0;
/// Maximum physical trigger value.
pub const TRIGGER_VALUE_MAX: u8 = 255;
/// Trigger value at which a split mapper switches to its positive half.
pub const TRIGGER_VALUE_MIDPOINT: u8 = 128;

/// Stick deflection beyond which an analog value counts as a pressed button.
pub const ANALOG_BUTTON_THRESHOLD: i32 = 7849;
/// Trigger value at or above which a trigger counts as a pressed button.
pub const TRIGGER_BUTTON_THRESHOLD: u8 = 30;

/// Number of virtual axis kinds.
pub const AXIS_COUNT: usize = 6;
/// Maximum number of virtual buttons.
pub const BUTTON_COUNT: usize = 16;

/// Kind of a virtual axis.
///
/// The declaration order is the order in which axes are reported by
/// [`Capabilities`] and laid out in the native data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    X,
    Y,
    Z,
    RotX,
    RotY,
    RotZ,
}

impl AxisKind {
    /// All axis kinds in reporting order.
    pub const ALL: [AxisKind; AXIS_COUNT] = [
        AxisKind::X,
        AxisKind::Y,
        AxisKind::Z,
        AxisKind::RotX,
        AxisKind::RotY,
        AxisKind::RotZ,
    ];

    /// Dense index of this axis kind (0..6).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Axis kind for a dense index, if in range.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human-readable axis name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AxisKind::X => "X Axis",
            AxisKind::Y => "Y Axis",
            AxisKind::Z => "Z Axis",
            AxisKind::RotX => "X Rotation",
            AxisKind::RotY => "Y Rotation",
            AxisKind::RotZ => "Z Rotation",
        }
    }
}

/// Which part of a virtual axis an axis mapper drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisDirection {
    /// Input drives the whole axis.
    #[default]
    Both,
    /// Input drives only the positive half of the axis.
    Positive,
    /// Input drives only the negative half of the axis.
    Negative,
}

/// One of the four hat components a POV mapper can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PovDirection {
    Up,
    Down,
    Left,
    Right,
}

impl PovDirection {
    /// Index into [`VirtualState::pov`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Resolved direction of the virtual hat.
///
/// Opposite components cancel out, so at most two adjacent components
/// contribute to a heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PovHeading {
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl PovHeading {
    /// Heading in hundredths of a degree, clockwise from north.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::controller::types::PovHeading;
    ///
    /// assert_eq!(PovHeading::Up.centidegrees(), 0);
    /// assert_eq!(PovHeading::Left.centidegrees(), 27000);
    /// ```
    #[must_use]
    pub fn centidegrees(self) -> u32 {
        match self {
            PovHeading::Up => 0,
            PovHeading::UpRight => 4500,
            PovHeading::Right => 9000,
            PovHeading::DownRight => 13500,
            PovHeading::Down => 18000,
            PovHeading::DownLeft => 22500,
            PovHeading::Left => 27000,
            PovHeading::UpLeft => 31500,
        }
    }
}

/// Index of a virtual button, guaranteed to be below [`BUTTON_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub struct ButtonIndex(u8);

impl ButtonIndex {
    /// Creates a button index, returning `None` if `index >= BUTTON_COUNT`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::controller::types::ButtonIndex;
    ///
    /// assert_eq!(ButtonIndex::new(3).map(|b| b.get()), Some(3));
    /// assert!(ButtonIndex::new(16).is_none());
    /// ```
    #[must_use]
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < BUTTON_COUNT).then_some(Self(index))
    }

    /// Zero-based button number.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ButtonIndex {
    type Error = String;

    fn try_from(index: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(index).ok_or_else(|| {
            format!(
                "button index {} out of range (0-{})",
                index,
                BUTTON_COUNT - 1
            )
        })
    }
}

/// Identifies one virtual element, or the whole virtual controller.
///
/// Every identifier has a unique dense index in `0..ElementIdentifier::COUNT`
/// so it can be used as a table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementIdentifier {
    Axis(AxisKind),
    Button(ButtonIndex),
    Pov,
    WholeController,
}

impl ElementIdentifier {
    /// Number of distinct identifiers.
    pub const COUNT: usize = AXIS_COUNT + BUTTON_COUNT + 2;

    /// Dense table index of this identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::controller::types::{AxisKind, ElementIdentifier};
    ///
    /// assert_eq!(ElementIdentifier::Axis(AxisKind::X).index(), 0);
    /// assert_eq!(ElementIdentifier::WholeController.index(), ElementIdentifier::COUNT - 1);
    /// ```
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ElementIdentifier::Axis(axis) => axis.index(),
            ElementIdentifier::Button(button) => AXIS_COUNT + button.get() as usize,
            ElementIdentifier::Pov => AXIS_COUNT + BUTTON_COUNT,
            ElementIdentifier::WholeController => AXIS_COUNT + BUTTON_COUNT + 1,
        }
    }
}

impl fmt::Display for ElementIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementIdentifier::Axis(axis) => write!(f, "{}", axis.name()),
            ElementIdentifier::Button(button) => write!(f, "Button {}", button.get() + 1),
            ElementIdentifier::Pov => write!(f, "POV"),
            ElementIdentifier::WholeController => write!(f, "Whole Controller"),
        }
    }
}

/// Physical gamepad buttons, as bit positions in [`PhysicalState::buttons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalButton {
    DpadUp = 0,
    DpadDown = 1,
    DpadLeft = 2,
    DpadRight = 3,
    Start = 4,
    Back = 5,
    LeftStick = 6,
    RightStick = 7,
    LeftShoulder = 8,
    RightShoulder = 9,
    A = 12,
    B = 13,
    X = 14,
    Y = 15,
}

impl PhysicalButton {
    /// Bit mask of this button within the button word.
    #[must_use]
    pub fn mask(self) -> u16 {
        1 << (self as u16)
    }
}

/// One sample of the physical gamepad.
///
/// Stick values use the signed physical domain, triggers `0..=255`.
/// The default value is the neutral sample.
///
/// # Examples
///
/// ```
/// use vpad_mapper::controller::types::{PhysicalButton, PhysicalState};
///
/// let mut state = PhysicalState::default();
/// state.set_button(PhysicalButton::A, true);
/// assert!(state.is_pressed(PhysicalButton::A));
/// assert!(!state.is_pressed(PhysicalButton::B));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysicalState {
    /// Left stick X.
    pub left_stick_x: i16,
    /// Left stick Y.
    pub left_stick_y: i16,
    /// Right stick X.
    pub right_stick_x: i16,
    /// Right stick Y.
    pub right_stick_y: i16,
    /// Left trigger.
    pub left_trigger: u8,
    /// Right trigger.
    pub right_trigger: u8,
    /// Button word, one bit per [`PhysicalButton`].
    pub buttons: u16,
}

impl PhysicalState {
    /// Whether `button` is pressed in this sample.
    #[must_use]
    pub fn is_pressed(&self, button: PhysicalButton) -> bool {
        self.buttons & button.mask() != 0
    }

    /// Sets or clears `button` in this sample.
    pub fn set_button(&mut self, button: PhysicalButton, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
    }
}

/// State of a virtual controller.
///
/// Axis values are accumulated relative to neutral while an element map is
/// applied and clamped to the analog domain afterwards. Buttons and POV
/// components are OR'ed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualState {
    /// Axis values indexed by [`AxisKind::index`].
    pub axis: [i32; AXIS_COUNT],
    /// Button states indexed by [`ButtonIndex::get`].
    pub button: [bool; BUTTON_COUNT],
    /// Hat components indexed by [`PovDirection::index`].
    pub pov: [bool; 4],
}

impl Default for VirtualState {
    fn default() -> Self {
        Self {
            axis: [ANALOG_VALUE_NEUTRAL; AXIS_COUNT],
            button: [false; BUTTON_COUNT],
            pov: [false; 4],
        }
    }
}

impl VirtualState {
    /// Value of one axis.
    #[must_use]
    pub fn axis_value(&self, axis: AxisKind) -> i32 {
        self.axis[axis.index()]
    }

    /// Whether one button is pressed.
    #[must_use]
    pub fn is_button_pressed(&self, button: ButtonIndex) -> bool {
        self.button[button.get() as usize]
    }

    /// Whether one hat component is pressed.
    #[must_use]
    pub fn is_pov_pressed(&self, direction: PovDirection) -> bool {
        self.pov[direction.index()]
    }

    /// Resolves the hat components into a heading, `None` when centered.
    ///
    /// Opposite components cancel each other.
    ///
    /// # Examples
    ///
    /// ```
    /// use vpad_mapper::controller::types::{PovDirection, PovHeading, VirtualState};
    ///
    /// let mut state = VirtualState::default();
    /// assert_eq!(state.pov_heading(), None);
    ///
    /// state.pov[PovDirection::Up.index()] = true;
    /// state.pov[PovDirection::Right.index()] = true;
    /// assert_eq!(state.pov_heading(), Some(PovHeading::UpRight));
    /// ```
    #[must_use]
    pub fn pov_heading(&self) -> Option<PovHeading> {
        let vertical = i8::from(self.is_pov_pressed(PovDirection::Down))
            - i8::from(self.is_pov_pressed(PovDirection::Up));
        let horizontal = i8::from(self.is_pov_pressed(PovDirection::Right))
            - i8::from(self.is_pov_pressed(PovDirection::Left));

        match (vertical, horizontal) {
            (-1, 0) => Some(PovHeading::Up),
            (-1, 1) => Some(PovHeading::UpRight),
            (0, 1) => Some(PovHeading::Right),
            (1, 1) => Some(PovHeading::DownRight),
            (1, 0) => Some(PovHeading::Down),
            (1, -1) => Some(PovHeading::DownLeft),
            (0, -1) => Some(PovHeading::Left),
            (-1, -1) => Some(PovHeading::UpLeft),
            _ => None,
        }
    }

    /// Clamps every axis into the analog domain.
    pub fn clamp_axes(&mut self) {
        for value in &mut self.axis {
            *value = (*value).clamp(ANALOG_VALUE_MIN, ANALOG_VALUE_MAX);
        }
    }
}

/// Shape of a virtual controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    axes: Vec<AxisKind>,
    num_buttons: usize,
    has_pov: bool,
}

impl Capabilities {
    /// Creates capabilities from their parts; axes are sorted and deduplicated.
    #[must_use]
    pub fn new(mut axes: Vec<AxisKind>, num_buttons: usize, has_pov: bool) -> Self {
        axes.sort_unstable();
        axes.dedup();
        Self {
            axes,
            num_buttons: num_buttons.min(BUTTON_COUNT),
            has_pov,
        }
    }

    /// Axes present, in [`AxisKind`] order.
    #[must_use]
    pub fn axes(&self) -> &[AxisKind] {
        &self.axes
    }

    /// Number of axes present.
    #[must_use]
    pub fn num_axes(&self) -> usize {
        self.axes.len()
    }

    /// Number of buttons present.
    #[must_use]
    pub fn num_buttons(&self) -> usize {
        self.num_buttons
    }

    /// Number of POVs present (0 or 1).
    #[must_use]
    pub fn num_povs(&self) -> usize {
        usize::from(self.has_pov)
    }

    /// Whether the controller has a POV.
    #[must_use]
    pub fn has_pov(&self) -> bool {
        self.has_pov
    }

    /// Type-relative index of an axis kind, if present.
    #[must_use]
    pub fn find_axis(&self, axis: AxisKind) -> Option<usize> {
        self.axes.iter().position(|&a| a == axis)
    }

    /// Axis kind at a type-relative index, if present.
    #[must_use]
    pub fn axis_at(&self, index: usize) -> Option<AxisKind> {
        self.axes.get(index).copied()
    }

    /// Whether the controller exposes `element`.
    ///
    /// The whole-controller identifier is always present.
    #[must_use]
    pub fn has_element(&self, element: ElementIdentifier) -> bool {
        match element {
            ElementIdentifier::Axis(axis) => self.find_axis(axis).is_some(),
            ElementIdentifier::Button(button) => (button.get() as usize) < self.num_buttons,
            ElementIdentifier::Pov => self.has_pov,
            ElementIdentifier::WholeController => true,
        }
    }
}
