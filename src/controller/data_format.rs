//! # Data Format Module
//!
//! Negotiates an application-defined packet layout against the capabilities
//! of a virtual controller and writes virtual states into packets of that
//! layout.
//!
//! ## Binding
//!
//! The application supplies an ordered list of [`ObjectFormat`] descriptors.
//! Each one is claimed greedily, in order, by the first matching unclaimed
//! element. The result is a [`DataFormat`]: a consistent pair of maps
//! `instance -> offset` and `offset -> instance`. Any hard error aborts the
//! whole negotiation and produces no binding.
//!
//! ## Packet Layout
//!
//! | Element | Size | Encoding |
//! |---------|------|----------|
//! | Axis | 4 bytes | little-endian `i32` |
//! | Button | 1 byte | `0x80` pressed, `0x00` released |
//! | POV | 4 bytes | little-endian `i32` centidegrees, `-1` centered |
//!
//! ## Usage
//!
//! ```
//! use vpad_mapper::controller::data_format::{DataFormat, DataFormatSpec, Instance};
//! use vpad_mapper::controller::types::{AxisKind, Capabilities};
//!
//! let caps = Capabilities::new(vec![AxisKind::X, AxisKind::Y], 4, true);
//! let format = DataFormat::bind(&DataFormatSpec::native(&caps), &caps)?;
//!
//! assert_eq!(format.offset_for(Instance::axis(1)), Some(4));
//! assert_eq!(format.packet_size(), 16);
//! # Ok::<(), vpad_mapper::error::MapperError>(())
//! ```

use std::collections::BTreeMap;
use std::ops::BitOr;

use tracing::debug;

use crate::controller::types::{AxisKind, ButtonIndex, Capabilities, ElementIdentifier, VirtualState};
use crate::error::{MapperError, Result};

/// Packet size of an axis value.
pub const AXIS_SIZE: u32 = 4;
/// Packet size of a button value.
pub const BUTTON_SIZE: u32 = 1;
/// Packet size of a POV value.
pub const POV_SIZE: u32 = 4;

/// Button value written for a pressed button.
pub const BUTTON_PRESSED: u8 = 0x80;
/// POV value written when the hat is centered.
pub const POV_CENTERED: i32 = -1;

/// Largest packet an application may request.
pub const MAX_PACKET_SIZE: u32 = 4096;

/// Type of a bindable virtual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    Axis,
    Button,
    Pov,
}

impl ElementType {
    /// Candidate order used while binding.
    const ORDER: [ElementType; 3] = [ElementType::Axis, ElementType::Button, ElementType::Pov];

    /// Packet size of one element of this type.
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            ElementType::Axis => AXIS_SIZE,
            ElementType::Button => BUTTON_SIZE,
            ElementType::Pov => POV_SIZE,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// An element addressed by type and type-relative index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instance {
    pub element_type: ElementType,
    pub index: u8,
}

impl Instance {
    /// Axis instance by index into the controller's axis list.
    #[must_use]
    pub fn axis(index: u8) -> Self {
        Self {
            element_type: ElementType::Axis,
            index,
        }
    }

    /// Button instance.
    #[must_use]
    pub fn button(index: u8) -> Self {
        Self {
            element_type: ElementType::Button,
            index,
        }
    }

    /// POV instance.
    #[must_use]
    pub fn pov(index: u8) -> Self {
        Self {
            element_type: ElementType::Pov,
            index,
        }
    }

    /// Resolves this instance to a virtual element of a controller.
    #[must_use]
    pub fn to_element(self, caps: &Capabilities) -> Option<ElementIdentifier> {
        let index = self.index as usize;
        match self.element_type {
            ElementType::Axis => caps.axis_at(index).map(ElementIdentifier::Axis),
            ElementType::Button => (index < caps.num_buttons())
                .then(|| ButtonIndex::new(self.index))
                .flatten()
                .map(ElementIdentifier::Button),
            ElementType::Pov => (index < caps.num_povs()).then_some(ElementIdentifier::Pov),
        }
    }

    /// Instance of a virtual element of a controller, if present.
    #[must_use]
    pub fn from_element(element: ElementIdentifier, caps: &Capabilities) -> Option<Self> {
        match element {
            ElementIdentifier::Axis(axis) => caps
                .find_axis(axis)
                .and_then(|i| u8::try_from(i).ok())
                .map(Instance::axis),
            ElementIdentifier::Button(button) => {
                ((button.get() as usize) < caps.num_buttons()).then(|| Instance::button(button.get()))
            }
            ElementIdentifier::Pov => caps.has_pov().then(|| Instance::pov(0)),
            ElementIdentifier::WholeController => None,
        }
    }
}

/// Set of element types a descriptor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMask(u8);

impl TypeMask {
    pub const AXIS: TypeMask = TypeMask(1 << 0);
    pub const BUTTON: TypeMask = TypeMask(1 << 1);
    pub const POV: TypeMask = TypeMask(1 << 2);
    pub const ANY: TypeMask = TypeMask(0b111);

    /// Whether this mask accepts `element_type`.
    #[must_use]
    pub fn contains(self, element_type: ElementType) -> bool {
        let bit = match element_type {
            ElementType::Axis => Self::AXIS,
            ElementType::Button => Self::BUTTON,
            ElementType::Pov => Self::POV,
        };
        self.0 & bit.0 != 0
    }
}

impl BitOr for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: TypeMask) -> TypeMask {
        TypeMask(self.0 | rhs.0)
    }
}

/// Specific kind of element a descriptor asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSubtype {
    Axis(AxisKind),
    Button,
    Pov,
}

impl ObjectSubtype {
    /// Element type this subtype belongs to.
    #[must_use]
    pub fn element_type(self) -> ElementType {
        match self {
            ObjectSubtype::Axis(_) => ElementType::Axis,
            ObjectSubtype::Button => ElementType::Button,
            ObjectSubtype::Pov => ElementType::Pov,
        }
    }
}

/// One application object descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectFormat {
    /// Element types accepted.
    pub type_mask: TypeMask,
    /// Specific type-relative index, or `None` for any instance.
    pub instance: Option<u8>,
    /// Specific subtype, or `None` for any subtype.
    pub subtype: Option<ObjectSubtype>,
    /// Byte offset of the element within the packet.
    pub offset: u32,
}

impl ObjectFormat {
    /// Descriptor accepting any instance of the masked types.
    #[must_use]
    pub fn any(type_mask: TypeMask, offset: u32) -> Self {
        Self {
            type_mask,
            instance: None,
            subtype: None,
            offset,
        }
    }

    /// Descriptor asking for one specific instance.
    #[must_use]
    pub fn instance(type_mask: TypeMask, index: u8, offset: u32) -> Self {
        Self {
            type_mask,
            instance: Some(index),
            subtype: None,
            offset,
        }
    }

    /// Descriptor asking for a specific axis kind, any instance.
    #[must_use]
    pub fn axis_kind(axis: AxisKind, offset: u32) -> Self {
        Self::any(TypeMask::AXIS, offset).with_subtype(ObjectSubtype::Axis(axis))
    }

    /// Returns this descriptor restricted to `subtype`.
    #[must_use]
    pub fn with_subtype(mut self, subtype: ObjectSubtype) -> Self {
        self.subtype = Some(subtype);
        self
    }
}

/// Application-requested packet layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFormatSpec {
    /// Total packet size in bytes; a non-zero multiple of 4, at most [`MAX_PACKET_SIZE`].
    pub packet_size: u32,
    /// Ordered object descriptors.
    pub objects: Vec<ObjectFormat>,
}

impl DataFormatSpec {
    /// Native layout of a controller: axes, then buttons, then the POV.
    ///
    /// The packet size is rounded up to a multiple of 4.
    #[must_use]
    pub fn native(caps: &Capabilities) -> Self {
        let mut objects = Vec::new();
        let mut offset = 0;

        for index in 0..caps.num_axes() {
            objects.push(ObjectFormat::instance(TypeMask::AXIS, index as u8, offset));
            offset += AXIS_SIZE;
        }
        for index in 0..caps.num_buttons() {
            objects.push(ObjectFormat::instance(TypeMask::BUTTON, index as u8, offset));
            offset += BUTTON_SIZE;
        }
        if caps.has_pov() {
            offset = offset.next_multiple_of(POV_SIZE);
            objects.push(ObjectFormat::instance(TypeMask::POV, 0, offset));
            offset += POV_SIZE;
        }

        Self {
            packet_size: offset.next_multiple_of(4).max(4),
            objects,
        }
    }
}

/// Claim bookkeeping for one negotiation.
struct Claims {
    counts: [usize; 3],
    used: [Vec<bool>; 3],
    next_unused: [usize; 3],
    bytes: Vec<bool>,
}

impl Claims {
    fn new(caps: &Capabilities, packet_size: u32) -> Self {
        let counts = [caps.num_axes(), caps.num_buttons(), caps.num_povs()];
        Self {
            counts,
            used: counts.map(|n| vec![false; n]),
            next_unused: [0; 3],
            bytes: vec![false; packet_size as usize],
        }
    }

    fn has_unused(&self, element_type: ElementType) -> bool {
        self.next_unused[element_type.slot()] < self.counts[element_type.slot()]
    }

    fn exists(&self, element_type: ElementType, index: usize) -> bool {
        index < self.counts[element_type.slot()]
    }

    fn is_used(&self, element_type: ElementType, index: usize) -> bool {
        self.used[element_type.slot()][index]
    }

    fn claim(&mut self, element_type: ElementType, index: usize, offset: u32) {
        self.used[element_type.slot()][index] = true;
        let start = offset as usize;
        let end = start + element_type.size() as usize;
        self.bytes[start..end].iter_mut().for_each(|b| *b = true);
    }

    fn bytes_free(&self, offset: u32, size: u32) -> bool {
        let start = offset as usize;
        !self.bytes[start..start + size as usize].iter().any(|&b| b)
    }

    fn advance(&mut self) {
        for slot in 0..3 {
            while self.next_unused[slot] < self.counts[slot] && self.used[slot][self.next_unused[slot]] {
                self.next_unused[slot] += 1;
            }
        }
    }
}

/// Negotiated mapping between controller elements and packet offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFormat {
    packet_size: u32,
    capabilities: Capabilities,
    instance_to_offset: BTreeMap<Instance, u32>,
    offset_to_instance: BTreeMap<u32, Instance>,
}

impl DataFormat {
    /// Negotiates `spec` against a controller's capabilities.
    ///
    /// Descriptors are processed in order. A descriptor for "any instance"
    /// that finds no unclaimed element is skipped; a descriptor for a
    /// specific instance that cannot be satisfied is a hard error.
    ///
    /// # Errors
    ///
    /// - `Validation`: bad packet size, byte range outside the packet,
    ///   nonexistent specific instance, subtype outside the type mask
    /// - `Conflict`: overlapping byte ranges or an already claimed specific instance
    pub fn bind(spec: &DataFormatSpec, caps: &Capabilities) -> Result<Self> {
        if spec.packet_size == 0 || spec.packet_size % 4 != 0 {
            return Err(MapperError::Validation(format!(
                "packet size {} is not a non-zero multiple of 4",
                spec.packet_size
            )));
        }
        if spec.packet_size > MAX_PACKET_SIZE {
            return Err(MapperError::Validation(format!(
                "packet size {} exceeds the maximum of {}",
                spec.packet_size, MAX_PACKET_SIZE
            )));
        }

        let mut claims = Claims::new(caps, spec.packet_size);
        let mut instance_to_offset = BTreeMap::new();
        let mut offset_to_instance = BTreeMap::new();

        for (position, object) in spec.objects.iter().enumerate() {
            let Some(element_type) = Self::candidate_type(object, &claims, position)? else {
                debug!("Object {} skipped: no unclaimed element of requested type", position);
                continue;
            };

            let Some(index) = Self::select(object, element_type, &claims, caps, position)? else {
                debug!("Object {} skipped: no matching unclaimed element", position);
                continue;
            };

            let size = element_type.size();
            if u64::from(object.offset) + u64::from(size) > u64::from(spec.packet_size) {
                return Err(MapperError::Validation(format!(
                    "object {}: offset {} + {} exceeds packet size {}",
                    position, object.offset, size, spec.packet_size
                )));
            }
            if !claims.bytes_free(object.offset, size) {
                return Err(MapperError::Conflict(format!(
                    "object {}: offset {} overlaps a previously claimed element",
                    position, object.offset
                )));
            }

            claims.claim(element_type, index, object.offset);
            let instance = Instance {
                element_type,
                index: index as u8,
            };
            instance_to_offset.insert(instance, object.offset);
            offset_to_instance.insert(object.offset, instance);
            debug!("Object {} bound: {:?} at offset {}", position, instance, object.offset);

            claims.advance();
        }

        debug!(
            "Data format negotiated: {} elements in {} bytes",
            instance_to_offset.len(),
            spec.packet_size
        );

        Ok(Self {
            packet_size: spec.packet_size,
            capabilities: caps.clone(),
            instance_to_offset,
            offset_to_instance,
        })
    }

    /// Element type a descriptor binds to, `Ok(None)` to skip it.
    ///
    /// A subtype pins the type. Otherwise a specific instance takes the first
    /// masked type in which it exists, and "any instance" takes the first
    /// masked type with an unclaimed element.
    fn candidate_type(object: &ObjectFormat, claims: &Claims, position: usize) -> Result<Option<ElementType>> {
        if let Some(subtype) = object.subtype {
            let element_type = subtype.element_type();
            if !object.type_mask.contains(element_type) {
                return Err(MapperError::Validation(format!(
                    "object {}: subtype {:?} is outside its type mask",
                    position, subtype
                )));
            }
            return Ok(Some(element_type));
        }

        match object.instance {
            Some(index) => ElementType::ORDER
                .into_iter()
                .find(|&t| object.type_mask.contains(t) && claims.exists(t, index as usize))
                .map(Some)
                .ok_or_else(|| {
                    MapperError::Validation(format!(
                        "object {}: no element exists for instance {}",
                        position, index
                    ))
                }),
            None => Ok(ElementType::ORDER
                .into_iter()
                .find(|&t| object.type_mask.contains(t) && claims.has_unused(t))),
        }
    }

    /// Picks the element a descriptor claims, `Ok(None)` to skip it.
    fn select(
        object: &ObjectFormat,
        element_type: ElementType,
        claims: &Claims,
        caps: &Capabilities,
        position: usize,
    ) -> Result<Option<usize>> {
        if let Some(ObjectSubtype::Axis(axis)) = object.subtype {
            return match (caps.find_axis(axis), object.instance) {
                (Some(index), None) => Ok((!claims.is_used(element_type, index)).then_some(index)),
                (Some(index), Some(0)) if !claims.is_used(element_type, index) => Ok(Some(index)),
                (None, None) => Ok(None),
                (None, Some(_)) => Err(MapperError::Validation(format!(
                    "object {}: axis {:?} does not exist",
                    position, axis
                ))),
                _ => Err(MapperError::Conflict(format!(
                    "object {}: axis {:?} instance {:?} unavailable",
                    position, axis, object.instance
                ))),
            };
        }

        match object.instance {
            None => Ok(claims
                .has_unused(element_type)
                .then_some(claims.next_unused[element_type.slot()])),
            Some(index) if !claims.exists(element_type, index as usize) => Err(MapperError::Validation(format!(
                "object {}: {:?} instance {} does not exist",
                position, element_type, index
            ))),
            Some(index) if claims.is_used(element_type, index as usize) => {
                Err(MapperError::Conflict(format!(
                    "object {}: {:?} instance {} already claimed",
                    position, element_type, index
                )))
            }
            Some(index) => Ok(Some(index as usize)),
        }
    }

    /// Packet size in bytes.
    #[must_use]
    pub fn packet_size(&self) -> u32 {
        self.packet_size
    }

    /// Number of bound elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instance_to_offset.len()
    }

    /// Whether no element is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instance_to_offset.is_empty()
    }

    /// Offset of a bound instance.
    #[must_use]
    pub fn offset_for(&self, instance: Instance) -> Option<u32> {
        self.instance_to_offset.get(&instance).copied()
    }

    /// Instance bound at an offset.
    #[must_use]
    pub fn instance_for(&self, offset: u32) -> Option<Instance> {
        self.offset_to_instance.get(&offset).copied()
    }

    /// Offset of a bound virtual element.
    #[must_use]
    pub fn offset_for_element(&self, element: ElementIdentifier) -> Option<u32> {
        Instance::from_element(element, &self.capabilities).and_then(|i| self.offset_for(i))
    }

    /// Virtual element bound at an offset.
    #[must_use]
    pub fn element_for_offset(&self, offset: u32) -> Option<ElementIdentifier> {
        self.instance_for(offset)
            .and_then(|i| i.to_element(&self.capabilities))
    }

    /// Bound instances with their offsets, in instance order.
    pub fn iter(&self) -> impl Iterator<Item = (Instance, u32)> + '_ {
        self.instance_to_offset.iter().map(|(&i, &o)| (i, o))
    }

    /// Writes `state` into `buffer` using this layout.
    ///
    /// The first `packet_size` bytes are zero-filled, then every bound
    /// element is written at its offset.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `buffer` is shorter than the packet size.
    pub fn write_packet(&self, state: &VirtualState, buffer: &mut [u8]) -> Result<()> {
        let packet_size = self.packet_size as usize;
        if buffer.len() < packet_size {
            return Err(MapperError::Validation(format!(
                "buffer of {} bytes is smaller than packet size {}",
                buffer.len(),
                packet_size
            )));
        }

        let packet = &mut buffer[..packet_size];
        packet.fill(0);

        for (instance, offset) in self.iter() {
            let offset = offset as usize;
            let Some(element) = instance.to_element(&self.capabilities) else {
                continue;
            };
            let Some(value) = element_value(state, element) else {
                continue;
            };
            match instance.element_type {
                ElementType::Button => packet[offset] = value as u8,
                ElementType::Axis | ElementType::Pov => {
                    packet[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
        }

        Ok(())
    }
}

/// Value of one element as it appears in a packet.
///
/// Axes are their value, buttons [`BUTTON_PRESSED`] or 0, and the POV its
/// heading in centidegrees or [`POV_CENTERED`].
#[must_use]
pub fn element_value(state: &VirtualState, element: ElementIdentifier) -> Option<i32> {
    match element {
        ElementIdentifier::Axis(axis) => Some(state.axis_value(axis)),
        ElementIdentifier::Button(button) => {
            Some(if state.is_button_pressed(button) { i32::from(BUTTON_PRESSED) } else { 0 })
        }
        ElementIdentifier::Pov => Some(
            state
                .pov_heading()
                .map_or(POV_CENTERED, |heading| heading.centidegrees() as i32),
        ),
        ElementIdentifier::WholeController => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::types::PovDirection;

    fn test_caps() -> Capabilities {
        Capabilities::new(vec![AxisKind::X, AxisKind::Y, AxisKind::RotZ], 4, true)
    }

    fn spec(packet_size: u32, objects: Vec<ObjectFormat>) -> DataFormatSpec {
        DataFormatSpec { packet_size, objects }
    }

    fn read_i32(packet: &[u8], offset: usize) -> i32 {
        i32::from_le_bytes(packet[offset..offset + 4].try_into().unwrap())
    }

    // ==================== Native Layout Tests ====================

    #[test]
    fn test_native_layout() {
        let caps = test_caps();
        let format = DataFormat::bind(&DataFormatSpec::native(&caps), &caps).unwrap();

        assert_eq!(format.packet_size(), 20);
        assert_eq!(format.offset_for(Instance::axis(0)), Some(0));
        assert_eq!(format.offset_for(Instance::axis(2)), Some(8));
        assert_eq!(format.offset_for(Instance::button(0)), Some(12));
        assert_eq!(format.offset_for(Instance::button(3)), Some(15));
        assert_eq!(format.offset_for(Instance::pov(0)), Some(16));
        assert_eq!(format.len(), 8);
    }

    #[test]
    fn test_native_layout_empty_controller() {
        let caps = Capabilities::default();
        let native = DataFormatSpec::native(&caps);
        assert_eq!(native.packet_size, 4);
        assert!(DataFormat::bind(&native, &caps).unwrap().is_empty());
    }

    // ==================== Binding Tests ====================

    #[test]
    fn test_bind_rejects_bad_packet_size() {
        let caps = test_caps();
        assert!(matches!(
            DataFormat::bind(&spec(0, vec![]), &caps),
            Err(MapperError::Validation(_))
        ));
        assert!(matches!(
            DataFormat::bind(&spec(6, vec![]), &caps),
            Err(MapperError::Validation(_))
        ));
    }

    #[test]
    fn test_bind_any_instance_claims_in_order() {
        let caps = test_caps();
        let format = DataFormat::bind(
            &spec(
                16,
                vec![
                    ObjectFormat::any(TypeMask::AXIS, 0),
                    ObjectFormat::any(TypeMask::AXIS, 4),
                    ObjectFormat::any(TypeMask::BUTTON, 8),
                    ObjectFormat::any(TypeMask::BUTTON, 9),
                ],
            ),
            &caps,
        )
        .unwrap();

        assert_eq!(format.instance_for(0), Some(Instance::axis(0)));
        assert_eq!(format.instance_for(4), Some(Instance::axis(1)));
        assert_eq!(format.instance_for(8), Some(Instance::button(0)));
        assert_eq!(format.instance_for(9), Some(Instance::button(1)));
    }

    #[test]
    fn test_bind_type_mask_prefers_axis_then_button_then_pov() {
        let caps = Capabilities::new(vec![AxisKind::X], 1, true);
        let any = TypeMask::AXIS | TypeMask::BUTTON | TypeMask::POV;
        let format = DataFormat::bind(
            &spec(
                16,
                vec![
                    ObjectFormat::any(any, 0),
                    ObjectFormat::any(any, 4),
                    ObjectFormat::any(any, 8),
                    ObjectFormat::any(any, 12),
                ],
            ),
            &caps,
        )
        .unwrap();

        assert_eq!(format.instance_for(0), Some(Instance::axis(0)));
        assert_eq!(format.instance_for(4), Some(Instance::button(0)));
        assert_eq!(format.instance_for(8), Some(Instance::pov(0)));
        assert_eq!(format.instance_for(12), None);
    }

    #[test]
    fn test_bind_skips_exhausted_any_instance() {
        let caps = Capabilities::new(vec![AxisKind::X], 0, false);
        let format = DataFormat::bind(
            &spec(
                8,
                vec![
                    ObjectFormat::any(TypeMask::AXIS, 0),
                    ObjectFormat::any(TypeMask::AXIS, 4),
                ],
            ),
            &caps,
        )
        .unwrap();
        assert_eq!(format.len(), 1);
        assert_eq!(format.instance_for(4), None);
    }

    #[test]
    fn test_bind_specific_instance() {
        let caps = test_caps();
        let format = DataFormat::bind(
            &spec(
                8,
                vec![
                    ObjectFormat::instance(TypeMask::BUTTON, 3, 0),
                    ObjectFormat::any(TypeMask::BUTTON, 1),
                ],
            ),
            &caps,
        )
        .unwrap();
        assert_eq!(format.offset_for(Instance::button(3)), Some(0));
        assert_eq!(format.offset_for(Instance::button(0)), Some(1));
    }

    #[test]
    fn test_bind_specific_instance_nonexistent_fails() {
        let caps = test_caps();
        let result = DataFormat::bind(&spec(8, vec![ObjectFormat::instance(TypeMask::BUTTON, 9, 0)]), &caps);
        assert!(matches!(result, Err(MapperError::Validation(_))));
    }

    #[test]
    fn test_bind_specific_instance_twice_fails() {
        let caps = test_caps();
        let result = DataFormat::bind(
            &spec(
                8,
                vec![
                    ObjectFormat::instance(TypeMask::BUTTON, 2, 0),
                    ObjectFormat::instance(TypeMask::BUTTON, 2, 1),
                ],
            ),
            &caps,
        );
        assert!(matches!(result, Err(MapperError::Conflict(_))));
    }

    #[test]
    fn test_bind_axis_subtype() {
        let caps = test_caps();
        let format = DataFormat::bind(
            &spec(
                8,
                vec![
                    ObjectFormat::axis_kind(AxisKind::RotZ, 0),
                    ObjectFormat::any(TypeMask::AXIS, 4),
                ],
            ),
            &caps,
        )
        .unwrap();
        assert_eq!(format.element_for_offset(0), Some(ElementIdentifier::Axis(AxisKind::RotZ)));
        assert_eq!(format.element_for_offset(4), Some(ElementIdentifier::Axis(AxisKind::X)));
    }

    #[test]
    fn test_bind_missing_axis_subtype_any_instance_skipped() {
        let caps = test_caps();
        let format = DataFormat::bind(&spec(4, vec![ObjectFormat::axis_kind(AxisKind::Z, 0)]), &caps).unwrap();
        assert!(format.is_empty());
    }

    #[test]
    fn test_bind_missing_axis_subtype_specific_instance_fails() {
        let caps = test_caps();
        let object = ObjectFormat::instance(TypeMask::AXIS, 0, 0).with_subtype(ObjectSubtype::Axis(AxisKind::Z));
        assert!(matches!(
            DataFormat::bind(&spec(4, vec![object]), &caps),
            Err(MapperError::Validation(_))
        ));
    }

    #[test]
    fn test_bind_button_with_wrong_subtype_fails() {
        let caps = test_caps();
        let object = ObjectFormat::any(TypeMask::BUTTON, 0).with_subtype(ObjectSubtype::Pov);
        assert!(matches!(
            DataFormat::bind(&spec(4, vec![object]), &caps),
            Err(MapperError::Validation(_))
        ));
    }

    #[test]
    fn test_bind_axis_subtype_in_mixed_mask_skipped_when_absent() {
        let caps = Capabilities::new(vec![AxisKind::X], 2, false);
        let format = DataFormat::bind(
            &spec(
                8,
                vec![
                    ObjectFormat::any(TypeMask::AXIS, 0),
                    ObjectFormat::any(TypeMask::ANY, 4).with_subtype(ObjectSubtype::Axis(AxisKind::Z)),
                ],
            ),
            &caps,
        )
        .unwrap();

        assert_eq!(format.len(), 1);
        assert_eq!(format.instance_for(4), None);
        assert_eq!(format.offset_for(Instance::button(0)), None);
    }

    #[test]
    fn test_bind_button_subtype_in_mixed_mask_claims_button() {
        let caps = Capabilities::new(vec![AxisKind::X, AxisKind::Y], 2, false);
        let format = DataFormat::bind(
            &spec(
                4,
                vec![
                    ObjectFormat::any(TypeMask::ANY, 0).with_subtype(ObjectSubtype::Button),
                    ObjectFormat::any(TypeMask::ANY, 1).with_subtype(ObjectSubtype::Button),
                ],
            ),
            &caps,
        )
        .unwrap();

        assert_eq!(format.instance_for(0), Some(Instance::button(0)));
        assert_eq!(format.instance_for(1), Some(Instance::button(1)));
    }

    #[test]
    fn test_bind_pov_subtype_without_pov_skipped() {
        let caps = Capabilities::new(vec![AxisKind::X], 1, false);
        let object = ObjectFormat::any(TypeMask::ANY, 0).with_subtype(ObjectSubtype::Pov);
        let format = DataFormat::bind(&spec(4, vec![object]), &caps).unwrap();
        assert!(format.is_empty());
    }

    #[test]
    fn test_bind_last_instance_claimed_twice_conflicts() {
        let caps = Capabilities::new(vec![], 1, false);
        let result = DataFormat::bind(
            &spec(
                4,
                vec![
                    ObjectFormat::instance(TypeMask::BUTTON, 0, 0),
                    ObjectFormat::instance(TypeMask::BUTTON, 0, 1),
                ],
            ),
            &caps,
        );
        assert!(matches!(result, Err(MapperError::Conflict(_))));
    }

    #[test]
    fn test_bind_specific_instance_uses_first_type_where_it_exists() {
        let caps = Capabilities::new(vec![AxisKind::X], 3, false);
        let mask = TypeMask::AXIS | TypeMask::BUTTON;
        let format = DataFormat::bind(&spec(4, vec![ObjectFormat::instance(mask, 2, 0)]), &caps).unwrap();
        assert_eq!(format.instance_for(0), Some(Instance::button(2)));
    }

    #[test]
    fn test_bind_rejects_oversized_packet() {
        let caps = test_caps();
        let oversized = spec(MAX_PACKET_SIZE + 4, vec![ObjectFormat::any(TypeMask::AXIS, 0)]);
        assert!(matches!(
            DataFormat::bind(&oversized, &caps),
            Err(MapperError::Validation(_))
        ));
        assert!(matches!(
            DataFormat::bind(&spec(0xFFFF_FFFC, vec![]), &caps),
            Err(MapperError::Validation(_))
        ));

        let largest = spec(MAX_PACKET_SIZE, vec![ObjectFormat::any(TypeMask::AXIS, MAX_PACKET_SIZE - 4)]);
        let format = DataFormat::bind(&largest, &caps).unwrap();
        assert_eq!(format.instance_for(MAX_PACKET_SIZE - 4), Some(Instance::axis(0)));
    }

    #[test]
    fn test_element_value_encoding() {
        let mut state = VirtualState::default();
        state.axis[AxisKind::Y.index()] = -42;
        state.button[3] = true;

        assert_eq!(element_value(&state, ElementIdentifier::Axis(AxisKind::Y)), Some(-42));
        assert_eq!(
            element_value(&state, ElementIdentifier::Button(ButtonIndex::new(3).unwrap())),
            Some(0x80)
        );
        assert_eq!(
            element_value(&state, ElementIdentifier::Button(ButtonIndex::new(0).unwrap())),
            Some(0)
        );
        assert_eq!(element_value(&state, ElementIdentifier::Pov), Some(POV_CENTERED));
        assert_eq!(element_value(&state, ElementIdentifier::WholeController), None);
    }

    #[test]
    fn test_bind_overlapping_offsets_fail() {
        let caps = test_caps();
        let result = DataFormat::bind(
            &spec(
                8,
                vec![
                    ObjectFormat::any(TypeMask::AXIS, 0),
                    ObjectFormat::any(TypeMask::BUTTON, 3),
                ],
            ),
            &caps,
        );
        assert!(matches!(result, Err(MapperError::Conflict(_))));
    }

    #[test]
    fn test_bind_offset_beyond_packet_fails() {
        let caps = test_caps();
        let result = DataFormat::bind(&spec(4, vec![ObjectFormat::any(TypeMask::AXIS, 2)]), &caps);
        assert!(matches!(result, Err(MapperError::Validation(_))));
    }

    #[test]
    fn test_bind_element_offset_round_trip() {
        let caps = test_caps();
        let format = DataFormat::bind(&DataFormatSpec::native(&caps), &caps).unwrap();
        for (instance, offset) in format.iter() {
            assert_eq!(format.instance_for(offset), Some(instance));
            let element = instance.to_element(&caps).unwrap();
            assert_eq!(format.offset_for_element(element), Some(offset));
        }
        assert_eq!(format.offset_for_element(ElementIdentifier::WholeController), None);
    }

    // ==================== Packet Writer Tests ====================

    #[test]
    fn test_write_packet() {
        let caps = test_caps();
        let format = DataFormat::bind(&DataFormatSpec::native(&caps), &caps).unwrap();

        let mut state = VirtualState::default();
        state.axis[AxisKind::X.index()] = -1234;
        state.axis[AxisKind::RotZ.index()] = 32767;
        state.button[1] = true;
        state.pov[PovDirection::Down.index()] = true;

        let mut packet = [0xAAu8; 24];
        format.write_packet(&state, &mut packet).unwrap();

        assert_eq!(read_i32(&packet, 0), -1234);
        assert_eq!(read_i32(&packet, 4), 0);
        assert_eq!(read_i32(&packet, 8), 32767);
        assert_eq!(&packet[12..16], &[0x00, 0x80, 0x00, 0x00]);
        assert_eq!(read_i32(&packet, 16), 18000);
        assert_eq!(&packet[20..], &[0xAA; 4]);
    }

    #[test]
    fn test_write_packet_pov_centered_and_unbound_zeroed() {
        let caps = test_caps();
        let format = DataFormat::bind(
            &spec(12, vec![ObjectFormat::any(TypeMask::POV, 8)]),
            &caps,
        )
        .unwrap();

        let mut packet = [0xFFu8; 12];
        format.write_packet(&VirtualState::default(), &mut packet).unwrap();
        assert_eq!(&packet[..8], &[0; 8]);
        assert_eq!(read_i32(&packet, 8), POV_CENTERED);
    }

    #[test]
    fn test_write_packet_short_buffer_fails() {
        let caps = test_caps();
        let format = DataFormat::bind(&DataFormatSpec::native(&caps), &caps).unwrap();
        let mut packet = [0u8; 8];
        assert!(format.write_packet(&VirtualState::default(), &mut packet).is_err());
    }
}
