//! # Virtual Controller Module
//!
//! A [`VirtualController`] presents one shared [`Mapper`] to one consuming
//! application. It owns everything that is per-application:
//!
//! - The latest raw virtual state, refreshed from the physical gamepad
//! - The per-axis properties (deadzone, saturation, range), created lazily
//! - The negotiated data format, if any
//! - A bounded buffer of state changes for the elements that format binds
//!
//! All of it sits behind a single mutex per controller, so the state can be
//! refreshed from a polling thread while the application reads packets or
//! changes properties from another.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use vpad_mapper::controller::data_format::DataFormatSpec;
//! use vpad_mapper::controller::types::{AxisKind, PhysicalState};
//! use vpad_mapper::controller::virtual_controller::VirtualController;
//! use vpad_mapper::mapper::MapperRegistry;
//!
//! let registry = MapperRegistry::with_builtins();
//! let mapper = registry.lookup("StandardGamepad").unwrap();
//! let controller = VirtualController::new(mapper);
//!
//! controller.set_axis_deadzone(AxisKind::X, 2000)?;
//! controller.set_data_format(&DataFormatSpec::native(controller.capabilities()))?;
//!
//! let mut physical = PhysicalState::default();
//! physical.left_stick_x = 32767;
//! controller.refresh_state(&physical);
//!
//! let mut packet = vec![0u8; 64];
//! controller.get_device_state(&mut packet)?;
//! assert_eq!(i32::from_le_bytes(packet[0..4].try_into().unwrap()), 32767);
//! # Ok::<(), vpad_mapper::error::MapperError>(())
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::controller::axis_transform::AxisProperties;
use crate::controller::data_format::{element_value, DataFormat, DataFormatSpec, Instance};
use crate::controller::evdev_source::PhysicalSource;
use crate::controller::event_buffer::{BufferedData, EventBuffer};
use crate::controller::types::{
    AxisKind, Capabilities, ElementIdentifier, PhysicalState, VirtualState, AXIS_COUNT,
};
use crate::error::{MapperError, Result};
use crate::mapper::Mapper;

/// Element addressed by a property request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTarget {
    /// The controller as a whole.
    Device,
    /// An element by type and type-relative index.
    ById(Instance),
    /// An element by its offset in the negotiated data format.
    ByOffset(u32),
}

/// An axis property with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Deadzone(u32),
    Saturation(u32),
    Range { min: i32, max: i32 },
    /// Event buffer capacity; whole controller only.
    BufferSize(u32),
}

/// An axis property without a value, for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Deadzone,
    Saturation,
    Range,
    BufferSize,
}

#[derive(Debug, Default)]
struct ControllerInner {
    raw_state: VirtualState,
    axis_properties: Option<[AxisProperties; AXIS_COUNT]>,
    data_format: Option<DataFormat>,
    events: EventBuffer,
}

impl ControllerInner {
    fn axis_properties(&mut self, defaults: AxisProperties) -> &mut [AxisProperties; AXIS_COUNT] {
        self.axis_properties.get_or_insert([defaults; AXIS_COUNT])
    }
}

/// One virtual controller backed by a shared mapper.
#[derive(Debug)]
pub struct VirtualController {
    mapper: Arc<Mapper>,
    capabilities: Capabilities,
    axis_defaults: AxisProperties,
    inner: Mutex<ControllerInner>,
}

impl VirtualController {
    /// Creates a controller with default axis properties.
    #[must_use]
    pub fn new(mapper: Arc<Mapper>) -> Self {
        Self::with_axis_defaults(mapper, AxisProperties::default())
    }

    /// Creates a controller whose axes start with `axis_defaults`.
    #[must_use]
    pub fn with_axis_defaults(mapper: Arc<Mapper>, axis_defaults: AxisProperties) -> Self {
        let capabilities = mapper.capabilities().clone();
        Self {
            mapper,
            capabilities,
            axis_defaults,
            inner: Mutex::new(ControllerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mapper driving this controller.
    #[must_use]
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Capabilities of this controller.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    // ==================== State ====================

    /// Maps a physical sample and stores it as the current raw state.
    ///
    /// # Returns
    ///
    /// `true` if the raw state changed.
    pub fn refresh_state(&self, physical: &PhysicalState) -> bool {
        self.store(self.mapper.map_physical_to_virtual(physical))
    }

    /// Stores the neutral state, as for a disconnected gamepad.
    pub fn refresh_neutral(&self) -> bool {
        self.store(VirtualState::default())
    }

    /// Replaces the raw state and buffers the changes of bound elements.
    fn store(&self, new_state: VirtualState) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.raw_state == new_state {
            return false;
        }

        if inner.events.is_enabled() {
            if let Some(format) = &inner.data_format {
                let properties = self.axis_table(inner.axis_properties.as_ref());
                let before = self.transform(&properties, inner.raw_state);
                let after = self.transform(&properties, new_state);
                for (instance, offset) in format.iter() {
                    let Some(element) = instance.to_element(&self.capabilities) else {
                        continue;
                    };
                    let value = element_value(&after, element);
                    if value == element_value(&before, element) {
                        continue;
                    }
                    if let Some(value) = value {
                        inner.events.push(element, offset, value);
                    }
                }
            }
        }

        inner.raw_state = new_state;
        true
    }

    /// Reads `source` and refreshes the state from it.
    ///
    /// On a read failure the state becomes neutral and the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates the error of `source`.
    pub fn poll(&self, source: &mut dyn PhysicalSource) -> Result<bool> {
        match source.read_state() {
            Ok(physical) => Ok(self.refresh_state(&physical)),
            Err(e) => {
                self.refresh_neutral();
                Err(e)
            }
        }
    }

    /// Current state before axis properties are applied.
    #[must_use]
    pub fn raw_state(&self) -> VirtualState {
        self.lock().raw_state
    }

    /// Current state with axis properties applied.
    #[must_use]
    pub fn state(&self) -> VirtualState {
        let inner = self.lock();
        self.transformed(&inner)
    }

    /// Axis properties in effect; the defaults until one is touched.
    fn axis_table(&self, properties: Option<&[AxisProperties; AXIS_COUNT]>) -> [AxisProperties; AXIS_COUNT] {
        properties.copied().unwrap_or([self.axis_defaults; AXIS_COUNT])
    }

    fn transform(&self, properties: &[AxisProperties; AXIS_COUNT], mut state: VirtualState) -> VirtualState {
        for &axis in self.capabilities.axes() {
            state.axis[axis.index()] = properties[axis.index()].apply(state.axis[axis.index()]);
        }
        state
    }

    fn transformed(&self, inner: &ControllerInner) -> VirtualState {
        let properties = self.axis_table(inner.axis_properties.as_ref());
        self.transform(&properties, inner.raw_state)
    }

    // ==================== Data Format ====================

    /// Negotiates and installs an application data format.
    ///
    /// The previous format stays in place if negotiation fails. On success
    /// any buffered events are discarded, since their offsets belong to the
    /// old format.
    ///
    /// # Errors
    ///
    /// Propagates the negotiation error of [`DataFormat::bind`].
    pub fn set_data_format(&self, spec: &DataFormatSpec) -> Result<()> {
        let data_format = DataFormat::bind(spec, &self.capabilities).map_err(|e| {
            warn!("Rejected data format for mapper {}: {}", self.mapper.name(), e);
            e
        })?;
        debug!(
            "Installed data format of {} bytes for mapper {}",
            data_format.packet_size(),
            self.mapper.name()
        );
        let mut inner = self.lock();
        inner.data_format = Some(data_format);
        inner.events.clear();
        Ok(())
    }

    /// Removes the data format and any buffered events.
    pub fn reset_data_format(&self) {
        let mut inner = self.lock();
        inner.data_format = None;
        inner.events.clear();
    }

    /// Whether a data format is installed.
    #[must_use]
    pub fn is_data_format_set(&self) -> bool {
        self.lock().data_format.is_some()
    }

    /// Packet size of the installed data format.
    #[must_use]
    pub fn packet_size(&self) -> Option<u32> {
        self.lock().data_format.as_ref().map(DataFormat::packet_size)
    }

    /// Offset of a virtual element in the installed data format.
    #[must_use]
    pub fn offset_for_element(&self, element: ElementIdentifier) -> Option<u32> {
        self.lock()
            .data_format
            .as_ref()
            .and_then(|format| format.offset_for_element(element))
    }

    /// Virtual element at an offset of the installed data format.
    #[must_use]
    pub fn element_for_offset(&self, offset: u32) -> Option<ElementIdentifier> {
        self.lock()
            .data_format
            .as_ref()
            .and_then(|format| format.element_for_offset(offset))
    }

    /// Writes the transformed state as a packet of the installed data format.
    ///
    /// # Errors
    ///
    /// - `Validation`: no data format installed or `buffer` too small
    pub fn get_device_state(&self, buffer: &mut [u8]) -> Result<()> {
        let inner = self.lock();
        let format = inner
            .data_format
            .as_ref()
            .ok_or_else(|| MapperError::Validation("no data format installed".to_string()))?;
        let state = self.transformed(&inner);
        format.write_packet(&state, buffer)
    }

    // ==================== Buffered Events ====================

    /// Capacity of the event buffer; 0 when buffering is disabled.
    #[must_use]
    pub fn event_buffer_capacity(&self) -> u32 {
        self.lock().events.capacity()
    }

    /// Sets the capacity of the event buffer; 0 disables buffering.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `capacity` is above the buffer maximum.
    pub fn set_event_buffer_capacity(&self, capacity: u32) -> Result<()> {
        self.lock().events.set_capacity(capacity)?;
        debug!("Event buffer capacity for mapper {}: {}", self.mapper.name(), capacity);
        Ok(())
    }

    /// Number of buffered events.
    #[must_use]
    pub fn event_buffer_len(&self) -> usize {
        self.lock().events.len()
    }

    /// Reads up to `max` buffered events, oldest first.
    ///
    /// With `peek` the events stay buffered.
    ///
    /// # Errors
    ///
    /// - `Validation`: no data format installed
    /// - `Unsupported`: buffering is disabled
    pub fn get_device_data(&self, max: usize, peek: bool) -> Result<BufferedData> {
        let mut inner = self.lock();
        if inner.data_format.is_none() {
            return Err(MapperError::Validation("no data format installed".to_string()));
        }
        if !inner.events.is_enabled() {
            return Err(MapperError::Unsupported("event buffering is disabled".to_string()));
        }

        let data = inner.events.read(max, peek);
        if data.overflowed {
            warn!("Event buffer for mapper {} overflowed", self.mapper.name());
        }
        Ok(data)
    }

    // ==================== Properties ====================

    /// Resolves a property target to a virtual element.
    ///
    /// `Device` resolves to the whole controller; `ByOffset` needs an
    /// installed data format.
    #[must_use]
    pub fn identify_element(&self, target: PropertyTarget) -> Option<ElementIdentifier> {
        match target {
            PropertyTarget::Device => Some(ElementIdentifier::WholeController),
            PropertyTarget::ById(instance) => instance.to_element(&self.capabilities),
            PropertyTarget::ByOffset(offset) => self.element_for_offset(offset),
        }
    }

    fn target_device(&self, target: PropertyTarget) -> Result<()> {
        match self.identify_element(target) {
            Some(ElementIdentifier::WholeController) => Ok(()),
            Some(element) => Err(MapperError::Unsupported(format!(
                "buffer size does not apply to {}",
                element
            ))),
            None => Err(MapperError::NotFound(format!("no element for {:?}", target))),
        }
    }

    fn target_axis(&self, target: PropertyTarget) -> Result<AxisKind> {
        match self.identify_element(target) {
            Some(ElementIdentifier::Axis(axis)) => Ok(axis),
            Some(element) => Err(MapperError::Unsupported(format!(
                "axis properties do not apply to {}",
                element
            ))),
            None => Err(MapperError::NotFound(format!("no element for {:?}", target))),
        }
    }

    /// Sets an axis property on the addressed element.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the target does not resolve to an element
    /// - `Unsupported`: an axis property on anything but an axis, or the
    ///   buffer size on anything but the whole controller
    /// - `Validation`: the property value is out of bounds
    pub fn set_property(&self, target: PropertyTarget, property: Property) -> Result<()> {
        match property {
            Property::Deadzone(value) => self.set_axis_deadzone(self.target_axis(target)?, value),
            Property::Saturation(value) => self.set_axis_saturation(self.target_axis(target)?, value),
            Property::Range { min, max } => self.set_axis_range(self.target_axis(target)?, min, max),
            Property::BufferSize(capacity) => {
                self.target_device(target)?;
                self.set_event_buffer_capacity(capacity)
            }
        }
    }

    /// Reads an axis property of the addressed element.
    ///
    /// # Errors
    ///
    /// Same target errors as [`VirtualController::set_property`].
    pub fn get_property(&self, target: PropertyTarget, kind: PropertyKind) -> Result<Property> {
        match kind {
            PropertyKind::Deadzone => Ok(Property::Deadzone(self.axis_deadzone(self.target_axis(target)?)?)),
            PropertyKind::Saturation => Ok(Property::Saturation(self.axis_saturation(self.target_axis(target)?)?)),
            PropertyKind::Range => {
                let (min, max) = self.axis_range(self.target_axis(target)?)?;
                Ok(Property::Range { min, max })
            }
            PropertyKind::BufferSize => {
                self.target_device(target)?;
                Ok(Property::BufferSize(self.event_buffer_capacity()))
            }
        }
    }

    fn check_axis(&self, axis: AxisKind) -> Result<()> {
        if self.capabilities.find_axis(axis).is_none() {
            return Err(MapperError::Validation(format!(
                "{} is not present on mapper {}",
                axis.name(),
                self.mapper.name()
            )));
        }
        Ok(())
    }

    fn update_axis(&self, axis: AxisKind, update: impl FnOnce(&mut AxisProperties) -> Result<()>) -> Result<()> {
        self.check_axis(axis)?;
        let mut inner = self.lock();
        let props = &mut inner.axis_properties(self.axis_defaults)[axis.index()];
        let mut updated = *props;
        update(&mut updated)?;
        *props = updated;
        debug!("{} properties: {:?}", axis.name(), updated);
        Ok(())
    }

    /// Properties of one axis.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis is not present.
    pub fn axis_properties(&self, axis: AxisKind) -> Result<AxisProperties> {
        self.check_axis(axis)?;
        let mut inner = self.lock();
        Ok(inner.axis_properties(self.axis_defaults)[axis.index()])
    }

    /// Deadzone of one axis.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis is not present.
    pub fn axis_deadzone(&self, axis: AxisKind) -> Result<u32> {
        self.axis_properties(axis).map(|p| p.deadzone())
    }

    /// Saturation of one axis.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis is not present.
    pub fn axis_saturation(&self, axis: AxisKind) -> Result<u32> {
        self.axis_properties(axis).map(|p| p.saturation())
    }

    /// Output range of one axis.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis is not present.
    pub fn axis_range(&self, axis: AxisKind) -> Result<(i32, i32)> {
        self.axis_properties(axis).map(|p| p.range())
    }

    /// Sets the deadzone of one axis.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis is not present or the value out of bounds.
    pub fn set_axis_deadzone(&self, axis: AxisKind, deadzone: u32) -> Result<()> {
        self.update_axis(axis, |p| p.set_deadzone(deadzone))
    }

    /// Sets the saturation of one axis.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis is not present or the value out of bounds.
    pub fn set_axis_saturation(&self, axis: AxisKind, saturation: u32) -> Result<()> {
        self.update_axis(axis, |p| p.set_saturation(saturation))
    }

    /// Sets the output range of one axis.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the axis is not present or `min >= max`.
    pub fn set_axis_range(&self, axis: AxisKind, min: i32, max: i32) -> Result<()> {
        self.update_axis(axis, |p| p.set_range(min, max))
    }
}
