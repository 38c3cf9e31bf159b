//! # Mapper Module
//!
//! Named, immutable mapping configurations.
//!
//! This module handles:
//! - [`Mapper`]: a name paired with an [`ElementMap`], shared read-only by any
//!   number of virtual controllers
//! - [`MapperRegistry`]: the name to mapper table, with the built-in mappers
//! - [`MapperBuilder`]: mutable blueprints with template inheritance that
//!   build into registered mappers

pub mod builder;
pub mod builtin;
pub mod registry;

pub use builder::{Blueprint, MapperBuilder};
pub use registry::MapperRegistry;

use crate::controller::element_map::ElementMap;
use crate::controller::types::{Capabilities, PhysicalState, VirtualState};

/// An immutable named element map.
///
/// # Examples
///
/// ```
/// use vpad_mapper::controller::element_map::{ElementMap, Slot};
/// use vpad_mapper::controller::element_mapper::ElementMapper;
/// use vpad_mapper::controller::types::AxisKind;
/// use vpad_mapper::mapper::Mapper;
///
/// let map = ElementMap::new().with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X));
/// let mapper = Mapper::new("OneAxis", map);
/// assert_eq!(mapper.name(), "OneAxis");
/// assert_eq!(mapper.capabilities().num_axes(), 1);
/// ```
#[derive(Debug)]
pub struct Mapper {
    name: String,
    element_map: ElementMap,
    capabilities: Capabilities,
}

impl Mapper {
    /// Creates a mapper; capabilities are derived from `element_map`.
    #[must_use]
    pub fn new(name: impl Into<String>, element_map: ElementMap) -> Self {
        let capabilities = element_map.capabilities();
        Self {
            name: name.into(),
            element_map,
            capabilities,
        }
    }

    /// Name of this mapper.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element map of this mapper.
    #[must_use]
    pub fn element_map(&self) -> &ElementMap {
        &self.element_map
    }

    /// Owned copy of the element map, for use as a template.
    #[must_use]
    pub fn clone_element_map(&self) -> ElementMap {
        self.element_map.clone()
    }

    /// Capabilities of controllers using this mapper.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Maps a physical sample to a virtual state.
    #[must_use]
    pub fn map_physical_to_virtual(&self, physical: &PhysicalState) -> VirtualState {
        self.element_map.apply(physical)
    }
}
