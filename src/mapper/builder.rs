//! # Mapper Blueprint Builder
//!
//! Builds new mappers from named, mutable blueprints.
//!
//! A [`Blueprint`] holds an optional template name and a sparse set of slot
//! overrides. Building resolves the template against the registry first, then
//! against other blueprints (building them recursively), applies the
//! overrides to a copy of the template's element map and registers the result.
//!
//! ## Failure Semantics
//!
//! - Every configuration call validates before mutating
//! - Template cycles, including self-reference, abort the whole build
//! - Nothing is registered for a build that fails
//!
//! ## Usage
//!
//! ```
//! use vpad_mapper::controller::element_map::Slot;
//! use vpad_mapper::controller::element_mapper::ElementMapper;
//! use vpad_mapper::mapper::{MapperBuilder, MapperRegistry};
//!
//! let registry = MapperRegistry::with_builtins();
//! let mut builder = MapperBuilder::new(&registry);
//!
//! builder.create_blueprint("Custom")?;
//! builder.set_template("Custom", "StandardGamepad")?;
//! builder.set_element_mapper("Custom", Slot::TriggerLT.index(), Some(ElementMapper::button(14)?))?;
//!
//! let mapper = builder.build("Custom")?;
//! assert_eq!(mapper.capabilities().num_buttons(), 15);
//! # Ok::<(), vpad_mapper::error::MapperError>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Mapper, MapperRegistry};
use crate::controller::element_map::{ElementMap, Slot};
use crate::controller::element_mapper::ElementMapper;
use crate::error::{MapperError, Result};

/// In-progress specification of a mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blueprint {
    template: String,
    overrides: BTreeMap<Slot, Option<ElementMapper>>,
}

impl Blueprint {
    /// Template name, empty for none.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Slot overrides; `None` forces the slot empty.
    #[must_use]
    pub fn overrides(&self) -> &BTreeMap<Slot, Option<ElementMapper>> {
        &self.overrides
    }

    /// Override for one slot, if any.
    #[must_use]
    pub fn override_for(&self, slot: Slot) -> Option<&Option<ElementMapper>> {
        self.overrides.get(&slot)
    }
}

/// Owner of named blueprints that build into a [`MapperRegistry`].
///
/// Building takes `&mut self`, so concurrent builds through one builder are
/// serialized by the borrow checker or by whatever lock wraps the builder.
#[derive(Debug)]
pub struct MapperBuilder<'r> {
    registry: &'r MapperRegistry,
    blueprints: HashMap<String, Blueprint>,
}

impl<'r> MapperBuilder<'r> {
    /// Creates a builder registering into `registry`.
    #[must_use]
    pub fn new(registry: &'r MapperRegistry) -> Self {
        Self {
            registry,
            blueprints: HashMap::new(),
        }
    }

    /// Creates an empty blueprint.
    ///
    /// # Errors
    ///
    /// - `Validation`: empty name
    /// - `Conflict`: `name` is already a blueprint or a registered mapper
    pub fn create_blueprint(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(MapperError::Validation("blueprint name must not be empty".to_string()));
        }
        if self.blueprints.contains_key(name) {
            return Err(MapperError::Conflict(format!("blueprint '{}' already exists", name)));
        }
        if self.registry.contains(name) {
            return Err(MapperError::Conflict(format!("mapper '{}' already registered", name)));
        }

        self.blueprints.insert(name.to_string(), Blueprint::default());
        debug!("Created blueprint {}", name);
        Ok(())
    }

    /// Whether `name` is a blueprint of this builder.
    #[must_use]
    pub fn blueprint_exists(&self, name: &str) -> bool {
        self.blueprints.contains_key(name)
    }

    /// Blueprint by name.
    #[must_use]
    pub fn blueprint(&self, name: &str) -> Option<&Blueprint> {
        self.blueprints.get(name)
    }

    /// Template of a blueprint.
    #[must_use]
    pub fn blueprint_template(&self, name: &str) -> Option<&str> {
        self.blueprints.get(name).map(Blueprint::template)
    }

    /// Names of all blueprints, sorted.
    #[must_use]
    pub fn blueprint_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blueprints.keys().cloned().collect();
        names.sort();
        names
    }

    fn blueprint_mut(&mut self, name: &str) -> Result<&mut Blueprint> {
        self.blueprints
            .get_mut(name)
            .ok_or_else(|| MapperError::NotFound(format!("blueprint '{}'", name)))
    }

    /// Sets the template of a blueprint.
    ///
    /// The template is resolved only at build time, so any name is accepted,
    /// including the blueprint's own.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `name` is not a blueprint.
    pub fn set_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.blueprint_mut(name)?.template = template.to_string();
        Ok(())
    }

    /// Overrides one slot; `None` forces the slot empty.
    ///
    /// # Errors
    ///
    /// - `NotFound`: `name` is not a blueprint
    /// - `Validation`: invalid slot index or malformed mapper
    pub fn set_element_mapper(&mut self, name: &str, slot: usize, mapper: Option<ElementMapper>) -> Result<()> {
        let slot = Slot::from_index(slot)?;
        if let Some(mapper) = &mapper {
            mapper.validate()?;
        }
        self.blueprint_mut(name)?.overrides.insert(slot, mapper);
        Ok(())
    }

    /// Removes the override of one slot.
    ///
    /// # Errors
    ///
    /// - `NotFound`: `name` is not a blueprint, or the slot has no override
    /// - `Validation`: invalid slot index
    pub fn clear_override(&mut self, name: &str, slot: usize) -> Result<()> {
        let slot = Slot::from_index(slot)?;
        match self.blueprint_mut(name)?.overrides.remove(&slot) {
            Some(_) => Ok(()),
            None => Err(MapperError::NotFound(format!(
                "blueprint '{}' has no override for {}",
                name, slot
            ))),
        }
    }

    /// Builds a blueprint and registers the resulting mapper under its name.
    ///
    /// Templates that are still blueprints are built and registered first.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown blueprint or template
    /// - `Cycle`: the template chain loops back
    /// - `Conflict`: a mapper with this name is already registered
    pub fn build(&mut self, name: &str) -> Result<Arc<Mapper>> {
        let mut in_progress = Vec::new();
        self.build_blueprint(name, &mut in_progress).map_err(|e| {
            warn!("Failed to build mapper {}: {}", name, e);
            e
        })
    }

    fn build_blueprint(&self, name: &str, in_progress: &mut Vec<String>) -> Result<Arc<Mapper>> {
        let blueprint = self
            .blueprints
            .get(name)
            .ok_or_else(|| MapperError::NotFound(format!("blueprint '{}'", name)))?;

        if in_progress.iter().any(|n| n == name) {
            in_progress.push(name.to_string());
            return Err(MapperError::Cycle(in_progress.join(" -> ")));
        }
        if self.registry.contains(name) {
            return Err(MapperError::Conflict(format!("mapper '{}' already registered", name)));
        }

        in_progress.push(name.to_string());
        let mut element_map = self.resolve_template(&blueprint.template, in_progress)?;
        in_progress.pop();

        for (&slot, mapper) in &blueprint.overrides {
            element_map.set(slot, mapper.clone());
        }

        debug!(
            "Built blueprint {} (template: '{}', {} overrides)",
            name,
            blueprint.template,
            blueprint.overrides.len()
        );
        self.registry.register(name, element_map)
    }

    fn resolve_template(&self, template: &str, in_progress: &mut Vec<String>) -> Result<ElementMap> {
        if template.is_empty() {
            return Ok(ElementMap::new());
        }
        if let Some(mapper) = self.registry.lookup(template) {
            return Ok(mapper.clone_element_map());
        }
        if self.blueprints.contains_key(template) {
            return self
                .build_blueprint(template, in_progress)
                .map(|mapper| mapper.clone_element_map());
        }
        Err(MapperError::NotFound(format!("template '{}'", template)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::element_map::SLOT_COUNT;
    use crate::controller::types::AxisKind;
    use crate::mapper::builtin;

    fn button(index: u8) -> ElementMapper {
        ElementMapper::button(index).unwrap()
    }

    // ==================== Create Tests ====================

    #[test]
    fn test_create_blueprint() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);

        assert!(builder.create_blueprint("A").is_ok());
        assert!(builder.blueprint_exists("A"));
        assert_eq!(builder.blueprint_template("A"), Some(""));
        assert!(builder.blueprint("A").unwrap().overrides().is_empty());
    }

    #[test]
    fn test_create_duplicate_fails() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();
        assert!(matches!(builder.create_blueprint("A"), Err(MapperError::Conflict(_))));
    }

    #[test]
    fn test_create_with_builtin_name_fails() {
        let registry = MapperRegistry::with_builtins();
        let mut builder = MapperBuilder::new(&registry);
        for name in builtin::BUILTIN_NAMES {
            assert!(builder.create_blueprint(name).is_err(), "{} should be taken", name);
            assert!(!builder.blueprint_exists(name));
        }
    }

    // ==================== Configure Tests ====================

    #[test]
    fn test_set_template_any_name() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();

        builder.set_template("A", "DoesNotExistYet").unwrap();
        assert_eq!(builder.blueprint_template("A"), Some("DoesNotExistYet"));

        builder.set_template("A", "A").unwrap();
        assert_eq!(builder.blueprint_template("A"), Some("A"));
    }

    #[test]
    fn test_configure_unknown_blueprint_fails() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);

        assert!(matches!(builder.set_template("X", "A"), Err(MapperError::NotFound(_))));
        assert!(builder.set_element_mapper("X", 0, Some(button(0))).is_err());
        assert!(builder.clear_override("X", 0).is_err());
    }

    #[test]
    fn test_set_and_clear_element_mapper() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();

        let slot = Slot::ButtonB.index();
        builder.set_element_mapper("A", slot, Some(button(3))).unwrap();
        assert_eq!(
            builder.blueprint("A").unwrap().override_for(Slot::ButtonB),
            Some(&Some(button(3)))
        );

        builder.clear_override("A", slot).unwrap();
        assert_eq!(builder.blueprint("A").unwrap().override_for(Slot::ButtonB), None);
        assert!(matches!(builder.clear_override("A", slot), Err(MapperError::NotFound(_))));
    }

    #[test]
    fn test_invalid_slot_fails_without_mutation() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();

        assert!(builder.set_element_mapper("A", SLOT_COUNT, Some(button(0))).is_err());
        assert!(builder.clear_override("A", SLOT_COUNT).is_err());
        assert!(builder.blueprint("A").unwrap().overrides().is_empty());
    }

    #[test]
    fn test_invalid_mapper_rejected() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();

        let oversized = ElementMapper::Compound(vec![ElementMapper::Null; 9]);
        assert!(builder.set_element_mapper("A", 0, Some(oversized)).is_err());
        assert!(builder.blueprint("A").unwrap().overrides().is_empty());
    }

    // ==================== Build Tests ====================

    #[test]
    fn test_build_empty_blueprint() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("Empty").unwrap();

        let mapper = builder.build("Empty").unwrap();
        assert!(mapper.element_map().is_empty());
        assert!(registry.lookup("Empty").is_some());
    }

    #[test]
    fn test_build_unknown_blueprint_fails() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        assert!(matches!(builder.build("Nope"), Err(MapperError::NotFound(_))));
    }

    #[test]
    fn test_build_with_overrides_only() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();
        builder
            .set_element_mapper("A", Slot::StickLeftX.index(), Some(ElementMapper::axis(AxisKind::RotY)))
            .unwrap();

        let expected = ElementMap::new().with(Slot::StickLeftX, ElementMapper::axis(AxisKind::RotY));
        assert!(builder.build("A").unwrap().element_map().is_equivalent(&expected));
    }

    #[test]
    fn test_build_template_with_modification() {
        let registry = MapperRegistry::with_builtins();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("Custom").unwrap();
        builder.set_template("Custom", builtin::STANDARD_GAMEPAD).unwrap();
        builder
            .set_element_mapper("Custom", Slot::TriggerLT.index(), Some(button(14)))
            .unwrap();

        let mut expected = builtin::standard_gamepad().unwrap();
        expected.set(Slot::TriggerLT, Some(button(14)));

        let mapper = builder.build("Custom").unwrap();
        assert!(mapper.element_map().is_equivalent(&expected));
        assert_eq!(mapper.capabilities().num_buttons(), 15);
    }

    #[test]
    fn test_build_template_with_removal() {
        let registry = MapperRegistry::with_builtins();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("Custom").unwrap();
        builder.set_template("Custom", builtin::STANDARD_GAMEPAD).unwrap();
        builder.set_element_mapper("Custom", Slot::StickRightX.index(), None).unwrap();

        let mut expected = builtin::standard_gamepad().unwrap();
        expected.set(Slot::StickRightX, None);

        let mapper = builder.build("Custom").unwrap();
        assert!(mapper.element_map().is_equivalent(&expected));
        assert_eq!(mapper.capabilities().find_axis(AxisKind::Z), None);
    }

    #[test]
    fn test_build_cleared_modification_uses_template() {
        let registry = MapperRegistry::with_builtins();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("Custom").unwrap();
        builder.set_template("Custom", builtin::XINPUT_NATIVE).unwrap();
        builder.set_element_mapper("Custom", Slot::ButtonA.index(), None).unwrap();
        builder.clear_override("Custom", Slot::ButtonA.index()).unwrap();

        let expected = builtin::xinput_native().unwrap();
        assert!(builder.build("Custom").unwrap().element_map().is_equivalent(&expected));
    }

    #[test]
    fn test_build_does_not_alias_template() {
        let registry = MapperRegistry::with_builtins();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("Custom").unwrap();
        builder.set_template("Custom", builtin::STANDARD_GAMEPAD).unwrap();
        builder.set_element_mapper("Custom", Slot::ButtonA.index(), None).unwrap();
        builder.build("Custom").unwrap();

        let template = registry.lookup(builtin::STANDARD_GAMEPAD).unwrap();
        assert_eq!(template.element_map(), &builtin::standard_gamepad().unwrap());
    }

    #[test]
    fn test_build_twice_fails() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();
        builder.build("A").unwrap();

        assert!(matches!(builder.build("A"), Err(MapperError::Conflict(_))));
        assert!(builder.blueprint_exists("A"));
    }

    #[test]
    fn test_build_self_reference_fails() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();
        builder.set_template("A", "A").unwrap();

        assert!(matches!(builder.build("A"), Err(MapperError::Cycle(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_build_unknown_template_fails() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();
        builder.set_template("A", "Missing").unwrap();

        assert!(matches!(builder.build("A"), Err(MapperError::NotFound(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_build_chain_registers_all() {
        let registry = MapperRegistry::with_builtins();
        let mut builder = MapperBuilder::new(&registry);
        let chain = ["C1", "C2", "C3", "C4"];

        for name in chain {
            builder.create_blueprint(name).unwrap();
        }
        builder.set_template("C1", "C2").unwrap();
        builder.set_template("C2", "C3").unwrap();
        builder.set_template("C3", "C4").unwrap();
        builder.set_template("C4", builtin::STANDARD_GAMEPAD).unwrap();
        builder
            .set_element_mapper("C3", Slot::ButtonY.index(), Some(button(15)))
            .unwrap();

        let mapper = builder.build("C1").unwrap();
        for name in chain {
            assert!(registry.contains(name), "{} should be registered", name);
        }
        assert_eq!(mapper.element_map().get(Slot::ButtonY), Some(&button(15)));
        assert_eq!(
            registry.lookup("C4").unwrap().element_map(),
            &builtin::standard_gamepad().unwrap()
        );
    }

    #[test]
    fn test_build_fork_and_diamond() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        for name in ["Top", "Left", "Right", "Base"] {
            builder.create_blueprint(name).unwrap();
        }
        builder.set_template("Left", "Base").unwrap();
        builder.set_template("Right", "Base").unwrap();
        builder.set_template("Top", "Left").unwrap();
        builder
            .set_element_mapper("Base", Slot::StickLeftX.index(), Some(ElementMapper::axis(AxisKind::X)))
            .unwrap();

        builder.build("Top").unwrap();
        // Base is already registered, so Right resolves it from the registry
        let right = builder.build("Right").unwrap();
        assert_eq!(right.element_map().get(Slot::StickLeftX), Some(&ElementMapper::axis(AxisKind::X)));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_build_cycle_fails_at_every_node() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        let cycle = ["A", "B", "C", "D"];
        for name in cycle {
            builder.create_blueprint(name).unwrap();
        }
        builder.set_template("A", "B").unwrap();
        builder.set_template("B", "C").unwrap();
        builder.set_template("C", "D").unwrap();
        builder.set_template("D", "A").unwrap();

        for name in cycle {
            assert!(matches!(builder.build(name), Err(MapperError::Cycle(_))), "{}", name);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_build_cycle_leaves_template_blueprints_untouched() {
        let registry = MapperRegistry::new();
        let mut builder = MapperBuilder::new(&registry);
        builder.create_blueprint("A").unwrap();
        builder.create_blueprint("B").unwrap();
        builder.set_template("A", "B").unwrap();
        builder.set_template("B", "A").unwrap();
        builder.set_element_mapper("B", 0, Some(button(1))).unwrap();
        let before = builder.blueprint("B").unwrap().clone();

        assert!(builder.build("A").is_err());
        assert_eq!(builder.blueprint("B"), Some(&before));
    }
}
