//! # Mapper Registry
//!
//! Central name to [`Mapper`] table.
//!
//! The registry is append-only: mappers are registered once and live as long
//! as the registry. Lookups take a read lock and may run concurrently with
//! each other and with registrations.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{info, warn};

use super::builtin;
use super::Mapper;
use crate::controller::element_map::ElementMap;
use crate::error::{MapperError, Result};

/// Registry of named mappers.
///
/// # Examples
///
/// ```
/// use vpad_mapper::controller::element_map::ElementMap;
/// use vpad_mapper::mapper::MapperRegistry;
///
/// let registry = MapperRegistry::new();
/// registry.register("Empty", ElementMap::new())?;
/// assert!(registry.lookup("Empty").is_some());
/// assert!(registry.register("Empty", ElementMap::new()).is_err());
/// # Ok::<(), vpad_mapper::error::MapperError>(())
/// ```
#[derive(Debug)]
pub struct MapperRegistry {
    mappers: RwLock<HashMap<String, Arc<Mapper>>>,
}

impl MapperRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            mappers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the built-in mappers pre-loaded
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.load_builtins();
        registry
    }

    /// Process-wide registry, initialized with the built-in mappers on first access
    pub fn global() -> &'static MapperRegistry {
        static GLOBAL: OnceLock<MapperRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_builtins)
    }

    fn load_builtins(&self) {
        match builtin::all() {
            Ok(mappers) => {
                for (name, element_map) in mappers {
                    if let Err(e) = self.register(name, element_map) {
                        warn!("Skipping built-in mapper {}: {}", name, e);
                    }
                }
            }
            Err(e) => warn!("Failed to construct built-in mappers: {}", e),
        }
    }

    /// Register an element map under `name`
    ///
    /// # Errors
    ///
    /// - `Validation`: empty name
    /// - `Conflict`: a mapper with this name is already registered
    pub fn register(&self, name: &str, element_map: ElementMap) -> Result<Arc<Mapper>> {
        if name.is_empty() {
            return Err(MapperError::Validation("mapper name must not be empty".to_string()));
        }

        let mut mappers = self.mappers.write().unwrap_or_else(PoisonError::into_inner);
        if mappers.contains_key(name) {
            return Err(MapperError::Conflict(format!("mapper '{}' already registered", name)));
        }

        let mapper = Arc::new(Mapper::new(name, element_map));
        mappers.insert(name.to_string(), Arc::clone(&mapper));
        info!(
            "Registered mapper {} ({} axes, {} buttons, POV: {})",
            name,
            mapper.capabilities().num_axes(),
            mapper.capabilities().num_buttons(),
            mapper.capabilities().has_pov()
        );
        Ok(mapper)
    }

    /// Find a mapper by name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<Mapper>> {
        self.mappers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Check if a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.mappers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Get all registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .mappers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Get the number of registered mappers
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::element_map::Slot;
    use crate::controller::element_mapper::ElementMapper;
    use crate::controller::types::AxisKind;

    #[test]
    fn test_registry_with_builtins() {
        let registry = MapperRegistry::with_builtins();
        assert_eq!(registry.len(), 5);
        for name in builtin::BUILTIN_NAMES {
            assert!(registry.contains(name), "missing built-in {}", name);
        }
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = MapperRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.lookup(builtin::STANDARD_GAMEPAD).is_none());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = MapperRegistry::new();
        let map = ElementMap::new().with(Slot::StickLeftX, ElementMapper::axis(AxisKind::X));
        let registered = registry.register("Custom", map.clone()).unwrap();

        let found = registry.lookup("Custom").unwrap();
        assert!(Arc::ptr_eq(&registered, &found));
        assert_eq!(found.element_map(), &map);
    }

    #[test]
    fn test_register_duplicate_fails() {
        let registry = MapperRegistry::with_builtins();
        let result = registry.register(builtin::STANDARD_GAMEPAD, ElementMap::new());
        assert!(matches!(result, Err(MapperError::Conflict(_))));
        assert!(!registry.lookup(builtin::STANDARD_GAMEPAD).unwrap().element_map().is_empty());
    }

    #[test]
    fn test_register_empty_name_fails() {
        let registry = MapperRegistry::new();
        assert!(registry.register("", ElementMap::new()).is_err());
    }

    #[test]
    fn test_names_sorted() {
        let registry = MapperRegistry::new();
        registry.register("b", ElementMap::new()).unwrap();
        registry.register("a", ElementMap::new()).unwrap();
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_global_registry_has_builtins() {
        assert!(MapperRegistry::global().contains(builtin::XINPUT_NATIVE));
    }

    #[test]
    fn test_concurrent_lookups_during_registration() {
        let registry = Arc::new(MapperRegistry::with_builtins());
        let writer = Arc::clone(&registry);

        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                writer.register(&format!("Mapper{}", i), ElementMap::new()).unwrap();
            }
        });

        for _ in 0..100 {
            assert!(registry.lookup(builtin::DIGITAL_GAMEPAD).is_some());
        }
        handle.join().unwrap();
        assert_eq!(registry.len(), 105);
    }
}
