//! Guardrail registry: named checks partitioned by group.
//!
//! The registry is built once at startup and then shared read-only (usually
//! behind an `Arc`) with the executor. Enumeration order is registration
//! order, so verdicts list outcomes reproducibly.

use std::sync::Arc;

use tracing::debug;

use crate::config::GuardrailConfig;
use crate::error::{Error, Result};

use super::{CheckCatalog, CheckDefinition, GuardrailCheck, GuardrailGroup, SharedGuardrailCheck};

/// Ordered mapping from [`GuardrailGroup`] to its registered checks.
#[derive(Debug, Clone, Default)]
pub struct GuardrailRegistry {
    blocking: Vec<CheckDefinition>,
    non_blocking: Vec<CheckDefinition>,
}

impl GuardrailRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration, resolving each entry's function
    /// identifier through `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCheck`] if an entry names a function the
    /// catalog does not provide, or [`Error::DuplicateName`] if a name appears
    /// twice in the same group.
    pub fn from_config(config: &GuardrailConfig, catalog: &CheckCatalog) -> Result<Self> {
        let mut registry = Self::new();
        for group in GuardrailGroup::ALL {
            for entry in config.entries(group) {
                let check = catalog
                    .resolve(&entry.function)
                    .ok_or_else(|| Error::UnknownCheck {
                        name: entry.name.clone(),
                        function: entry.function.clone(),
                    })?;
                registry.register_shared(group, entry.name.clone(), check)?;
            }
        }
        Ok(registry)
    }

    /// Register a check under `name` in `group`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if `name` is already registered in
    /// `group`. The same name may be used once in each group.
    pub fn register(
        &mut self,
        group: GuardrailGroup,
        name: impl Into<String>,
        check: impl GuardrailCheck + 'static,
    ) -> Result<()> {
        self.register_shared(group, name, Arc::new(check))
    }

    /// Register an already shared check under `name` in `group`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if `name` is already registered in
    /// `group`.
    pub fn register_shared(
        &mut self,
        group: GuardrailGroup,
        name: impl Into<String>,
        check: SharedGuardrailCheck,
    ) -> Result<()> {
        let name = name.into();
        let checks = self.group_mut(group);
        if checks.iter().any(|existing| existing.name() == name) {
            return Err(Error::duplicate_name(group, name));
        }
        debug!(guardrail = %name, %group, "Registered guardrail");
        checks.push(CheckDefinition::new(name, check));
        Ok(())
    }

    /// Checks registered in `group`, in registration order.
    ///
    /// Returns an empty slice when nothing is registered.
    #[must_use]
    pub fn checks_for(&self, group: GuardrailGroup) -> &[CheckDefinition] {
        match group {
            GuardrailGroup::Blocking => &self.blocking,
            GuardrailGroup::NonBlocking => &self.non_blocking,
        }
    }

    /// Total number of registered checks across both groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocking.len() + self.non_blocking.len()
    }

    /// Returns `true` if no check is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn group_mut(&mut self, group: GuardrailGroup) -> &mut Vec<CheckDefinition> {
        match group {
            GuardrailGroup::Blocking => &mut self.blocking,
            GuardrailGroup::NonBlocking => &mut self.non_blocking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardrailEntry;
    use crate::guardrail::check_fn;

    fn names(registry: &GuardrailRegistry, group: GuardrailGroup) -> Vec<&str> {
        registry
            .checks_for(group)
            .iter()
            .map(CheckDefinition::name)
            .collect()
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let mut registry = GuardrailRegistry::new();
        for name in ["first", "second", "third"] {
            registry
                .register(GuardrailGroup::Blocking, name, check_fn(|_| Ok(true)))
                .unwrap();
        }

        assert_eq!(
            names(&registry, GuardrailGroup::Blocking),
            vec!["first", "second", "third"]
        );
        assert!(registry.checks_for(GuardrailGroup::NonBlocking).is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_registered_check_appears_once() {
        let mut registry = GuardrailRegistry::new();
        registry
            .register(GuardrailGroup::NonBlocking, "audit", check_fn(|_| Ok(true)))
            .unwrap();

        let found = names(&registry, GuardrailGroup::NonBlocking)
            .into_iter()
            .filter(|name| *name == "audit")
            .count();
        assert_eq!(found, 1);
    }

    #[test]
    fn test_duplicate_name_in_group_is_rejected() {
        let mut registry = GuardrailRegistry::new();
        registry
            .register(GuardrailGroup::Blocking, "filter", check_fn(|_| Ok(true)))
            .unwrap();

        let err = registry
            .register(GuardrailGroup::Blocking, "filter", check_fn(|_| Ok(false)))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateName { group: GuardrailGroup::Blocking, ref name } if name == "filter"
        ));
        assert_eq!(registry.checks_for(GuardrailGroup::Blocking).len(), 1);

        // The same name is allowed in the other group.
        registry
            .register(GuardrailGroup::NonBlocking, "filter", check_fn(|_| Ok(true)))
            .unwrap();
    }

    #[test]
    fn test_empty_registry() {
        let registry = GuardrailRegistry::new();
        assert!(registry.is_empty());
        for group in GuardrailGroup::ALL {
            assert!(registry.checks_for(group).is_empty());
        }

        let registry =
            GuardrailRegistry::from_config(&GuardrailConfig::empty(), &CheckCatalog::builtin())
                .unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_default_config() {
        let registry =
            GuardrailRegistry::from_config(&GuardrailConfig::default(), &CheckCatalog::builtin())
                .unwrap();

        assert_eq!(
            names(&registry, GuardrailGroup::Blocking),
            vec!["profanity_filter", "sentiment_analysis"]
        );
        assert_eq!(
            names(&registry, GuardrailGroup::NonBlocking),
            vec!["log_conversation", "update_user_stats"]
        );
    }

    #[test]
    fn test_from_config_unknown_function() {
        let config = GuardrailConfig {
            blocking: vec![GuardrailEntry::new("mystery", "does_not_exist")],
            non_blocking: Vec::new(),
        };

        let err = GuardrailRegistry::from_config(&config, &CheckCatalog::builtin()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownCheck { ref name, ref function }
                if name == "mystery" && function == "does_not_exist"
        ));
    }

    #[test]
    fn test_from_config_duplicate_name() {
        let config = GuardrailConfig {
            blocking: vec![
                GuardrailEntry::new("profanity_filter", "check_profanity"),
                GuardrailEntry::new("profanity_filter", "analyze_sentiment"),
            ],
            non_blocking: Vec::new(),
        };

        let err = GuardrailRegistry::from_config(&config, &CheckCatalog::builtin()).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
    }
}
