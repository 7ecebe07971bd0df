//! Inheritance-aware template loading with a per-instance cache

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_yaml::Value;

use super::merge::apply_template_layer;
use super::{TemplateDocument, TemplateKind, TemplateSource, TemplateSpec};
use crate::error::{ConfigurationError, CycleError};

type CacheKey = (TemplateKind, String);

/// Resolves `extends` chains and inline overrides.
///
/// Resolved templates are cached by (kind, name). The cache belongs to this
/// instance; share the instance to share the cache. Reads take a shared lock
/// and each key is written once, so concurrent scenario runs may use one
/// resolver safely.
pub struct TemplateResolver {
    source: Arc<dyn TemplateSource>,
    cache: RwLock<HashMap<CacheKey, Value>>,
}

impl TemplateResolver {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &dyn TemplateSource {
        self.source.as_ref()
    }

    /// Load a template, applying any inline overrides carried by `spec`
    pub fn load(
        &self,
        kind: TemplateKind,
        spec: &TemplateSpec,
    ) -> Result<TemplateDocument, ConfigurationError> {
        let resolved = self.resolve_named(kind, spec.name())?;
        let body = match spec {
            TemplateSpec::Name(_) => resolved,
            TemplateSpec::WithOverrides { overrides, .. } => {
                apply_template_layer(&resolved, &Value::Mapping(overrides.clone()))
            }
        };
        Ok(TemplateDocument::new(kind, spec.name(), body))
    }

    /// Load a template by bare name
    pub fn load_named(
        &self,
        kind: TemplateKind,
        name: &str,
    ) -> Result<TemplateDocument, ConfigurationError> {
        self.load(kind, &TemplateSpec::from(name))
    }

    /// Number of resolved templates held in the cache
    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Walk the `extends` chain leaf-to-root, then merge root-to-leaf.
    /// Every intermediate ancestor is cached as it is resolved.
    fn resolve_named(&self, kind: TemplateKind, name: &str) -> Result<Value, ConfigurationError> {
        if let Some(hit) = self.cached(kind, name) {
            log::debug!("Template cache hit: {kind}/{name}");
            return Ok(hit);
        }

        let mut chain: Vec<(String, Value)> = Vec::new();
        let mut base = Value::Null;
        let mut next = Some(name.to_string());

        while let Some(current) = next.take() {
            if chain.iter().any(|(seen, _)| *seen == current) {
                let mut names: Vec<String> = chain.into_iter().map(|(seen, _)| seen).collect();
                names.push(current);
                return Err(CycleError { kind, chain: names }.into());
            }
            if let Some(resolved) = self.cached(kind, &current) {
                base = resolved;
                break;
            }

            let raw = self.source.read_template(kind, &current)?;
            next = parent_name(kind, &current, &raw)?;
            chain.push((current, raw));
        }

        for (layer_name, raw) in chain.into_iter().rev() {
            base = apply_template_layer(&base, &raw);
            self.store(kind, &layer_name, &base);
        }
        Ok(base)
    }

    fn cached(&self, kind: TemplateKind, name: &str) -> Option<Value> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, name.to_string()))
            .cloned()
    }

    fn store(&self, kind: TemplateKind, name: &str, resolved: &Value) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((kind, name.to_string()))
            .or_insert_with(|| resolved.clone());
    }
}

fn parent_name(
    kind: TemplateKind,
    name: &str,
    raw: &Value,
) -> Result<Option<String>, ConfigurationError> {
    match raw.get("extends") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(parent)) => Ok(Some(parent.clone())),
        Some(_) => Err(ConfigurationError::invalid(
            format!("{kind} template '{name}'"),
            "extends",
            "expected a template name",
        )),
    }
}
