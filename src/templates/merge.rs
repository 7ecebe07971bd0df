//! Recursive deep merge of YAML template trees
//!
//! Mappings merge key by key. Sequences and scalars are replaced whole by
//! the overlay; sequences are never merged element-wise.

use serde_yaml::{Mapping, Value};

/// Merge `overlay` onto `base`, returning a new tree. Neither input is aliased.
pub fn merge_values(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => merge_values(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Mapping(merged)
        }
        _ => overlay.clone(),
    }
}

/// Apply one template layer onto an already-resolved base.
///
/// `extends` is dropped, regular keys merge first, and the `overrides`
/// fragment is merged last so it wins over both the base and the layer.
pub fn apply_template_layer(base: &Value, layer: &Value) -> Value {
    let Value::Mapping(layer_map) = layer else {
        return layer.clone();
    };

    let mut regular = Mapping::new();
    let mut overrides = None;
    for (key, value) in layer_map {
        match key.as_str() {
            Some("extends") => {}
            Some("overrides") => overrides = Some(value),
            _ => {
                regular.insert(key.clone(), value.clone());
            }
        }
    }

    let merged = merge_values(base, &Value::Mapping(regular));
    match overrides {
        Some(fragment) => merge_values(&merged, fragment),
        None => merged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_mappings_merge_recursively() {
        let base = yaml("a: 1\nnested:\n  x: 1\n  y: 2\n");
        let overlay = yaml("b: 2\nnested:\n  y: 20\n  z: 30\n");
        let merged = merge_values(&base, &overlay);
        assert_eq!(merged, yaml("a: 1\nnested:\n  x: 1\n  y: 20\n  z: 30\nb: 2\n"));
    }

    #[test]
    fn test_sequences_replace_wholesale() {
        let base = yaml("rates: [0.05, 0.03, 0.02]\n");
        let overlay = yaml("rates: [0.10]\n");
        assert_eq!(merge_values(&base, &overlay), yaml("rates: [0.10]\n"));
    }

    #[test]
    fn test_scalar_replaces_mapping() {
        let base = yaml("bonus:\n  type: percentage_of_salary\n");
        let overlay = yaml("bonus: none\n");
        assert_eq!(merge_values(&base, &overlay), yaml("bonus: none\n"));
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let base = yaml("nested:\n  x: 1\n");
        let overlay = yaml("nested:\n  x: 2\n");
        let _ = merge_values(&base, &overlay);
        assert_eq!(base, yaml("nested:\n  x: 1\n"));
    }

    #[test]
    fn test_overrides_fragment_applies_last() {
        let base = yaml("rental:\n  monthly_cost: 1500\n  deposit: 3000\n");
        let layer = yaml(
            "extends: uk_rent\nrental:\n  monthly_cost: 1800\noverrides:\n  rental:\n    monthly_cost: 2000\n",
        );
        let merged = apply_template_layer(&base, &layer);
        assert_eq!(merged, yaml("rental:\n  monthly_cost: 2000\n  deposit: 3000\n"));
        assert!(merged.get("extends").is_none());
        assert!(merged.get("overrides").is_none());
    }

    #[test]
    fn test_root_layer_applies_own_overrides() {
        let layer = yaml("a: 1\noverrides:\n  a: 2\n");
        assert_eq!(apply_template_layer(&Value::Null, &layer), yaml("a: 2\n"));
    }
}
