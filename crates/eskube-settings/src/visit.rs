//! Deferred variable substitution in settings trees
//!
//! Some settings reference values only known once a node has an identity,
//! such as `${POD_NAME}`. They are resolved by walking the settings tree.

/// Placeholder for the pod name
pub const POD_NAME_VAR: &str = "${POD_NAME}";
/// Placeholder for the namespace
pub const NAMESPACE_VAR: &str = "${NAMESPACE}";
/// Placeholder for the headless service name
pub const HEADLESS_SERVICE_NAME_VAR: &str = "${HEADLESS_SERVICE_NAME}";

/// Rewrite every string leaf of a settings tree, at any depth
///
/// Maps and lists are walked; numbers, booleans and nulls are left alone.
pub fn visit(value: &mut serde_json::Value, apply: &dyn Fn(&str) -> String) {
    match value {
        serde_json::Value::String(s) => *s = apply(s),
        serde_json::Value::Object(map) => {
            for child in map.values_mut() {
                visit(child, apply);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                visit(item, apply);
            }
        }
        _ => {}
    }
}

/// Replaces a fixed set of placeholders in strings
#[derive(Clone, Debug, Default)]
pub struct VariableReplacer {
    pairs: Vec<(String, String)>,
}

impl VariableReplacer {
    /// Create an empty replacer
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `placeholder` with `value`
    pub fn with(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((placeholder.into(), value.into()));
        self
    }

    /// Apply every replacement to `input`
    pub fn replace(&self, input: &str) -> String {
        self.pairs
            .iter()
            .fold(input.to_string(), |acc, (from, to)| acc.replace(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Story: node identities are substituted at every depth
    #[test]
    fn story_placeholders_resolved_in_nested_settings() {
        let mut settings = json!({
            "node": {"name": "${POD_NAME}", "attr": {"rack": "r1", "weight": 3}},
            "network.publish_host": "${POD_NAME}.${HEADLESS_SERVICE_NAME}.${NAMESPACE}.svc",
            "discovery": {"seed_hosts": ["${HEADLESS_SERVICE_NAME}", {"deep": "${NAMESPACE}"}]},
            "enabled": true,
            "nothing": null
        });
        let replacer = VariableReplacer::new()
            .with(POD_NAME_VAR, "es-default-0")
            .with(NAMESPACE_VAR, "search")
            .with(HEADLESS_SERVICE_NAME_VAR, "es-default");

        visit(&mut settings, &|s| replacer.replace(s));

        assert_eq!(
            settings,
            json!({
                "node": {"name": "es-default-0", "attr": {"rack": "r1", "weight": 3}},
                "network.publish_host": "es-default-0.es-default.search.svc",
                "discovery": {"seed_hosts": ["es-default", {"deep": "search"}]},
                "enabled": true,
                "nothing": null
            })
        );
    }

    #[test]
    fn test_visit_scalar_root() {
        let mut value = json!("${POD_NAME}");
        visit(&mut value, &|s| s.to_uppercase());
        assert_eq!(value, json!("${POD_NAME}"));

        let mut value = json!(42);
        visit(&mut value, &|_| "changed".to_string());
        assert_eq!(value, json!(42));
    }
}
