//! Flattening of nested configuration documents into dotted names.

use crate::validation::is_valid_name;
use serde_yaml::Value;
use tracing::warn;

/// Every node reachable through nested mappings, paired with its dotted
/// name, in document order.
///
/// Interior mappings are included as well as leaves, so a map-valued
/// variable can take a whole subtree. Sequences are not descended. Keys
/// that do not form a valid name are skipped along with their subtree.
pub fn flatten(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    if root.is_mapping() {
        walk("", root, &mut out);
    } else if !root.is_null() {
        warn!("configuration document root is not a mapping; nothing to load");
    }
    out
}

fn walk<'a>(prefix: &str, node: &'a Value, out: &mut Vec<(String, &'a Value)>) {
    let Value::Mapping(mapping) = node else {
        return;
    };

    for (key, child) in mapping {
        let key = match key {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                warn!(prefix, "skipping non-scalar configuration key");
                continue;
            }
        };
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        if !is_valid_name(&name) {
            warn!(name = %name, "skipping configuration key with invalid name");
            continue;
        }

        out.push((name.clone(), child));
        walk(&name, child, out);
    }
}
