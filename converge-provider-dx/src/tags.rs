//! Tag reconciliation

use std::collections::HashMap;

use converge_core::resource::Value;

/// Changes needed to move a resource from one tag set to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Tags to add or overwrite
    pub create: HashMap<String, String>,
    /// Keys to drop, sorted
    pub remove: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.remove.is_empty()
    }
}

/// Compute the untag/tag calls that turn `old` into `new`
///
/// A key whose value changed is removed and then re-created.
pub fn diff_tags(old: &HashMap<String, String>, new: &HashMap<String, String>) -> TagDiff {
    let create: HashMap<String, String> = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut remove: Vec<String> = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect();
    remove.sort();

    TagDiff { create, remove }
}

/// Read a `tags` attribute into a string map
///
/// Non-string values are skipped; a missing attribute means no tags.
pub fn tags_from_attributes(attributes: &HashMap<String, Value>) -> HashMap<String, String> {
    match attributes.get("tags") {
        Some(Value::Map(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => HashMap::new(),
    }
}

/// Render tags as an attribute value
pub fn tags_to_value(tags: &HashMap<String, String>) -> Value {
    Value::Map(
        tags.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}
