use serde_json::{Map, Value};

/// Keys whose list values are merged as a set union instead of index by index.
pub const UNION_KEYS: [&str; 3] = ["protocols", "endpoints", "customDomain"];

/// Deep-merge `source` into `target`, returning the merged document.
///
/// This is primarily used to lay a per-region override block on top of the
/// shared configuration of a resource, where the override should replace
/// scalars (a timeout, a stage name) but only ever *add* to the lists in
/// [`UNION_KEYS`].
///
/// - Objects are merged key by key. Keys only present in `source` are added.
/// - Lists under a [`UNION_KEYS`] key keep all `target` entries in order and
///   append every `source` entry that is not structurally equal to one
///   already present.
/// - Other lists are merged index by index, extra entries of either side are
///   kept.
/// - Everything else (scalars of any type, or two values of differing shape)
///   is taken from `source`.
///
/// Neither input is modified.
///
/// # Example
///
/// ```
/// # use django_deployer::config::merge::merge;
/// use serde_json::json;
///
/// let shared = json!({"timeout": 3, "protocols": ["http"]});
/// let region = json!({"timeout": 10, "protocols": ["https"]});
///
/// assert_eq!(
///     merge(&region, &shared),
///     json!({"timeout": 10, "protocols": ["http", "https"]})
/// );
/// ```
pub fn merge(source: &Value, target: &Value) -> Value {
    match (source, target) {
        (Value::Object(source), Value::Object(target)) => {
            Value::Object(merge_objects(source, target))
        }
        (Value::Array(source), Value::Array(target)) => Value::Array(merge_arrays(source, target)),
        (source, _) => source.clone(),
    }
}

fn merge_objects(source: &Map<String, Value>, target: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = target.clone();

    for (key, source_value) in source {
        let value = match target.get(key) {
            Some(target_value) if UNION_KEYS.contains(&key.as_str()) => {
                union(source_value, target_value)
            }
            Some(target_value) => merge(source_value, target_value),
            None => source_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    merged
}

fn merge_arrays(source: &[Value], target: &[Value]) -> Vec<Value> {
    (0..source.len().max(target.len()))
        .filter_map(|index| match (source.get(index), target.get(index)) {
            (Some(source), Some(target)) => Some(merge(source, target)),
            (Some(value), None) | (None, Some(value)) => Some(value.clone()),
            (None, None) => None,
        })
        .collect()
}

fn union(source: &Value, target: &Value) -> Value {
    let (Value::Array(source), Value::Array(target)) = (source, target) else {
        return source.clone();
    };

    let mut merged = target.clone();
    for entry in source {
        if !merged.contains(entry) {
            merged.push(entry.clone());
        }
    }

    Value::Array(merged)
}
