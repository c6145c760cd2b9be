//! Rewrites 2016-R2 collection dictionaries into the current form before decoding.
//!
//! Those collections carried their selector fields inline and tagged overrides with a
//! `scope`. The rewrite gives each one a simple selector and moves scoped overrides into
//! synthesized sub-collections that reproduce the old matching.

use crate::selector::filter::TypeFilter;
use crate::selector::pattern::ALL_NAMESPACES;
use serde_json::{Map, Value, json};

const LAYER_KEY: &str = "renderSetupLayer";
const COLLECTION_KEY: &str = "collection";
const SHADER_SCOPE: &str = "shader";

/// Migrate every legacy collection of `layers` in place. Returns how many were rewritten.
pub(crate) fn migrate_layers(layers: &mut [Value]) -> usize {
    layers
        .iter_mut()
        .filter_map(|l| l.get_mut(LAYER_KEY))
        .filter_map(|body| body.get_mut("collections"))
        .filter_map(Value::as_array_mut)
        .map(|collections| collections.iter_mut().map(migrate_node).sum::<usize>())
        .sum()
}

/// Return `true` for a collection dictionary in the 2016-R2 form.
pub(crate) fn is_legacy_collection(node: &Value) -> bool {
    node.get(COLLECTION_KEY)
        .and_then(Value::as_object)
        .is_some_and(|body| !body.contains_key("selector"))
}

fn migrate_node(node: &mut Value) -> usize {
    let legacy = is_legacy_collection(node);
    let Some(obj) = node.as_object_mut() else {
        return 0;
    };
    let mut count = 0;
    for (key, body) in obj.iter_mut() {
        if !key.to_ascii_lowercase().ends_with(COLLECTION_KEY) {
            continue;
        }
        let Some(body) = body.as_object_mut() else {
            continue;
        };
        if let Some(children) = body.get_mut("children").and_then(Value::as_array_mut) {
            count += children.iter_mut().map(migrate_node).sum::<usize>();
        }
        if legacy && key == COLLECTION_KEY {
            migrate_collection(body);
            count += 1;
        }
    }
    count
}

fn take_str(body: &mut Map<String, Value>, key: &str) -> String {
    match body.remove(key) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn take_filter(body: &mut Map<String, Value>) -> TypeFilter {
    match body.remove("typeFilter") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|c| u8::try_from(c).ok())
            .and_then(TypeFilter::from_code)
            .unwrap_or_default(),
        Some(Value::String(s)) => TypeFilter::from_name(&s).unwrap_or_default(),
        _ => TypeFilter::All,
    }
}

/// Shader-scope overrides come back tagged `true`; the `scope` key is dropped.
fn split_scope(mut child: Value) -> (bool, Value) {
    let mut shader = false;
    if let Some(obj) = child.as_object_mut() {
        for body in obj.values_mut().filter_map(Value::as_object_mut) {
            if let Some(scope) = body.remove("scope") {
                shader |= scope.as_str() == Some(SHADER_SCOPE);
            }
        }
    }
    (shader, child)
}

fn simple_selector(
    pattern: &str,
    static_selection: &str,
    filter: TypeFilter,
    custom: &str,
) -> Value {
    json!({
        "simpleSelector": {
            "pattern": pattern,
            "staticSelection": static_selection,
            "typeFilter": filter.code(),
            "customFilterValue": custom,
        }
    })
}

fn sub_collection(name: String, selector: Value, children: Vec<Value>) -> Value {
    json!({
        "collection": {
            "name": name,
            "selfEnabled": true,
            "isolateSelected": false,
            "selector": selector,
            "children": children,
        }
    })
}

fn migrate_collection(body: &mut Map<String, Value>) {
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(COLLECTION_KEY)
        .to_owned();
    let pattern = take_str(body, "expression");
    let static_selection = take_str(body, "staticSelection");
    let custom = take_str(body, "customFilterValue");
    let include_hierarchy = body
        .remove("includeHierarchy")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let filter = take_filter(body);
    let children = match body.remove("children") {
        Some(Value::Array(c)) => c,
        _ => Vec::new(),
    };
    let (shaders, rest): (Vec<_>, Vec<_>) = children
        .into_iter()
        .map(split_scope)
        .partition(|(s, _)| *s);
    let shaders: Vec<Value> = shaders.into_iter().map(|(_, c)| c).collect();
    let rest: Vec<Value> = rest.into_iter().map(|(_, c)| c).collect();

    let own_filter = if include_hierarchy { TypeFilter::All } else { filter };
    body.insert(
        "selector".to_owned(),
        simple_selector(&pattern, &static_selection, own_filter, &custom),
    );

    let mut children = Vec::new();
    if include_hierarchy {
        children.push(sub_collection(
            format!("{name}_hierarchy"),
            simple_selector(ALL_NAMESPACES, "", filter, &custom),
            rest,
        ));
    } else {
        children.extend(rest);
    }
    if !shaders.is_empty() {
        children.push(sub_collection(
            format!("{name}_shaders"),
            simple_selector(ALL_NAMESPACES, "", TypeFilter::Shaders, ""),
            shaders,
        ));
    }
    body.insert("children".to_owned(), Value::Array(children));
}

#[cfg(test)]
#[path = "../../tests/unit/serialize/legacy.rs"]
mod tests;
