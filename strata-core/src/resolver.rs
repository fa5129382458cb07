//! Resolver - Reference resolution and dependency ordering
//!
//! Attribute values of the form `${type.name.attribute}` refer to another
//! resource's attribute. A resource's vendor identifier is exposed as `id`.

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, State, Value};

/// Known attribute values per binding (`type.name`)
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, HashMap<String, Value>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state read back from a provider; missing resources are ignored
    pub fn insert_state(&mut self, state: &State) {
        if !state.exists {
            return;
        }
        let entry = self.values.entry(state.id.binding()).or_default();
        for (k, v) in &state.attributes {
            entry.insert(k.clone(), v.clone());
        }
        if let Some(identifier) = &state.identifier {
            entry
                .entry("id".to_string())
                .or_insert_with(|| Value::string(identifier.clone()));
        }
    }

    pub fn get(&self, binding: &str, attr: &str) -> Option<&Value> {
        self.values.get(binding).and_then(|attrs| attrs.get(attr))
    }

    /// Resolve references inside a value, leaving unknown ones in place
    pub fn resolve_value(&self, value: &Value) -> Value {
        self.resolve_value_depth(value, 0)
    }

    fn resolve_value_depth(&self, value: &Value, depth: usize) -> Value {
        // Guard against reference cycles between bindings
        if depth > 32 {
            return value.clone();
        }
        match value {
            Value::ResourceRef(binding, attr) => match self.get(binding, attr) {
                Some(resolved) => self.resolve_value_depth(resolved, depth + 1),
                None => value.clone(),
            },
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_value_depth(v, depth))
                    .collect(),
            ),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value_depth(v, depth)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    /// Resolve every attribute of a resource, leaving unknown references
    pub fn resolve_lenient(&self, resource: &Resource) -> Resource {
        let mut resolved = resource.clone();
        resolved.attributes = resource
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v)))
            .collect();
        resolved
    }

    /// Resolve every attribute of a resource; any reference left unresolved
    /// is an error naming it
    pub fn resolve(&self, resource: &Resource) -> Result<Resource, String> {
        let resolved = self.resolve_lenient(resource);
        let mut keys: Vec<&String> = resolved.attributes.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(reference) = first_reference(&resolved.attributes[key]) {
                return Err(format!(
                    "{}: attribute '{}' references unknown value '${{{}}}'",
                    resource.id, key, reference
                ));
            }
        }
        Ok(resolved)
    }
}

fn first_reference(value: &Value) -> Option<String> {
    match value {
        Value::ResourceRef(binding, attr) => Some(format!("{}.{}", binding, attr)),
        Value::List(items) => items.iter().find_map(first_reference),
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.into_iter().find_map(|k| first_reference(&map[k]))
        }
        _ => None,
    }
}

/// Extract binding names that a resource depends on
pub fn dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(binding, _) => {
            deps.insert(binding.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_dependencies(v, deps);
            }
        }
        _ => {}
    }
}

/// Sort resources so that every resource comes after the ones it references
///
/// Declaration order is kept wherever dependencies allow. A reference cycle
/// is an error.
pub fn sort_by_dependencies(resources: &[Resource]) -> Result<Vec<Resource>, String> {
    let by_binding: HashMap<String, &Resource> =
        resources.iter().map(|r| (r.id.binding(), r)).collect();

    let mut sorted = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();

    fn visit(
        resource: &Resource,
        by_binding: &HashMap<String, &Resource>,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        sorted: &mut Vec<Resource>,
    ) -> Result<(), String> {
        let binding = resource.id.binding();
        if visited.contains(&binding) {
            return Ok(());
        }
        if !visiting.insert(binding.clone()) {
            return Err(format!("Circular reference involving {}", binding));
        }

        let mut deps: Vec<String> = dependencies(resource).into_iter().collect();
        deps.sort();
        for dep in deps {
            if let Some(dep_resource) = by_binding.get(&dep) {
                visit(dep_resource, by_binding, visited, visiting, sorted)?;
            }
        }

        visiting.remove(&binding);
        visited.insert(binding);
        sorted.push(resource.clone());
        Ok(())
    }

    for resource in resources {
        visit(
            resource,
            &by_binding,
            &mut visited,
            &mut visiting,
            &mut sorted,
        )?;
    }

    Ok(sorted)
}
