//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the desired state declared in configuration with the current
//! state read back through the Provider, and generates the list of Effects
//! (Plan) needed to reconcile them.

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute differs -> delete and recreate
    Replace {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let needs_replace = schema.is_some_and(|s| changed.iter().any(|name| s.is_force_new(name)));
    if needs_replace {
        Diff::Replace {
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
///
/// Only attributes present in the configuration are compared, so values
/// computed by the remote API never show up as drift.
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        let attr_schema = schema.and_then(|s| s.attributes.get(key));
        let same = match (current.get(key), attr_schema) {
            (Some(current_value), Some(attr)) => attr.values_equal(desired_value, current_value),
            (Some(current_value), None) => current_value == desired_value,
            // An empty list or map in configuration matches an absent attribute
            (None, _) => match desired_value {
                Value::List(items) => items.is_empty(),
                Value::Map(map) => map.is_empty(),
                _ => false,
            },
        };

        if !same {
            changed.push(key.clone());
        }
    }

    changed.sort();
    changed
}

/// Compute Diffs for all declared resources and generate a Plan
///
/// `current_states` holds what was read back for each declared resource;
/// `orphans` are resources recorded in state but no longer declared, and are
/// scheduled for deletion. Data sources always produce a Read. Schema
/// defaults are filled in before comparing, so effects carry them.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    orphans: &[State],
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for declared in desired {
        let schema = schemas.get(&declared.id.resource_type);
        let mut resource = declared.clone();
        if let Some(schema) = schema {
            schema.apply_defaults(&mut resource.attributes);
        }

        if resource.is_data_source() {
            plan.add(Effect::Read(resource));
            continue;
        }

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(&resource, &current, schema) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    // Delete in reverse declaration order of the recorded state
    for state in orphans.iter().rev() {
        plan.add(Effect::Delete {
            id: state.id.clone(),
            from: state.clone(),
        });
    }

    plan
}
