//! Effect - A single side effect against a provider, held as a value

use crate::resource::{Resource, ResourceId, State};

/// Side effect to be executed by the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read a data source
    Read(Resource),
    /// Create a resource that does not exist yet
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete then create, because a force-new attribute changed
    Replace {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource that is no longer declared
    Delete { id: ResourceId, from: State },
}

impl Effect {
    /// Whether this effect changes remote infrastructure
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(r) | Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Delete { id, .. } => id,
            Effect::Replace { to, .. } => &to.id,
        }
    }

    /// Verb used in plan output
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Read(_) => "read",
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Replace { .. } => "replace",
            Effect::Delete { .. } => "delete",
        }
    }
}
