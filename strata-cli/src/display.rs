//! Plan and value rendering for terminal output

use std::collections::HashMap;

use colored::Colorize;
use strata_core::effect::Effect;
use strata_core::plan::Plan;
use strata_core::resource::{State, Value};
use strata_core::schema::ResourceSchema;

pub fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    if plan.mutation_count() == 0 {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects().iter().filter(|e| e.is_mutating()) {
        let schema = schemas.get(&effect.resource_id().resource_type);
        println!("  {} {}", symbol(effect), format_effect(effect).bold());
        for line in detail_lines(effect, schema) {
            println!("      {}", line);
        }
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to add, {} to change, {} to replace, {} to destroy.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red()
    );
}

fn symbol(effect: &Effect) -> colored::ColoredString {
    match effect {
        Effect::Create(_) => "+".green().bold(),
        Effect::Update { .. } => "~".yellow().bold(),
        Effect::Replace { .. } => "-/+".magenta().bold(),
        Effect::Delete { .. } => "-".red().bold(),
        Effect::Read(_) => "?".normal(),
    }
}

pub fn format_effect(effect: &Effect) -> String {
    let verb = match effect {
        Effect::Read(_) => "Read",
        Effect::Create(_) => "Create",
        Effect::Update { .. } => "Update",
        Effect::Replace { .. } => "Replace",
        Effect::Delete { .. } => "Delete",
    };
    format!("{} {}", verb, effect.resource_id())
}

/// Attribute lines shown under an effect
fn detail_lines(effect: &Effect, schema: Option<&ResourceSchema>) -> Vec<String> {
    let shown = |key: &str, value: &Value| {
        if schema.is_some_and(|s| s.is_sensitive(key)) {
            "(sensitive)".to_string()
        } else {
            format_value(value)
        }
    };

    match effect {
        Effect::Create(resource) => {
            let mut keys: Vec<&String> = resource.attributes.keys().collect();
            keys.sort();
            keys.into_iter()
                .map(|k| format!("{}: {}", k, shown(k, &resource.attributes[k])))
                .collect()
        }
        Effect::Update {
            from,
            to,
            changed_attributes,
            ..
        }
        | Effect::Replace {
            from,
            to,
            changed_attributes,
        } => changed_attributes
            .iter()
            .map(|k| {
                let before = from
                    .attributes
                    .get(k)
                    .map(|v| shown(k, v))
                    .unwrap_or_else(|| "(none)".to_string());
                let after = to
                    .attributes
                    .get(k)
                    .map(|v| shown(k, v))
                    .unwrap_or_else(|| "(none)".to_string());
                let marker = if schema.is_some_and(|s| s.is_force_new(k)) {
                    " (forces replacement)".red().to_string()
                } else {
                    String::new()
                };
                format!("{}: {} → {}{}", k, before, after.yellow(), marker)
            })
            .collect(),
        Effect::Delete { from, .. } => identifier_line(from).into_iter().collect(),
        Effect::Read(_) => Vec::new(),
    }
}

fn identifier_line(state: &State) -> Option<String> {
    state
        .identifier
        .as_ref()
        .map(|id| format!("id: {}", id.dimmed()))
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => format!("${{{}.{}}}", binding, attr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::resource::{Resource, ResourceId};
    use strata_core::schema::{AttributeSchema, AttributeType};

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::string("a")), "\"a\"");
        assert_eq!(
            format_value(&Value::block([("b", Value::Int(2)), ("a", Value::Bool(true))])),
            "{a: true, b: 2}"
        );
        assert_eq!(
            format_value(&Value::ResourceRef(
                "pureport_network.main".to_string(),
                "id".to_string()
            )),
            "${pureport_network.main.id}"
        );
    }

    #[test]
    fn test_format_effect() {
        let effect = Effect::Create(Resource::new("pureport_network", "main"));
        assert_eq!(format_effect(&effect), "Create pureport_network.main");
    }

    #[test]
    fn test_sensitive_values_are_hidden() {
        let schema = ResourceSchema::new("pureport_azure_connection")
            .attribute(AttributeSchema::new("service_key", AttributeType::String).sensitive());
        let effect = Effect::Create(
            Resource::new("pureport_azure_connection", "er")
                .with_attribute("service_key", Value::string("secret")),
        );

        let lines = detail_lines(&effect, Some(&schema));
        assert_eq!(lines, vec!["service_key: (sensitive)".to_string()]);
    }

    #[test]
    fn test_delete_shows_identifier() {
        let id = ResourceId::new("pureport_network", "main");
        let from = State::existing(id.clone(), HashMap::new()).with_identifier("net-1");
        let lines = detail_lines(&Effect::Delete { id, from }, None);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("net-1"));
    }
}
