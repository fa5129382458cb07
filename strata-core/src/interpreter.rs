//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.
//! References are re-resolved right before each effect runs, so a resource
//! can use the identifier of one created earlier in the same Plan.

use log::{debug, info};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resolver::Bindings;
use crate::resource::{ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Data source read succeeded
    Read { state: State },
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete followed by create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { id: ResourceId, reason: String },
}

impl EffectOutcome {
    /// State to persist after this outcome, if the resource still exists
    pub fn state(&self) -> Option<&State> {
        match self {
            EffectOutcome::Created { state }
            | EffectOutcome::Updated { state }
            | EffectOutcome::Replaced { state } => Some(state),
            _ => None,
        }
    }
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    ///
    /// `bindings` is updated with every state produced, so later effects see
    /// the attributes of earlier ones.
    pub async fn apply(&self, plan: &Plan, bindings: &mut Bindings) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.apply_effect(effect, bindings).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(e) => {
                    failure_count += 1;
                    info!("{} {} failed: {}", effect.kind(), effect.resource_id(), e);
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute one Effect and record the resulting state in `bindings`
    ///
    /// Errors carry the effect's resource id.
    pub async fn apply_effect(
        &self,
        effect: &Effect,
        bindings: &mut Bindings,
    ) -> ProviderResult<EffectOutcome> {
        let outcome = self
            .execute_effect(effect, bindings)
            .await
            .map_err(|e| match e.resource_id {
                Some(_) => e,
                None => e.for_resource(effect.resource_id().clone()),
            })?;
        if let EffectOutcome::Read { state } = &outcome {
            bindings.insert_state(state);
        } else if let Some(state) = outcome.state() {
            bindings.insert_state(state);
        }
        Ok(outcome)
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        bindings: &Bindings,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                id: effect.resource_id().clone(),
                reason: "dry-run mode".to_string(),
            });
        }

        debug!("{} {}", effect.kind(), effect.resource_id());

        match effect {
            Effect::Read(resource) => {
                let resource = bindings.resolve(resource).map_err(ProviderError::new)?;
                let state = self.provider.read_data_source(&resource).await?;
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let resource = bindings.resolve(resource).map_err(ProviderError::new)?;
                let state = self.provider.create(&resource).await?;
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let identifier = from.identifier.as_deref().ok_or_else(|| {
                    ProviderError::new("Cannot update a resource without a known identifier")
                })?;
                let to = bindings.resolve(to).map_err(ProviderError::new)?;
                let state = self.provider.update(id, identifier, from, &to).await?;
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { from, to, .. } => {
                let to = bindings.resolve(to).map_err(ProviderError::new)?;
                if let Some(identifier) = from.identifier.as_deref() {
                    self.provider.delete(&from.id, identifier, from).await?;
                }
                let state = self.provider.create(&to).await?;
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, from } => {
                let identifier = from.identifier.as_deref().ok_or_else(|| {
                    ProviderError::new("Cannot delete a resource without a known identifier")
                })?;
                self.provider.delete(id, identifier, from).await?;
                Ok(EffectOutcome::Deleted { id: id.clone() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::provider::{BoxFuture, ResourceType};
    use crate::resource::{Resource, Value};

    #[derive(Default)]
    struct TestProvider {
        calls: Mutex<Vec<String>>,
    }

    impl TestProvider {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("read {}", resource.id));
            let state = State::existing(
                resource.id.clone(),
                [("region".to_string(), Value::string("eastus"))].into(),
            );
            Box::pin(async move { Ok(state) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("create {}", resource.id));
            if resource.get_str("fail") == Some("yes") {
                return Box::pin(async { Err(ProviderError::new("rejected")) });
            }
            let state = State::existing(resource.id.clone(), resource.attributes.clone())
                .with_identifier(format!("{}-id", resource.id.name));
            Box::pin(async move { Ok(state) })
        }

        fn update(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("update {} {}", id, identifier));
            let state =
                State::existing(id.clone(), to.attributes.clone()).with_identifier(identifier);
            Box::pin(async move { Ok(state) })
        }

        fn delete(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
        ) -> BoxFuture<'_, ProviderResult<()>> {
            self.record(format!("delete {} {}", id, identifier));
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(TestProvider::default());
        let result = interpreter.apply(&Plan::new(), &mut Bindings::new()).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn created_identifier_feeds_later_references() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test_network", "main")));
        plan.add(Effect::Create(
            Resource::new("test_connection", "c").with_attribute(
                "network_id",
                Value::ResourceRef("test_network.main".to_string(), "id".to_string()),
            ),
        ));

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert!(result.is_success());
        let state = result.outcomes[1].as_ref().unwrap().state().unwrap();
        assert_eq!(state.get_str("network_id"), Some("main-id"));
    }

    #[tokio::test]
    async fn replace_deletes_before_creating() {
        let interpreter = Interpreter::new(TestProvider::default());
        let id = ResourceId::new("test_network", "main");
        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            from: State::existing(id.clone(), Default::default()).with_identifier("old-id"),
            to: Resource::new("test_network", "main"),
            changed_attributes: vec!["name".to_string()],
        });

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert!(result.is_success());
        let calls = interpreter.provider().calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "delete test_network.main old-id".to_string(),
                "create test_network.main".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_failure_unless_continuing() {
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("test_network", "bad").with_attribute("fail", Value::string("yes")),
        ));
        plan.add(Effect::Read(
            Resource::new("test_regions", "all").with_read_only(true),
        ));

        let interpreter = Interpreter::new(TestProvider::default());
        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.outcomes.len(), 1);
        let err = result.outcomes[0].as_ref().unwrap_err();
        assert_eq!(err.resource_id, Some(ResourceId::new("test_network", "bad")));

        let interpreter = Interpreter::new(TestProvider::default()).with_config(InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        });
        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.success_count, 1);
    }

    #[tokio::test]
    async fn delete_without_identifier_fails() {
        let interpreter = Interpreter::new(TestProvider::default());
        let id = ResourceId::new("test_network", "main");
        let mut plan = Plan::new();
        plan.add(Effect::Delete {
            id: id.clone(),
            from: State::existing(id, Default::default()),
        });

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(TestProvider::default()).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test_network", "example")));

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;

        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Skipped { .. })
        ));
        assert!(interpreter.provider().calls.lock().unwrap().is_empty());
    }
}
