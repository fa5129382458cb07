mod display;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use env_logger::Builder;
use log::{LevelFilter, debug, warn};

use strata_core::config::{Config, DEFAULT_CONFIG_FILE};
use strata_core::differ::create_plan;
use strata_core::effect::Effect;
use strata_core::interpreter::{EffectOutcome, Interpreter};
use strata_core::plan::Plan;
use strata_core::provider::{Provider, ResourceType};
use strata_core::registry::ProviderRegistry;
use strata_core::resolver::{Bindings, dependencies, sort_by_dependencies};
use strata_core::resource::{Resource, ResourceId, State};
use strata_core::schema::ResourceSchema;
use strata_provider_azurerm::AzureRmProvider;
use strata_provider_pureport::PureportProvider;
use strata_state::{StateBackend, StateFile, create_backend};

use display::{format_effect, print_plan};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Declarative management of Pureport and Azure resources", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy every resource recorded in state
    Destroy {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Remove a state lock left behind by an interrupted run
    ForceUnlock {
        lock_id: String,

        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },
    /// Print shell completions
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file, auto_approve } => run_apply(&file, auto_approve).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::ForceUnlock { lock_id, file } => run_force_unlock(&file, &lock_id).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "strata", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over `--verbose` when set
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => Builder::from_default_env().init(),
        None => Builder::new().filter_level(level).init(),
    }
}

fn load_config(file: &PathBuf) -> Result<Config, String> {
    Config::load(file).map_err(|e| e.to_string())
}

fn known_types() -> Vec<Box<dyn ResourceType>> {
    strata_provider_pureport::resources::resource_types()
        .into_iter()
        .chain(strata_provider_azurerm::resources::resource_types())
        .collect()
}

/// Checks declarations against provider schemas without needing credentials
fn validate_resources(resources: &[Resource]) -> Result<(), String> {
    let types: HashMap<&'static str, Box<dyn ResourceType>> =
        known_types().into_iter().map(|t| (t.name(), t)).collect();
    let bindings: HashSet<String> = resources.iter().map(|r| r.id.binding()).collect();
    let mut all_errors = Vec::new();

    for resource in resources {
        match types.get(resource.id.resource_type.as_str()) {
            None => all_errors.push(format!(
                "{}: unknown resource type '{}'",
                resource.id, resource.id.resource_type
            )),
            Some(t) if t.is_data_source() != resource.is_data_source() => {
                all_errors.push(format!(
                    "{}: '{}' must be declared under \"{}\"",
                    resource.id,
                    resource.id.resource_type,
                    if t.is_data_source() { "data" } else { "resources" }
                ));
            }
            Some(t) => {
                if let Err(errors) = t.schema().validate(&resource.attributes) {
                    for error in errors {
                        all_errors.push(format!("{}: {}", resource.id, error));
                    }
                }
            }
        }

        let mut missing: Vec<String> = dependencies(resource)
            .into_iter()
            .filter(|dep| !bindings.contains(dep))
            .collect();
        missing.sort();
        for dep in missing {
            all_errors.push(format!("{}: reference to undeclared {}", resource.id, dep));
        }
    }

    if let Err(e) = sort_by_dependencies(resources) {
        all_errors.push(e);
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

/// Provider names needed by the configuration or by resources in state
fn provider_names(config: &Config, state: &StateFile) -> Vec<String> {
    let mut names: Vec<String> = config
        .required_providers()
        .into_iter()
        .chain(state.resources.iter().map(|r| r.provider.clone()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    names.sort();
    names
}

fn build_registry(config: &Config, names: &[String]) -> Result<ProviderRegistry, String> {
    let mut registry = ProviderRegistry::new();
    for name in names {
        let block = config.provider_block(name);
        let provider: Box<dyn Provider> = match name.as_str() {
            "pureport" => Box::new(
                PureportProvider::from_block(&block)
                    .map_err(|e| format!("Failed to configure provider pureport: {}", e))?,
            ),
            "azurerm" => Box::new(
                AzureRmProvider::from_block(&block)
                    .map_err(|e| format!("Failed to configure provider azurerm: {}", e))?,
            ),
            other => return Err(format!("Unknown provider '{}'", other)),
        };
        debug!("Configured provider {}", name);
        registry.register(provider);
    }
    Ok(registry)
}

/// Read every resource recorded in state back from its provider
async fn refresh_states(
    registry: &ProviderRegistry,
    state: &StateFile,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut current = HashMap::new();
    for recorded in &state.resources {
        let id = recorded.id();
        let refreshed = match &recorded.identifier {
            Some(identifier) => registry
                .read(&id, Some(identifier))
                .await
                .map_err(|e| format!("Failed to read state: {}", e))?,
            None => recorded.to_state(),
        };
        current.insert(id, refreshed);
    }
    Ok(current)
}

struct PlannedRun {
    plan: Plan,
    bindings: Bindings,
    current: HashMap<ResourceId, State>,
}

async fn build_plan(
    config: &Config,
    registry: &ProviderRegistry,
    state: &StateFile,
) -> Result<PlannedRun, String> {
    let sorted = sort_by_dependencies(&config.resources)?;
    let current = refresh_states(registry, state).await?;

    let mut bindings = Bindings::new();
    for refreshed in current.values() {
        bindings.insert_state(refreshed);
    }

    let declared: HashSet<&ResourceId> = sorted.iter().map(|r| &r.id).collect();
    let orphans: Vec<State> = state
        .resources
        .iter()
        .map(|r| r.id())
        .filter(|id| !declared.contains(id))
        .filter_map(|id| current.get(&id))
        .filter(|s| s.exists)
        .cloned()
        .collect();

    // References to resources already in state compare by their known value
    let desired: Vec<Resource> = sorted.iter().map(|r| bindings.resolve_lenient(r)).collect();
    let schemas: HashMap<String, ResourceSchema> = registry
        .all_schemas()
        .into_iter()
        .map(|s| (s.resource_type.clone(), s))
        .collect();

    Ok(PlannedRun {
        plan: create_plan(&desired, &current, &orphans, &schemas),
        bindings,
        current,
    })
}

fn schemas_of(registry: &ProviderRegistry) -> HashMap<String, ResourceSchema> {
    registry
        .all_schemas()
        .into_iter()
        .map(|s| (s.resource_type.clone(), s))
        .collect()
}

fn run_validate(file: &PathBuf) -> Result<(), String> {
    let config = load_config(file)?;

    println!("{}", "Validating...".cyan());
    validate_resources(&config.resources)?;

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            config.resources.len()
        )
        .green()
        .bold()
    );
    for resource in &config.resources {
        println!("  • {}", resource.id);
    }
    Ok(())
}

async fn run_plan(file: &PathBuf) -> Result<(), String> {
    let config = load_config(file)?;
    validate_resources(&config.resources)?;

    let backend = create_backend(config.backend.as_ref()).map_err(|e| e.to_string())?;
    let state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let registry = build_registry(&config, &provider_names(&config, &state))?;

    let planned = build_plan(&config, &registry, &state).await?;
    print_plan(&planned.plan, &schemas_of(&registry));
    Ok(())
}

/// Run `operation` while holding the state lock, releasing it afterwards
/// even when the operation fails
async fn with_lock<'a, F, Fut>(
    backend: &'a dyn StateBackend,
    operation: &str,
    run: F,
) -> Result<(), String>
where
    F: FnOnce(&'a dyn StateBackend) -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    let lock = backend
        .acquire_lock(operation)
        .await
        .map_err(|e| e.to_string())?;
    debug!("Acquired state lock {}", lock.id);

    let result = run(backend).await;
    let released = backend
        .release_lock(&lock)
        .await
        .map_err(|e| format!("Failed to release state lock: {}", e));
    result.and(released)
}

async fn run_apply(file: &PathBuf, auto_approve: bool) -> Result<(), String> {
    let config = load_config(file)?;
    validate_resources(&config.resources)?;
    let backend = create_backend(config.backend.as_ref()).map_err(|e| e.to_string())?;

    with_lock(backend.as_ref(), "apply", |backend| {
        apply_locked(&config, backend, auto_approve)
    })
    .await
}

async fn apply_locked(
    config: &Config,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let registry = build_registry(config, &provider_names(config, &state))?;
    let PlannedRun {
        plan,
        mut bindings,
        current,
    } = build_plan(config, &registry, &state).await?;

    // Resources that vanished remotely leave state even if nothing else changes
    let mut dirty = false;
    for (id, refreshed) in &current {
        if !refreshed.exists && state.remove_resource(id).is_some() {
            dirty = true;
        }
    }
    if dirty {
        write_state(backend, &mut state).await?;
    }

    let schemas = schemas_of(&registry);
    if plan.mutation_count() == 0 {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan, &schemas);
    println!();

    if !auto_approve && !confirm("Do you want to perform these actions?")? {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let interpreter = Interpreter::new(registry);
    let mut success_count = 0;
    for effect in plan.effects() {
        match interpreter.apply_effect(effect, &mut bindings).await {
            Ok(outcome) => {
                if !effect.is_mutating() {
                    continue;
                }
                println!("  {} {}", "✓".green(), format_effect(effect));
                success_count += 1;
                record_outcome(&mut state, &outcome, interpreter.provider());
                write_state(backend, &mut state).await?;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                if let Effect::Replace { from, .. } = effect
                    && forget_if_deleted(&mut state, interpreter.provider(), from).await
                {
                    write_state(backend, &mut state).await?;
                }
                return Err(format!(
                    "Apply failed after {} change(s); state records what was completed",
                    success_count
                ));
            }
        }
    }

    println!();
    println!(
        "{}",
        format!("Apply complete! {} changes applied.", success_count)
            .green()
            .bold()
    );
    Ok(())
}

fn record_outcome(state: &mut StateFile, outcome: &EffectOutcome, registry: &ProviderRegistry) {
    match outcome {
        EffectOutcome::Deleted { id } => {
            state.remove_resource(id);
        }
        other => {
            if let Some(resource_state) = other.state() {
                let provider = registry
                    .provider_for(&resource_state.id.resource_type)
                    .map(|p| p.name())
                    .unwrap_or_default();
                state.record(resource_state, provider);
            }
        }
    }
}

/// A failed replacement may have deleted the old resource before its
/// create failed; drop it from state if it no longer reads back
async fn forget_if_deleted(
    state: &mut StateFile,
    registry: &ProviderRegistry,
    replaced: &State,
) -> bool {
    let Some(identifier) = replaced.identifier.as_deref() else {
        return false;
    };
    match registry.read(&replaced.id, Some(identifier)).await {
        Ok(current) if !current.exists => state.remove_resource(&replaced.id).is_some(),
        Ok(_) => false,
        Err(e) => {
            warn!("Could not check {} after failed replacement: {}", replaced.id, e);
            false
        }
    }
}

async fn write_state(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend
        .write_state(state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn run_destroy(file: &PathBuf, auto_approve: bool) -> Result<(), String> {
    let config = load_config(file)?;
    let backend = create_backend(config.backend.as_ref()).map_err(|e| e.to_string())?;

    with_lock(backend.as_ref(), "destroy", |backend| {
        destroy_locked(&config, backend, auto_approve)
    })
    .await
}

async fn destroy_locked(
    config: &Config,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let Some(mut state) = backend.read_state().await.map_err(|e| e.to_string())? else {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    };
    let registry = build_registry(config, &provider_names(config, &state))?;
    let current = refresh_states(&registry, &state).await?;

    // Later entries were created later and may reference earlier ones
    let mut plan = Plan::new();
    for recorded in state.resources.iter().rev() {
        if let Some(from) = current.get(&recorded.id()).filter(|s| s.exists) {
            plan.add(Effect::Delete {
                id: from.id.clone(),
                from: from.clone(),
            });
        }
    }

    if plan.is_empty() {
        if !state.resources.is_empty() {
            state.resources.clear();
            write_state(backend, &mut state).await?;
        }
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id());
    }
    println!();
    println!("Plan: {} to destroy.", plan.effects().len().to_string().red());
    println!();

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let interpreter = Interpreter::new(registry);
    let mut bindings = Bindings::new();
    let mut success_count = 0;
    for effect in plan.effects() {
        match interpreter.apply_effect(effect, &mut bindings).await {
            Ok(outcome) => {
                println!("  {} {}", "✓".green(), format_effect(effect));
                success_count += 1;
                record_outcome(&mut state, &outcome, interpreter.provider());
                write_state(backend, &mut state).await?;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                return Err(format!(
                    "Destroy failed after {} resource(s) destroyed",
                    success_count
                ));
            }
        }
    }

    println!();
    println!(
        "{}",
        format!("Destroy complete! {} resources destroyed.", success_count)
            .green()
            .bold()
    );
    Ok(())
}

async fn run_force_unlock(file: &PathBuf, lock_id: &str) -> Result<(), String> {
    let config = load_config(file)?;
    let backend = create_backend(config.backend.as_ref()).map_err(|e| e.to_string())?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("Lock {} released.", lock_id).green());
    Ok(())
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", "Only 'yes' will be accepted to approve.".yellow());
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}
