use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use converge_core::resource::{Resource, ResourceId, Value};
use converge_core::timeouts::{ResourceTimeouts, parse_duration};
use converge_provider_dx::DxProvider;
use converge_provider_dx::arn::AccountContext;
use converge_provider_dx::aws::AwsDirectConnect;
use converge_provider_dx::schema::virtual_interface_schema;
use converge_provider_dx::state::VirtualInterfaceKind;
use converge_provider_dx::tags::{tags_from_attributes, tags_to_value};

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Drive Direct Connect virtual interfaces to a settled state", long_about = None)]
struct Cli {
    /// AWS region of the virtual interface
    #[arg(long, global = true, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Account ID used to build resource ARNs
    #[arg(long, global = true, env = "AWS_ACCOUNT_ID", default_value = "")]
    account_id: String,

    /// AWS partition used to build resource ARNs
    #[arg(long, global = true, default_value = "aws")]
    partition: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current attributes of a virtual interface
    Read {
        /// Virtual interface ID (dxvif-...)
        id: String,

        #[arg(long, default_value = "private")]
        kind: VirtualInterfaceKind,
    },
    /// Wait for a newly created virtual interface to become available
    Wait {
        /// Virtual interface ID (dxvif-...)
        id: String,

        #[arg(long, default_value = "private")]
        kind: VirtualInterfaceKind,

        /// How long to wait (e.g. 10m, 1h30m)
        #[arg(long, value_parser = parse_timeout)]
        timeout: Option<Duration>,
    },
    /// Delete a virtual interface and wait until it is gone
    Delete {
        /// Virtual interface ID (dxvif-...)
        id: String,

        #[arg(long, default_value = "private")]
        kind: VirtualInterfaceKind,

        /// How long to wait (e.g. 10m, 1h30m)
        #[arg(long, value_parser = parse_timeout)]
        timeout: Option<Duration>,
    },
    /// Set or remove tags on a virtual interface
    Tag {
        /// Virtual interface ID (dxvif-...)
        id: String,

        #[arg(long, default_value = "private")]
        kind: VirtualInterfaceKind,

        /// Tag to add or overwrite, as key=value
        #[arg(long = "set", value_parser = parse_tag)]
        set: Vec<(String, String)>,

        /// Tag key to remove
        #[arg(long = "remove")]
        remove: Vec<String>,
    },
    /// Validate a JSON file of virtual interface attributes
    Validate {
        /// Path to a JSON object of attributes
        file: PathBuf,

        #[arg(long, default_value = "private")]
        kind: VirtualInterfaceKind,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let account = AccountContext::new(&cli.partition, &cli.region, &cli.account_id);

    let result = match cli.command {
        Commands::Read { id, kind } => run_read(&account, &id, kind).await,
        Commands::Wait { id, kind, timeout } => run_wait(&account, &id, kind, timeout).await,
        Commands::Delete { id, kind, timeout } => run_delete(&account, &id, kind, timeout).await,
        Commands::Tag {
            id,
            kind,
            set,
            remove,
        } => run_tag(&account, &id, kind, set, remove).await,
        Commands::Validate { file, kind } => run_validate(&file, kind),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid tag '{}': expected key=value", s)),
    }
}

async fn get_provider(account: &AccountContext) -> Result<DxProvider<AwsDirectConnect>, String> {
    if account.account_id.is_empty() {
        return Err("An account ID is required (--account-id or AWS_ACCOUNT_ID)".to_string());
    }
    let client = AwsDirectConnect::new(&account.region).await;
    log::debug!("Using Direct Connect in {}", client.region());
    Ok(DxProvider::new(client, account.clone()))
}

fn resource_id(kind: VirtualInterfaceKind, id: &str) -> ResourceId {
    ResourceId::new(kind.resource_type(), id)
}

async fn run_read(account: &AccountContext, id: &str, kind: VirtualInterfaceKind) -> Result<(), String> {
    let provider = get_provider(account).await?;
    let state = provider
        .read(kind, &resource_id(kind, id), id)
        .await
        .map_err(|e| e.to_string())?;

    if !state.exists {
        println!("{}", format!("Virtual interface {} no longer exists.", id).yellow());
        return Ok(());
    }

    let json = serde_json::to_string_pretty(&state.attributes_json())
        .map_err(|e| format!("Failed to render attributes: {}", e))?;
    println!("{}", json);
    Ok(())
}

async fn run_wait(
    account: &AccountContext,
    id: &str,
    kind: VirtualInterfaceKind,
    timeout: Option<Duration>,
) -> Result<(), String> {
    let mut timeouts = ResourceTimeouts::default();
    if let Some(timeout) = timeout {
        timeouts = timeouts.with_create(timeout);
    }
    let provider = get_provider(account).await?.with_timeouts(timeouts);

    println!(
        "Waiting up to {:?} for {} to become available...",
        provider.timeouts().create,
        id.cyan()
    );
    let vif = provider
        .wait_until_available(kind, id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} {} is {}", "✓".green(), id, vif.state.to_string().green());
    Ok(())
}

async fn run_delete(
    account: &AccountContext,
    id: &str,
    kind: VirtualInterfaceKind,
    timeout: Option<Duration>,
) -> Result<(), String> {
    let mut timeouts = ResourceTimeouts::default();
    if let Some(timeout) = timeout {
        timeouts = timeouts.with_delete(timeout);
    }
    let provider = get_provider(account).await?.with_timeouts(timeouts);

    println!(
        "Deleting {} (timeout {:?})...",
        id.cyan(),
        provider.timeouts().delete
    );
    provider
        .delete(&resource_id(kind, id), id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} {} deleted", "✓".green(), id);
    Ok(())
}

/// Apply `set` and `remove` on top of the current tags
fn desired_tags(
    current: &HashMap<String, String>,
    set: Vec<(String, String)>,
    remove: &[String],
) -> HashMap<String, String> {
    let mut tags = current.clone();
    for key in remove {
        tags.remove(key);
    }
    tags.extend(set);
    tags
}

async fn run_tag(
    account: &AccountContext,
    id: &str,
    kind: VirtualInterfaceKind,
    set: Vec<(String, String)>,
    remove: Vec<String>,
) -> Result<(), String> {
    let provider = get_provider(account).await?;
    let resource_id = resource_id(kind, id);
    let current = provider
        .read(kind, &resource_id, id)
        .await
        .map_err(|e| e.to_string())?;
    if !current.exists {
        return Err(format!("Virtual interface {} does not exist", id));
    }

    let tags = desired_tags(&tags_from_attributes(&current.attributes), set, &remove);
    let desired = Resource::new(resource_id.resource_type, resource_id.name)
        .with_attribute("tags", tags_to_value(&tags));

    provider
        .update(id, &current, &desired)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} Tags updated on {}", "✓".green(), id);
    Ok(())
}

/// Validate a JSON object of attributes against the schema of `kind`
fn validate_json(json: &serde_json::Value, kind: VirtualInterfaceKind) -> Result<(), String> {
    let attributes: HashMap<String, Value> = match Value::from_json(json) {
        Some(Value::Map(map)) => map,
        _ => return Err("Expected a JSON object of attributes".to_string()),
    };

    let mut problems: Vec<String> = match virtual_interface_schema(kind).validate(&attributes) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .iter()
            .map(|e| format!("{}: {}", kind.resource_type(), e))
            .collect(),
    };
    if let Err(e) = ResourceTimeouts::from_attributes(&attributes) {
        problems.push(format!("timeouts: {}", e));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}

fn run_validate(file: &PathBuf, kind: VirtualInterfaceKind) -> Result<(), String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", file.display(), e))?;

    validate_json(&json, kind)?;
    println!("{}", "Configuration is valid.".green());
    Ok(())
}
