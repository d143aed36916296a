// src/main.rs
//! LeafBridge Deploy - CLI Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use leafbridge_deploy::engine::{AppEngine, ConditionEngine, DeploymentEngine, Options};
use leafbridge_deploy::events::{BasicHandler, EventLevel, Recorder};
use leafbridge_deploy::http::ReqwestClient;
use leafbridge_deploy::model::{Deployment, FlowId};
use leafbridge_deploy::platform::{HostPlatform, Platform};
use leafbridge_deploy::util::CancellationToken;
use leafbridge_deploy::{engine, fs, load_deployment};

#[derive(Parser)]
#[command(name = "lb-deploy")]
#[command(version)]
#[command(about = "Deploys software to computers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a particular software package
    Deploy {
        /// Path to a deployment file describing the deployment
        #[arg(long)]
        config_file: PathBuf,

        /// The flow to invoke within the deployment
        #[arg(long)]
        flow: String,

        /// Run commands even when their app changes are already in effect
        #[arg(long)]
        force: bool,

        /// Show debug messages on the command line
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a deployment
    Show {
        #[command(subcommand)]
        command: ShowCommands,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
enum ShowCommands {
    /// Show configuration loaded from a deployment configuration file
    Config {
        #[arg(long)]
        config_file: PathBuf,
    },

    /// Show the current conditions for a deployment
    Conditions {
        #[arg(long)]
        config_file: PathBuf,
    },

    /// Show the relevant resources for a deployment
    Resources {
        #[arg(long)]
        config_file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Deploy {
            config_file,
            flow,
            force,
            verbose,
        } => deploy(&config_file, &flow, force, verbose),
        Commands::Show { command } => match command {
            ShowCommands::Config { config_file } => show_config(&config_file),
            ShowCommands::Conditions { config_file } => show_conditions(&config_file),
            ShowCommands::Resources { config_file } => show_resources(&config_file),
        },
        Commands::Version => {
            println!("lb-deploy {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn deploy(config_file: &PathBuf, flow: &str, force: bool, verbose: bool) -> Result<()> {
    let deployment = load_deployment(config_file)?;

    let min = if verbose {
        EventLevel::Debug
    } else {
        EventLevel::Info
    };
    let events = Recorder::new(BasicHandler::stdout(min));

    let engine = DeploymentEngine::new(
        deployment,
        Options {
            events,
            force,
            platform: Arc::new(HostPlatform::new()),
            http: Arc::new(ReqwestClient::new()?),
            cancel: CancellationToken::new(),
        },
    );

    engine.invoke(&FlowId::from(flow))?;
    Ok(())
}

fn show_config(config_file: &PathBuf) -> Result<()> {
    let deployment = load_deployment(config_file)?;
    println!("{}", serde_json::to_string_pretty(&deployment)?);
    Ok(())
}

fn show_conditions(config_file: &PathBuf) -> Result<()> {
    let deployment = load_validated(config_file)?;
    println!(
        "---- {} ({}): Conditions ----",
        deployment.name,
        config_file.display()
    );

    let platform = HostPlatform::new();
    let engine = ConditionEngine::with_parts(&deployment, &platform);
    for id in deployment.conditions.keys() {
        match engine.evaluate(id) {
            Ok(result) => println!("    {id}: {result}"),
            Err(err) => println!("    {id}: {err}"),
        }
    }

    Ok(())
}

fn show_resources(config_file: &PathBuf) -> Result<()> {
    let deployment = load_validated(config_file)?;
    println!(
        "---- {} ({}): Resources ----",
        deployment.name,
        config_file.display()
    );

    let platform = HostPlatform::new();
    let resources = &deployment.resources;

    if !resources.processes.is_empty() {
        println!("  Processes:");
        for (id, process) in &resources.processes {
            println!("    {id}:");
            println!("      Description: {}", process.description);
            match engine::number_of_running_processes(&platform, &process.matcher) {
                Ok(0) => println!("      Running:     No"),
                Ok(1) => println!("      Running:     Yes (1 process)"),
                Ok(total) => println!("      Running:     Yes ({total} processes)"),
                Err(err) => println!("      Running:     ({err})"),
            }
        }
    }

    if !resources.mutexes.is_empty() {
        println!("  Mutexes:");
        for (id, mutex) in &resources.mutexes {
            println!("    {id}:");
            let name = match mutex.object_name() {
                Ok(name) => name,
                Err(err) => {
                    println!("      Name:        ({err})");
                    continue;
                }
            };
            println!("      Name:        {name}");
            match platform.mutex_exists(&name) {
                Ok(true) => println!("      Status:      Present"),
                Ok(false) => println!("      Status:      Missing"),
                Err(err) => println!("      Status:      ({err})"),
            }
        }
    }

    if !resources.registry.keys.is_empty() {
        println!("  Registry Keys:");
        for id in resources.registry.keys.keys() {
            println!("    {id}:");
            let reference = match resources.registry.resolve_key(id) {
                Ok(reference) => reference,
                Err(err) => {
                    println!("      Path:        ({err})");
                    continue;
                }
            };
            match reference.absolute_path() {
                Ok(path) => println!("      Path:        {path}"),
                Err(err) => {
                    println!("      Path:        ({err})");
                    continue;
                }
            }
            let relative = match reference.relative_path() {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            match platform.open_registry_key(reference.root.hive(), &relative) {
                Ok(Some(_)) => println!("      Status:      Present"),
                Ok(None) => println!("      Status:      Missing"),
                Err(err) => println!("      Status:      ({err})"),
            }
        }
    }

    if !resources.registry.values.is_empty() {
        println!("  Registry Values:");
        for id in resources.registry.values.keys() {
            println!("    {id}:");
            let reference = match resources.registry.resolve_value(id) {
                Ok(reference) => reference,
                Err(err) => {
                    println!("      Key:         ({err})");
                    continue;
                }
            };
            match reference.key().absolute_path() {
                Ok(path) => println!("      Key:         {path}"),
                Err(err) => println!("      Key:         ({err})"),
            }
            println!("      Name:        {}", reference.value_name);
            let relative = match reference.key().relative_path() {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            match platform.open_registry_key(reference.root.hive(), &relative) {
                Ok(Some(key)) => match key.has_value(&reference.value_name) {
                    Ok(true) => println!("      Status:      Present"),
                    Ok(false) => println!("      Status:      Missing"),
                    Err(err) => println!("      Status:      ({err})"),
                },
                Ok(None) => println!("      Status:      Missing"),
                Err(err) => println!("      Status:      ({err})"),
            }
        }
    }

    if !resources.file_system.directories.is_empty() {
        println!("  Directories:");
        for id in resources.file_system.directories.keys() {
            println!("    {id}:");
            let reference = match resources.file_system.resolve_directory(id) {
                Ok(reference) => reference,
                Err(err) => {
                    println!("      Path:        ({err})");
                    continue;
                }
            };
            match fs::local::dir_path(&platform, &reference) {
                Ok(path) => println!("      Path:        {}", path.display()),
                Err(err) => {
                    println!("      Path:        ({err})");
                    continue;
                }
            }
            match fs::local::open_dir(&platform, &reference) {
                Ok(Some(_)) => println!("      Status:      Present"),
                Ok(None) => println!("      Status:      Missing"),
                Err(err) => println!("      Status:      ({err})"),
            }
        }
    }

    if !resources.file_system.files.is_empty() {
        println!("  Files:");
        for id in resources.file_system.files.keys() {
            println!("    {id}:");
            let reference = match resources.file_system.resolve_file(id) {
                Ok(reference) => reference,
                Err(err) => {
                    println!("      Path:        ({err})");
                    continue;
                }
            };
            match fs::local::file_path(&platform, &reference) {
                Ok(path) => println!("      Path:        {}", path.display()),
                Err(err) => {
                    println!("      Path:        ({err})");
                    continue;
                }
            }
            let dir = match fs::local::open_dir(&platform, &reference.dir()) {
                Ok(Some(dir)) => dir,
                Ok(None) => {
                    println!("      Status:      Missing");
                    continue;
                }
                Err(err) => {
                    println!("      Status:      ({err})");
                    continue;
                }
            };
            match dir.stat(&reference.file_path) {
                Ok(Some(metadata)) if metadata.is_file() => {
                    println!("      Status:      Present");
                    println!("      Size:        {} byte(s)", metadata.len());
                }
                Ok(Some(_)) => println!("      Status:      Not A File"),
                Ok(None) => println!("      Status:      Missing"),
                Err(err) => println!("      Status:      ({err})"),
            }
        }
    }

    // App detection shares the same machinery as deployments; surface it
    // alongside the declared resources.
    if !deployment.apps.is_empty() {
        println!("  Apps:");
        let apps = AppEngine::with_parts(&deployment, &platform);
        for id in deployment.apps.keys() {
            println!("    {id}:");
            match apps.is_installed(id) {
                Ok(true) => println!("      Installed:   Yes"),
                Ok(false) => println!("      Installed:   No"),
                Err(err) => println!("      Installed:   ({err})"),
            }
        }
    }

    Ok(())
}

fn load_validated(config_file: &PathBuf) -> Result<Deployment> {
    let deployment = load_deployment(config_file)?;
    if let Err(err) = deployment.validate() {
        eprintln!("The deployment contains invalid configuration: {err}");
        std::process::exit(1);
    }
    Ok(deployment)
}
