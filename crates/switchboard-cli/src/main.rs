//! Switchboard CLI - compile and inspect service route tables

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use switchboard_core::{Gateway, GatewayConfig, Manifest, RouteKey, Startup};
use switchboard_registry::canonicalize::to_hex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Switchboard - service route registry compiler")]
struct Cli {
    /// Configuration file path (defaults to environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Compile a manifest and print its route tables
    Compile {
        /// Declaration manifest path
        manifest: PathBuf,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a manifest without printing the tables
    Check {
        /// Declaration manifest path
        manifest: PathBuf,
    },
    /// Resolve one route key, e.g. "GET /users/:id"
    Lookup {
        /// Declaration manifest path
        manifest: PathBuf,

        /// Route key: verb, then resource with an optional ":Model" suffix
        route: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GatewayConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::from_env(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Compile { manifest, json }) => {
            let gateway = compile(config, &manifest)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&gateway.registry().snapshot())?);
            } else {
                print_tables(&gateway);
            }
            println!("fingerprint: {}", to_hex(&gateway.registry().fingerprint()?));
        }
        Some(Commands::Check { manifest }) => {
            let gateway = compile(config, &manifest)?;
            let registry = gateway.registry();
            println!(
                "OK: {} methods, {} routes, {} event keys",
                registry.method_count(),
                registry.route_count(),
                registry.event_key_count()
            );
        }
        Some(Commands::Lookup { manifest, route }) => {
            let gateway = compile(config, &manifest)?;
            let key: RouteKey = route.parse().with_context(|| format!("bad route key {:?}", route))?;
            let record = gateway
                .registry()
                .route(&key)
                .with_context(|| format!("no route for [{}]", key))?;
            let code = record.http().get(&key).map_or(200, |r| r.code);
            let roles = record.effective_roles();
            println!(
                "{} -> {} ({}) internal={} external={} remote={}",
                key,
                record.qualified_name().unwrap_or_else(|| record.id().to_string()),
                code,
                roles.internal,
                roles.external,
                roles.remote
            );
        }
        None => {
            println!("Switchboard v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn compile(config: GatewayConfig, path: &Path) -> anyhow::Result<Gateway> {
    let manifest = Manifest::load(path).with_context(|| format!("reading manifest {}", path.display()))?;
    let mut startup = Startup::new(config);
    startup.load_manifest(&manifest)?;
    info!("Compiled {} services from {}", manifest.services.len(), path.display());
    Ok(startup.finish())
}

fn print_tables(gateway: &Gateway) {
    let registry = gateway.registry();

    println!("routes:");
    for (key, record) in registry.routes() {
        let code = record.http().get(key).map_or(200, |r| r.code);
        let owner = record.qualified_name().unwrap_or_else(|| record.id().to_string());
        println!("  {:<40} {} {}", key.to_string(), code, owner);
    }

    println!("events:");
    for (key, handlers) in registry.events() {
        for record in handlers {
            let Some(route) = record.events().get(key) else {
                continue;
            };
            let owner = record.qualified_name().unwrap_or_else(|| record.id().to_string());
            println!(
                "  {:<40} {}/{} {}",
                key.to_string(),
                route.action_filter,
                route.object_filter,
                owner
            );
        }
    }
}
