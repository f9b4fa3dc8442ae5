//! Marionette CLI - Command-line interface for the Marionette runtime
//!
//! Provides subcommands for initializing a script root, inspecting the
//! keyword tables and checking scripts and encoded values offline.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use marionette::runtime::action::{ActionRegistry, VOCABULARY_VERSION, register_builtin_actions};
use marionette::runtime::actor::DefaultActorFactory;
use marionette::runtime::codec;
use marionette::runtime::controller::{ControllerRegistry, register_builtin_controllers};
use marionette::runtime::event::{EventRegistry, register_builtin_events};
use marionette::runtime::host::DetachedHost;
use marionette::runtime::registry::Registry;
use marionette::runtime::{Runtime, RuntimeConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "marionette")]
#[command(about = "Behaviour-scripting runtime for simulated actors", long_about = None)]
struct Cli {
    /// Root directory for runtime storage
    #[arg(short, long, default_value = ".marionette")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new runtime root
    Init {
        /// Seconds between script reloads
        #[arg(long, default_value = "60")]
        reload_interval: u64,

        /// Reject actors whose unique id is already live
        #[arg(long)]
        enforce_unique_ids: bool,
    },

    /// Show runtime status
    Status,

    /// List registered action keywords, events and controllers
    Actions,

    /// Parse a single statement and print the action tree
    Parse {
        /// Statement text, e.g. `move world,0,64,0`
        statement: String,
    },

    /// Decode a compact value
    Codec {
        /// Value shape
        shape: Shape,

        /// Encoded text
        text: String,
    },

    /// Compile every loaded script and report problems
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Angle,
    Position,
    Location,
}

fn load(root: PathBuf) -> Result<Runtime> {
    Runtime::load(root, Arc::new(DetachedHost), Arc::new(DefaultActorFactory))
}

fn print_table<V>(registry: &Registry<V>) {
    println!("{} keywords ({}):", registry.label(), registry.len());
    for name in registry.names() {
        println!("  {}", name);
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            reload_interval,
            enforce_unique_ids,
        } => {
            let root = cli.root.clone();
            let config = RuntimeConfig {
                root: cli.root,
                reload_interval_secs: reload_interval,
                enforce_unique_ids,
                ..RuntimeConfig::default()
            };

            Runtime::init(config)?;
            println!("Initialized Marionette runtime at {:?}", root);
        }

        Commands::Status => {
            let runtime = load(cli.root)?;
            let config = runtime.config();
            println!("Storage root: {:?}", runtime.storage().root());
            println!(
                "Scripts: {} loaded from {:?}",
                runtime.scripts().len(),
                runtime.storage().scripts_dir(config)
            );
            if let Some(at) = runtime.scripts().last_success() {
                println!("Last reload: {}", at.to_rfc3339());
            }
            println!("Reload interval: {}s", config.reload_interval_secs);
            println!("Unique ids enforced: {}", config.enforce_unique_ids);
        }

        Commands::Actions => {
            let actions = ActionRegistry::actions();
            register_builtin_actions(&actions);
            let events = EventRegistry::events();
            register_builtin_events(&events);
            let controllers = ControllerRegistry::controllers();
            register_builtin_controllers(&controllers);

            println!("Built-in vocabulary v{}", VOCABULARY_VERSION);
            print_table(&actions);
            print_table(&events);
            print_table(&controllers);
        }

        Commands::Parse { statement } => {
            let actions = ActionRegistry::actions();
            register_builtin_actions(&actions);
            let node = actions.parse(&statement)?;
            println!("[{:?}] {}", node.category(), serde_json::to_string_pretty(&node)?);
        }

        Commands::Codec { shape, text } => match shape {
            Shape::Angle => {
                let angle = codec::to_euler_angle(&text)?;
                println!("x={} y={} z={}", angle.x, angle.y, angle.z);
            }
            Shape::Position => {
                let position = codec::to_position(&text)?;
                println!("x={} y={} z={}", position.x, position.y, position.z);
            }
            Shape::Location => {
                let location = codec::to_location(&text)?;
                println!("{}", location);
            }
        },

        Commands::Check => {
            let runtime = load(cli.root)?;
            let diagnostics = runtime.check_scripts();
            if diagnostics.is_empty() {
                println!("{} scripts OK", runtime.scripts().len());
            } else {
                for diagnostic in &diagnostics {
                    println!("{}", diagnostic);
                }
                anyhow::bail!("{} problems found", diagnostics.len());
            }
        }
    }

    Ok(())
}
