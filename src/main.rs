use clap::{Parser, Subcommand};
use ofroute::config::{self, Config};
use ofroute::controller::{service, Controller, Dpid, LogDataplane};
use ofroute::replay;
use ofroute::telemetry::{init_logging, ControllerMetrics};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "ofroute")]
#[command(about = "An OpenFlow routing controller with a security deny list")]
struct Cli {
    /// Path to controller.toml (built-in reference topology if omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration
    Validate,
    /// Print the rules a switch receives when it connects
    Rules {
        #[arg(short, long)]
        dpid: u64,
    },
    /// Feed a recorded event trace through the controller
    Replay {
        /// Path to a trace.toml file
        trace: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate => cmd_validate(cli.config.as_deref()),
        Commands::Rules { dpid } => cmd_rules(cli.config.as_deref(), dpid),
        Commands::Replay { trace } => cmd_replay(cli.config.as_deref(), &trace),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, String> {
    match path {
        Some(path) => {
            config::load(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
        }
        None => config::reference().map_err(|e| format!("Failed to parse reference config: {}", e)),
    }
}

/// Load and validate, failing on any validation error
fn load_valid_config(path: Option<&Path>) -> Result<Config, String> {
    let cfg = load_config(path)?;
    let validation = config::validate(&cfg);
    if validation.has_errors() {
        validation.print_diagnostics();
        return Err("Validation failed".to_string());
    }
    Ok(cfg)
}

fn cmd_validate(path: Option<&Path>) -> Result<(), String> {
    match path {
        Some(path) => println!("[INFO] Validating {}...", path.display()),
        None => println!("[INFO] Validating built-in reference topology..."),
    }

    let cfg = load_config(path)?;
    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        return Err("Validation failed".to_string());
    }
    cfg.resolve().map_err(|e| e.to_string())?;
    println!("[INFO] Configuration is valid");
    Ok(())
}

fn cmd_rules(path: Option<&Path>, dpid: u64) -> Result<(), String> {
    let cfg = load_valid_config(path)?;
    let settings = cfg.resolve().map_err(|e| e.to_string())?;
    let dpid = Dpid(dpid);

    let role = settings.roles.role_of(dpid).map_err(|e| e.to_string())?;
    let name = settings.roles.name_of(dpid).unwrap_or("-").to_string();
    let controller = Controller::new(settings, Arc::new(ControllerMetrics::new()));
    let rules = controller.static_rules(dpid).map_err(|e| e.to_string())?;

    println!("# dpid={} name={} role={}", dpid, name, role);
    for rule in rules {
        println!("{}", rule);
    }
    Ok(())
}

fn cmd_replay(path: Option<&Path>, trace: &Path) -> Result<(), String> {
    use tokio::runtime::Runtime;

    let cfg = load_valid_config(path)?;
    init_logging(Some(&cfg.logging));

    let settings = cfg.resolve().map_err(|e| e.to_string())?;
    let events = replay::load(trace)
        .map_err(|e| format!("Failed to load trace {}: {}", trace.display(), e))?;
    info!("Replaying {} events from {}", events.len(), trace.display());

    let metrics = Arc::new(ControllerMetrics::new());
    let controller = Controller::new(settings, metrics.clone());

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;
    let (controller, dataplane) = rt.block_on(async move {
        let (tx, rx) = mpsc::channel(64);
        let feeder = tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        let done = service::run(controller, rx, LogDataplane::default()).await;
        let _ = feeder.await;
        done
    });

    let snapshot = metrics.snapshot();
    info!(
        rules = dataplane.rules_installed,
        frames = dataplane.frames_emitted,
        "replay finished"
    );
    println!("{:#?}", snapshot);
    for (dpid, cache) in controller.arp_caches() {
        println!("# arp cache dpid={} ({} entries)", dpid, cache.len());
        let mut entries: Vec<_> = cache.iter().collect();
        entries.sort_by_key(|(ip, _)| **ip);
        for (ip, entry) in entries {
            println!("{:<16} {} port {}", ip, entry.mac, entry.port);
        }
    }
    Ok(())
}
