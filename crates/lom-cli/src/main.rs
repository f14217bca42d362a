use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lom_cli::{HttpTransport, Workflow};
use lom_config::{
    config_paths, load_settings, report_unused_keys, ConfigScope, UnusedKeyPolicy,
    ENV_CONFIG_PATHS,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lom")]
#[command(about = "Lab order management client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scripted extraction workflow end to end
    Workflow {
        /// Only print the JSON of each request; send nothing.
        #[arg(long, default_value_t = false)]
        no_request: bool,

        /// API root (overrides config and LOM_API_ROOT)
        #[arg(long)]
        api_root: Option<String>,

        /// Layered config paths in merge order (default: LOM_CONFIG)
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if absent.
    let _ = dotenvy::from_filename(".env.local");

    // stdout carries the request trace; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Workflow {
            no_request,
            api_root,
            config_paths: paths,
        } => {
            let paths = if paths.is_empty() {
                std::env::var(ENV_CONFIG_PATHS)
                    .map(|raw| config_paths(&raw))
                    .unwrap_or_default()
            } else {
                paths
            };
            let (loaded, mut settings) = load_settings(&paths).context("config load failed")?;
            settings
                .apply_env(|key| std::env::var(key).ok())
                .context("environment overrides rejected")?;
            let unused = report_unused_keys(
                ConfigScope::Client,
                &loaded.config_json,
                UnusedKeyPolicy::Warn,
            )?;
            if !unused.is_clean() {
                warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by the client");
            }

            let api_root = api_root.unwrap_or(settings.client.api_root);
            info!(%api_root, dry = no_request, config_hash = %loaded.config_hash, "workflow start");

            let report = if no_request {
                Workflow::dry(api_root, std::io::stdout()).run().await?
            } else {
                let transport = HttpTransport::new(api_root.clone());
                Workflow::live(api_root, &transport, std::io::stdout())
                    .run()
                    .await?
            };
            info!(order = %report.order, searches = report.searches.len(), "workflow done");
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = lom_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}
