//! routekit CLI
//!
//! # Architecture Overview
//!
//! ```text
//!   routekit dev                         routekit build
//!   ─────────────                        ──────────────
//!   config + import map                  config + import map
//!        │                                    │
//!        ▼                                    ▼
//!   ServerContext ◀── DevWatcher         ServerContext
//!   (graph, routes,   (notify)                │
//!    pipeline)                                ├──▶ ModuleServer (background, for the bundler)
//!        │                                    │
//!        ▼                                    ▼
//!   ModuleServer ──▶ browser              BuildPipeline ──▶ <out>/server.js
//!   (until Ctrl-C)                                     ──▶ <out>/server_dependency_graph.js
//!                                                      ──▶ <out>/<client modules>
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use routekit::build::{BuildPipeline, ServerEntry, TextExportParser, VendorBundler};
use routekit::cache::HttpContentCache;
use routekit::config::{load_import_map, load_project_config};
use routekit::lifecycle::{wait_for_signal, Shutdown};
use routekit::observability::logging;
use routekit::server::{DevWatcher, ModuleServer, ServerContext, ServerHook};
use routekit::transform::TransformPipeline;

/// Environment variable that switches the pipeline to dev mode.
const ENV_MODE: &str = "ROUTEKIT_ENV";

#[derive(Parser)]
#[command(name = "routekit")]
#[command(about = "File-system routed module server and production builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the app for production
    Build {
        /// App root
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Serve modules with file watching
    Dev {
        /// App root
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Companion command started once the port is bound (after `--`)
        #[arg(last = true)]
        companion: Vec<String>,
    },
    /// Print the ordered route table
    Routes {
        /// App root
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn env_is_dev() -> bool {
    std::env::var(ENV_MODE).map(|v| v == "development").unwrap_or(false)
}

/// Load configuration and assemble the shared server context.
fn context(root: &Path, is_dev: bool) -> Result<Arc<ServerContext>, Box<dyn std::error::Error>> {
    let config = load_project_config(root)?;
    logging::init(&config.observability.log_level);

    let import_map = load_import_map(root, config.import_map.as_deref())?;
    tracing::info!(
        root = ?root,
        dev = is_dev,
        platform = %config.build.platform,
        imports = import_map.imports.len(),
        "Configuration loaded"
    );

    let cache = Arc::new(HttpContentCache::new(reqwest::Client::new()));
    let pipeline = TransformPipeline::new(root, Arc::new(import_map), cache).dev(is_dev);
    Ok(Arc::new(ServerContext::new(root, config, pipeline)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dev { dir, companion } => {
            let ctx = context(&dir, true)?;
            let shutdown = Shutdown::new();

            let server = ModuleServer::new(ctx.clone(), ServerHook::default());
            let (listener, port) = server.listen().await?;
            tracing::info!(port, "routekit dev server ready");

            let _companion = match companion.split_first() {
                Some((program, args)) => {
                    let child = ctx.companion_command(program, args).spawn()?;
                    tracing::info!(program = %program, pid = ?child.id(), "Companion started");
                    Some(child)
                }
                None => None,
            };

            let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));
            let watcher_task = tokio::spawn(DevWatcher::new(ctx).run(shutdown.subscribe()));

            wait_for_signal(shutdown.clone()).await;

            server_task.await??;
            watcher_task.await??;
            tracing::info!("Shutdown complete");
        }
        Commands::Build { dir } => {
            let ctx = context(&dir, env_is_dev())?;
            let shutdown = Shutdown::new();

            let server = ModuleServer::new(ctx.clone(), ServerHook::default());
            let (listener, _port) = server.listen().await?;
            let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

            let build = BuildPipeline::new(
                ModuleServer::new(ctx.clone(), ServerHook::default()),
                Arc::new(TextExportParser),
                Arc::new(VendorBundler),
            );
            let result = build.build(ServerEntry::detect(ctx.root())).await;

            shutdown.trigger();
            server_task.await??;

            let output = result?;
            println!(
                "Built {} routes and {} client modules into {}",
                output.route_files.len(),
                output.client_modules.len(),
                ctx.config().build.output_dir
            );
        }
        Commands::Routes { dir } => {
            let ctx = context(&dir, env_is_dev())?;
            let routes = ctx.routes();
            if routes.is_empty() {
                println!("No routes configured");
            }
            for route in &routes.routes {
                let host = route.meta.pattern.host.as_deref().unwrap_or("*");
                let nesting = if route.meta.nesting { " (nesting)" } else { "" };
                println!("{:<8} {:<32} {}{}", host, route.pathname(), route.meta.filename, nesting);
            }
        }
    }

    Ok(())
}
