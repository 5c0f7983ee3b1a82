use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use roadmapper::constants;
use roadmapper::llm_interaction::{ChatClient, RoadmapService};
use roadmapper::progress::ProgressStore;
use roadmapper::terminal;
use roadmapper::web_server::{self, AppState};
use roadmapper::TaskCompletion;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the roadmap web UI.
    Serve {
        #[arg(long, default_value_t = 8501, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding the HTML templates.")]
        templates: PathBuf,
        #[arg(long, default_value = "static", help = "Directory served under /static.")]
        static_dir: PathBuf,
    },
    /// Generate a roadmap in the terminal and write roadmap.json.
    Generate {
        #[arg(long, help = "Project idea. Asked for interactively when omitted.")]
        idea: Option<String>,
        #[arg(long, help = "Preferred tools to hint to the model.")]
        tools: Option<String>,
        #[arg(long, help = "API key for this run. Falls back to GROQ_API_KEY.")]
        api_key: Option<String>,
    },
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for GROQ_API_KEY and friends)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,roadmapper=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("roadmapper=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Roadmapper starting with command: {:?}", redacted(&cli.command));

    let service = RoadmapService::new(ChatClient::from_env(), constants::GROQ_API_KEY.clone());
    let store = ProgressStore::in_working_dir();

    match cli.command {
        Commands::Serve {
            port,
            templates,
            static_dir,
        } => {
            if !service.has_env_api_key() {
                info!("{} not set; each session must enter an API key", constants::API_KEY_ENV);
            }
            let state = AppState::new(templates, static_dir, service, store);

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down.");
                }
                res = web_server::start_web_server(port, state) => {
                    if let Err(e) = &res {
                        error!("Web server failed: {:?}", e);
                    }
                    res?;
                }
            }
        }
        Commands::Generate {
            idea,
            tools,
            api_key,
        } => {
            let idea = match idea {
                Some(idea) => idea,
                None => match terminal::prompt_for_idea().context("Failed to read project idea")? {
                    Some(idea) => idea,
                    None => {
                        println!("No project idea provided.");
                        return Ok(());
                    }
                },
            };

            let parsed = service
                .generate(api_key.as_deref(), &idea, tools.as_deref())
                .await
                .context("Roadmap generation failed")?;
            let path = store.save_roadmap(&parsed.document).context("Failed to save roadmap")?;

            print!("{}", terminal::render_checklist(&parsed.roadmap, &TaskCompletion::default()));
            println!("\nRoadmap saved to '{}'", path.display());
        }
    }

    Ok(())
}

// Keeps API keys out of the startup log line.
fn redacted(command: &Commands) -> String {
    match command {
        Commands::Generate { idea, tools, api_key } => format!(
            "Generate {{ idea: {:?}, tools: {:?}, api_key: {} }}",
            idea,
            tools,
            if api_key.is_some() { "<set>" } else { "<unset>" }
        ),
        other => format!("{:?}", other),
    }
}
