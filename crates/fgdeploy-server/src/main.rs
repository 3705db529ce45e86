use clap::Parser;
use fgdeploy_server::ControlPlaneServer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "fgdeploy-server",
    about = "Simulated function control plane serving the fgdeploy routes"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8321)]
    port: u16,

    /// Region reported by the simulated platform.
    #[arg(long, default_value = "cn-north-4")]
    region: String,

    /// Directory to persist platform state in. State is in-memory only when omitted.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Answer project lookups for the region with this project id.
    #[arg(long)]
    project_id: Option<String>,

    /// Require this token on every control-plane call.
    #[arg(long, env = "FGDEPLOY_AUTH_TOKEN")]
    auth_token: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let state = match &cli.data_dir {
        Some(dir) => match ControlPlaneServer::with_data_dir(&cli.region, dir) {
            Ok(state) => {
                info!("data directory: {}", dir.display());
                state
            }
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => ControlPlaneServer::new(&cli.region),
    };
    let state = match cli.auth_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => state.with_auth_token(token),
        None => state,
    };

    if let Some(id) = cli.project_id.as_deref().filter(|p| !p.is_empty()) {
        let known = state
            .platform()
            .snapshot()
            .projects
            .iter()
            .any(|p| p.name == cli.region);
        if !known {
            state.platform().insert_project(&cli.region, id);
        }
    }

    let addr = format!("0.0.0.0:{}", cli.port);
    info!("starting fgdeploy-server on {addr} (region {})", cli.region);
    if let Err(e) = fgdeploy_server::run_server(&Arc::new(state), &addr) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
