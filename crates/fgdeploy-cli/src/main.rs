mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::invoke::EventSource;
use commands::{EngineFlags, Target, EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_REMOTE_ERROR};
use fgdeploy_core::{install_signal_handler, Selection};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "fgdeploy",
    version,
    about = "Declarative deployment of serverless functions and their triggers"
)]
struct Cli {
    /// Path to the manifest TOML file.
    #[arg(long, short, default_value = "fgdeploy.toml", global = true)]
    manifest: PathBuf,

    /// Control-plane endpoint (overrides the stored remote config).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ScopeArgs {
    /// Only this declared function.
    #[arg(long)]
    function: Option<String>,
    /// Only triggers of this kind (tag or platform code); the function
    /// itself is left alone.
    #[arg(long)]
    trigger: Option<String>,
    /// Version segment of function URNs.
    #[arg(long)]
    qualifier: Option<String>,
}

impl ScopeArgs {
    fn selection(&self) -> Selection {
        Selection::from_filters(self.function.clone(), self.trigger.clone())
    }
}

#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
struct EngineArgs {
    /// Use the first of several matching remote triggers instead of failing.
    #[arg(long, default_value_t = false)]
    first_match_wins: bool,
    /// Treat a failed trigger listing as "no triggers".
    #[arg(long, default_value_t = false)]
    fail_open_listing: bool,
    /// Stop at the first failing function.
    #[arg(long, default_value_t = false)]
    fail_fast: bool,
}

impl From<&EngineArgs> for EngineFlags {
    fn from(args: &EngineArgs) -> Self {
        Self {
            first_match_wins: args.first_match_wins,
            fail_open_listing: args.fail_open_listing,
            fail_fast: args.fail_fast,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or update declared functions and their triggers.
    Deploy {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Delete declared triggers and functions.
    Remove {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Show what is deployed for each declared function.
    Info {
        /// Only this declared function.
        #[arg(long)]
        function: Option<String>,
        /// Version segment of function URNs.
        #[arg(long)]
        qualifier: Option<String>,
    },
    /// Run a deployed function once with an event payload.
    Invoke {
        /// Declared function to run.
        #[arg(long)]
        function: String,
        /// File holding the JSON event.
        #[arg(long, conflicts_with = "data")]
        event: Option<PathBuf>,
        /// Inline JSON event.
        #[arg(long)]
        data: Option<String>,
        /// Version segment of the function URN.
        #[arg(long)]
        qualifier: Option<String>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

impl Cli {
    fn target<'a>(&'a self, qualifier: Option<&'a str>) -> Target<'a> {
        Target {
            manifest: &self.manifest,
            endpoint: self.endpoint.as_deref(),
            qualifier,
        }
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FGDEPLOY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let json = cli.json;
    let result = match &cli.command {
        Commands::Deploy { scope, engine } => commands::deploy::run(
            &cli.target(scope.qualifier.as_deref()),
            &scope.selection(),
            engine.into(),
            json,
        ),
        Commands::Remove { scope, engine } => commands::remove::run(
            &cli.target(scope.qualifier.as_deref()),
            &scope.selection(),
            engine.into(),
            json,
        ),
        Commands::Info {
            function,
            qualifier,
        } => commands::info::run(
            &cli.target(qualifier.as_deref()),
            &Selection::from_filters(function.clone(), None),
            json,
        ),
        Commands::Invoke {
            function,
            event,
            data,
            qualifier,
        } => {
            let source = match (event, data) {
                (Some(path), _) => EventSource::File(path),
                (None, Some(text)) => EventSource::Inline(text),
                (None, None) => EventSource::Empty,
            };
            commands::invoke::run(&cli.target(qualifier.as_deref()), function, source, json)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("failed to parse manifest")
                || msg.starts_with("failed to read manifest")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("remote error:") {
                EXIT_REMOTE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
