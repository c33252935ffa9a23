use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "plait",
    version,
    about = "Build, visualize, and execute semantic pipeline workflows"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Metadata store base URL (overrides PIPELINE_ENDPOINT)
    #[arg(long = "url", global = true)]
    url: Option<String>,

    /// Artifact repository base URL; rewrites every access URL
    /// (overrides ARTIFACT_REPOSITORY_URL)
    #[arg(long = "artifact-url", global = true)]
    artifact_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

fn main() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command, cli.url, cli.artifact_url)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
