use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use swarm_exec::config::ExecConfig;
use swarm_exec::session::ServiceMode;
use swarm_exec::shutdown::install_shutdown_handler;
use swarm_exec::SessionOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "swarm-exec")]
#[command(version)]
#[command(about = "Execute a command on all nodes in Docker Swarm mode")]
struct Args {
    /// Command to execute on swarm nodes
    command: String,

    /// Mode of the service
    #[arg(long, value_enum, default_value = "global")]
    mode: ModeArg,

    /// Remove the service after execution
    #[arg(long)]
    rm: bool,

    /// Show the service logs and wait until every node has finished
    #[arg(long)]
    logs: bool,

    /// Do not echo the output of docker service create/rm
    #[arg(short, long)]
    quiet: bool,

    /// Print the command template and session phase transitions
    #[arg(short, long)]
    verbose: bool,

    /// Image the command runs in (needs a docker CLI to use the mounted socket)
    #[arg(long, default_value = "docker:cli")]
    image: String,

    /// Docker CLI binary
    #[arg(long, default_value = "docker")]
    docker: PathBuf,

    /// Give up waiting for completion after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Output format of the final session report
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Global,
    Replicated,
}

impl From<ModeArg> for ServiceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Global => ServiceMode::Global,
            ModeArg::Replicated => ServiceMode::Replicated,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Args {
    fn into_config(self) -> (String, ExecConfig, OutputFormat) {
        let mut config = ExecConfig::new(self.mode.into())
            .with_docker_binary(self.docker)
            .with_image(self.image);
        if let Some(secs) = self.timeout {
            config = config.with_watch_timeout(Duration::from_secs(secs));
        }
        config.remove = self.rm;
        config.follow_logs = self.logs;
        config.verbose = self.verbose;
        config.quiet = self.quiet;
        (self.command, config, self.output)
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "swarm_exec=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let (command, config, output) = args.into_config();
    let cancel = install_shutdown_handler()?;

    let orchestrator = SessionOrchestrator::new(command, config);
    tracing::info!(
        service = %orchestrator.session().name,
        mode = %orchestrator.session().mode,
        "Starting session"
    );

    let report = orchestrator.run(cancel).await;

    if let OutputFormat::Json = output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
