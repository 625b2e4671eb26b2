use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "fleet")]
#[command(about = "Launch, supervise and health-check the local service fleet")]
#[command(version)]
pub struct Cli {
    /// Keep the fleet running and re-check health until interrupted
    #[arg(long)]
    pub monitor: bool,
}
