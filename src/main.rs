use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use leadsync::app::{App, Command};
use leadsync::config::Config;
use leadsync::logging::{self, LogTarget};

#[derive(Parser, Debug)]
#[command(name = "leadsync")]
#[command(about = "Track company leads and their analyses from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/leadsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overrides the config file and LEADSYNC_API_URL
  #[arg(long)]
  api_url: Option<String>,

  /// Log to stderr instead of the log file
  #[arg(long)]
  log_stderr: bool,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let target = if args.log_stderr {
    LogTarget::Stderr
  } else {
    LogTarget::default_file()
  };
  let _guard = logging::init(&target)?;

  let mut config = Config::load(args.config.as_deref())?;
  config.override_api_url(args.api_url);

  let app = App::new(&config)?;
  app.run(args.command, &mut std::io::stdout()).await?;

  Ok(())
}
