mod cli;
mod logger;

use clap::Parser;
use cli::args::Cli;
use cli::dispatch::handle;
use omnidb::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref(), cli.env.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logger::setup_logger(cli.verbose, &config.logging);
    handle(cli, config).await;
}
