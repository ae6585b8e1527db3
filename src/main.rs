mod app;
mod cli;

use clap::Parser;
use cli::{Cli, Command, RunArgs};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => cmd_run(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let _guard = orp_core::lifecycle::logging::init_logging(&args.log_level, false, None);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let application = app::Application::build(&args).await?;
        application.serve().await
    })
}
