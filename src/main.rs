use ark_console::{
    init_errors,
    init_logging,
    App,
    Cli,
};
use clap::Parser;
use color_eyre::Result;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Cli { args, command } = Cli::parse();
    init_errors()?;
    init_logging(args.verbose)?;
    App::new(args)?.run(command).await
}
