use estimo_config::EstimoConfig;

use crate::cli::Commands;

pub mod console;
pub mod init;
pub mod report;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, config: &EstimoConfig) -> anyhow::Result<()> {
    match command {
        Commands::Init(args) => init::handle(&args, config).await,
        Commands::Console(args) => console::handle(&args, config).await,
        Commands::Report(args) => report::handle(&args, config).await,
    }
}
