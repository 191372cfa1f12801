use clap::Parser;
use color_eyre::Result;
#[cfg(not(windows))]
use jemallocator::Jemalloc;
#[cfg(windows)]
use mimalloc::MiMalloc;
use shoplock_cli::{Cli, Commands, handle_command, init_tracing};
use shoplock_autolock::SimulatedBiometrics;

#[cfg(windows)]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Without a subcommand, start an interactive session as the guest user.
    let cmd = cli.command.unwrap_or(Commands::Run {
        user: "guest".to_string(),
        timeout: None,
        biometrics: SimulatedBiometrics::Accept,
    });

    if let Err(err) = handle_command(cmd, cli.config).await {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
    Ok(())
}
