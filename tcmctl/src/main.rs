use clap::Parser;
use std::process::ExitCode;
use tcmctl::cli::Command;
use tcmctl::{Application, Config, client, telemetry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Install rustls crypto provider before anything else that might build a TLS client
    client::install_crypto_provider();

    // Parse CLI args
    let args = tcmctl::config::Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(ExitCode::SUCCESS);
    }

    // Initialize telemetry (tracing + optional OpenTelemetry)
    telemetry::init_telemetry(config.enable_otel_export)?;

    tracing::debug!("{:?}", args);

    let command = args.command.unwrap_or(Command::Status);
    let outcome = match Application::new(config) {
        Ok(mut app) => app.run(command).await,
        Err(e) => Err(e),
    };

    let code = match outcome {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            e.log();
            eprintln!("{}", e.user_message());
            if !e.is_recoverable() {
                eprintln!("Rerun with RUST_LOG=tcmctl=debug for details.");
            }
            ExitCode::from(e.exit_code())
        }
    };

    telemetry::shutdown_telemetry();
    Ok(code)
}
