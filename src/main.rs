//! grantline CLI binary entry point.

use grantline::cli::auth::{self, CliContext};
use grantline::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    let ctx = CliContext::new(cli.storage_dir, cli.config);

    let result = match cli.command {
        Commands::Device(args) => auth::handle_device(&ctx, &args.scopes).await,
        Commands::Authorize(args) => auth::handle_authorize(
            &ctx,
            &args.scope.scopes,
            args.session.as_deref(),
            args.payload.as_deref(),
        ),
        Commands::Callback(args) => {
            auth::handle_callback(&ctx, &args.code, &args.state, &args.session).await
        }
        Commands::Logout => auth::handle_logout(&ctx),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
