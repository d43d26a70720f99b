use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use mypyls::dmypy::DmypyEngine;
use mypyls::{Backend, CheckingEngine, Config, EngineError, EngineFactory, EngineOptions};

/// Python language server answering go-to-definition from a live mypy
/// daemon session.  Speaks LSP over stdio.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// dmypy executable used to run checks.
    #[arg(long, default_value = "dmypy")]
    dmypy: String,

    /// Daemon status file, relative to the workspace root.
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `mypyls=debug`.  Logs go to stderr.
    #[arg(long, env = "MYPYLS_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = Config {
        dmypy: args.dmypy,
        ..Config::default()
    };
    if let Some(status_file) = args.status_file {
        config.status_file = status_file;
    }

    let factory: EngineFactory = Arc::new(
        |options: &EngineOptions| -> Result<Arc<dyn CheckingEngine>, EngineError> {
            Ok(Arc::new(DmypyEngine::new(options.clone())))
        },
    );

    let (service, socket) =
        LspService::new(move |client| Backend::new(client, config.clone(), factory.clone()));
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;
}
