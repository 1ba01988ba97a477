use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use submerge::Admin;
use submerge_rowdb::Tree;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let admin = Admin::new(Arc::new(Tree::new()));
    let stdin = io::stdin();
    let result = admin.run(stdin.lock(), io::stdout());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: "submerge", error = %e, "administrator loop failed");
            ExitCode::FAILURE
        }
    }
}
