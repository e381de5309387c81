use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    arma_cli::run().await
}
