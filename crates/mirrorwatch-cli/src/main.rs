//! Binary entrypoint for the mirrorwatch CLI.

#[tokio::main]
async fn main() {
    let code = mirrorwatch_cli::run().await;
    std::process::exit(code);
}
