mod cli;

#[tokio::main]
async fn main() {
    libraryconnect::logging::init();
    match cli::run() {
        cli::RunOutcome::Serve(config) => {
            if let Err(err) = libraryconnect::serve(config).await {
                tracing::error!(error = %err, "server stopped");
                std::process::exit(1);
            }
        }
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    }
}
