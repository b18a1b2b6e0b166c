use std::process;

#[tokio::main]
async fn main() {
    process::exit(reattach_cli::run().await);
}
