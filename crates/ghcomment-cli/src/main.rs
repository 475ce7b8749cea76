//! Binary entrypoint for ghcomment.
use clap::Parser;
use ghcomment_cli::{options::Cli, run};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ghcomment error: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}
