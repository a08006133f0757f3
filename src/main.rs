use clap::Parser;

use nestegg::api::Cli;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = nestegg::api::run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
