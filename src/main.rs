use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "warmr")]
#[command(about = "Capture photos and check them against your content vibe", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the capture loop (default)
    Run,
    /// Save the business context the vibe summary is derived from
    Context {
        /// What the business is, e.g. "a neighbourhood bakery"
        business: String,
        /// Who the ideal customer is
        customer: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    warmr_lib::init_logging();
    let result = match args.command.unwrap_or(Command::Run) {
        Command::Run => warmr_lib::run().await.map_err(|e| e.to_string()),
        Command::Context { business, customer } => {
            warmr_lib::save_context(&business, &customer).map_err(|e| e.to_string())
        }
    };
    if let Err(e) = result {
        eprintln!("warmr: {}", e);
        std::process::exit(1);
    }
}
