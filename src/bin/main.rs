use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use yakusoku::{
    ActionValue, Deadline, DeferredResult, Dispatcher, Failure, HaltSignal, Host,
    PendingComputation, Request, SettingsStore, load_settings,
};

/// Asynchronous completion of suspended requests on an in-memory host
#[derive(Parser)]
#[command(name = "yakusoku")]
#[command(version)]
#[command(about = "Asynchronous completion of suspended requests on an in-memory host")]
struct Cli {
    /// Project directory containing yakusoku.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one request whose action returns a pending computation
    Simulate(SimulateArgs),
    /// Inspect settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct SimulateArgs {
    /// Time until the computation resolves
    #[arg(long, default_value_t = 10)]
    delay_ms: u64,

    /// Deadline for the computation (defaults to the configured async_timeout)
    #[arg(long, conflicts_with = "unbounded")]
    deadline_ms: Option<u64>,

    /// Let the computation run without a deadline
    #[arg(long)]
    unbounded: bool,

    /// Fail the computation with this message
    #[arg(long, conflicts_with = "halt_status")]
    fail: Option<String>,

    /// Halt the computation with this status
    #[arg(long)]
    halt_status: Option<u16>,

    /// Wrap the computation in this many extra pending layers
    #[arg(long, default_value_t = 0)]
    nest: usize,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings as TOML
    Show,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = load_settings(cli.config.as_deref(), None);
    for event in &outcome.events {
        event.log();
    }
    let settings = outcome.settings;

    match cli.command {
        Commands::Config {
            action: ConfigAction::Show,
        } => match toml::to_string(&settings) {
            Ok(rendered) => print!("{}", rendered),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Simulate(args) => {
            let host = Host::with_runtime(Handle::current(), settings.host_timeout.host_timeout());
            let dispatcher = Dispatcher::builder()
                .settings(Arc::new(SettingsStore::new(settings)))
                .build(Handle::current());

            let action = action_value(&args);
            let mut dispatched = None;
            let served = host.serve(Request::get("/simulate"), |exchange| {
                dispatched = Some(dispatcher.dispatch(exchange, Ok(action)));
            });
            if let Some(Err(e)) = dispatched {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }

            let exchange = served.finished().await;
            let Some(response) = exchange.response() else {
                eprintln!("Error: exchange {} finished without a response", exchange.id());
                std::process::exit(1);
            };
            match serde_json::to_string_pretty(&response) {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn action_value(args: &SimulateArgs) -> ActionValue {
    let delay = args.delay_ms;
    let fail = args.fail.clone();
    let halt_status = args.halt_status;

    let mut pending = PendingComputation::new(async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if let Some(status) = halt_status {
            return Err(HaltSignal::with_status(status).into());
        }
        if let Some(message) = fail {
            return Err(Failure::msg(message));
        }
        Ok(ActionValue::Ready(json!({ "delay_ms": delay })))
    });
    for _ in 0..args.nest {
        pending = PendingComputation::ready(pending);
    }

    if args.unbounded {
        DeferredResult::unbounded(pending).into()
    } else if let Some(millis) = args.deadline_ms {
        DeferredResult::new(pending, Deadline::from_millis(millis)).into()
    } else {
        pending.into()
    }
}
