use std::{env, env::VarError};

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Loyalty points ledger server")]
pub struct Arguments {
    /// The address to listen on, as host:port. RUN_ADDRESS takes precedence over this flag.
    #[arg(short = 'a', long = "address")]
    pub run_address: Option<String>,
    /// The ledger database URI. DATABASE_URI takes precedence over this flag.
    #[arg(short = 'd', long = "database")]
    pub database_uri: Option<String>,
    /// The base URL of the accrual system. ACCRUAL_SYSTEM_ADDRESS takes precedence over this flag.
    #[arg(short = 'r', long = "accrual")]
    pub accrual_address: Option<String>,
    /// Print the configuration environment variables and exit
    #[arg(long = "show-env")]
    pub show_env: bool,
}

/// Parses the command line. Returns `None` if the process should exit after printing information.
pub fn handle_command_line_args() -> Option<Arguments> {
    let args = Arguments::parse();
    if args.show_env {
        display_envs();
        return None;
    }
    Some(args)
}

fn display_envs() {
    const DISPLAY_ENVS: [&str; 16] = [
        "RUST_LOG",
        "RUN_ADDRESS",
        "DATABASE_URI",
        "ACCRUAL_SYSTEM_ADDRESS",
        "LOYALTY_USER_HEADER",
        "LOYALTY_QUEUE_CAPACITY",
        "LOYALTY_BATCH_SIZE",
        "LOYALTY_FLUSH_INTERVAL_MS",
        "LOYALTY_MAX_ATTEMPTS",
        "LOYALTY_RETRY_BACKOFF_MS",
        "LOYALTY_MAX_CONCURRENCY",
        "LOYALTY_SUBMIT_TIMEOUT_MS",
        "LOYALTY_REQUEUE_ON_EXHAUSTED",
        "LOYALTY_SWEEP_INTERVAL_SECS",
        "LOYALTY_ORACLE_TIMEOUT_MS",
        "LOYALTY_DB_MAX_CONNECTIONS",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
