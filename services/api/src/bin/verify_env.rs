//! services/api/src/bin/verify_env.rs
//!
//! Pre-deploy check of the environment. Exits with status 1 when a
//! required variable is missing or malformed.

use api_lib::config::{verify_environment, REQUIRED_VARS};

fn main() {
    dotenvy::dotenv().ok();

    let problems = verify_environment(|name| std::env::var(name).ok());
    if problems.is_empty() {
        println!("Environment OK ({} required variables set).", REQUIRED_VARS.len());
        return;
    }

    eprintln!("Environment check failed:");
    for problem in &problems {
        eprintln!("  - {}", problem);
    }
    std::process::exit(1);
}
