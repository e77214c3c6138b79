use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // LOYALTY_IDENTITY_SERVICE_KEY is deliberately absent
    const DISPLAY_ENVS: [&str; 9] = [
        "RUST_LOG",
        "LOYALTY_DATABASE_URL",
        "LOYALTY_DB_MAX_CONNECTIONS",
        "LOYALTY_AUTO_MIGRATE",
        "LOYALTY_SHADOW_WALLET_TTL_HOURS",
        "LOYALTY_EXPIRATION_INTERVAL_MINUTES",
        "LOYALTY_REQUEST_TIMEOUT_SECS",
        "LOYALTY_IDENTITY_URL",
        "LOYALTY_MOCK_IDENTITY",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<40} {val:<15}");
    })
}
