use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 20] = [
        "RUST_LOG",
        "STL_HOST",
        "STL_PORT",
        "STL_DATABASE_URL",
        "STL_DB_MAX_CONNECTIONS",
        "STL_GATEWAY_USE_TEST_SECRET",
        "STL_GATEWAY_IP_WHITELIST",
        "STL_USE_X_FORWARDED_FOR",
        "STL_USE_FORWARDED",
        "STL_ACQUIRE_TIMEOUT_SECS",
        "STL_TX_TIMEOUT_SECS",
        "STL_EXTENDED_TX_TIMEOUT_SECS",
        "STL_PARALLEL_LOOKUPS",
        "STL_RECOVERY_CONCURRENCY",
        "STL_RECOVERY_BATCH_SIZE",
        "STL_RECOVERY_EXTENDED_BATCH_SIZE",
        "STL_RECOVERY_EXTENDED_METHODS",
        "STL_NOTIFICATION_POLL_SECS",
        "STL_NOTIFICATION_MAX_ATTEMPTS",
        "STL_NOTIFICATION_RETENTION_HOURS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
