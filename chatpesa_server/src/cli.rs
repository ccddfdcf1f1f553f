use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the relevant environment, and the caller exits.
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "CPL_HOST",
        "CPL_PORT",
        "CPL_DATABASE_URL",
        "CPL_DB_MAX_CONNECTIONS",
        "CPL_STORE_TIMEOUT_MS",
        "CPL_MAX_WRITE_ATTEMPTS",
        "CPL_MATCH_WINDOW_HOURS",
        "CPL_RETRY_AFTER_SECS",
        "CPL_RECONCILE_INTERVAL_SECS",
        "CPL_RECOVER_ON_STARTUP",
        "CPL_CHANGES_PAGE_LIMIT",
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
