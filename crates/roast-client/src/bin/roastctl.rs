//! CLI entrypoint for the roast controller client.

#[path = "roastctl/cli.rs"]
mod cli;
#[path = "roastctl/ctl.rs"]
mod ctl;
#[path = "roastctl/monitor.rs"]
mod monitor;
#[path = "roastctl/style.rs"]
mod style;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use roast_client::ClientConfig;
use roast_protocol::LifecycleCommand;
use tracing_subscriber::filter::{Directive, EnvFilter};

use cli::{Cli, Command};
use ctl::Action;

fn main() {
    if let Err(err) = run() {
        let message = format_error_with_tip(&err);
        eprintln!("{}", style::error(format!("Error: {message}")));
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let raw_args: Vec<String> = std::env::args().collect();
    let cli = match Cli::try_parse_from(&raw_args) {
        Ok(cli) => cli,
        Err(err) => {
            if err.kind() == ErrorKind::InvalidSubcommand {
                if let Some(input) = raw_args.iter().skip(1).find(|arg| !arg.starts_with('-')) {
                    if let Some(suggestion) = suggest_subcommand(input) {
                        eprintln!("Did you mean: {suggestion}?");
                    }
                }
            }
            err.exit();
        }
    };
    if let Command::Completions { shell } = cli.command {
        print_completions(shell);
        return Ok(());
    }

    let mut config = ClientConfig::discover(cli.config.as_deref())?;
    if let Some(url) = cli.url.as_deref() {
        config.override_url(url)?;
    }
    // The console owns the terminal; log lines would tear its frames.
    if !matches!(cli.command, Command::Console) {
        init_tracing(config.log_level.as_deref(), cli.verbose);
    }

    match cli.command {
        Command::Status => ctl::run_status(&config),
        Command::Start => ctl::run_action(&config, Action::Command(LifecycleCommand::Start)),
        Command::Stop => ctl::run_action(&config, Action::Command(LifecycleCommand::Stop)),
        Command::Restart => ctl::run_action(&config, Action::Command(LifecycleCommand::Restart)),
        Command::SaveConfig => {
            ctl::run_action(&config, Action::Command(LifecycleCommand::SaveConfig))
        }
        Command::Mode { mode } => ctl::run_action(&config, Action::Mode(mode.into())),
        Command::Set { name, value } => ctl::run_action(&config, Action::Set { name, value }),
        Command::Upload { file } => ctl::run_action(&config, Action::Upload(file)),
        Command::Monitor { samples } => monitor::run_monitor(&config, samples),
        Command::Console => roast_client::console::run_console(&config),
        Command::Completions { .. } => Ok(()),
    }
}

fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "roastctl", &mut std::io::stdout());
}

fn init_tracing(level: Option<&str>, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        level.unwrap_or("warn")
    };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = level.parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn suggest_subcommand(input: &str) -> Option<&'static str> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let candidates = [
        "status",
        "start",
        "stop",
        "restart",
        "save-config",
        "mode",
        "set",
        "upload",
        "monitor",
        "console",
        "completions",
    ];
    let mut best = None;
    let mut best_score = usize::MAX;
    for candidate in candidates {
        let score = levenshtein(input, candidate);
        if score < best_score {
            best_score = score;
            best = Some(candidate);
        }
    }
    if best_score <= 2 {
        best
    } else {
        None
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }
    prev[b.len()]
}

fn format_error_with_tip(err: &anyhow::Error) -> String {
    let message = err.to_string();
    let tip = if message.contains("invalid config") {
        Some("Tip: check roaster.toml or pass --config <file>.")
    } else if message.contains("Connection refused") || message.contains("timed out") {
        Some("Tip: check that the controller is powered and reachable, or pass --url <host>.")
    } else if message.contains("unknown parameter") {
        Some("Tip: tunable parameters are setpoint, ramp_rate, p, i and d.")
    } else if message.contains("invalid program") {
        Some("Tip: a program needs program_name and at least one step with step_name, target_temp and ramp_rate.")
    } else {
        None
    };
    match tip {
        Some(tip) => format!("{message}\n{tip}"),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_typos_get_a_suggestion() {
        assert_eq!(suggest_subcommand("stat"), Some("start"));
        assert_eq!(suggest_subcommand("monitr"), Some("monitor"));
        assert_eq!(suggest_subcommand("upload-program-now"), None);
        assert_eq!(suggest_subcommand(" "), None);
    }

    #[test]
    fn config_errors_carry_a_tip() {
        let err = anyhow::Error::new(roast_client::ClientError::InvalidConfig(
            "roaster.toml: unknown field `urll`".into(),
        ));
        let text = format_error_with_tip(&err);
        assert!(text.starts_with("invalid config: roaster.toml"), "{text}");
        assert!(text.contains("Tip: check roaster.toml"), "{text}");
    }

    #[test]
    fn cli_parses_parameter_changes() {
        let cli = Cli::try_parse_from(["roastctl", "-u", "roaster.local", "set", "p", "2.5"])
            .expect("parse");
        assert_eq!(cli.url.as_deref(), Some("roaster.local"));
        match cli.command {
            Command::Set { name, value } => {
                assert_eq!(name, "p");
                assert_eq!(value, "2.5");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
