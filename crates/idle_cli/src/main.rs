use std::env;
use std::io;
use std::process::ExitCode;
use std::time::Duration;

use idle_cli::{parse_command, run, CommonOptions};
use idle_engine::{ApiConfig, HttpGameApi};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--base-url" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --base-url".to_string())?;
                if value.trim().is_empty() {
                    return Err("--base-url must not be empty".to_string());
                }
                options.base_url = value.trim().to_string();
                index += 2;
            }
            "--timeout-ms" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --timeout-ms".to_string())?;
                options.timeout_ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --timeout-ms value '{value}' (expected u64)"))?;
                index += 2;
            }
            "--retry-ms" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --retry-ms".to_string())?;
                options.retry_ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --retry-ms value '{value}' (expected u64)"))?;
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let kind = parse_command(command, &args[(index + 1)..])?;

    let api = HttpGameApi::new(&ApiConfig {
        base_url: options.base_url.clone(),
        request_timeout: Duration::from_millis(options.timeout_ms.max(1)),
        ..ApiConfig::default()
    });
    run(kind, &api, &options, &mut io::stdout())
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "idle_cli - command line client for the idle game server",
        "",
        "Usage:",
        "  idle_cli [--base-url <url>] [--timeout-ms <u64>] [--retry-ms <u64>] map",
        "  idle_cli [--base-url <url>] [--timeout-ms <u64>] [--retry-ms <u64>] generate",
        "  idle_cli [--base-url <url>] [--timeout-ms <u64>] [--retry-ms <u64>] characters",
        "  idle_cli [--base-url <url>] [--timeout-ms <u64>] [--retry-ms <u64>] create <name> <role> <color>",
        "  idle_cli [--base-url <url>] [--timeout-ms <u64>] [--retry-ms <u64>] move <id> <x> <y>",
        "  idle_cli [--base-url <url>] [--timeout-ms <u64>] [--retry-ms <u64>] progress [--wait]",
        "  idle_cli [--base-url <url>] [--timeout-ms <u64>] [--retry-ms <u64>] snapshot <path.svg|path.png>",
        "",
        "Defaults:",
        "  --base-url http://localhost:5000",
        "  --timeout-ms 5000",
        "  --retry-ms 100",
    ]
    .join("\n")
}
