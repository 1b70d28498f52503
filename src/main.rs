pub mod models {
    pub mod adax;
}

pub mod client;
pub mod config;
pub mod control;
pub mod entity;
pub mod hub;
pub mod utils;
pub mod services {
    pub mod command;
    pub mod poll;
    pub mod setup;
}

use crate::config::Config;
use crate::services::command::{self, Command};
use log::{error, info};
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

#[derive(Debug, PartialEq)]
struct CliArgs {
    env_file: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_cli(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut env_file: Option<PathBuf> = None;
    let mut command = Vec::new();

    while let Some(arg) = args.next() {
        let value = if arg == "--env-file" {
            Some(
                args.next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?,
            )
        } else {
            arg.strip_prefix("--env-file=").map(str::to_string)
        };

        match value {
            Some(v) if v.is_empty() => return Err("`--env-file` requires a path argument".to_string()),
            Some(_) if env_file.is_some() => return Err("`--env-file` provided more than once".to_string()),
            Some(v) => env_file = Some(PathBuf::from(v)),
            None if arg == "--help" || arg == "-h" => return Err(command::USAGE.to_string()),
            None => command.push(arg),
        }
    }

    Ok(CliArgs { env_file, command })
}

fn load_env(explicit: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(&path)?;
        return Ok(Some(LoadedEnvFile { path, explicit: true }));
    }

    let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
    let path = cwd.join(".env");
    if !path.is_file() {
        return Ok(None);
    }
    load_env_file(&path)?;
    Ok(Some(LoadedEnvFile { path, explicit: false }))
}

fn load_env_file(path: &Path) -> Result<(), String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    for (index, line) in raw.lines().enumerate() {
        let Some((key, value)) = parse_env_line(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?
        else {
            continue;
        };
        // Values already present in the process environment win.
        if std::env::var_os(&key).is_none() {
            // Mutating the process environment is unsafe on some targets; done before any threads start.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

/// `KEY=value`, `export KEY=value`, optional single/double quotes, `#` comments.
fn parse_env_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(format!("invalid variable name: {:?}", key));
    }

    let value = value.trim();
    let value = match value.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let inner = &value[1..];
            let end = inner.find(q).ok_or_else(|| format!("unterminated {} quote", q))?;
            let trailing = inner[end + 1..].trim();
            if !trailing.is_empty() && !trailing.starts_with('#') {
                return Err("unexpected characters after closing quote".to_string());
            }
            inner[..end].to_string()
        }
        _ => value.split('#').next().unwrap_or_default().trim_end().to_string(),
    };
    Ok(Some((key.to_string(), value)))
}

pub fn run(command: Command) -> Result<(), String> {
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (api_url={}, poll_interval={}s, min_refresh_interval={}s, cache_token={}, http_timeout={})",
        cfg.api_url,
        cfg.poll_interval.as_secs(),
        cfg.min_refresh_interval.as_secs(),
        cfg.cache_token,
        cfg.http_timeout
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "-".to_string()),
    );
    command::execute(&cfg, command)
}

fn main() {
    let cli = match parse_cli(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    let command = match Command::parse(&cli.command) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    let loaded_env = match load_env(cli.env_file) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "adax-heater {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(command) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
