//! Command-line client for domainforged.
//!
//! Each invocation opens one admin connection, sends one command line and
//! prints the daemon's response until the connection closes. `start` runs
//! the daemon itself instead.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use shared::protocol::{Command, DEFAULT_ADMIN_ADDRESS, DEFAULT_CONFIG_PATH};

const DAEMON_BINARY: &str = "domainforged";

#[derive(Parser, Debug)]
#[command(
    name = "domainforge",
    version,
    about = "Manage local .local domains and their reverse proxy ports",
    long_about = None,
)]
struct Cli {
    /// Admin address of the running daemon [default: admin.listen from the config file]
    #[arg(long, short = 'a', global = true)]
    addr: Option<String>,

    /// Daemon config file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon with the same config file.
    Start {
        /// Run in the background and return immediately
        #[arg(long, short = 'd')]
        detach: bool,
    },

    /// Register <domain>.local and route it to a local port.
    Add {
        domain: String,
        /// Port the reverse proxy forwards to
        #[arg(long, short = 'p', value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
    },

    /// Stop advertising a domain.
    Remove { domain: String },

    /// List registered domains.
    List,

    /// Stop the daemon.
    Stop,
}

/// What one invocation does: launch the daemon or talk to it.
#[derive(Debug, PartialEq)]
enum Action {
    Start { detach: bool },
    Send(Command),
}

impl From<Commands> for Action {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Start { detach } => Action::Start { detach },
            Commands::Add { domain, port } => Action::Send(Command::Add { name: domain, port }),
            Commands::Remove { domain } => Action::Send(Command::Remove { name: domain }),
            Commands::List => Action::Send(Command::List),
            Commands::Stop => Action::Send(Command::Stop),
        }
    }
}

/// The slice of the daemon's config file the client cares about
#[derive(Debug, Default, Deserialize)]
struct ClientConfig {
    #[serde(default)]
    admin: AdminSection,
}

#[derive(Debug, Deserialize)]
struct AdminSection {
    #[serde(default = "default_listen")]
    listen: String,
}

fn default_listen() -> String {
    DEFAULT_ADMIN_ADDRESS.to_string()
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Pick the daemon's admin address: `--addr` wins, then `admin.listen` from
/// the config file, then the built-in default when there is no file.
fn resolve_addr(addr: Option<&str>, config_path: &Path) -> Result<String> {
    if let Some(addr) = addr {
        return Ok(addr.to_string());
    }
    if !config_path.exists() {
        return Ok(DEFAULT_ADMIN_ADDRESS.to_string());
    }

    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config file: {}", config_path.display()))?;
    let config: ClientConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", config_path.display()))?;
    Ok(config.admin.listen)
}

/// Send one command and copy every response line to `out`.
fn send_command(addr: &str, command: &Command, out: &mut impl Write) -> Result<()> {
    let mut stream =
        TcpStream::connect(addr).map_err(|e| anyhow!("failed to connect to daemon: {e}"))?;

    writeln!(stream, "{command}").context("failed to send command")?;
    stream.flush().context("failed to send command")?;

    for line in BufReader::new(stream).lines() {
        let line = line.context("error reading response")?;
        writeln!(out, "{line}")?;
    }

    Ok(())
}

/// The daemon installed next to this binary, else whatever is on `PATH`.
fn daemon_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DAEMON_BINARY)))
        .filter(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(DAEMON_BINARY))
}

/// Run `binary <config>`. In the foreground this waits and fails if the
/// daemon exits unsuccessfully; detached it returns the child's pid.
fn launch(binary: &Path, config_path: &Path, detach: bool) -> Result<Option<u32>> {
    let mut daemon = std::process::Command::new(binary);
    daemon.arg(config_path);

    if !detach {
        let status: ExitStatus = daemon
            .status()
            .with_context(|| format!("failed to start {}", binary.display()))?;
        if !status.success() {
            bail!("{} exited with {status}", binary.display());
        }
        return Ok(None);
    }

    daemon
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        // Leave the terminal's process group so Ctrl-C there doesn't reach it
        use std::os::unix::process::CommandExt;
        daemon.process_group(0);
    }

    let child = daemon
        .spawn()
        .with_context(|| format!("failed to start {}", binary.display()))?;
    Ok(Some(child.id()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match Action::from(cli.command) {
        Action::Start { detach } => {
            if let Some(pid) = launch(&daemon_binary(), &cli.config, detach)? {
                println!("{DAEMON_BINARY} started in the background (pid {pid})");
            }
            Ok(())
        }
        Action::Send(command) => {
            let addr = resolve_addr(cli.addr.as_deref(), &cli.config)?;
            send_command(&addr, &command, &mut std::io::stdout().lock())
        }
    }
}
