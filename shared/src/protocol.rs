use std::fmt;
use thiserror::Error;

/// Address the admin server listens on when no config overrides it
pub const DEFAULT_ADMIN_ADDRESS: &str = "localhost:2013";

/// Config file shared by the daemon and the client
pub const DEFAULT_CONFIG_PATH: &str = "/etc/domainforge/domainforged.toml";

/// Reverse proxy admin API used when no config overrides it
pub const DEFAULT_PROXY_ADMIN: &str = "http://localhost:1990";

/// Domain suffix appended to every registered name
pub const LOCAL_SUFFIX: &str = "local";

/// mDNS instance name used for every proxy advertisement
pub const ADVERTISER_INSTANCE: &str = "domainforge";

/// Port published in proxy advertisements (the reverse proxy's HTTP port)
pub const ADVERTISED_PORT: u16 = 80;

pub const ADD_USAGE: &str = "add <domain> --port <port>";
pub const REMOVE_USAGE: &str = "remove <domain>";
pub const LIST_USAGE: &str = "list";
pub const STOP_USAGE: &str = "stop";

pub const NO_DOMAINS: &str = "No domains registered";
pub const REGISTERED_HEADER: &str = "Registered domains:";

/// One admin request. Each connection carries exactly one of these as a
/// single newline-terminated line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { name: String, port: u16 },
    Remove { name: String },
    List,
    Stop,
}

/// Why a request line was rejected. The `Display` output is the exact
/// response line sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid command. Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Unknown command")]
    Unknown,

    #[error("Invalid command. Request longer than {0} bytes")]
    TooLong(usize),
}

impl Command {
    /// Parse one request line into a command. Tokens are split on any
    /// whitespace; the shape of each command is checked strictly.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = parts.first() else {
            return Err(ParseError::Unknown);
        };

        match cmd {
            "add" => {
                if parts.len() != 4 || parts[2] != "--port" {
                    return Err(ParseError::Usage(ADD_USAGE));
                }
                let port = parse_port(parts[3])?;
                Ok(Command::Add {
                    name: parts[1].to_string(),
                    port,
                })
            }
            "remove" => {
                if parts.len() != 2 {
                    return Err(ParseError::Usage(REMOVE_USAGE));
                }
                Ok(Command::Remove {
                    name: parts[1].to_string(),
                })
            }
            "list" if parts.len() == 1 => Ok(Command::List),
            "list" => Err(ParseError::Usage(LIST_USAGE)),
            "stop" if parts.len() == 1 => Ok(Command::Stop),
            "stop" => Err(ParseError::Usage(STOP_USAGE)),
            _ => Err(ParseError::Unknown),
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, ParseError> {
    let port: u16 = raw
        .parse()
        .map_err(|e| ParseError::InvalidPort(format!("{raw:?}: {e}")))?;
    if port == 0 {
        return Err(ParseError::InvalidPort(format!(
            "{raw:?}: port must be between 1 and 65535"
        )));
    }
    Ok(port)
}

/// Renders the wire form of a command, without the trailing newline.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Add { name, port } => write!(f, "add {name} --port {port}"),
            Command::Remove { name } => write!(f, "remove {name}"),
            Command::List => f.write_str("list"),
            Command::Stop => f.write_str("stop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let cmd = Command::parse("add hello --port 3000\n").unwrap();
        assert_eq!(
            cmd,
            Command::Add {
                name: "hello".to_string(),
                port: 3000
            }
        );
    }

    #[test]
    fn test_parse_add_wrong_shape() {
        assert_eq!(Command::parse("add foo"), Err(ParseError::Usage(ADD_USAGE)));
        assert_eq!(
            Command::parse("add foo -p 80"),
            Err(ParseError::Usage(ADD_USAGE))
        );
        assert_eq!(
            Command::parse("add foo --port 80 extra"),
            Err(ParseError::Usage(ADD_USAGE))
        );
    }

    #[test]
    fn test_parse_add_bad_port() {
        assert!(matches!(
            Command::parse("add foo --port eighty"),
            Err(ParseError::InvalidPort(_))
        ));
        assert!(matches!(
            Command::parse("add foo --port 0"),
            Err(ParseError::InvalidPort(_))
        ));
        assert!(matches!(
            Command::parse("add foo --port 70000"),
            Err(ParseError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_parse_remove_list_stop() {
        assert_eq!(
            Command::parse("remove hello"),
            Ok(Command::Remove {
                name: "hello".to_string()
            })
        );
        assert_eq!(
            Command::parse("remove"),
            Err(ParseError::Usage(REMOVE_USAGE))
        );
        assert_eq!(Command::parse("  list  "), Ok(Command::List));
        assert_eq!(Command::parse("list all"), Err(ParseError::Usage(LIST_USAGE)));
        assert_eq!(Command::parse("stop"), Ok(Command::Stop));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Command::parse("bogus"), Err(ParseError::Unknown));
        assert_eq!(Command::parse(""), Err(ParseError::Unknown));
        assert_eq!(Command::parse("   \n"), Err(ParseError::Unknown));
        // Commands are case-sensitive on the wire
        assert_eq!(Command::parse("LIST"), Err(ParseError::Unknown));
    }

    #[test]
    fn test_error_lines() {
        assert_eq!(
            ParseError::Usage(ADD_USAGE).to_string(),
            "Invalid command. Usage: add <domain> --port <port>"
        );
        assert_eq!(ParseError::Unknown.to_string(), "Unknown command");
        assert_eq!(
            ParseError::TooLong(4096).to_string(),
            "Invalid command. Request longer than 4096 bytes"
        );
    }

    #[test]
    fn test_display_matches_parse() {
        let cmd = Command::Add {
            name: "api".to_string(),
            port: 8080,
        };
        assert_eq!(cmd.to_string(), "add api --port 8080");
        assert_eq!(Command::parse(&cmd.to_string()), Ok(cmd));
    }
}
