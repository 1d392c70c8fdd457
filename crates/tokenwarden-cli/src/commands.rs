//! Interactive command parsing.

/// A line typed at the `tokenwarden>` prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Renew,
    /// GET a backend path with the current token and print the JSON
    Get(String),
    Login,
    Logout,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Command::Empty;
        };

        match name.to_ascii_lowercase().as_str() {
            "status" | "s" => Command::Status,
            "renew" | "r" => Command::Renew,
            "get" | "g" => match parts.next() {
                Some(path) => Command::Get(path.to_string()),
                None => Command::Unknown("get needs a path, e.g. `get /me`".to_string()),
            },
            "login" => Command::Login,
            "logout" => Command::Logout,
            "help" | "h" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Unknown(format!("Unknown command: {}", name)),
        }
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  status        Show session state, expiry and next renewal
  renew         Renew the access token now
  get <path>    GET a backend path with the current token
  login         Log in again (replaces the current session)
  logout        End the session
  help          Show this help
  quit          Exit (the session is dropped, the server is not told)";
