//! Line commands accepted on stdin while `watch` is running.

use anyhow::{anyhow, bail, Result};

pub const HELP: &str = "\
Commands:
  list                         show every endpoint and its state
  active                       show active endpoints only
  filter <text>                show endpoints whose URL or device id contains <text>
  import <text>                extract and validate endpoints from <text>
  add <server_url> <device_id> validate one endpoint
  toggle <device_id> on|off    force a device active or inactive
  remove <server_url> <device_id>
  check                        run a full check now
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Active,
    Filter(String),
    Import(String),
    Add { server_url: String, device_id: String },
    Toggle { device_id: String, active: bool },
    Remove { server_url: String, device_id: String },
    Check,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let command = match verb.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "list" | "ls" => ConsoleCommand::List,
            "active" => ConsoleCommand::Active,
            "filter" => ConsoleCommand::Filter(required(rest, "filter needs a search text")?),
            "import" => ConsoleCommand::Import(required(rest, "import needs some text")?),
            "add" => {
                let (server_url, device_id) = pair(&mut args, "add <server_url> <device_id>")?;
                ConsoleCommand::Add { server_url, device_id }
            }
            "toggle" => {
                let usage = "toggle <device_id> on|off";
                let device_id = args.next().ok_or_else(|| anyhow!("Usage: {usage}"))?.to_string();
                let active = match args.next().map(str::to_ascii_lowercase).as_deref() {
                    Some("on" | "active" | "true") => true,
                    Some("off" | "inactive" | "false") => false,
                    _ => bail!("Usage: {usage}"),
                };
                ConsoleCommand::Toggle { device_id, active }
            }
            "remove" | "rm" => {
                let (server_url, device_id) = pair(&mut args, "remove <server_url> <device_id>")?;
                ConsoleCommand::Remove { server_url, device_id }
            }
            "check" => ConsoleCommand::Check,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => bail!("Unknown command '{other}', type 'help' for a list"),
        };
        Ok(Some(command))
    }
}

fn required(rest: &str, message: &str) -> Result<String> {
    if rest.is_empty() {
        bail!("{message}");
    }
    Ok(rest.to_string())
}

fn pair<'a>(args: &mut impl Iterator<Item = &'a str>, usage: &str) -> Result<(String, String)> {
    match (args.next(), args.next()) {
        (Some(first), Some(second)) => Ok((first.to_string(), second.to_string())),
        _ => bail!("Usage: {usage}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("list", ConsoleCommand::List)]
    #[case("  LS ", ConsoleCommand::List)]
    #[case("active", ConsoleCommand::Active)]
    #[case("filter svc.example", ConsoleCommand::Filter("svc.example".to_string()))]
    #[case(
        "import http://svc.example/c 00:1A:79:70:E2:97",
        ConsoleCommand::Import("http://svc.example/c 00:1A:79:70:E2:97".to_string())
    )]
    #[case(
        "add http://svc.example/c 00:1A:79:70:E2:97",
        ConsoleCommand::Add {
            server_url: "http://svc.example/c".to_string(),
            device_id: "00:1A:79:70:E2:97".to_string(),
        }
    )]
    #[case(
        "toggle 00:1A:79:70:E2:97 off",
        ConsoleCommand::Toggle { device_id: "00:1A:79:70:E2:97".to_string(), active: false }
    )]
    #[case(
        "toggle 00:1A:79:70:E2:97 ON",
        ConsoleCommand::Toggle { device_id: "00:1A:79:70:E2:97".to_string(), active: true }
    )]
    #[case(
        "rm http://svc.example/c 00:1A:79:70:E2:97",
        ConsoleCommand::Remove {
            server_url: "http://svc.example/c".to_string(),
            device_id: "00:1A:79:70:E2:97".to_string(),
        }
    )]
    #[case("check", ConsoleCommand::Check)]
    #[case("?", ConsoleCommand::Help)]
    #[case("exit", ConsoleCommand::Quit)]
    fn test_parse(#[case] line: &str, #[case] expected: ConsoleCommand) {
        assert_eq!(ConsoleCommand::parse(line).unwrap(), Some(expected));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
    }

    #[rstest]
    #[case("filter")]
    #[case("import   ")]
    #[case("add http://svc.example/c")]
    #[case("toggle 00:1A:79:70:E2:97")]
    #[case("toggle 00:1A:79:70:E2:97 maybe")]
    #[case("remove")]
    #[case("play")]
    fn test_parse_errors(#[case] line: &str) {
        assert!(ConsoleCommand::parse(line).is_err());
    }
}
