use std::path::PathBuf;

use anyhow::{bail, Context};
use fdr::Request;

/// A line typed on the SITL console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Request(Request),
    /// Export to a file instead of stdout
    ExportTo(PathBuf),
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb {
            "reading" | "r" => Command::Request(Request::Reading),
            "start" => {
                let duration_s = parse_number(words.next(), "duration")?;
                let samples_per_second = parse_number(words.next(), "rate")?;
                Command::Request(Request::Start {
                    duration_s,
                    samples_per_second,
                })
            }
            "stop" => Command::Request(Request::Stop),
            "reset" => Command::Request(Request::Reset),
            "export" => match words.next() {
                Some(path) => Command::ExportTo(PathBuf::from(path)),
                None => Command::Request(Request::Export),
            },
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command '{}'", other),
        };

        if let Some(extra) = words.next() {
            bail!("unexpected argument '{}'", extra);
        }
        Ok(Some(command))
    }
}

fn parse_number(word: Option<&str>, what: &str) -> anyhow::Result<Option<u32>> {
    word.map(|w| w.parse::<u32>().with_context(|| format!("invalid {} '{}'", what, w)))
        .transpose()
}

pub const HELP: &str = "commands: reading | start [duration_s] [samples_per_s] | stop | reset | export [path] | quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        assert_eq!(
            Command::parse("start").unwrap(),
            Some(Command::Request(Request::Start {
                duration_s: None,
                samples_per_second: None,
            }))
        );
        assert_eq!(
            Command::parse("  start 2 10 ").unwrap(),
            Some(Command::Request(Request::Start {
                duration_s: Some(2),
                samples_per_second: Some(10),
            }))
        );
        assert!(Command::parse("start fast").is_err());
        assert!(Command::parse("start 1 2 3").is_err());
    }

    #[test]
    fn test_parse_export() {
        assert_eq!(
            Command::parse("export").unwrap(),
            Some(Command::Request(Request::Export))
        );
        assert_eq!(
            Command::parse("export out.csv").unwrap(),
            Some(Command::ExportTo(PathBuf::from("out.csv")))
        );
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(
            Command::parse("reading").unwrap(),
            Some(Command::Request(Request::Reading))
        );
        assert!(Command::parse("launch").is_err());
    }
}
