// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Log initialization shared by the daemons in this workspace.

use std::fs::OpenOptions;
use std::str::FromStr;

use anyhow::Context;
use slog::Drain;

/// Output log info in unstructured text or json?
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            x => Err(format!("invalid log format: {x}")),
        }
    }
}

fn async_root<D>(drain: D, name: &'static str) -> slog::Logger
where
    D: Drain<Ok = (), Err = slog::Never> + Send + 'static,
{
    let drain = slog_async::Async::new(drain)
        .chan_size(32768)
        .build()
        .fuse();
    slog::Logger::root(drain, slog::o!("daemon" => name))
}

/// Build the root logger, writing to `log_file` if set and stdout
/// otherwise.
pub fn init(
    name: &'static str,
    log_file: &Option<String>,
    log_format: LogFormat,
) -> anyhow::Result<slog::Logger> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            match log_format {
                LogFormat::Human => {
                    let decorator = slog_term::PlainDecorator::new(file);
                    let drain =
                        slog_term::FullFormat::new(decorator).build().fuse();
                    Ok(async_root(drain, name))
                }
                LogFormat::Json => {
                    let drain = slog_bunyan::with_name(name, file)
                        .build()
                        .fuse();
                    Ok(async_root(drain, name))
                }
            }
        }
        None => match log_format {
            LogFormat::Human => {
                let decorator = slog_term::TermDecorator::new().build();
                let drain =
                    slog_term::FullFormat::new(decorator).build().fuse();
                Ok(async_root(drain, name))
            }
            LogFormat::Json => {
                let drain =
                    slog_bunyan::with_name(name, std::io::stdout())
                        .build()
                        .fuse();
                Ok(async_root(drain, name))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::LogFormat;

    #[test]
    fn test_format_parse() {
        assert_eq!("human".parse(), Ok(LogFormat::Human));
        assert_eq!("JSON".parse(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
