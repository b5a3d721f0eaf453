// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Configuration for `svcd`.

use crate::types::SvcdResult;

/// The Config structure captures all of the run-time settings for the
/// daemon, taken from command-line options.
#[derive(Debug)]
pub struct Config {
    /// If set, where the log should be written.  If not set, the log goes
    /// to stdout.
    pub log_file: Option<String>,

    /// Output log info in unstructured text or json?
    pub log_format: common::logging::LogFormat,

    /// Where to find the devices, links, and connections to bring up
    /// automatically at startup.
    pub switch_config: Option<String>,

    /// Backend/board-specific config settings.
    pub backend_config: ncp::BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_file: None,
            log_format: common::logging::LogFormat::Json,
            switch_config: None,
            backend_config: ncp::BackendConfig::default(),
        }
    }
}

// Use the command-line arguments to update the run-time config.
fn update_from_cli(opts: &crate::Opt, config: &mut Config) -> SvcdResult<()> {
    if let Some(log_file) = &opts.log_file {
        config.log_file = Some(log_file.to_string());
    }

    if let Some(log_format) = opts.log_format {
        config.log_format = log_format;
    }

    if let Some(switch_config) = &opts.switch_config {
        config.switch_config = Some(switch_config.to_string());
    }

    if let Some(gpio) = opts.reset_gpio {
        config.backend_config.reset_gpio = gpio;
    }

    if let Some(gpio) = opts.irq_gpio {
        config.backend_config.irq_gpio = gpio;
    }

    Ok(())
}

/// This builds a Config struct containing the tunable settings used to
/// adjust the daemon's behavior.
pub(crate) fn build_config(opts: &crate::Opt) -> SvcdResult<Config> {
    let mut config = Config::default();
    update_from_cli(opts, &mut config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opt;

    #[test]
    fn test_updates() {
        let opts = Opt {
            log_file: Some("test.log".to_string()),
            switch_config: Some("switch.toml".to_string()),
            reset_gpio: Some(117),
            ..Opt::default()
        };

        let config = build_config(&opts).unwrap();
        assert_eq!(config.log_file, Some("test.log".to_string()));
        assert_eq!(config.switch_config, Some("switch.toml".to_string()));
        assert_eq!(config.backend_config.reset_gpio, 117);
        // untouched settings keep their defaults
        assert_eq!(config.backend_config.irq_gpio, 0);
        assert_eq!(config.log_format, common::logging::LogFormat::Json);
    }
}
