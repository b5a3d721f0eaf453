// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Main application entry point for `svcd`, the control-plane driver for
//! the UniPro switch.

use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Context;
use futures::stream::StreamExt;
use libc::c_int;
use serde::Deserialize;
use signal_hook::consts::SIGHUP;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGQUIT;
use signal_hook::consts::SIGTERM;
use signal_hook_tokio::Signals;
use slog::debug;
use slog::error;
use slog::info;
use structopt::StructOpt;

use common::link::{LinkConfig, PowerMode, TimerOverrides};
use common::ports::{CportId, DeviceId, PortId};
use crate::types::*;
use ual::{SwitchIdentifiers, SwitchOps};

mod config;
mod connection;
mod dme;
mod events;
mod link;
mod route;
mod types;

#[derive(Debug, Default, StructOpt)]
#[structopt(name = "svcd", about = "control-plane driver for unipro switch")]
pub(crate) struct Opt {
    #[structopt(
        long,
        about = "send log data to the named file rather than stdout"
    )]
    log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        about = "log format",
        help = "format logs for 'human' or 'json' consumption"
    )]
    log_format: Option<common::logging::LogFormat>,

    #[structopt(
        long,
        help = "file defining the devices, links, and connections to \
                configure at startup"
    )]
    switch_config: Option<String>,

    #[structopt(long, help = "GPIO line wired to the switch reset pin")]
    reset_gpio: Option<u32>,

    #[structopt(long, help = "GPIO line wired to the switch interrupt pin")]
    irq_gpio: Option<u32>,
}

/// The main context object for running all of `svcd`.
pub struct Switch {
    // Time this object was created.
    start_time: chrono::DateTime<chrono::Utc>,
    pub config: Mutex<config::Config>,
    pub log: slog::Logger,
    pub hdl: ncp::Handle,
    // The switch processes one NCP command at a time; every backend call
    // is made while holding this lock.
    bus: Mutex<()>,
    pub devices: Mutex<route::DeviceMap>,
}

impl Switch {
    fn new(log: slog::Logger, config: config::Config) -> Self {
        let hdl = ncp::Handle::new(&log, config.backend_config.clone());
        Switch {
            start_time: chrono::Utc::now(),
            config: Mutex::new(config),
            log,
            hdl,
            bus: Mutex::new(()),
            devices: Mutex::new(route::DeviceMap::new()),
        }
    }
}

/// One device-id assignment from the autoconfiguration file.
#[derive(Debug, Deserialize)]
struct DeviceSpec {
    port: PortId,
    device_id: DeviceId,
}

/// One link power-mode setting from the autoconfiguration file.
#[derive(Debug, Deserialize)]
struct LinkSpec {
    port: PortId,
    mode: PowerMode,
    gear: u8,
    #[serde(default = "default_lanes")]
    lanes: u8,
}

fn default_lanes() -> u8 {
    1
}

/// One connection from the autoconfiguration file.  Startup connections
/// are always standard ones; the ports must have device ids assigned by
/// earlier `[[device]]` entries.
#[derive(Debug, Deserialize)]
struct ConnectionSpec {
    port_a: PortId,
    cport_a: CportId,
    port_b: PortId,
    cport_b: CportId,
}

/// The switch state to establish at startup.
#[derive(Debug, Default, Deserialize)]
struct SwitchConfig {
    #[serde(default)]
    device: Vec<DeviceSpec>,
    #[serde(default)]
    link: Vec<LinkSpec>,
    #[serde(default)]
    connection: Vec<ConnectionSpec>,
}

async fn load_auto_configuration<P>(path: P) -> SvcdResult<SwitchConfig>
where
    P: AsRef<std::path::Path>,
{
    let contents = tokio::fs::read_to_string(path).await?;
    toml::from_str(&contents)
        .map_err(|e| SvcdError::Other(format!("failed to parse TOML: {e:?}")))
}

fn link_config_for(spec: &LinkSpec) -> SvcdResult<LinkConfig> {
    let cfg = match spec.mode {
        PowerMode::Fast => LinkConfig::hs(spec.gear, spec.lanes, false),
        PowerMode::FastAuto => LinkConfig::hs(spec.gear, spec.lanes, true),
        PowerMode::Slow => LinkConfig::pwm(spec.gear, spec.lanes, false),
        PowerMode::SlowAuto => LinkConfig::pwm(spec.gear, spec.lanes, true),
        PowerMode::Unchanged => {
            return Err(SvcdError::Invalid(format!(
                "link on port {} has no target mode",
                spec.port
            )))
        }
    };
    Ok(cfg)
}

// Establish the configured startup state.  Each item stands alone: a
// failure is logged and the rest of the file is still applied.
fn apply_auto_configuration(switch: &Switch, auto: &SwitchConfig) {
    for d in &auto.device {
        if let Err(e) = switch.if_dev_id_set(d.port, d.device_id) {
            error!(switch.log, "autoconfig: device id assignment failed";
                "port" => %d.port,
                "device_id" => %d.device_id,
                "error" => %e);
        }
    }
    for l in &auto.link {
        let result = link_config_for(l).and_then(|cfg| {
            switch.configure_link(l.port, &cfg, &TimerOverrides::default())
        });
        if let Err(e) = result {
            error!(switch.log, "autoconfig: link setup failed";
                "port" => %l.port, "error" => %e);
        }
    }
    for c in &auto.connection {
        if let Err(e) = switch
            .connection_std_create(c.port_a, c.cport_a, c.port_b, c.cport_b)
        {
            error!(switch.log, "autoconfig: connection setup failed";
                "a" => format!("{}:{}", c.port_a, c.cport_a),
                "b" => format!("{}:{}", c.port_b, c.cport_b),
                "error" => %e);
        }
    }
}

async fn handle_signals(switch: &Switch, mut signals: Signals) {
    let log = switch.log.new(slog::o!("unit" => "signal_handler"));
    let handle = signals.handle();

    while let Some(signal) = signals.next().await {
        match signal {
            SIGTERM | SIGQUIT | SIGINT | SIGHUP => {
                info!(log, "received signal"; "sig" => signal);
                handle.close();
                return;
            }
            _ => unreachable!(),
        }
    }
}

async fn svcd_main(switch: Switch) -> anyhow::Result<()> {
    switch
        .hdl
        .init_comm()
        .context("failed to bring up the switch")?;

    let ver = switch.switch_version()?;
    {
        let ids = switch.hdl.identifiers()?;
        info!(switch.log, "switch is up";
            "version" => format!("{:#x}", ver.version),
            "status" => format!("{:#x}", ver.status),
            "backend" => ids.backend().to_string(),
            "id" => ids.id().to_string());
    }

    let switch = Arc::new(switch);
    let events = events::init_event_handler(&switch)?;
    switch.irq_enable(true)?;
    for p in 0..common::ports::SWITCH_UNIPORT_MAX {
        switch.port_irq_enable(PortId::new(p)?, true)?;
    }

    let maybe_config_file = switch.config.lock().unwrap().switch_config.clone();
    if let Some(file) = &maybe_config_file {
        debug!(switch.log, "reading switch autoconfiguration"; "file" => file);
        let auto = load_auto_configuration(file).await?;
        apply_auto_configuration(&switch, &auto);
        debug!(switch.log, "devices: {:?}",
            switch.devices.lock().unwrap().all());
        debug!(switch.log, "routing state:\n{}", switch.dump_routing()?);
    }

    // Wait for a signal to exit.
    const SIGNALS: &[c_int] = &[SIGTERM, SIGQUIT, SIGINT, SIGHUP];
    let signals = Signals::new(SIGNALS).unwrap();
    handle_signals(&switch, signals).await;

    events.shutdown().await;

    info!(switch.log, "shutting down switch driver");
    switch.hdl.fini();

    let uptime = chrono::Utc::now() - switch.start_time;
    info!(switch.log, "done"; "uptime_s" => uptime.num_seconds());

    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let config = config::build_config(&opt)?;

    let log =
        common::logging::init("svcd", &config.log_file, config.log_format)?;
    info!(log, "svcd config: {config:#?}");

    let switch = Switch::new(log, config);
    svcd_main(switch).await
}

#[cfg(test)]
pub(crate) fn test_switch() -> Switch {
    let log = slog::Logger::root(slog::Discard, slog::o!());
    let switch = Switch::new(log, config::Config::default());
    switch.hdl.init_comm().unwrap();
    switch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch_config() {
        let text = r#"
            [[device]]
            port = 2
            device_id = 5

            [[device]]
            port = 4
            device_id = 7

            [[link]]
            port = 2
            mode = "fast"
            gear = 2

            [[connection]]
            port_a = 2
            cport_a = 0
            port_b = 4
            cport_b = 1
        "#;
        let cfg: SwitchConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.device.len(), 2);
        assert_eq!(cfg.link.len(), 1);
        assert_eq!(cfg.connection.len(), 1);
        assert_eq!(cfg.link[0].mode, PowerMode::Fast);
        // lane count defaults to one
        assert_eq!(cfg.link[0].lanes, 1);
        assert_eq!(cfg.connection[0].port_b, PortId::new(4).unwrap());
    }

    #[test]
    fn test_apply_auto_configuration() {
        let switch = test_switch();
        let text = r#"
            [[device]]
            port = 2
            device_id = 5

            [[device]]
            port = 4
            device_id = 7

            [[connection]]
            port_a = 2
            cport_a = 0
            port_b = 4
            cport_b = 0
        "#;
        let auto: SwitchConfig = toml::from_str(text).unwrap();
        apply_auto_configuration(&switch, &auto);

        let devices = switch.devices.lock().unwrap();
        assert_eq!(
            devices.port_for(DeviceId::new(5).unwrap()),
            Some(PortId::new(2).unwrap())
        );
        drop(devices);
        let snap = switch.dump_routing().unwrap();
        assert_eq!(snap.entries.len(), 2);
    }

    #[test]
    fn test_bad_link_spec() {
        let spec = LinkSpec {
            port: PortId::new(0).unwrap(),
            mode: PowerMode::Unchanged,
            gear: 0,
            lanes: 1,
        };
        assert!(matches!(
            link_config_for(&spec),
            Err(SvcdError::Invalid(_))
        ));
    }
}
