// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The switch event loop.
//!
//! The backend delivers interrupt notifications on an unbounded channel;
//! a dedicated task drains it and services each interrupt under the bus
//! lock.  A service failure is logged and the loop keeps running, since
//! a wedged interrupt path would otherwise take out all future events.

use std::sync::Arc;

use slog::{debug, error, info, o};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::types::SvcdResult;
use crate::Switch;
use ual::{SwitchEvent, SwitchOps};

pub struct EventHandler {
    log: slog::Logger,
    tx: UnboundedSender<SwitchEvent>,
    task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    /// Ask the event loop to exit and wait for it to drain.  Events
    /// already queued ahead of the shutdown message are still serviced.
    pub async fn shutdown(self) {
        // send fails only if the loop already exited
        let _ = self.tx.send(SwitchEvent::Shutdown);
        if let Err(e) = self.task.await {
            error!(self.log, "event loop panicked"; "error" => %e);
        }
    }
}

/// Spawn the event loop and register its channel with the backend.
pub fn init_event_handler(switch: &Arc<Switch>) -> SvcdResult<EventHandler> {
    let (tx, mut rx) = unbounded_channel();
    switch.hdl.register_irq_handler(tx.clone())?;

    let sw = Arc::clone(switch);
    let log = switch.log.new(o!("unit" => "events"));
    let handler_log = log.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SwitchEvent::Shutdown => {
                    info!(log, "event loop exiting");
                    break;
                }
                SwitchEvent::Irq => {
                    debug!(log, "servicing switch interrupt");
                    if let Err(e) = sw.service_irq() {
                        error!(log, "failed to service interrupt";
                            "error" => %e);
                    }
                }
            }
        }
    });

    Ok(EventHandler {
        log: handler_log,
        tx,
        task,
    })
}

impl Switch {
    pub(crate) fn service_irq(&self) -> SvcdResult<()> {
        let _bus = self.ncp();
        Ok(self.hdl.switch_irq_handler()?)
    }

    /// Unmask (or mask) a single port's interrupt source.
    pub fn port_irq_enable(
        &self,
        port: common::ports::PortId,
        enable: bool,
    ) -> SvcdResult<()> {
        let _bus = self.ncp();
        Ok(self.hdl.port_irq_enable(port, enable)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_switch;
    use std::time::Duration;
    use tokio::time::sleep;

    async fn wait_for_dispatches(switch: &Switch, count: usize) {
        for _ in 0..100 {
            if switch.hdl.irq_dispatches() >= count {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {count} dispatches, saw {}",
            switch.hdl.irq_dispatches()
        );
    }

    #[tokio::test]
    async fn test_irq_dispatch() {
        let switch = Arc::new(test_switch());
        let handler = init_event_handler(&switch).unwrap();
        switch.irq_enable(true).unwrap();

        switch.hdl.post_irq().unwrap();
        wait_for_dispatches(&switch, 1).await;

        switch.hdl.post_irq().unwrap();
        switch.hdl.post_irq().unwrap();
        wait_for_dispatches(&switch, 3).await;

        handler.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_dispatch() {
        let switch = Arc::new(test_switch());
        let handler = init_event_handler(&switch).unwrap();
        switch.irq_enable(true).unwrap();

        switch.hdl.post_irq().unwrap();
        wait_for_dispatches(&switch, 1).await;
        handler.shutdown().await;

        // events raised after the loop exits go nowhere
        let before = switch.hdl.irq_dispatches();
        let _ = switch.hdl.post_irq();
        sleep(Duration::from_millis(20)).await;
        assert_eq!(switch.hdl.irq_dispatches(), before);
    }
}
