//! Relay and mode command implementations.
//!
//! Both commands go through the control panel: propose, ask, then confirm or
//! cancel. Nothing is sent to the service until the user agrees.

use std::sync::Arc;

use anyhow::Result;
use relaywatch_core::{Applied, ControlPanel, HttpApi};
use uuid::Uuid;

use crate::style;
use crate::util::confirm;

pub async fn cmd_relay(api: Arc<HttpApi>, relay: Uuid, yes: bool, no_color: bool) -> Result<()> {
    let mut panel = ControlPanel::load(api).await?;

    let proposal = panel.propose_relay_toggle(relay)?;
    let prompt = format!(
        "Turn relay '{}' {}?",
        proposal.relay_name,
        if proposal.desired_state { "ON" } else { "OFF" }
    );

    apply(&mut panel, &prompt, yes, no_color).await
}

pub async fn cmd_mode(api: Arc<HttpApi>, controller: u64, yes: bool, no_color: bool) -> Result<()> {
    let mut panel = ControlPanel::load(api).await?;

    let proposal = panel.propose_mode_switch(controller)?;
    let prompt = format!(
        "Switch controller '{}' from {} to {}?",
        proposal.controller_name, proposal.current, proposal.desired
    );

    apply(&mut panel, &prompt, yes, no_color).await
}

async fn apply(panel: &mut ControlPanel<HttpApi>, prompt: &str, yes: bool, no_color: bool) -> Result<()> {
    if !confirm(prompt, yes)? {
        panel.cancel();
        eprintln!("Cancelled.");
        return Ok(());
    }

    let message = match panel.confirm().await? {
        Applied::Relay(relay) => format!(
            "Relay '{}' is now {}",
            relay.name,
            style::format_relay_state(relay.is_working, no_color)
        ),
        Applied::Mode(controller) => format!(
            "Controller '{}' is now in {} mode",
            controller.display_name(),
            style::format_mode(controller.control_mode, no_color)
        ),
    };
    println!("{}", style::format_success(&message, no_color));
    Ok(())
}
