//! Status command implementation.

use std::sync::Arc;

use anyhow::Result;
use relaywatch_core::{ControlPanel, HttpApi, Session};
use relaywatch_types::{ControlMode, Controller, Relay};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::style;
use crate::util::print_json;

#[derive(Serialize)]
struct StatusJson<'a> {
    user: &'a relaywatch_types::User,
    controllers: Vec<ControllerJson<'a>>,
}

#[derive(Serialize)]
struct ControllerJson<'a> {
    #[serde(flatten)]
    controller: &'a Controller,
    relays: Vec<&'a Relay>,
}

pub async fn cmd_status(api: Arc<HttpApi>, format: OutputFormat, no_color: bool) -> Result<()> {
    let session = Session::establish(api.as_ref()).await?;
    let panel = ControlPanel::load(api).await?;

    match format {
        OutputFormat::Json => {
            let status = StatusJson {
                user: session.user(),
                controllers: panel
                    .controllers()
                    .iter()
                    .map(|c| ControllerJson {
                        controller: c,
                        relays: panel.relays_of(c.id).collect(),
                    })
                    .collect(),
            };
            print_json(&status)?;
        }
        OutputFormat::Text => {
            print!(
                "{}",
                format_status_text(&session, panel.controllers(), panel.relays(), no_color)
            );
        }
    }
    Ok(())
}

fn format_status_text(
    session: &Session,
    controllers: &[Controller],
    relays: &[Relay],
    no_color: bool,
) -> String {
    let mut out = format!(
        "Signed in as {} ({})\n",
        session.display_name(),
        session.role()
    );
    if session.can_view_all_companies() {
        out.push_str("Showing controllers of all companies\n");
    }

    if controllers.is_empty() {
        out.push_str("\nNo controllers.\n");
        return out;
    }

    for controller in controllers {
        out.push('\n');
        out.push_str(&style::format_title(
            &format!("{} (#{})", controller.display_name(), controller.id),
            no_color,
        ));
        out.push('\n');
        out.push_str(&format!(
            "  Mode: {}\n",
            style::format_mode(controller.control_mode, no_color)
        ));

        let inert = controller.control_mode == ControlMode::Auto;
        let mut any = false;
        for relay in relays.iter().filter(|r| r.controller_id == controller.id) {
            any = true;
            out.push_str(&format!(
                "  {:<20} {:<3}{}  {}\n",
                relay.name,
                style::format_relay_state(relay.is_working, no_color),
                if inert { " (auto)" } else { "" },
                relay.uuid
            ));
        }
        if !any {
            out.push_str("  No relays\n");
        }
    }
    out
}
