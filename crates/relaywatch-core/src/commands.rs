//! Shared command-flow state and the control panel.
//!
//! Relay toggles and mode switches share one lifecycle:
//!
//! ```text
//! Idle --propose--> AwaitingConfirmation --confirm--> Applying --ack/err--> Idle
//!                          |
//!                          +--cancel--> Idle
//! ```
//!
//! [`ControlPanel`] owns both flows and allows at most one pending command
//! across them.

use std::sync::Arc;

use relaywatch_types::{ControlMode, Controller, Relay};
use uuid::Uuid;

use crate::error::{Error, RejectReason, Result};
use crate::mode::{ControllerModeFlow, ModeProposal};
use crate::relay::{ControllerLookup, RelayCommandFlow, RelayProposal};
use crate::traits::TelemetryApi;

/// Where a command flow is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState<P> {
    Idle,
    /// A proposal waits for the user to confirm or cancel.
    AwaitingConfirmation(P),
    /// The command has been sent and the flow waits for the service.
    Applying(P),
}

impl<P> Default for FlowState<P> {
    fn default() -> Self {
        FlowState::Idle
    }
}

impl<P> FlowState<P> {
    pub fn is_idle(&self) -> bool {
        matches!(self, FlowState::Idle)
    }

    /// The proposal awaiting confirmation, if any.
    pub fn awaiting(&self) -> Option<&P> {
        match self {
            FlowState::AwaitingConfirmation(p) => Some(p),
            _ => None,
        }
    }
}

/// How a proposal resolved. Failures carry the notice to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    Failed { message: String },
    Cancelled,
}

impl CommandOutcome {
    pub(crate) fn failed(error: &Error) -> Self {
        CommandOutcome::Failed {
            message: error.to_string(),
        }
    }
}

/// Holds a flow in `Applying` and returns it to `Idle` when dropped.
///
/// The flow leaves `Applying` even if the confirming future is dropped
/// before the service answers.
pub(crate) struct ApplyingGuard<'a, P> {
    state: &'a mut FlowState<P>,
}

impl<'a, P> ApplyingGuard<'a, P> {
    pub(crate) fn new(state: &'a mut FlowState<P>, proposal: P) -> Self {
        *state = FlowState::Applying(proposal);
        Self { state }
    }
}

impl<P> Drop for ApplyingGuard<'_, P> {
    fn drop(&mut self) {
        *self.state = FlowState::Idle;
    }
}

/// The single outstanding proposal of a [`ControlPanel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    Relay(RelayProposal),
    Mode(ModeProposal),
}

/// The entity a confirmed command changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Relay(Relay),
    Mode(Controller),
}

/// Relay and mode flows with one pending command between them.
///
/// # Example
///
/// ```ignore
/// let mut panel = ControlPanel::load(api).await?;
/// panel.propose_relay_toggle(relay_uuid)?;
/// // ask the user...
/// match panel.confirm().await {
///     Ok(Applied::Relay(relay)) => println!("{} is now {}", relay.name, relay.is_working),
///     Ok(_) => {}
///     Err(e) => eprintln!("Command failed: {e}"),
/// }
/// ```
pub struct ControlPanel<A: TelemetryApi + ?Sized> {
    relays: RelayCommandFlow<A>,
    modes: ControllerModeFlow<A>,
    last_outcome: Option<CommandOutcome>,
}

impl<A: TelemetryApi + ?Sized> ControlPanel<A> {
    pub fn new(api: Arc<A>, controllers: Vec<Controller>, relays: Vec<Relay>) -> Self {
        Self {
            relays: RelayCommandFlow::new(Arc::clone(&api), relays),
            modes: ControllerModeFlow::new(api, controllers),
            last_outcome: None,
        }
    }

    /// Create a panel with controllers and relays fetched from the service.
    pub async fn load(api: Arc<A>) -> Result<Self> {
        let (controllers, relays) = tokio::try_join!(api.list_controllers(), api.list_relays())?;
        Ok(Self::new(api, controllers, relays))
    }

    pub fn controllers(&self) -> &[Controller] {
        self.modes.controllers()
    }

    pub fn controller(&self, id: u64) -> Option<&Controller> {
        self.modes.controller(id)
    }

    pub fn relays(&self) -> &[Relay] {
        self.relays.relays()
    }

    pub fn relay(&self, uuid: Uuid) -> Option<&Relay> {
        self.relays.relay(uuid)
    }

    /// Relays belonging to a controller.
    pub fn relays_of(&self, controller_id: u64) -> impl Iterator<Item = &Relay> {
        self.relays.relays_of(controller_id)
    }

    /// Whether a relay's switch is shown but does nothing (automatic mode).
    pub fn is_relay_inert(&self, relay: &Relay) -> bool {
        self.modes
            .controller(relay.controller_id)
            .is_some_and(|c| c.control_mode == ControlMode::Auto)
    }

    pub fn pending(&self) -> Option<PendingCommand> {
        if let Some(p) = self.relays.pending() {
            return Some(PendingCommand::Relay(p.clone()));
        }
        self.modes.pending().cloned().map(PendingCommand::Mode)
    }

    fn is_busy(&self) -> bool {
        !self.relays.state().is_idle() || !self.modes.state().is_idle()
    }

    /// Propose flipping a relay. See [`RelayCommandFlow::propose`].
    pub fn propose_relay_toggle(&mut self, relay_uuid: Uuid) -> Result<&RelayProposal> {
        if self.is_busy() {
            return Err(Error::Rejected(RejectReason::CommandPending));
        }
        self.relays.propose(relay_uuid, &self.modes)
    }

    /// Propose switching a controller's mode. See [`ControllerModeFlow::propose`].
    pub fn propose_mode_switch(&mut self, controller_id: u64) -> Result<&ModeProposal> {
        if self.is_busy() {
            return Err(Error::Rejected(RejectReason::CommandPending));
        }
        self.modes.propose(controller_id)
    }

    /// Apply the pending command.
    pub async fn confirm(&mut self) -> Result<Applied> {
        if self.relays.pending().is_some() {
            let result = self.relays.confirm(&self.modes).await.map(Applied::Relay);
            self.last_outcome = self.relays.last_outcome().cloned();
            result
        } else if self.modes.pending().is_some() {
            let result = self.modes.confirm().await.map(Applied::Mode);
            self.last_outcome = self.modes.last_outcome().cloned();
            result
        } else {
            Err(Error::Rejected(RejectReason::NothingPending))
        }
    }

    /// Drop the pending command. Returns `false` if nothing was pending.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.relays.cancel() || self.modes.cancel();
        if cancelled {
            self.last_outcome = Some(CommandOutcome::Cancelled);
        }
        cancelled
    }

    /// How the most recent command resolved.
    pub fn last_outcome(&self) -> Option<&CommandOutcome> {
        self.last_outcome.as_ref()
    }

    /// Reload controllers and relays from the service. Only allowed while idle.
    pub async fn refresh(&mut self) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Rejected(RejectReason::CommandPending));
        }
        self.modes.refresh().await?;
        self.relays.refresh().await
    }
}
