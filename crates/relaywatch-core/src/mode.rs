//! Confirmed switches between manual and automatic control.
//!
//! [`ControllerModeFlow`] has the same propose / confirm / cancel shape as
//! [`RelayCommandFlow`](crate::RelayCommandFlow) and owns the controller
//! cache. It is also the [`ControllerLookup`] the relay flow consults, so a
//! confirmed switch to automatic mode immediately makes that controller's
//! relays inert.

use std::sync::Arc;

use tracing::{debug, info, warn};

use relaywatch_types::{ControlMode, Controller};

use crate::commands::{ApplyingGuard, CommandOutcome, FlowState};
use crate::error::{Error, RejectReason, Result};
use crate::relay::ControllerLookup;
use crate::traits::TelemetryApi;

/// An unconfirmed mode switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeProposal {
    pub controller_id: u64,
    pub controller_name: String,
    pub current: ControlMode,
    pub desired: ControlMode,
}

/// State machine for mode switches, owning the controller cache.
pub struct ControllerModeFlow<A: TelemetryApi + ?Sized> {
    api: Arc<A>,
    controllers: Vec<Controller>,
    state: FlowState<ModeProposal>,
    last_outcome: Option<CommandOutcome>,
}

impl<A: TelemetryApi + ?Sized> ControllerModeFlow<A> {
    pub fn new(api: Arc<A>, controllers: Vec<Controller>) -> Self {
        Self {
            api,
            controllers,
            state: FlowState::Idle,
            last_outcome: None,
        }
    }

    /// Create a flow with controllers fetched from the service.
    pub async fn load(api: Arc<A>) -> Result<Self> {
        let controllers = api.list_controllers().await?;
        Ok(Self::new(api, controllers))
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn state(&self) -> &FlowState<ModeProposal> {
        &self.state
    }

    pub fn pending(&self) -> Option<&ModeProposal> {
        self.state.awaiting()
    }

    pub fn last_outcome(&self) -> Option<&CommandOutcome> {
        self.last_outcome.as_ref()
    }

    /// Propose switching a controller to the other mode.
    pub fn propose(&mut self, controller_id: u64) -> Result<&ModeProposal> {
        if !self.state.is_idle() {
            return Err(Error::Rejected(RejectReason::CommandPending));
        }
        let controller = self
            .controller(controller_id)
            .ok_or(Error::Rejected(RejectReason::UnknownController(controller_id)))?;

        let proposal = ModeProposal {
            controller_id,
            controller_name: controller.display_name().to_string(),
            current: controller.control_mode,
            desired: controller.control_mode.toggled(),
        };
        debug!(
            "Proposed switching '{}' to {}",
            proposal.controller_name, proposal.desired
        );
        self.state = FlowState::AwaitingConfirmation(proposal);
        self.state
            .awaiting()
            .ok_or(Error::Rejected(RejectReason::NothingPending))
    }

    /// Send the pending switch and wait for the updated controller.
    ///
    /// On success the cached controller is replaced by the one the service
    /// returned. On failure the cache is left as it was.
    pub async fn confirm(&mut self) -> Result<Controller> {
        let proposal = match std::mem::take(&mut self.state) {
            FlowState::AwaitingConfirmation(p) => p,
            other => {
                self.state = other;
                return Err(Error::Rejected(RejectReason::NothingPending));
            }
        };

        let result = {
            let _applying = ApplyingGuard::new(&mut self.state, proposal.clone());
            self.api
                .set_controller_mode(proposal.controller_id, proposal.desired)
                .await
        };

        match result {
            Ok(updated) => {
                if updated.control_mode != proposal.desired {
                    warn!(
                        "Service reports '{}' in {} after requesting {}",
                        proposal.controller_name, updated.control_mode, proposal.desired
                    );
                }
                // The service's copy wins, even if the cache lost the entry meanwhile.
                match self
                    .controllers
                    .iter_mut()
                    .find(|c| c.id == proposal.controller_id)
                {
                    Some(cached) => *cached = updated.clone(),
                    None => self.controllers.push(updated.clone()),
                }
                info!(
                    "Controller '{}' switched to {}",
                    updated.display_name(),
                    updated.control_mode
                );
                self.last_outcome = Some(CommandOutcome::Applied);
                Ok(updated)
            }
            Err(e) => {
                warn!(
                    "Failed to switch '{}' to {}: {}",
                    proposal.controller_name, proposal.desired, e
                );
                self.last_outcome = Some(CommandOutcome::failed(&e));
                Err(e)
            }
        }
    }

    /// Drop the pending proposal. Returns `false` if nothing was pending.
    pub fn cancel(&mut self) -> bool {
        if self.state.awaiting().is_none() {
            return false;
        }
        self.state = FlowState::Idle;
        self.last_outcome = Some(CommandOutcome::Cancelled);
        true
    }

    /// Replace the controller cache with the service's current list.
    pub async fn refresh(&mut self) -> Result<()> {
        if !self.state.is_idle() {
            return Err(Error::Rejected(RejectReason::CommandPending));
        }
        self.controllers = self.api.list_controllers().await?;
        Ok(())
    }
}

impl<A: TelemetryApi + ?Sized> ControllerLookup for ControllerModeFlow<A> {
    fn controller(&self, id: u64) -> Option<&Controller> {
        self.controllers.controller(id)
    }
}
