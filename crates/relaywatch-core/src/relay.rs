//! Confirmed relay on/off commands.
//!
//! A relay toggle goes through [`RelayCommandFlow::propose`] and then either
//! [`RelayCommandFlow::confirm`] or [`RelayCommandFlow::cancel`]. The cached
//! relay is updated only after the service acknowledges the command.
//!
//! Relays of a controller in [`ControlMode::Auto`] are inert: proposing a
//! toggle is rejected without touching any state, and the gate is checked
//! again at confirmation in case the mode changed in between.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use relaywatch_types::{ControlMode, Controller, Relay};

use crate::commands::{ApplyingGuard, CommandOutcome, FlowState};
use crate::error::{Error, RejectReason, Result};
use crate::traits::TelemetryApi;

/// Resolves a controller by its numeric id.
pub trait ControllerLookup {
    fn controller(&self, id: u64) -> Option<&Controller>;
}

impl ControllerLookup for [Controller] {
    fn controller(&self, id: u64) -> Option<&Controller> {
        self.iter().find(|c| c.id == id)
    }
}

impl ControllerLookup for Vec<Controller> {
    fn controller(&self, id: u64) -> Option<&Controller> {
        self.as_slice().controller(id)
    }
}

/// An unconfirmed relay toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayProposal {
    pub relay_uuid: Uuid,
    pub relay_name: String,
    pub controller_id: u64,
    pub controller_uuid: Uuid,
    /// The state the relay will be switched to.
    pub desired_state: bool,
}

/// State machine for relay toggles, owning the relay cache.
pub struct RelayCommandFlow<A: TelemetryApi + ?Sized> {
    api: Arc<A>,
    relays: Vec<Relay>,
    state: FlowState<RelayProposal>,
    last_outcome: Option<CommandOutcome>,
}

impl<A: TelemetryApi + ?Sized> RelayCommandFlow<A> {
    pub fn new(api: Arc<A>, relays: Vec<Relay>) -> Self {
        Self {
            api,
            relays,
            state: FlowState::Idle,
            last_outcome: None,
        }
    }

    /// Create a flow with relays fetched from the service.
    pub async fn load(api: Arc<A>) -> Result<Self> {
        let relays = api.list_relays().await?;
        Ok(Self::new(api, relays))
    }

    pub fn relays(&self) -> &[Relay] {
        &self.relays
    }

    pub fn relay(&self, uuid: Uuid) -> Option<&Relay> {
        self.relays.iter().find(|r| r.uuid == uuid)
    }

    /// Relays belonging to a controller.
    pub fn relays_of(&self, controller_id: u64) -> impl Iterator<Item = &Relay> {
        self.relays
            .iter()
            .filter(move |r| r.controller_id == controller_id)
    }

    pub fn state(&self) -> &FlowState<RelayProposal> {
        &self.state
    }

    /// The proposal awaiting confirmation, if any.
    pub fn pending(&self) -> Option<&RelayProposal> {
        self.state.awaiting()
    }

    /// How the most recent proposal resolved.
    pub fn last_outcome(&self) -> Option<&CommandOutcome> {
        self.last_outcome.as_ref()
    }

    /// Propose flipping a relay.
    ///
    /// Rejected while another proposal is unresolved, and for relays whose
    /// controller is in automatic mode. A rejection leaves all state unchanged.
    pub fn propose<L>(&mut self, relay_uuid: Uuid, controllers: &L) -> Result<&RelayProposal>
    where
        L: ControllerLookup + ?Sized,
    {
        if !self.state.is_idle() {
            return Err(Error::Rejected(RejectReason::CommandPending));
        }
        let relay = self
            .relay(relay_uuid)
            .ok_or(Error::Rejected(RejectReason::UnknownRelay(relay_uuid)))?;
        let controller = gate(controllers, relay.controller_id)?;

        let proposal = RelayProposal {
            relay_uuid,
            relay_name: relay.name.clone(),
            controller_id: controller.id,
            controller_uuid: controller.uuid,
            desired_state: !relay.is_working,
        };
        debug!(
            "Proposed switching relay '{}' {}",
            proposal.relay_name,
            on_off(proposal.desired_state)
        );
        self.state = FlowState::AwaitingConfirmation(proposal);
        self.state
            .awaiting()
            .ok_or(Error::Rejected(RejectReason::NothingPending))
    }

    /// Send the pending toggle and wait for the acknowledgement.
    ///
    /// On success the cached relay takes the desired state and is returned.
    /// On failure the relay is left as it was, the error is returned, and
    /// [`last_outcome`](Self::last_outcome) holds the failure notice. The
    /// flow is idle again either way.
    pub async fn confirm<L>(&mut self, controllers: &L) -> Result<Relay>
    where
        L: ControllerLookup + ?Sized,
    {
        let proposal = match std::mem::take(&mut self.state) {
            FlowState::AwaitingConfirmation(p) => p,
            other => {
                self.state = other;
                return Err(Error::Rejected(RejectReason::NothingPending));
            }
        };

        if let Err(e) = gate(controllers, proposal.controller_id) {
            info!(
                "Dropping toggle of relay '{}': {}",
                proposal.relay_name, e
            );
            self.last_outcome = Some(CommandOutcome::failed(&e));
            return Err(e);
        }

        let result = {
            let _applying = ApplyingGuard::new(&mut self.state, proposal.clone());
            self.api
                .set_relay_state(
                    proposal.controller_uuid,
                    proposal.relay_uuid,
                    proposal.desired_state,
                )
                .await
        };

        match result {
            Ok(()) => {
                self.last_outcome = Some(CommandOutcome::Applied);
                let relay = match self.relays.iter().position(|r| r.uuid == proposal.relay_uuid) {
                    Some(i) => &mut self.relays[i],
                    None => {
                        // Acknowledged but no longer cached: keep what the service now holds.
                        self.relays.push(Relay {
                            uuid: proposal.relay_uuid,
                            name: proposal.relay_name.clone(),
                            controller_id: proposal.controller_id,
                            is_working: proposal.desired_state,
                            description: None,
                        });
                        let last = self.relays.len() - 1;
                        &mut self.relays[last]
                    }
                };
                relay.is_working = proposal.desired_state;
                info!(
                    "Relay '{}' switched {}",
                    relay.name,
                    on_off(relay.is_working)
                );
                Ok(relay.clone())
            }
            Err(e) => {
                warn!(
                    "Failed to switch relay '{}' {}: {}",
                    proposal.relay_name,
                    on_off(proposal.desired_state),
                    e
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

    /// Replace the relay cache with the service's current list.
    ///
    /// Only allowed while idle.
    pub async fn refresh(&mut self) -> Result<()> {
        if !self.state.is_idle() {
            return Err(Error::Rejected(RejectReason::CommandPending));
        }
        self.relays = self.api.list_relays().await?;
        Ok(())
    }
}

/// Look up a relay's controller and refuse if it is in automatic mode.
fn gate<L>(controllers: &L, controller_id: u64) -> Result<&Controller>
where
    L: ControllerLookup + ?Sized,
{
    let controller = controllers
        .controller(controller_id)
        .ok_or(Error::Rejected(RejectReason::UnknownController(controller_id)))?;
    if controller.control_mode == ControlMode::Auto {
        return Err(Error::Rejected(RejectReason::AutoMode { controller_id }));
    }
    Ok(controller)
}

fn on_off(state: bool) -> &'static str {
    if state { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockApi;

    fn controller(id: u64, mode: ControlMode) -> Controller {
        Controller {
            uuid: Uuid::new_v4(),
            id,
            name: format!("ctrl-{}", id),
            control_mode: mode,
        }
    }

    fn relay(controller_id: u64, is_working: bool) -> Relay {
        Relay {
            uuid: Uuid::new_v4(),
            name: "pump".to_string(),
            controller_id,
            is_working,
            description: None,
        }
    }

    fn setup(mode: ControlMode) -> (Arc<MockApi>, Vec<Controller>, Relay) {
        let c = controller(1, mode);
        let r = relay(1, false);
        let api = Arc::new(
            MockApi::builder()
                .controller(c.clone())
                .relay(r.clone())
                .build(),
        );
        (api, vec![c], r)
    }

    #[tokio::test]
    async fn test_propose_then_confirm_applies() {
        let (api, controllers, r) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::load(Arc::clone(&api)).await.unwrap();

        let proposal = flow.propose(r.uuid, &controllers).unwrap();
        assert!(proposal.desired_state);
        assert!(!flow.relay(r.uuid).unwrap().is_working);

        let updated = flow.confirm(&controllers).await.unwrap();
        assert!(updated.is_working);
        assert!(flow.relay(r.uuid).unwrap().is_working);
        assert!(flow.state().is_idle());
        assert_eq!(flow.last_outcome(), Some(&CommandOutcome::Applied));

        let sent = api.relay_commands().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].controller_uuid, controllers[0].uuid);
        assert!(sent[0].desired_state);
    }

    #[tokio::test]
    async fn test_propose_then_cancel_is_side_effect_free() {
        let (api, controllers, r) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::load(Arc::clone(&api)).await.unwrap();

        flow.propose(r.uuid, &controllers).unwrap();
        assert!(flow.cancel());
        assert!(flow.state().is_idle());
        assert!(!flow.relay(r.uuid).unwrap().is_working);
        assert_eq!(flow.last_outcome(), Some(&CommandOutcome::Cancelled));
        assert!(api.relay_commands().await.is_empty());

        assert!(!flow.cancel());
    }

    #[tokio::test]
    async fn test_confirm_failure_leaves_relay_unchanged() {
        let (api, controllers, r) = setup(ControlMode::Manual);
        api.set_command_failure(Some("controller offline")).await;
        let mut flow = RelayCommandFlow::load(Arc::clone(&api)).await.unwrap();

        flow.propose(r.uuid, &controllers).unwrap();
        let err = flow.confirm(&controllers).await.unwrap_err();
        assert!(err.to_string().contains("controller offline"));
        assert!(!flow.relay(r.uuid).unwrap().is_working);
        assert!(flow.state().is_idle());
        assert!(matches!(
            flow.last_outcome(),
            Some(CommandOutcome::Failed { message }) if message.contains("controller offline")
        ));
    }

    #[tokio::test]
    async fn test_auto_mode_makes_relay_inert() {
        let (api, controllers, r) = setup(ControlMode::Auto);
        let mut flow = RelayCommandFlow::load(Arc::clone(&api)).await.unwrap();

        let err = flow.propose(r.uuid, &controllers).unwrap_err();
        assert!(matches!(
            err,
            Error::Rejected(RejectReason::AutoMode { controller_id: 1 })
        ));
        assert!(flow.state().is_idle());
        assert!(flow.last_outcome().is_none());
        assert!(api.relay_commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_rechecks_auto_gate() {
        let (api, mut controllers, r) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::load(Arc::clone(&api)).await.unwrap();

        flow.propose(r.uuid, &controllers).unwrap();
        controllers[0].control_mode = ControlMode::Auto;

        let err = flow.confirm(&controllers).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(RejectReason::AutoMode { .. })));
        assert!(flow.state().is_idle());
        assert!(api.relay_commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_single_outstanding_proposal() {
        let (api, controllers, r) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::load(api).await.unwrap();

        flow.propose(r.uuid, &controllers).unwrap();
        let err = flow.propose(r.uuid, &controllers).unwrap_err();
        assert!(matches!(err, Error::Rejected(RejectReason::CommandPending)));
        assert!(flow.refresh().await.is_err());
    }

    #[tokio::test]
    async fn test_confirm_without_proposal() {
        let (api, controllers, _) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::load(api).await.unwrap();
        let err = flow.confirm(&controllers).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(RejectReason::NothingPending)));
    }

    #[tokio::test]
    async fn test_unknown_relay_and_controller() {
        let (api, _, r) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::load(api).await.unwrap();

        let err = flow.propose(Uuid::new_v4(), &Vec::<Controller>::new()).unwrap_err();
        assert!(matches!(err, Error::Rejected(RejectReason::UnknownRelay(_))));

        let err = flow.propose(r.uuid, &Vec::<Controller>::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Rejected(RejectReason::UnknownController(1))
        ));
    }

    #[tokio::test]
    async fn test_acknowledged_toggle_survives_cache_miss() {
        let (api, controllers, r) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::load(Arc::clone(&api)).await.unwrap();

        flow.propose(r.uuid, &controllers).unwrap();
        flow.relays.clear();

        let updated = flow.confirm(&controllers).await.unwrap();
        assert!(updated.is_working);
        assert_eq!(flow.last_outcome(), Some(&CommandOutcome::Applied));
        assert!(flow.relay(r.uuid).unwrap().is_working);
        assert_eq!(api.relay_commands().await.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_cache() {
        let (api, controllers, r) = setup(ControlMode::Manual);
        let mut flow = RelayCommandFlow::new(Arc::clone(&api), Vec::new());
        assert!(flow.propose(r.uuid, &controllers).is_err());

        flow.refresh().await.unwrap();
        assert_eq!(flow.relays().len(), 1);
        assert_eq!(flow.relays_of(1).count(), 1);
        assert_eq!(flow.relays_of(2).count(), 0);
    }
}
