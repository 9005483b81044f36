//! deregistration - UE and network initiated deregistration (TS24.501, 5.5.2)

use super::{GmmAction, UeProcedure};
use crate::HandlerApi;
use crate::consumers::SmCause;
use crate::data::{AccessType, GmmEvent, GmmState, ReleaseAction};
use crate::protocols::nas::{DeregistrationAccessType, DeregistrationRequestFromUe, build};
use crate::protocols::ngap::NasCause;
use crate::timer::TimerKind;
use anyhow::Result;
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};

#[derive(Deref, DerefMut)]
pub struct DeregistrationProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> DeregistrationProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        DeregistrationProcedure(inner)
    }

    /// TS24.501, 5.5.2.2.  Runs on entry to DeregistrationInitiated.
    pub async fn ue_originated(
        mut self,
        access_type: AccessType,
        r: DeregistrationRequestFromUe,
    ) -> Result<Option<GmmAction>> {
        self.log_message(">> Nas DeregistrationRequestFromUe");
        info!(
            self.logger,
            "UE deregisters from {:?}{}",
            r.access_type,
            if r.switch_off { " (switch off)" } else { "" }
        );
        self.ue.deregistration_target = Some(r.access_type);

        let target = r.access_type;
        self.release_pdu_sessions(
            |s| session_released(target, access_type, s.access_type),
            Some(SmCause::RelDueToUeDeregistration),
        )
        .await;
        if target == DeregistrationAccessType::Both || self.ue.deregistered_apart_from(access_type)
        {
            self.delete_am_policy().await;
        }

        if !r.switch_off && self.ue.is_connected(access_type) {
            self.send_nas(access_type, build::deregistration_accept())
                .await?;
        }

        for &target in targets(r.access_type) {
            if self.ue.is_connected(target) {
                self.release_ue_context(
                    target,
                    ReleaseAction::ReleaseUeContext,
                    NasCause::Deregister,
                )
                .await?;
            }
        }
        Ok(Some(GmmAction::Event(GmmEvent::DeregistrationAccept, None)))
    }

    /// TS24.501, 5.5.2.3.3: the UE accepted our Deregistration Request.
    pub async fn handle_accept(mut self, access_type: AccessType) -> Result<Option<GmmAction>> {
        self.log_message(">> Nas DeregistrationAcceptFromUe");
        self.stop_timer(TimerKind::T3522);

        let target = self
            .ue
            .deregistration_target
            .unwrap_or(access_type_target(access_type));
        for &target in targets(target) {
            if self.ue.is_connected(target) {
                self.release_ue_context(
                    target,
                    ReleaseAction::NwInitiatedDeregistration,
                    NasCause::Deregister,
                )
                .await?;
            }
        }
        Ok(Some(GmmAction::Event(GmmEvent::DeregistrationAccept, None)))
    }

    /// TS24.501, 5.5.2.3.  A registered UE with a signalling connection is asked to
    /// deregister.  Otherwise it is deregistered locally.
    pub async fn network_initiated(mut self, access_type: AccessType) -> Result<()> {
        info!(self.logger, "Network initiated deregistration on {access_type:?}");
        let registered = self.ue.state[access_type] == GmmState::Registered;

        if registered && self.ue.is_connected(access_type) {
            let target = access_type_target(access_type);
            self.ue.deregistration_target = Some(target);
            self.send_nas_with_timer(
                access_type,
                build::deregistration_request(target, true, None),
                TimerKind::T3522,
            )
            .await?;
            self.fire(access_type, GmmEvent::InitDeregistration, None)
                .await?;
        } else {
            self.ue.state[access_type] = GmmState::Deregistered;
        }

        self.release_pdu_sessions(
            |s| s.access_type == access_type,
            Some(SmCause::RelDueToUeDeregistration),
        )
        .await;
        if self.ue.deregistered_apart_from(access_type) {
            self.delete_am_policy().await;
        }

        if self.ue.state[access_type] != GmmState::Registered
            && self.ue.state[access_type] != GmmState::DeregistrationInitiated
        {
            if self.ue.is_connected(access_type) {
                self.release_ue_context(
                    access_type,
                    ReleaseAction::NwInitiatedDeregistration,
                    NasCause::Deregister,
                )
                .await?;
            } else if self.ue.fully_deregistered() {
                self.remove_ue();
            }
        }
        Ok(())
    }

    async fn delete_am_policy(&mut self) {
        let Some(policy) = self.ue.am_policy.take() else {
            return;
        };
        self.log_message("<< Pcf AmPolicyControlDelete");
        if let Err(e) = self
            .consumers()
            .pcf
            .delete_am_policy(&policy.association_id)
            .await
        {
            warn!(self.logger, "Failed to delete AM policy association - {e:#}");
        }
    }
}

fn access_type_target(access_type: AccessType) -> DeregistrationAccessType {
    match access_type {
        AccessType::ThreeGpp => DeregistrationAccessType::ThreeGpp,
        AccessType::NonThreeGpp => DeregistrationAccessType::NonThreeGpp,
    }
}

// Unless both access types are named, the sessions released are those on the access type the
// request arrived on, whichever one it names.  Its GMM state moves the same way.
fn session_released(
    target: DeregistrationAccessType,
    arrived_on: AccessType,
    session_access_type: AccessType,
) -> bool {
    target == DeregistrationAccessType::Both || session_access_type == arrived_on
}

fn targets(target: DeregistrationAccessType) -> &'static [AccessType] {
    match target {
        DeregistrationAccessType::ThreeGpp => &[AccessType::ThreeGpp],
        DeregistrationAccessType::NonThreeGpp => &[AccessType::NonThreeGpp],
        DeregistrationAccessType::Both => &AccessType::ALL,
    }
}
