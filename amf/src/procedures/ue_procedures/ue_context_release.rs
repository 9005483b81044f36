//! ue_context_release - NGAP responses that change what the RAN holds for the UE

use super::UeProcedure;
use crate::HandlerApi;
use crate::data::{AccessType, ReleaseAction};
use crate::protocols::ngap::NgapMessage;
use crate::timer::TimerKind;
use anyhow::Result;
use derive_deref::{Deref, DerefMut};
use slog::{debug, info};

#[derive(Deref, DerefMut)]
pub struct UeContextReleaseProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> UeContextReleaseProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        UeContextReleaseProcedure(ue_procedure)
    }

    /// The RAN has released its side of the UE context.
    pub fn release_complete(mut self, access_type: AccessType) {
        self.log_message(">> Ngap UeContextReleaseComplete");
        let Some(ran_ue) = self.ue.ran_ue[access_type].take() else {
            debug!(self.logger, "No RAN connection on {access_type:?} to release");
            return;
        };
        info!(
            self.logger,
            "Released RAN connection on {access_type:?}, action {:?}", ran_ue.release_action
        );

        let remove = match ran_ue.release_action {
            Some(ReleaseAction::NwInitiatedDeregistration | ReleaseAction::ReleaseUeContext) => {
                true
            }
            Some(ReleaseAction::N2NormalRelease) | None => {
                self.ue.fully_deregistered()
                    && AccessType::ALL.iter().all(|a| !self.ue.is_connected(*a))
            }
        };
        if remove {
            self.remove_ue();
        }
    }

    /// TS23.502, 4.12.2.2 step 13: over non-3GPP access the Registration Accept waits for the
    /// N3IWF to set up the UE context.
    pub async fn initial_context_setup_response(mut self, access_type: AccessType) -> Result<()> {
        self.log_message(">> Ngap InitialContextSetupResponse");
        if let Some(ran_ue) = self.ue.ran_ue[access_type].as_mut() {
            ran_ue.recvd_initial_context_setup_response = true;
        }
        if access_type != AccessType::NonThreeGpp {
            return Ok(());
        }
        let Some(pdu) = self.ue.registration_accept_for_non3gpp.take() else {
            return Ok(());
        };
        self.log_message(&format!("<< Nas {}", pdu.message.name()));
        self.send_ngap(access_type, NgapMessage::DownlinkNasTransport(pdu.clone()))
            .await?;
        self.start_timer(TimerKind::T3550, access_type, Some(pdu));
        Ok(())
    }
}
