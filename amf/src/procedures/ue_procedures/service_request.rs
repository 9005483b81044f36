//! service_request - UE triggered service request (TS24.501, 5.6.1)

use super::UeProcedure;
use crate::HandlerApi;
use crate::data::{AccessType, GmmState, OnGoing, ReleaseAction};
use crate::protocols::nas::{
    GmmMessage, PduSessionResults, ServiceRequest, ServiceType, build, cause,
};
use crate::protocols::ngap::{NasCause, NgapMessage, PduSessionResourceItem};
use crate::timer::TimerKind;
use anyhow::{Result, bail};
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};

#[derive(Deref, DerefMut)]
pub struct ServiceRequestProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> ServiceRequestProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        ServiceRequestProcedure(inner)
    }

    pub async fn run(mut self, access_type: AccessType, r: ServiceRequest) -> Result<()> {
        self.log_message(">> Nas ServiceRequest");
        self.stop_timer(TimerKind::T3513);
        self.stop_timer(TimerKind::T3565);
        if self.ue.ongoing[access_type] == OnGoing::Paging {
            self.ue.ongoing[access_type] = OnGoing::Nothing;
        }

        // TS24.501, 5.6.1.5: a UE we hold no usable context for must register again.
        if !self.ue.security.is_valid() || self.ue.state[access_type] == GmmState::Deregistered {
            info!(self.logger, "No security context or not registered - reject");
            return self
                .reject_and_release(access_type, cause::UE_IDENTITY_CANNOT_BE_DERIVED)
                .await;
        }

        let mut r = r;
        if let Some(container) = r.nas_message_container.take() {
            let GmmMessage::ServiceRequest(inner) = *container else {
                bail!(
                    "Expected ServiceRequest in NAS message container, got {}",
                    container.name()
                )
            };
            r = inner;
            self.ue.retransmission_of_initial_nas = self.ue.security.mac_failed;
        }

        if self.ue.security.mac_failed {
            warn!(self.logger, "Service request failed integrity check - reject");
            self.ue.security.available = false;
            return self
                .reject_and_release(access_type, cause::UE_IDENTITY_CANNOT_BE_DERIVED)
                .await;
        }

        info!(self.logger, "Service type {:?}", r.service_type);
        if r.service_type == ServiceType::Signalling {
            return self
                .send_service_accept(access_type, PduSessionResults::default(), vec![])
                .await;
        }

        let mut results = PduSessionResults::default();
        let mut sessions = Vec::new();
        if let Some(uplink_data_status) = r.uplink_data_status {
            sessions = self
                .reactivate_pdu_sessions(access_type, uplink_data_status, &mut results)
                .await;
        }
        if let Some(status) = r.pdu_session_status {
            results.pdu_session_status =
                Some(self.reconcile_pdu_session_status(access_type, status).await);
        }

        match r.service_type {
            ServiceType::Data if !self.in_allowed_service_area(access_type) => {
                warn!(self.logger, "Data service outside the allowed service area");
                let status = results.pdu_session_status;
                self.send_nas(
                    access_type,
                    build::service_reject(cause::RESTRICTED_SERVICE_AREA, status),
                )
                .await?;
                Ok(())
            }
            // Without downlink data buffering, a paged UE coming back only needs its
            // signalling connection.
            ServiceType::Data | ServiceType::MobileTerminatedServices => {
                self.send_service_accept(access_type, results, sessions)
                    .await
            }
            other => bail!("Service type {other:?} not supported"),
        }
    }

    async fn reject_and_release(&mut self, access_type: AccessType, cause: u8) -> Result<()> {
        self.send_nas(access_type, build::service_reject(cause, None))
            .await?;
        self.release_ue_context(
            access_type,
            ReleaseAction::N2NormalRelease,
            NasCause::NormalRelease,
        )
        .await
    }

    /// Service Accept goes in an Initial Context Setup Request if the RAN asked for the UE
    /// context in its Initial UE Message (TS23.502, 4.2.3.2 step 12).  Otherwise it goes
    /// in a PDU Session Resource Setup Request when sessions are reactivated, or on its own.
    async fn send_service_accept(
        &mut self,
        access_type: AccessType,
        results: PduSessionResults,
        sessions: Vec<PduSessionResourceItem>,
    ) -> Result<()> {
        let ue_context_request = self.ran_ue(access_type)?.ue_context_request;
        if ue_context_request {
            self.ue.security.update_for_access(access_type);
            let pdu = self.protect(build::service_accept(results));
            return self
                .send_initial_context_setup(access_type, Some(pdu), sessions)
                .await;
        }

        let pdu = self.protect(build::service_accept(results));
        let message = if sessions.is_empty() {
            NgapMessage::DownlinkNasTransport(pdu)
        } else {
            NgapMessage::PduSessionResourceSetupRequest {
                nas: Some(pdu),
                sessions,
            }
        };
        self.send_ngap(access_type, message).await
    }
}
