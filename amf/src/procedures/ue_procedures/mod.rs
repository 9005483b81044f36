mod authentication;
mod configuration_update;
mod deregistration;
mod gmm;
mod identity;
mod notification;
mod registration;
mod registration_request;
mod security_mode;
mod service_request;
mod session_relay;
mod sm_contexts;
mod timers;
mod ue_context_release;
mod ue_message_handler;
mod uplink_nas;

pub use authentication::AuthenticationProcedure;
pub use configuration_update::ConfigurationUpdateProcedure;
pub use deregistration::DeregistrationProcedure;
pub use gmm::GmmAction;
pub use identity::IdentityProcedure;
pub use notification::NotificationProcedure;
pub use registration::RegistrationProcedure;
pub use registration_request::RegistrationRequestProcedure;
pub use security_mode::SecurityModeProcedure;
pub use service_request::ServiceRequestProcedure;
pub use session_relay::{NotImplemented, SessionRelayProcedure};
pub use timers::TimerProcedure;
pub use ue_context_release::UeContextReleaseProcedure;
pub use ue_message_handler::UeMessageHandler;
pub use uplink_nas::UplinkNasProcedure;

use crate::HandlerApi;
use crate::data::{AccessType, AmfUe, RanUe, ReleaseAction};
use crate::protocols::nas::{DownlinkNasPdu, GmmMessage};
use crate::protocols::ngap::{
    InitialContextSetupRequest, NasCause, NgapMessage, NgapPdu, PduSessionResourceItem,
};
use crate::timer::TimerKind;
use anyhow::{Result, anyhow};
use slog::{Logger, debug, info};

/// One UE's context together with the AMF-wide services a procedure runs against.
pub struct UeProcedure<'a, A: HandlerApi> {
    api: &'a A,
    logger: &'a Logger,
    ue: &'a mut AmfUe,
}

impl<A: HandlerApi> std::ops::Deref for UeProcedure<'_, A> {
    type Target = A;

    fn deref(&self) -> &Self::Target {
        self.api
    }
}

impl<'a, A: HandlerApi> UeProcedure<'a, A> {
    pub fn new(api: &'a A, ue: &'a mut AmfUe, logger: &'a Logger) -> Self {
        UeProcedure { api, logger, ue }
    }

    /// A shorter-lived procedure on the same UE, for handing to a sub-procedure.
    fn reborrow(&mut self) -> UeProcedure<'_, A> {
        UeProcedure {
            api: self.api,
            logger: self.logger,
            ue: &mut *self.ue,
        }
    }

    pub fn log_message(&self, s: &str) {
        debug!(self.logger, "{}", s)
    }

    fn ran_ue(&self, access_type: AccessType) -> Result<&RanUe> {
        self.ue.ran_ue[access_type]
            .as_ref()
            .ok_or_else(|| anyhow!("No RAN connection on {access_type:?}"))
    }

    async fn send_ngap(&self, access_type: AccessType, message: NgapMessage) -> Result<()> {
        let pdu = NgapPdu::new(self.ran_ue(access_type)?, message);
        self.log_message(&format!("<< Ngap {}", pdu.message.name()));
        self.api.ngap_send(pdu, self.logger).await
    }

    /// Apply the security header to a 5GMM message.  The caller decides how it is carried.
    fn protect(&mut self, message: GmmMessage) -> DownlinkNasPdu {
        self.log_message(&format!("<< Nas {}", message.name()));
        self.ue.security.protect(message)
    }

    /// Send a 5GMM message in a Downlink NAS Transport.  Returns the PDU so that it can be
    /// retransmitted.
    async fn send_nas(
        &mut self,
        access_type: AccessType,
        message: GmmMessage,
    ) -> Result<DownlinkNasPdu> {
        // Fail before the DL COUNT moves.
        self.ran_ue(access_type)?;
        let pdu = self.protect(message);
        self.send_ngap(access_type, NgapMessage::DownlinkNasTransport(pdu.clone()))
            .await?;
        Ok(pdu)
    }

    /// Send a 5GMM message and guard it with a retransmission timer.
    async fn send_nas_with_timer(
        &mut self,
        access_type: AccessType,
        message: GmmMessage,
        kind: TimerKind,
    ) -> Result<()> {
        let pdu = self.send_nas(access_type, message).await?;
        self.start_timer(kind, access_type, Some(pdu));
        Ok(())
    }

    fn start_timer(&mut self, kind: TimerKind, access_type: AccessType, pdu: Option<DownlinkNasPdu>) {
        let config = kind.config(self.api.config());
        let ue_id = self.ue.ue_id;
        debug!(self.logger, "Start {kind:?}");
        self.ue
            .timers
            .start(self.api, ue_id, kind, access_type, pdu, config);
    }

    fn stop_timer(&mut self, kind: TimerKind) {
        if self.ue.timers.stop(kind) {
            debug!(self.logger, "Stop {kind:?}");
        }
    }

    /// Send an Initial Context Setup Request, optionally carrying a NAS PDU.
    async fn send_initial_context_setup(
        &self,
        access_type: AccessType,
        nas: Option<DownlinkNasPdu>,
        pdu_sessions: Vec<PduSessionResourceItem>,
    ) -> Result<()> {
        let guami = self.api.config().guami;
        let request =
            InitialContextSetupRequest::new(&*self.ue, access_type, guami, nas, pdu_sessions);
        self.send_ngap(
            access_type,
            NgapMessage::InitialContextSetupRequest(Box::new(request)),
        )
        .await
    }

    /// Ask the RAN to release the UE context, noting what to do once it confirms.
    async fn release_ue_context(
        &mut self,
        access_type: AccessType,
        action: ReleaseAction,
        cause: NasCause,
    ) -> Result<()> {
        let ran_ue = self.ue.ran_ue[access_type]
            .as_mut()
            .ok_or_else(|| anyhow!("No RAN connection on {access_type:?} to release"))?;
        ran_ue.release_action = Some(action);
        self.send_ngap(access_type, NgapMessage::UeContextReleaseCommand(cause))
            .await
    }

    /// Remove the UE context.  Its task exits once the current message is processed.
    fn remove_ue(&mut self) {
        info!(self.logger, "Remove UE context");
        self.ue.timers.stop_all();
        self.ue.removed = true;
    }
}
