//! security_mode - NAS security mode control (TS24.501, 5.4.2)

use super::{GmmAction, UeProcedure};
use crate::HandlerApi;
use crate::data::{AccessType, GmmEvent, ReleaseAction};
use crate::protocols::nas::parse::{MobileIdentity, mobile_identity};
use crate::protocols::nas::{GmmMessage, SecurityModeComplete, SecurityModeReject, build};
use crate::protocols::ngap::NasCause;
use crate::timer::TimerKind;
use anyhow::{Result, bail, ensure};
use derive_deref::{Deref, DerefMut};
use slog::{debug, info, warn};

#[derive(Deref, DerefMut)]
pub struct SecurityModeProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> SecurityModeProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        SecurityModeProcedure(inner)
    }

    fn stored_registration_request(&self) -> Option<GmmMessage> {
        self.ue
            .registration_request
            .clone()
            .map(GmmMessage::RegistrationRequest)
    }

    pub async fn start(mut self, access_type: AccessType) -> Result<Option<GmmAction>> {
        if self.ue.security.is_valid() {
            debug!(self.logger, "Security context is valid - skip security mode control");
            let message = self.stored_registration_request();
            return Ok(Some(GmmAction::Event(GmmEvent::SecurityModeSuccess, message)));
        }

        let api = self.api;
        let algorithms = &api.config().security_algorithm;
        self.ue
            .security
            .select_algorithms(&algorithms.integrity_order, &algorithms.ciphering_order);
        self.ue.security.derive_algorithm_keys();
        info!(
            self.logger,
            "Selected NIA{} and NEA{}",
            self.ue.security.integrity_algorithm,
            self.ue.security.ciphering_algorithm
        );

        if self.ue.security.is_null_security() {
            let message = self.stored_registration_request();
            return Ok(Some(GmmAction::Event(GmmEvent::SecuritySkip, message)));
        }

        let eap_success = self.ue.eap_success.take();
        let message = build::security_mode_command(&*self.ue, eap_success);
        self.send_nas_with_timer(access_type, message, TimerKind::T3560)
            .await?;
        Ok(None)
    }

    pub async fn handle_complete(
        mut self,
        access_type: AccessType,
        r: SecurityModeComplete,
    ) -> Result<Option<GmmAction>> {
        self.log_message(">> Nas SecurityModeComplete");
        ensure!(
            !self.ue.security.mac_failed,
            "NAS message integrity check failed"
        );
        self.stop_timer(TimerKind::T3560);

        if self.ue.security.is_valid() {
            self.ue.security.update_for_access(access_type);
        }

        if let Some(imeisv) = r.imeisv {
            match mobile_identity(&imeisv) {
                Ok(MobileIdentity::Imeisv(pei)) => self.ue.pei = Some(pei),
                Ok(other) => warn!(self.logger, "Expected IMEISV, got {}", other.type_name()),
                Err(e) => warn!(self.logger, "Bad IMEISV - {e}"),
            }
        }

        // TS24.501, 4.4.6: the complete initial NAS message, if the first one could not be
        // trusted.
        let message = match r.nas_message_container.map(|m| *m) {
            Some(
                m @ (GmmMessage::RegistrationRequest(_) | GmmMessage::ServiceRequest(_)),
            ) => Some(m),
            Some(m) => bail!("Unexpected {} in NAS message container", m.name()),
            None => self.stored_registration_request(),
        };
        Ok(Some(GmmAction::Event(
            GmmEvent::SecurityModeSuccess,
            message,
        )))
    }

    pub async fn handle_reject(
        mut self,
        access_type: AccessType,
        r: SecurityModeReject,
    ) -> Result<()> {
        self.log_message(">> Nas SecurityModeReject");
        self.stop_timer(TimerKind::T3560);
        warn!(self.logger, "UE rejected security mode with cause {:#04x}", r.cause);
        self.ue.security.available = false;
        self.release_ue_context(
            access_type,
            ReleaseAction::ReleaseUeContext,
            NasCause::NormalRelease,
        )
        .await
    }
}
