//! gmm - per access type 5GMM state machine callbacks (TS24.501, 5.1.3.2)

use super::{
    AuthenticationProcedure, ConfigurationUpdateProcedure, DeregistrationProcedure,
    IdentityProcedure, NotificationProcedure, RegistrationProcedure, RegistrationRequestProcedure,
    SecurityModeProcedure, ServiceRequestProcedure, SessionRelayProcedure, UeProcedure,
};
use crate::HandlerApi;
use crate::data::{AccessType, GmmEvent, GmmState};
use crate::protocols::nas::{DeregistrationAccessType, GmmMessage, Status5gmm};
use crate::timer::TimerKind;
use anyhow::{Result, bail, ensure};
use slog::{debug, info, warn};

/// What a state callback asks to happen next.
#[derive(Debug)]
pub enum GmmAction {
    /// Fire an event, carrying the message (if any) that the next state should act on.
    Event(GmmEvent, Option<GmmMessage>),
    /// Handle a message in whatever state the access type is now in.
    Message(GmmMessage),
}

impl<A: HandlerApi> UeProcedure<'_, A> {
    pub async fn fire(
        &mut self,
        access_type: AccessType,
        event: GmmEvent,
        message: Option<GmmMessage>,
    ) -> Result<()> {
        self.run_gmm(access_type, GmmAction::Event(event, message))
            .await
    }

    pub async fn handle_gmm_message(
        &mut self,
        access_type: AccessType,
        message: GmmMessage,
    ) -> Result<()> {
        self.run_gmm(access_type, GmmAction::Message(message)).await
    }

    // Callbacks return the next action rather than firing events themselves, so one inbound
    // message runs to completion here without the state machine re-entering itself.
    async fn run_gmm(&mut self, access_type: AccessType, action: GmmAction) -> Result<()> {
        let mut next = Some(action);
        while let Some(action) = next.take() {
            if self.ue.removed {
                break;
            }
            next = match action {
                GmmAction::Event(event, message) => {
                    self.transition(access_type, event, message).await?
                }
                GmmAction::Message(message) => self.on_message(access_type, message).await?,
            };
        }
        Ok(())
    }

    async fn transition(
        &mut self,
        access_type: AccessType,
        event: GmmEvent,
        message: Option<GmmMessage>,
    ) -> Result<Option<GmmAction>> {
        let from = self.ue.state[access_type];
        let to = self.gmm_fsm().transition(from, event)?;
        debug!(
            self.logger,
            "{access_type:?} {from:?} --{event:?}--> {to:?}"
        );

        let after_event = self.on_event(from, access_type, event).await;
        if from == to {
            return Ok(after_event);
        }

        self.ue.state[access_type] = to;
        let after_entry = self.on_entry(to, access_type, message).await;
        self.on_exit(from);
        Ok(after_entry?.or(after_event))
    }

    async fn on_event(
        &mut self,
        state: GmmState,
        access_type: AccessType,
        event: GmmEvent,
    ) -> Option<GmmAction> {
        match (state, event) {
            (GmmState::Authentication, GmmEvent::AuthRestart) => {
                self.authenticate(access_type).await
            }
            (GmmState::Authentication, GmmEvent::AuthError) => {
                if let Err(e) = AuthenticationProcedure::new(self.reborrow())
                    .handle_error(access_type)
                    .await
                {
                    warn!(self.logger, "Failed to reject registration - {e:#}");
                }
                None
            }
            (GmmState::SecurityMode, GmmEvent::SecurityModeAbort) => {
                self.ue.security.available = false;
                self.stop_timer(TimerKind::T3560);
                None
            }
            (GmmState::DeregistrationInitiated, GmmEvent::DeregistrationAccept) => {
                self.ue.subscription_data_valid = false;
                if self.ue.deregistration_target.take() == Some(DeregistrationAccessType::Both) {
                    self.ue.state[access_type.other()] = GmmState::Deregistered;
                }
                None
            }
            _ => None,
        }
    }

    async fn on_entry(
        &mut self,
        state: GmmState,
        access_type: AccessType,
        message: Option<GmmMessage>,
    ) -> Result<Option<GmmAction>> {
        match state {
            GmmState::Deregistered => {
                self.ue.clear_registration_request_data(access_type);
                Ok(message.map(GmmAction::Message))
            }
            GmmState::Authentication => Ok(self.authenticate(access_type).await),
            GmmState::SecurityMode => {
                SecurityModeProcedure::new(self.reborrow())
                    .start(access_type)
                    .await
            }
            GmmState::ContextSetup => match message {
                Some(GmmMessage::RegistrationRequest(r)) => {
                    self.ue.registration_request = Some(r);
                    Ok(self.register(access_type).await)
                }
                Some(GmmMessage::ServiceRequest(r)) => {
                    ServiceRequestProcedure::new(self.reborrow())
                        .run(access_type, r)
                        .await?;
                    Ok(None)
                }
                Some(m) => bail!("UE state mismatch: {} on entry to ContextSetup", m.name()),
                None => bail!("Entered ContextSetup with no initial NAS message"),
            },
            GmmState::Registered => {
                self.ue.clear_registration_request_data(access_type);
                Ok(None)
            }
            GmmState::DeregistrationInitiated => match message {
                Some(GmmMessage::DeregistrationRequestFromUe(r)) => {
                    DeregistrationProcedure::new(self.reborrow())
                        .ue_originated(access_type, r)
                        .await
                }
                _ => Ok(None),
            },
        }
    }

    fn on_exit(&mut self, state: GmmState) {
        if state == GmmState::Authentication {
            self.ue.auth_ctx = None;
            self.ue.synch_failure_count = 0;
        }
    }

    async fn on_message(
        &mut self,
        access_type: AccessType,
        message: GmmMessage,
    ) -> Result<Option<GmmAction>> {
        let state = self.ue.state[access_type];
        match (state, message) {
            (
                GmmState::Deregistered | GmmState::Registered,
                GmmMessage::RegistrationRequest(r),
            ) => {
                RegistrationRequestProcedure::new(self.reborrow())
                    .run(access_type, r)
                    .await?;
                Ok(Some(GmmAction::Event(GmmEvent::StartAuth, None)))
            }
            (GmmState::Deregistered | GmmState::Registered, GmmMessage::ServiceRequest(r)) => {
                ServiceRequestProcedure::new(self.reborrow())
                    .run(access_type, r)
                    .await?;
                Ok(None)
            }
            (GmmState::Registered, GmmMessage::UlNasTransport(r)) => {
                SessionRelayProcedure::new(self.reborrow())
                    .run(access_type, r)
                    .await?;
                Ok(None)
            }
            (GmmState::Registered, GmmMessage::ConfigurationUpdateComplete) => {
                ConfigurationUpdateProcedure::new(self.reborrow()).handle_complete()?;
                Ok(None)
            }
            (GmmState::Registered, GmmMessage::NotificationResponse(r)) => {
                NotificationProcedure::new(self.reborrow())
                    .handle_response(access_type, r)
                    .await?;
                Ok(None)
            }
            (GmmState::Registered, m @ GmmMessage::DeregistrationRequestFromUe(_)) => Ok(Some(
                GmmAction::Event(GmmEvent::InitDeregistration, Some(m)),
            )),
            (GmmState::Authentication, GmmMessage::IdentityResponse(r)) => {
                if let Err(e) = IdentityProcedure::new(self.reborrow()).handle_response(r) {
                    warn!(self.logger, "Bad identity response - {e:#}");
                }
                Ok(Some(GmmAction::Event(GmmEvent::AuthRestart, None)))
            }
            (GmmState::Authentication, GmmMessage::AuthenticationResponse(r)) => {
                AuthenticationProcedure::new(self.reborrow())
                    .handle_response(access_type, r)
                    .await
            }
            (GmmState::Authentication, GmmMessage::AuthenticationFailure(r)) => {
                AuthenticationProcedure::new(self.reborrow())
                    .handle_failure(access_type, r)
                    .await
            }
            (GmmState::SecurityMode, GmmMessage::SecurityModeComplete(r)) => {
                SecurityModeProcedure::new(self.reborrow())
                    .handle_complete(access_type, r)
                    .await
            }
            (GmmState::SecurityMode, GmmMessage::SecurityModeReject(r)) => {
                if let Err(e) = SecurityModeProcedure::new(self.reborrow())
                    .handle_reject(access_type, r)
                    .await
                {
                    warn!(self.logger, "Error handling security mode reject - {e:#}");
                }
                Ok(Some(GmmAction::Event(GmmEvent::SecurityModeFail, None)))
            }
            (GmmState::SecurityMode, m @ GmmMessage::RegistrationRequest(_)) => {
                // The UE has restarted registration.  Abandon security mode and start over.
                Ok(Some(GmmAction::Event(GmmEvent::SecurityModeAbort, Some(m))))
            }
            (GmmState::ContextSetup, GmmMessage::IdentityResponse(r)) => {
                if let Err(e) = IdentityProcedure::new(self.reborrow()).handle_response(r) {
                    warn!(self.logger, "Bad identity response - {e:#}");
                }
                Ok(self.register(access_type).await)
            }
            (GmmState::ContextSetup, GmmMessage::RegistrationComplete(r)) => {
                RegistrationProcedure::new(self.reborrow())
                    .handle_complete(access_type, r)
                    .await
            }
            (GmmState::ContextSetup, m @ GmmMessage::RegistrationRequest(_)) => Ok(Some(
                GmmAction::Event(GmmEvent::ContextSetupFail, Some(m)),
            )),
            (GmmState::DeregistrationInitiated, GmmMessage::DeregistrationAcceptFromUe) => {
                DeregistrationProcedure::new(self.reborrow())
                    .handle_accept(access_type)
                    .await
            }
            (_, GmmMessage::Status5gmm(r)) => {
                self.handle_status_5gmm(r)?;
                Ok(None)
            }
            (GmmState::Authentication, m) => {
                warn!(
                    self.logger,
                    "UE state mismatch: {} in Authentication",
                    m.name()
                );
                Ok(Some(GmmAction::Event(GmmEvent::AuthFail, None)))
            }
            (GmmState::SecurityMode, m) => {
                warn!(self.logger, "UE state mismatch: {} in SecurityMode", m.name());
                Ok(Some(GmmAction::Event(GmmEvent::SecurityModeFail, None)))
            }
            (state, m) => bail!("UE state mismatch: {} in {state:?}", m.name()),
        }
    }

    /// Run the authentication procedure.  An error becomes AuthError.
    async fn authenticate(&mut self, access_type: AccessType) -> Option<GmmAction> {
        match AuthenticationProcedure::new(self.reborrow())
            .start(access_type)
            .await
        {
            Ok(next) => next,
            Err(e) => {
                warn!(self.logger, "Authentication procedure failed - {e:#}");
                Some(GmmAction::Event(GmmEvent::AuthError, None))
            }
        }
    }

    /// Run registration for the stored registration type.  An error aborts context setup.
    async fn register(&mut self, access_type: AccessType) -> Option<GmmAction> {
        match RegistrationProcedure::new(self.reborrow())
            .run(access_type)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(self.logger, "Registration failed - {e:#}");
                Some(GmmAction::Event(GmmEvent::ContextSetupFail, None))
            }
        }
    }

    fn handle_status_5gmm(&self, r: Status5gmm) -> Result<()> {
        self.log_message(">> Nas Status5gmm");
        ensure!(
            !self.ue.security.mac_failed,
            "NAS message integrity check failed"
        );
        info!(self.logger, "UE reported 5GMM status cause {:#04x}", r.cause);
        Ok(())
    }
}
