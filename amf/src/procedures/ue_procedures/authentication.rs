//! authentication - primary authentication by 5G AKA or EAP-AKA' (TS33.501, 6.1.3)

use super::{GmmAction, UeProcedure};
use crate::HandlerApi;
use crate::consumers::{AuthResult, AuthType, ResynchronizationInfo, UeAuthenticationCtx};
use crate::data::{AccessType, GmmEvent};
use crate::protocols::nas::{
    AuthenticationFailure, AuthenticationResponse, IdentityType, build, cause,
};
use crate::timer::TimerKind;
use anyhow::{Result, anyhow, bail};
use derive_deref::{Deref, DerefMut};
use slog::{debug, info, warn};

// A second consecutive synch failure ends the procedure (TS33.501, 6.1.3.3.2).
const MAX_SYNCH_FAILURES: u32 = 2;

#[derive(Deref, DerefMut)]
pub struct AuthenticationProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> AuthenticationProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        AuthenticationProcedure(inner)
    }

    /// Authenticate the UE unless it already has a valid security context.  The UE is asked
    /// for its SUCI if it has not identified itself.
    pub async fn start(mut self, access_type: AccessType) -> Result<Option<GmmAction>> {
        if self.ue.security.is_valid() {
            debug!(self.logger, "Security context is valid - skip authentication");
            return Ok(Some(GmmAction::Event(GmmEvent::AuthSuccess, None)));
        }

        let Some(identity) = self.ue.supi_or_suci().map(str::to_owned) else {
            // The Identity Response restarts authentication.
            self.send_nas(access_type, build::identity_request(IdentityType::Suci))
                .await?;
            return Ok(None);
        };

        let serving_network_name = self.config().serving_network_name.clone();
        self.log_message("<< Ausf UeAuthenticationsPost");
        let auth_ctx = self
            .consumers()
            .ausf
            .authenticate(&identity, &serving_network_name, None)
            .await?;
        self.log_message(">> Ausf UeAuthenticationCtx");
        self.begin(access_type, auth_ctx).await?;
        Ok(None)
    }

    async fn begin(&mut self, access_type: AccessType, auth_ctx: UeAuthenticationCtx) -> Result<()> {
        self.ue.auth_ctx = Some(auth_ctx);
        self.ue.security.abba = [0x00, 0x00];
        self.send_authentication_request(access_type).await
    }

    async fn send_authentication_request(&mut self, access_type: AccessType) -> Result<()> {
        let auth_ctx = self
            .ue
            .auth_ctx
            .as_ref()
            .ok_or_else(|| anyhow!("No authentication in progress"))?;
        let message = build::authentication_request(
            self.ue.security.ngksi,
            self.ue.security.abba,
            auth_ctx.av_5g_aka.as_ref(),
            auth_ctx.eap_payload.clone(),
        );
        self.send_nas_with_timer(access_type, message, TimerKind::T3560)
            .await
    }

    pub async fn handle_response(
        mut self,
        access_type: AccessType,
        r: AuthenticationResponse,
    ) -> Result<Option<GmmAction>> {
        self.log_message(">> Nas AuthenticationResponse");
        self.stop_timer(TimerKind::T3560);
        let Some(auth_ctx) = self.ue.auth_ctx.clone() else {
            bail!("Authentication Response with no authentication in progress")
        };
        match auth_ctx.auth_type {
            AuthType::FiveGAka => self.confirm_5g_aka(access_type, &auth_ctx, r).await,
            AuthType::EapAkaPrime => self.confirm_eap(access_type, &auth_ctx, r).await,
        }
    }

    async fn confirm_5g_aka(
        &mut self,
        access_type: AccessType,
        auth_ctx: &UeAuthenticationCtx,
        r: AuthenticationResponse,
    ) -> Result<Option<GmmAction>> {
        let Some(av) = &auth_ctx.av_5g_aka else {
            bail!("5G AKA context has no authentication vector")
        };
        let Some(res_star) = r.res_star else {
            bail!("Authentication Response has no RES*")
        };

        // TS33.501, 6.1.3.2 step 10
        let hres_star = hex::encode(security::hres_star(&av.rand, &res_star));
        if !hres_star.eq_ignore_ascii_case(&av.hxres_star) {
            warn!(
                self.logger,
                "HRES* {hres_star} does not match HXRES* {}", av.hxres_star
            );
            return self.authentication_failed(access_type, None).await;
        }

        self.log_message("<< Ausf 5gAkaConfirmation");
        let confirmation = self
            .consumers()
            .ausf
            .confirm_5g_aka(auth_ctx, &res_star)
            .await?;
        self.log_message(">> Ausf ConfirmationDataResponse");

        match (confirmation.auth_result, confirmation.kseaf, confirmation.supi) {
            (AuthResult::Success, Some(kseaf), Some(supi)) => {
                self.authenticated(&supi, &kseaf)?;
                Ok(Some(GmmAction::Event(GmmEvent::AuthSuccess, None)))
            }
            (AuthResult::Success, _, _) => bail!("AUSF confirmed 5G AKA without Kseaf and SUPI"),
            (result, _, _) => {
                info!(self.logger, "AUSF gave 5G AKA result {result:?}");
                self.authentication_failed(access_type, None).await
            }
        }
    }

    async fn confirm_eap(
        &mut self,
        access_type: AccessType,
        auth_ctx: &UeAuthenticationCtx,
        r: AuthenticationResponse,
    ) -> Result<Option<GmmAction>> {
        let Some(eap_message) = r.eap_message else {
            bail!("Authentication Response has no EAP message")
        };

        self.log_message("<< Ausf EapSession");
        let session = self
            .consumers()
            .ausf
            .confirm_eap(auth_ctx, &eap_message)
            .await?;
        self.log_message(">> Ausf EapSession");

        match session.auth_result {
            AuthResult::Success => {
                let (Some(kseaf), Some(supi)) = (session.kseaf, session.supi) else {
                    bail!("AUSF confirmed EAP-AKA' without Kseaf and SUPI")
                };
                self.authenticated(&supi, &kseaf)?;
                // EAP-Success goes to the UE in the Security Mode Command.
                self.ue.eap_success = session.eap_payload;
                Ok(Some(GmmAction::Event(GmmEvent::AuthSuccess, None)))
            }
            AuthResult::Failure => {
                self.authentication_failed(access_type, session.eap_payload)
                    .await
            }
            AuthResult::Ongoing => {
                if let Some(auth_ctx) = &mut self.ue.auth_ctx {
                    auth_ctx.eap_payload = session.eap_payload;
                }
                self.send_authentication_request(access_type).await?;
                Ok(None)
            }
        }
    }

    fn authenticated(&mut self, supi: &str, kseaf: &[u8; 32]) -> Result<()> {
        info!(self.logger, "Authenticated {supi}");
        self.ue.security.derive_kamf(kseaf, supi)?;
        self.ue.supi = Some(supi.to_string());
        let ue_id = self.ue.ue_id;
        self.register_supi(supi, ue_id);
        Ok(())
    }

    // A UE that identified itself by 5G-GUTI may have been mistaken for another UE, so ask for
    // its SUCI.  Otherwise reject it.
    async fn authentication_failed(
        &mut self,
        access_type: AccessType,
        eap_message: Option<Vec<u8>>,
    ) -> Result<Option<GmmAction>> {
        if self.ue.registration_identity == Some(IdentityType::Guti) {
            if let Some(eap_message) = eap_message {
                let message = build::authentication_result(
                    self.ue.security.ngksi,
                    eap_message,
                    self.ue.security.abba,
                );
                self.send_nas(access_type, message).await?;
            }
            self.send_nas(access_type, build::identity_request(IdentityType::Suci))
                .await?;
            Ok(None)
        } else {
            self.send_nas(access_type, build::authentication_reject(eap_message))
                .await?;
            Ok(Some(GmmAction::Event(GmmEvent::AuthFail, None)))
        }
    }

    pub async fn handle_failure(
        mut self,
        access_type: AccessType,
        r: AuthenticationFailure,
    ) -> Result<Option<GmmAction>> {
        self.log_message(">> Nas AuthenticationFailure");
        self.stop_timer(TimerKind::T3560);
        let Some(auth_ctx) = self.ue.auth_ctx.clone() else {
            bail!("Authentication Failure with no authentication in progress")
        };

        match (auth_ctx.auth_type, r.cause) {
            (AuthType::FiveGAka, cause::MAC_FAILURE | cause::NON_5G_AUTHENTICATION_UNACCEPTABLE) => {
                warn!(self.logger, "Authentication failure cause {:#04x}", r.cause);
                self.send_nas(access_type, build::authentication_reject(None))
                    .await?;
                Ok(Some(GmmAction::Event(GmmEvent::AuthFail, None)))
            }
            (_, cause::NGKSI_ALREADY_IN_USE) => {
                self.ue.synch_failure_count = 0;
                self.ue.security.ngksi.rotate();
                info!(
                    self.logger,
                    "ngKSI already in use - retry with KSI {}", self.ue.security.ngksi.ksi
                );
                self.send_authentication_request(access_type).await?;
                Ok(None)
            }
            (AuthType::FiveGAka, cause::SYNCH_FAILURE) => {
                self.ue.synch_failure_count += 1;
                if self.ue.synch_failure_count >= MAX_SYNCH_FAILURES {
                    warn!(self.logger, "2 consecutive synch failures - reject");
                    self.send_nas(access_type, build::authentication_reject(None))
                        .await?;
                    return Ok(Some(GmmAction::Event(GmmEvent::AuthFail, None)));
                }
                self.resynchronize(access_type, &auth_ctx, r.auts).await?;
                Ok(None)
            }
            (auth_type, other) => {
                warn!(
                    self.logger,
                    "Ignore authentication failure cause {other:#04x} for {auth_type:?}"
                );
                Ok(None)
            }
        }
    }

    async fn resynchronize(
        &mut self,
        access_type: AccessType,
        auth_ctx: &UeAuthenticationCtx,
        auts: Option<Vec<u8>>,
    ) -> Result<()> {
        let Some(auts) = auts else {
            bail!("Synch failure without AUTS")
        };
        let Some(av) = &auth_ctx.av_5g_aka else {
            bail!("5G AKA context has no authentication vector")
        };
        let Some(identity) = self.ue.supi_or_suci().map(str::to_owned) else {
            bail!("No identity to resynchronize")
        };
        let resynchronization_info = ResynchronizationInfo { rand: av.rand, auts };
        let serving_network_name = self.config().serving_network_name.clone();

        self.log_message("<< Ausf UeAuthenticationsPost (resynchronization)");
        let auth_ctx = self
            .consumers()
            .ausf
            .authenticate(&identity, &serving_network_name, Some(resynchronization_info))
            .await?;
        self.log_message(">> Ausf UeAuthenticationCtx");
        self.begin(access_type, auth_ctx).await
    }

    /// Authentication could not be run.  Reject the registration that prompted it.
    pub async fn handle_error(mut self, access_type: AccessType) -> Result<()> {
        if self.ue.registration_request.is_some() {
            self.send_nas(
                access_type,
                build::registration_reject(cause::UE_IDENTITY_CANNOT_BE_DERIVED, None),
            )
            .await?;
        }
        Ok(())
    }
}
