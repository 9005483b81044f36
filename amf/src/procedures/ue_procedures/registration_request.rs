//! registration_request - cleartext checks on a Registration Request ahead of authentication

use super::UeProcedure;
use crate::HandlerApi;
use crate::data::{AccessType, Guti, OnGoing};
use crate::protocols::nas::parse::{MobileIdentity, mobile_identity};
use crate::protocols::nas::{
    GmmMessage, IdentityType, KSI_NO_KEY_AVAILABLE, NgKsi, RegistrationRequest, RegistrationType,
    Tsc, build, cause,
};
use crate::timer::TimerKind;
use anyhow::{Result, anyhow, bail};
use derive_deref::{Deref, DerefMut};
use slog::{debug, info, warn};

#[derive(Deref, DerefMut)]
pub struct RegistrationRequestProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> RegistrationRequestProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        RegistrationRequestProcedure(inner)
    }

    /// Take in a Registration Request.  On success the caller starts authentication.
    pub async fn run(mut self, access_type: AccessType, r: RegistrationRequest) -> Result<()> {
        self.log_message(">> Nas RegistrationRequest");
        let tai = self
            .ran_ue(access_type)?
            .tai
            .ok_or_else(|| anyhow!("No TAI for the RAN connection"))?;

        // TS24.501, 4.4.4.3: nothing in the request can be trusted, so do not give away the
        // current GUTI.
        if self.ue.security.mac_failed {
            self.reallocate_guti();
            self.ue.security.available = false;
        }

        self.ue.ongoing[access_type] = OnGoing::Registration;
        self.stop_timer(TimerKind::T3513);
        self.stop_timer(TimerKind::T3565);

        // TS24.501, 4.4.6: a UE with a security context sends the full message in the NAS
        // message container.
        let mut r = r;
        if let Some(container) = r.nas_message_container.take() {
            let GmmMessage::RegistrationRequest(inner) = *container else {
                bail!(
                    "Expected RegistrationRequest in NAS message container, got {}",
                    container.name()
                )
            };
            r = inner;
            self.ue.retransmission_of_initial_nas = self.ue.security.mac_failed;
        }

        let registration_type = match r.registration_type {
            RegistrationType::Emergency => bail!("Emergency registration is not supported"),
            RegistrationType::Reserved(x) => {
                debug!(self.logger, "Reserved registration type {x} - treat as initial");
                RegistrationType::Initial
            }
            t => t,
        };
        info!(self.logger, "Registration type {registration_type:?}");
        self.ue.registration_type = Some(registration_type);

        self.take_identity(&r.mobile_identity)?;
        self.ue.security.ngksi = native_ngksi(r.ngksi);

        let location = self.ue.ran_ue[access_type].as_ref().and_then(|r| r.location);
        if location != self.ue.location {
            self.ue.location = location;
            self.ue.location_changed = true;
        }
        self.ue.tai = Some(tai);

        let ue_security_capability = r.ue_security_capability;
        self.ue.registration_request = Some(r);

        if !self.config().in_supported_tai_list(&tai) {
            warn!(self.logger, "TAI {tai:?} is not served");
            self.send_nas(
                access_type,
                build::registration_reject(cause::TRACKING_AREA_NOT_ALLOWED, None),
            )
            .await?;
            bail!("Registration rejected - tracking area not allowed");
        }

        let Some(capability) = ue_security_capability else {
            self.send_nas(
                access_type,
                build::registration_reject(cause::PROTOCOL_ERROR_UNSPECIFIED, None),
            )
            .await?;
            bail!("Registration rejected - no UE security capability");
        };
        self.ue.security.ue_security_capability = Some(capability);
        Ok(())
    }

    fn take_identity(&mut self, ie: &[u8]) -> Result<()> {
        let identity = mobile_identity(ie)?;
        debug!(self.logger, "Registering with {}", identity.type_name());
        self.ue.registration_identity = match identity {
            MobileIdentity::NoIdentity => None,
            MobileIdentity::Suci { suci, plmn } => {
                self.ue.suci = Some(suci);
                self.ue.plmn = Some(plmn);
                Some(IdentityType::Suci)
            }
            MobileIdentity::Guti(guti) => {
                // A GUTI that resolved to this context is already ours.  Anything else was
                // assigned by another AMF or by us before a restart.
                if self.ue.guti != Some(guti) {
                    self.ue.old_guti = Some(guti);
                }
                self.ue.serving_amf_changed = guti.guami != self.config().guami;
                if self.ue.serving_amf_changed {
                    debug!(
                        self.logger,
                        "GUTI {guti} is from another AMF - context transfer not supported"
                    );
                }
                Some(IdentityType::Guti)
            }
            MobileIdentity::Imei(pei) => {
                self.ue.pei = Some(pei);
                Some(IdentityType::Imei)
            }
            MobileIdentity::Imeisv(pei) => {
                self.ue.pei = Some(pei);
                Some(IdentityType::Imeisv)
            }
            MobileIdentity::STmsi { .. } => bail!("5G-S-TMSI is not a registration identity"),
        };
        Ok(())
    }

    /// Replace the GUTI with one under a fresh TMSI.
    fn reallocate_guti(&mut self) {
        let ue_id = self.ue.ue_id;
        if let Some(old) = self.ue.guti.take() {
            self.free_tmsi(old.tmsi, ue_id);
            self.ue.old_guti = Some(old);
        }
        let tmsi = self.allocate_tmsi(ue_id);
        let guami = self.config().guami;
        self.ue.guti = Some(Guti { guami, tmsi });
        info!(self.logger, "Reallocated GUTI");
    }
}

// TS24.501, 9.11.3.32: only a native key set with a key available is kept.
fn native_ngksi(ngksi: NgKsi) -> NgKsi {
    if ngksi.tsc == Tsc::Native && ngksi.ksi != KSI_NO_KEY_AVAILABLE {
        ngksi
    } else {
        NgKsi {
            tsc: Tsc::Native,
            ksi: 0,
        }
    }
}
