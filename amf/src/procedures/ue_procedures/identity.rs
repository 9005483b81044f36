use super::UeProcedure;
use crate::HandlerApi;
use crate::data::Guti;
use crate::protocols::nas::IdentityResponse;
use crate::protocols::nas::parse::{MobileIdentity, mobile_identity};
use anyhow::{Result, bail, ensure};
use derive_deref::{Deref, DerefMut};
use slog::info;

#[derive(Deref, DerefMut)]
pub struct IdentityProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> IdentityProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        IdentityProcedure(inner)
    }

    /// Record the identity the UE gave.  Only a SUCI is accepted without integrity protection.
    pub fn handle_response(mut self, r: IdentityResponse) -> Result<()> {
        self.log_message(">> Nas IdentityResponse");
        let identity = mobile_identity(&r.mobile_identity)?;
        info!(self.logger, "UE identity type {}", identity.type_name());

        if let MobileIdentity::Suci { suci, plmn } = identity {
            self.ue.suci = Some(suci);
            self.ue.plmn = Some(plmn);
            return Ok(());
        }

        ensure!(
            !self.ue.security.mac_failed,
            "NAS message integrity check failed"
        );
        match identity {
            MobileIdentity::Guti(guti) => self.ue.guti = Some(guti),
            MobileIdentity::STmsi { tmsi, .. } => {
                // The GUAMI is ours, since the UE is talking to us.
                let guami = self.config().guami;
                self.ue.guti = Some(Guti { guami, tmsi });
            }
            MobileIdentity::Imei(pei) | MobileIdentity::Imeisv(pei) => self.ue.pei = Some(pei),
            other => bail!("Unusable identity {}", other.type_name()),
        }
        Ok(())
    }
}
