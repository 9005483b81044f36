//! uplink_nas - integrity gate and dispatch of an uplink 5GMM message

use super::UeProcedure;
use crate::HandlerApi;
use crate::data::{RanUe, allowed_without_integrity};
use crate::protocols::nas::UplinkNasPdu;
use anyhow::Result;
use derive_deref::{Deref, DerefMut};
use slog::{debug, warn};

#[derive(Deref, DerefMut)]
pub struct UplinkNasProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> UplinkNasProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        UplinkNasProcedure(ue_procedure)
    }

    /// `initial` is set for NAS that arrived in an Initial UE Message, which starts a new
    /// signalling connection on its access type.
    pub async fn run(mut self, ran_ue: RanUe, nas: UplinkNasPdu, initial: bool) -> Result<()> {
        let access_type = ran_ue.access_type;
        self.attach_ran_ue(ran_ue, initial);

        if let Err(e) = self
            .ue
            .security
            .check_uplink(nas.security.as_ref(), access_type)
        {
            warn!(self.logger, "Dropping {} - {e:#}", nas.message.name());
            return Ok(());
        }

        // TS24.501, 4.4.4.3: everything else must pass the integrity check.
        if self.ue.security.mac_failed && !allowed_without_integrity(&nas.message) {
            warn!(
                self.logger,
                "Dropping {} that failed the integrity check",
                nas.message.name()
            );
            return Ok(());
        }
        debug!(
            self.logger,
            "{:?} {:?} <- {}",
            access_type,
            self.ue.state[access_type],
            nas.message.name()
        );
        self.handle_gmm_message(access_type, nas.message).await
    }

    fn attach_ran_ue(&mut self, ran_ue: RanUe, initial: bool) {
        let slot = &mut self.ue.ran_ue[ran_ue.access_type];
        if !initial {
            if let Some(existing) = slot.as_mut() {
                if ran_ue.location.is_some() {
                    existing.location = ran_ue.location;
                    existing.tai = ran_ue.tai;
                }
                return;
            }
        }
        *slot = Some(ran_ue);
    }
}
