//! configuration_update - generic UE configuration update (TS24.501, 5.4.4)

use super::UeProcedure;
use crate::HandlerApi;
use crate::data::AccessType;
use crate::protocols::nas::build;
use crate::timer::TimerKind;
use anyhow::{Result, ensure};
use derive_deref::{Deref, DerefMut};

#[derive(Deref, DerefMut)]
pub struct ConfigurationUpdateProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> ConfigurationUpdateProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        ConfigurationUpdateProcedure(inner)
    }

    /// Tell the UE its current GUTI, TAI list and allowed NSSAI, asking for an acknowledgement.
    pub async fn send_command(mut self, access_type: AccessType) -> Result<()> {
        let api = self.api;
        let message = build::configuration_update_command(&*self.ue, access_type, api.config());
        self.send_nas_with_timer(access_type, message, TimerKind::T3555)
            .await
    }

    pub fn handle_complete(mut self) -> Result<()> {
        self.log_message(">> Nas ConfigurationUpdateComplete");
        ensure!(
            !self.ue.security.mac_failed,
            "NAS message integrity check failed"
        );
        self.stop_timer(TimerKind::T3555);
        Ok(())
    }
}
