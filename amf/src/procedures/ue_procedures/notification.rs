//! notification - paging a UE over non-3GPP access for a 3GPP session and vice versa (TS24.501, 5.6.3)

use super::UeProcedure;
use crate::HandlerApi;
use crate::data::{AccessType, OnGoing};
use crate::protocols::nas::{NotificationResponse, build};
use crate::timer::TimerKind;
use anyhow::{Result, ensure};
use derive_deref::{Deref, DerefMut};
use slog::info;

#[derive(Deref, DerefMut)]
pub struct NotificationProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> NotificationProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        NotificationProcedure(inner)
    }

    /// Send a Notification for `access_type` over the 3GPP signalling connection.
    pub async fn send(mut self, access_type: AccessType) -> Result<()> {
        let via = AccessType::ThreeGpp;
        ensure!(
            self.ue.is_connected(via),
            "No 3GPP signalling connection to notify the UE over"
        );
        self.send_nas_with_timer(via, build::notification(access_type), TimerKind::T3565)
            .await?;
        self.ue.ongoing[via] = OnGoing::Paging;
        Ok(())
    }

    pub async fn handle_response(
        mut self,
        access_type: AccessType,
        r: NotificationResponse,
    ) -> Result<()> {
        self.log_message(">> Nas NotificationResponse");
        ensure!(
            !self.ue.security.mac_failed,
            "NAS message integrity check failed"
        );
        self.stop_timer(TimerKind::T3565);
        self.ue.ongoing[access_type] = OnGoing::Nothing;

        // TS24.501, 5.6.3.2: sessions the UE reports inactive are released, on either access.
        if let Some(status) = r.pdu_session_status {
            info!(self.logger, "UE reports PDU session status {:#06x}", status.0);
            self.release_pdu_sessions(|s| !status.is_set(s.pdu_session_id), None)
                .await;
        }
        Ok(())
    }
}
