//! sm_contexts - PDU session bookkeeping shared by registration, service request and deregistration

use super::UeProcedure;
use crate::HandlerApi;
use crate::consumers::{SmCause, SmContextReleaseData, SmContextUpdateData, UpCnxState};
use crate::data::{AccessType, SmContext};
use crate::protocols::nas::{PduSessionResults, PsiBitmap, ReactivationError, build, cause};
use crate::protocols::ngap::PduSessionResourceItem;
use anyhow::Result;
use slog::{debug, info, warn};

impl<A: HandlerApi> UeProcedure<'_, A> {
    /// Release a PDU session at the SMF and forget it.  A session that is already gone is left
    /// alone.
    pub(super) async fn release_pdu_session(
        &mut self,
        pdu_session_id: u8,
        cause: Option<SmCause>,
    ) -> Result<()> {
        let Some(sm_context) = self.ue.sm_contexts.get(&pdu_session_id) else {
            debug!(self.logger, "PDU session {pdu_session_id} already released");
            return Ok(());
        };
        if let Some(sm_context_ref) = sm_context.sm_context_ref.clone() {
            let data = SmContextReleaseData {
                cause,
                ue_location: self.ue.location,
                an_type: Some(sm_context.access_type),
            };
            self.log_message("<< Smf ReleaseSmContext");
            self.consumers()
                .smf
                .release_sm_context(&sm_context_ref, data)
                .await?;
        }
        self.ue.sm_contexts.remove(&pdu_session_id);
        info!(self.logger, "Released PDU session {pdu_session_id}");
        Ok(())
    }

    /// Release every PDU session matching `filter`.  Failures are logged and the session kept.
    pub(super) async fn release_pdu_sessions(
        &mut self,
        filter: impl Fn(&SmContext) -> bool,
        cause: Option<SmCause>,
    ) {
        let ids: Vec<u8> = self
            .ue
            .sm_contexts
            .values()
            .filter(|s| filter(s))
            .map(|s| s.pdu_session_id)
            .collect();
        for pdu_session_id in ids {
            if let Err(e) = self.release_pdu_session(pdu_session_id, cause).await {
                warn!(
                    self.logger,
                    "Failed to release PDU session {pdu_session_id} - {e:#}"
                );
            }
        }
    }

    /// TS24.501, 5.6.1.4: release the sessions on this access type that the UE no longer has.
    /// Returns the PDU session status to report back.
    pub(super) async fn reconcile_pdu_session_status(
        &mut self,
        access_type: AccessType,
        reported: PsiBitmap,
    ) -> PsiBitmap {
        self.release_pdu_sessions(
            |s| s.access_type == access_type && !reported.is_set(s.pdu_session_id),
            None,
        )
        .await;
        build::pdu_session_status(&*self.ue, access_type)
    }

    /// Whether the AM policy lets the UE use the user plane where it is.  Service area
    /// restrictions only apply on 3GPP access.
    pub(super) fn in_allowed_service_area(&self, access_type: AccessType) -> bool {
        if access_type != AccessType::ThreeGpp {
            return true;
        }
        let Some(restriction) = self
            .ue
            .am_policy
            .as_ref()
            .and_then(|p| p.service_area_restriction.as_ref())
        else {
            return true;
        };
        restriction.allowed_tais.is_empty()
            || self
                .ue
                .tai
                .is_some_and(|tai| restriction.allowed_tais.contains(&tai))
    }

    /// Ask the SMF to re-establish the user plane of the 3GPP sessions with pending uplink
    /// data.  Fills in the reactivation result and returns the N2 resources to set up.
    pub(super) async fn reactivate_pdu_sessions(
        &mut self,
        access_type: AccessType,
        uplink_data_status: PsiBitmap,
        results: &mut PduSessionResults,
    ) -> Vec<PduSessionResourceItem> {
        let mut reactivation_result = PsiBitmap::default();
        let mut sessions = Vec::new();

        if !self.in_allowed_service_area(access_type) {
            info!(self.logger, "Outside the allowed service area - no reactivation");
            for pdu_session_id in uplink_data_status.iter() {
                results.reactivation_errors.push(ReactivationError {
                    pdu_session_id,
                    cause: cause::RESTRICTED_SERVICE_AREA,
                });
            }
            results.reactivation_result = Some(reactivation_result);
            return sessions;
        }

        let candidates: Vec<_> = self
            .ue
            .sm_contexts
            .values()
            .filter(|s| {
                uplink_data_status.is_set(s.pdu_session_id)
                    && s.access_type == AccessType::ThreeGpp
            })
            .filter_map(|s| {
                s.sm_context_ref
                    .clone()
                    .map(|r| (s.pdu_session_id, s.snssai, r))
            })
            .collect();

        for (pdu_session_id, snssai, sm_context_ref) in candidates {
            let data = SmContextUpdateData {
                up_cnx_state: Some(UpCnxState::Activating),
                an_type: Some(access_type),
                ue_location: self.ue.location,
                ..Default::default()
            };
            self.log_message("<< Smf UpdateSmContext (activate)");
            match self
                .consumers()
                .smf
                .update_sm_context(&sm_context_ref, data)
                .await
            {
                Ok(updated) => {
                    if let Some(n2) = updated.n2_sm_info {
                        sessions.push(PduSessionResourceItem {
                            pdu_session_id,
                            snssai: Some(snssai),
                            nas: None,
                            transfer: n2.content,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        self.logger,
                        "Failed to reactivate PDU session {pdu_session_id} - {e:#}"
                    );
                    reactivation_result.set(pdu_session_id);
                    results.reactivation_errors.push(ReactivationError {
                        pdu_session_id,
                        cause: cause::PROTOCOL_ERROR_UNSPECIFIED,
                    });
                }
            }
        }
        results.reactivation_result = Some(reactivation_result);
        sessions
    }
}
