//! session_relay - UL NAS Transport of 5GSM payloads to and from the SMF (TS24.501, 5.4.5)

use super::UeProcedure;
use crate::HandlerApi;
use crate::consumers::{
    CreateSmContextResponse, N2SmInfoType, SmCause, SmContextCreateData, SmContextUpdateData,
    SmContextUpdatedData,
};
use crate::data::{AccessType, SmContext, Snssai};
use crate::protocols::nas::{
    DownlinkNasPdu, PayloadContainerType, RequestType, UlNasTransport, build, cause,
    is_5gsm_status,
};
use crate::protocols::ngap::{NgapMessage, PduSessionResourceItem};
use anyhow::{Result, anyhow, bail, ensure};
use derive_deref::{Deref, DerefMut};
use slog::{debug, info, warn};

/// Payloads and modes this AMF does not handle.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotImplemented {
    #[error("SMS over NAS is not implemented")]
    Sms,
    #[error("LPP payload transport is not implemented")]
    Lpp,
    #[error("SOR payload transport is not implemented")]
    Sor,
    #[error("Multiple payload transport is not implemented")]
    MultiplePayloads,
    #[error("Emergency PDU sessions are not supported")]
    EmergencyPduSession,
    #[error("SSC mode 3 session transfer is not implemented")]
    SscMode3,
    #[error("UECM registration over non-3GPP access is not implemented")]
    Non3gppUecmRegistration,
}

#[derive(Deref, DerefMut)]
pub struct SessionRelayProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> SessionRelayProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        SessionRelayProcedure(inner)
    }

    pub async fn run(mut self, access_type: AccessType, r: UlNasTransport) -> Result<()> {
        self.log_message(">> Nas UlNasTransport");
        ensure!(
            !self.ue.security.mac_failed,
            "NAS message integrity check failed"
        );

        match r.payload_container_type {
            PayloadContainerType::N1SmInformation => self.transport_5gsm(access_type, r).await,
            PayloadContainerType::Sms => Err(NotImplemented::Sms.into()),
            PayloadContainerType::Lpp => Err(NotImplemented::Lpp.into()),
            PayloadContainerType::Sor => Err(NotImplemented::Sor.into()),
            PayloadContainerType::MultiplePayloads => Err(NotImplemented::MultiplePayloads.into()),
            PayloadContainerType::UePolicy => {
                info!(self.logger, "UE policy container - not passed to the PCF");
                Ok(())
            }
            PayloadContainerType::UeParameterUpdate => {
                info!(self.logger, "UE parameters update acknowledgement received");
                Ok(())
            }
            PayloadContainerType::Other(x) => bail!("Unknown payload container type {x}"),
        }
    }

    async fn transport_5gsm(&mut self, access_type: AccessType, r: UlNasTransport) -> Result<()> {
        let pdu_session_id = r
            .pdu_session_id
            .ok_or_else(|| anyhow!("No PDU session ID in UL NAS Transport"))?;
        if r.old_pdu_session_id.is_some() {
            return Err(NotImplemented::SscMode3.into());
        }
        let payload = r.payload_container;

        if let Some(
            RequestType::InitialEmergencyRequest | RequestType::ExistingEmergencyPduSession,
        ) = r.request_type
        {
            warn!(self.logger, "{}", NotImplemented::EmergencyPduSession);
            return self
                .payload_not_forwarded(access_type, payload, pdu_session_id)
                .await;
        }

        // TS24.501, 5.4.5.2.3 case a) 1): the UE has reused the ID of a session we still hold.
        if self.ue.sm_contexts.contains_key(&pdu_session_id)
            && r.request_type == Some(RequestType::InitialRequest)
        {
            warn!(self.logger, "Duplicate PDU session ID {pdu_session_id}");
            if !self
                .release_duplicate_session(access_type, pdu_session_id)
                .await?
            {
                return self
                    .payload_not_forwarded(access_type, payload, pdu_session_id)
                    .await;
            }
        }

        if !self.ue.sm_contexts.contains_key(&pdu_session_id) && is_5gsm_status(&payload) {
            warn!(
                self.logger,
                "5GSM status for unknown PDU session {pdu_session_id} - dropped"
            );
            return Ok(());
        }

        if let Some(sm_context) = self.ue.sm_contexts.get(&pdu_session_id) {
            if r.request_type == Some(RequestType::ExistingPduSession)
                && !self.ue.allowed_nssai[access_type].contains(&sm_context.snssai)
            {
                warn!(
                    self.logger,
                    "S-NSSAI {:?} of PDU session {pdu_session_id} not allowed on {access_type:?}",
                    sm_context.snssai
                );
                return self
                    .payload_not_forwarded(access_type, payload, pdu_session_id)
                    .await;
            }
            return self
                .forward_to_smf(access_type, pdu_session_id, payload)
                .await;
        }

        match r.request_type {
            Some(RequestType::InitialRequest) => {
                self.establish(access_type, pdu_session_id, r.snssai, r.dnn, payload)
                    .await
            }
            Some(RequestType::ExistingPduSession | RequestType::ModificationRequest) => {
                // TS24.501, 5.4.5.2.5 case a) 3): a session another AMF set up.
                let known = self
                    .ue
                    .ue_context_in_smf
                    .as_ref()
                    .and_then(|c| c.pdu_sessions.get(&pdu_session_id))
                    .cloned();
                let Some(known) = known else {
                    return self
                        .payload_not_forwarded(access_type, payload, pdu_session_id)
                        .await;
                };
                let mut sm_context = SmContext::new(
                    pdu_session_id,
                    access_type,
                    known.snssai,
                    known.dnn,
                    None,
                );
                sm_context.sm_context_ref = Some(known.sm_context_ref);
                self.ue.sm_contexts.insert(pdu_session_id, sm_context);
                self.forward_to_smf(access_type, pdu_session_id, payload)
                    .await
            }
            other => {
                debug!(
                    self.logger,
                    "Request type {other:?} for unknown PDU session {pdu_session_id} - ignored"
                );
                Ok(())
            }
        }
    }

    /// Ask the SMF to release the old session.  Returns false if the SMF did not respond.
    async fn release_duplicate_session(
        &mut self,
        access_type: AccessType,
        pdu_session_id: u8,
    ) -> Result<bool> {
        let sm_context_ref = self
            .ue
            .sm_contexts
            .get(&pdu_session_id)
            .and_then(|s| s.sm_context_ref.clone());
        if let Some(sm_context_ref) = sm_context_ref {
            let data = SmContextUpdateData {
                release: true,
                cause: Some(SmCause::RelDueToDuplicateSessionId),
                ..Default::default()
            };
            self.log_message("<< Smf UpdateSmContext (release duplicate)");
            let updated = match self
                .consumers()
                .smf
                .update_sm_context(&sm_context_ref, data)
                .await
            {
                Ok(updated) => updated,
                Err(e) => {
                    warn!(
                        self.logger,
                        "PDU session {pdu_session_id} could not be released - {e:#}"
                    );
                    return Ok(false);
                }
            };
            if let Some(n2) = updated
                .n2_sm_info
                .filter(|n2| n2.info_type == N2SmInfoType::PduResRelCmd)
            {
                let sessions = vec![resource_item(pdu_session_id, None, n2.content)];
                self.send_ngap(
                    access_type,
                    NgapMessage::PduSessionResourceReleaseCommand {
                        nas: None,
                        sessions,
                    },
                )
                .await?;
            }
        }
        self.ue.sm_contexts.remove(&pdu_session_id);
        Ok(true)
    }

    // TS24.501, 5.4.5.2.3 case a) 1) iii)
    async fn establish(
        &mut self,
        access_type: AccessType,
        pdu_session_id: u8,
        snssai: Option<Snssai>,
        dnn: Option<String>,
        payload: Vec<u8>,
    ) -> Result<()> {
        let snssai = snssai
            .or_else(|| self.ue.default_snssai(access_type))
            .ok_or_else(|| anyhow!("UE has no allowed NSSAI on {access_type:?}"))?;
        let api = self.api;
        let dnn = dnn
            .or_else(|| {
                self.ue
                    .smf_selection_data
                    .as_ref()
                    .and_then(|s| s.default_dnn(&snssai))
                    .map(str::to_string)
            })
            .or_else(|| api.config().support_dnn_list.first().cloned())
            .ok_or_else(|| anyhow!("No DNN for the new PDU session"))?;
        let supi = self
            .ue
            .supi
            .clone()
            .ok_or_else(|| anyhow!("UE has no SUPI"))?;
        info!(
            self.logger,
            "New PDU session {pdu_session_id} on {dnn}, S-NSSAI {snssai:?}"
        );

        self.log_message("<< Nssf NSSelectionGet (PDU session)");
        let nsi_id = match api
            .consumers()
            .nssf
            .get_ns_selection_for_pdu_session(&snssai)
            .await
        {
            Ok(nsi) => nsi.nsi_id,
            Err(e) => {
                debug!(self.logger, "No network slice instance - {e:#}");
                None
            }
        };

        let data = SmContextCreateData {
            supi,
            pei: self.ue.pei.clone(),
            gpsi: self.ue.gpsi.clone(),
            pdu_session_id,
            dnn: dnn.clone(),
            snssai,
            serving_nf_id: api.config().name.clone(),
            guami: api.config().guami,
            an_type: access_type,
            ue_location: self.ue.location,
            nsi_id: nsi_id.clone(),
            n1_sm_msg: payload,
        };
        self.log_message("<< Smf CreateSmContext");
        match api.consumers().smf.create_sm_context(data).await {
            Err(e) => {
                warn!(self.logger, "CreateSmContext failed - {e:#}");
                Ok(())
            }
            Ok(CreateSmContextResponse::Rejected { n1_sm_msg }) => {
                warn!(self.logger, "SMF rejected PDU session {pdu_session_id}");
                let message = build::dl_nas_transport(
                    PayloadContainerType::N1SmInformation,
                    n1_sm_msg.unwrap_or_default(),
                    Some(pdu_session_id),
                    None,
                );
                self.send_nas(access_type, message).await?;
                Ok(())
            }
            Ok(CreateSmContextResponse::Created { sm_context_ref }) => {
                self.log_message(">> Smf SmContextCreated");
                let mut sm_context =
                    SmContext::new(pdu_session_id, access_type, snssai, dnn, self.ue.location);
                sm_context.sm_context_ref = Some(sm_context_ref);
                sm_context.nsi_id = nsi_id;
                self.ue.sm_contexts.insert(pdu_session_id, sm_context);
                Ok(())
            }
        }
    }

    // An SMF failure is logged and the payload dropped.
    async fn forward_to_smf(
        &mut self,
        access_type: AccessType,
        pdu_session_id: u8,
        payload: Vec<u8>,
    ) -> Result<()> {
        let sm_context = self
            .ue
            .sm_contexts
            .get(&pdu_session_id)
            .ok_or_else(|| anyhow!("No SM context for PDU session {pdu_session_id}"))?;
        let sm_context_ref = sm_context
            .sm_context_ref
            .clone()
            .ok_or_else(|| anyhow!("PDU session {pdu_session_id} has no SMF context"))?;
        let data = SmContextUpdateData {
            pei: self.ue.pei.clone(),
            gpsi: self.ue.gpsi.clone(),
            ue_location: (sm_context.user_location != self.ue.location)
                .then_some(self.ue.location)
                .flatten(),
            an_type: (sm_context.access_type != access_type).then_some(access_type),
            n1_sm_msg: Some(payload),
            ..Default::default()
        };

        self.log_message("<< Smf UpdateSmContext");
        let updated = match self
            .consumers()
            .smf
            .update_sm_context(&sm_context_ref, data)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                warn!(
                    self.logger,
                    "UpdateSmContext failed for PDU session {pdu_session_id} - {e:#}"
                );
                return Ok(());
            }
        };

        let location = self.ue.location;
        if let Some(sm_context) = self.ue.sm_contexts.get_mut(&pdu_session_id) {
            sm_context.access_type = access_type;
            sm_context.user_location = location;
        }
        self.relay_smf_response(access_type, pdu_session_id, updated)
            .await
    }

    async fn relay_smf_response(
        &mut self,
        access_type: AccessType,
        pdu_session_id: u8,
        updated: SmContextUpdatedData,
    ) -> Result<()> {
        let nas = updated.n1_sm_msg.map(|n1| {
            self.protect(build::dl_nas_transport(
                PayloadContainerType::N1SmInformation,
                n1,
                Some(pdu_session_id),
                None,
            ))
        });

        let message = match (updated.n2_sm_info, nas) {
            (Some(n2), nas) => match n2.info_type {
                N2SmInfoType::PduResModReq => NgapMessage::PduSessionResourceModifyRequest {
                    sessions: vec![resource_item(pdu_session_id, nas, n2.content)],
                },
                N2SmInfoType::PduResRelCmd => NgapMessage::PduSessionResourceReleaseCommand {
                    nas,
                    sessions: vec![resource_item(pdu_session_id, None, n2.content)],
                },
                other => bail!("Unexpected N2 SM information {other:?} from SMF"),
            },
            (None, Some(nas)) => NgapMessage::DownlinkNasTransport(nas),
            (None, None) => return Ok(()),
        };
        self.send_ngap(access_type, message).await
    }

    async fn payload_not_forwarded(
        &mut self,
        access_type: AccessType,
        payload: Vec<u8>,
        pdu_session_id: u8,
    ) -> Result<()> {
        let message = build::dl_nas_transport(
            PayloadContainerType::N1SmInformation,
            payload,
            Some(pdu_session_id),
            Some(cause::PAYLOAD_WAS_NOT_FORWARDED),
        );
        self.send_nas(access_type, message).await?;
        Ok(())
    }
}

fn resource_item(
    pdu_session_id: u8,
    nas: Option<DownlinkNasPdu>,
    transfer: Vec<u8>,
) -> PduSessionResourceItem {
    PduSessionResourceItem {
        pdu_session_id,
        snssai: None,
        nas,
        transfer,
    }
}
