//! ngap - downlink NGAP messages the GMM core asks the NGAP layer to send

use crate::data::{AccessType, AmfUe, Guami, RanUe, Snssai};
use crate::protocols::nas::{DownlinkNasPdu, UeSecurityCapability};

/// NAS cause carried in UE Context Release Command (TS38.413, 9.3.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasCause {
    NormalRelease,
    AuthenticationFailure,
    Deregister,
    Unspecified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionResourceItem {
    pub pdu_session_id: u8,
    pub snssai: Option<Snssai>,
    pub nas: Option<DownlinkNasPdu>,
    /// Opaque N2 SM transfer from the SMF.
    pub transfer: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitialContextSetupRequest {
    pub guami: Guami,
    pub allowed_nssai: Vec<Snssai>,
    pub ue_security_capability: Option<UeSecurityCapability>,
    /// KgNB or KN3IWF.
    pub security_key: [u8; 32],
    pub next_hop_chaining_count: u8,
    pub pdu_sessions: Vec<PduSessionResourceItem>,
    pub nas: Option<DownlinkNasPdu>,
}

impl InitialContextSetupRequest {
    /// TS38.413, 8.3.1.  The security key is KgNB or KN3IWF depending on the access type.
    pub fn new(
        ue: &AmfUe,
        access_type: AccessType,
        guami: Guami,
        nas: Option<DownlinkNasPdu>,
        pdu_sessions: Vec<PduSessionResourceItem>,
    ) -> Self {
        InitialContextSetupRequest {
            guami,
            allowed_nssai: ue.allowed_nssai[access_type].clone(),
            ue_security_capability: ue.security.ue_security_capability,
            security_key: ue.security.access_key(access_type),
            next_hop_chaining_count: ue.security.ncc,
            pdu_sessions,
            nas,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NgapMessage {
    DownlinkNasTransport(DownlinkNasPdu),
    InitialContextSetupRequest(Box<InitialContextSetupRequest>),
    UeContextReleaseCommand(NasCause),
    PduSessionResourceSetupRequest {
        nas: Option<DownlinkNasPdu>,
        sessions: Vec<PduSessionResourceItem>,
    },
    PduSessionResourceModifyRequest {
        sessions: Vec<PduSessionResourceItem>,
    },
    PduSessionResourceReleaseCommand {
        nas: Option<DownlinkNasPdu>,
        sessions: Vec<PduSessionResourceItem>,
    },
}

impl NgapMessage {
    pub fn name(&self) -> &'static str {
        match self {
            NgapMessage::DownlinkNasTransport(_) => "DownlinkNasTransport",
            NgapMessage::InitialContextSetupRequest(_) => "InitialContextSetupRequest",
            NgapMessage::UeContextReleaseCommand(_) => "UeContextReleaseCommand",
            NgapMessage::PduSessionResourceSetupRequest { .. } => "PduSessionResourceSetupRequest",
            NgapMessage::PduSessionResourceModifyRequest { .. } => {
                "PduSessionResourceModifyRequest"
            }
            NgapMessage::PduSessionResourceReleaseCommand { .. } => {
                "PduSessionResourceReleaseCommand"
            }
        }
    }
}

/// An NGAP message addressed to one UE association.
#[derive(Debug, Clone, PartialEq)]
pub struct NgapPdu {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u64,
    pub message: NgapMessage,
}

impl NgapPdu {
    pub fn new(ran_ue: &RanUe, message: NgapMessage) -> Self {
        NgapPdu {
            amf_ue_ngap_id: ran_ue.amf_ue_ngap_id,
            ran_ue_ngap_id: ran_ue.ran_ue_ngap_id,
            message,
        }
    }
}
