use super::*;
use crate::consumers::Av5gAka;
use crate::data::{AccessType, AmfUe, Config, GmmState};

pub fn authentication_request(
    ngksi: NgKsi,
    abba: [u8; 2],
    av: Option<&Av5gAka>,
    eap_message: Option<Vec<u8>>,
) -> GmmMessage {
    // "The SEAF shall set the ABBA parameter as defined in Annex A.7.1."
    GmmMessage::AuthenticationRequest(AuthenticationRequest {
        ngksi,
        abba,
        rand: av.map(|av| av.rand),
        autn: av.map(|av| av.autn),
        eap_message,
    })
}

pub fn authentication_reject(eap_message: Option<Vec<u8>>) -> GmmMessage {
    GmmMessage::AuthenticationReject(AuthenticationReject { eap_message })
}

pub fn authentication_result(ngksi: NgKsi, eap_message: Vec<u8>, abba: [u8; 2]) -> GmmMessage {
    GmmMessage::AuthenticationResult(AuthenticationResult {
        ngksi,
        eap_message,
        abba: Some(abba),
    })
}

pub fn identity_request(identity_type: IdentityType) -> GmmMessage {
    GmmMessage::IdentityRequest(IdentityRequest { identity_type })
}

pub fn security_mode_command(ue: &AmfUe, eap_success: Option<Vec<u8>>) -> GmmMessage {
    let abba = eap_success.as_ref().map(|_| ue.security.abba);
    GmmMessage::SecurityModeCommand(SecurityModeCommand {
        ciphering_algorithm: ue.security.ciphering_algorithm,
        integrity_algorithm: ue.security.integrity_algorithm,
        ngksi: ue.security.ngksi,
        replayed_ue_security_capability: ue.security.ue_security_capability.unwrap_or_default(),
        imeisv_request: ue.pei.is_none(),
        // Request retransmission of the initial NAS message if it could not be trusted.
        rinmr: ue.retransmission_of_initial_nas,
        eap_message: eap_success,
        abba,
    })
}

fn network_feature_support(
    config: &Config,
    access_type: AccessType,
) -> Option<NetworkFeatureSupport> {
    let f = &config.network_feature_support_5gs;
    let (ims_vo_ps_3gpp, ims_vo_ps_n3gpp) = match access_type {
        AccessType::ThreeGpp => (f.ims_vo_ps, 0),
        AccessType::NonThreeGpp => (0, f.ims_vo_ps),
    };
    f.enable.then_some(NetworkFeatureSupport {
        ims_vo_ps_3gpp,
        ims_vo_ps_n3gpp,
        emc: f.emc,
        emf: f.emf,
        iwk_n26: f.iwk_n26,
        mpsi: f.mpsi,
        emc_n3: f.emc_n3,
        mcsi: f.mcsi,
    })
}

/// The PDU sessions the UE has on an access type.
pub fn pdu_session_status(ue: &AmfUe, access_type: AccessType) -> PsiBitmap {
    let mut status = PsiBitmap::default();
    for sm_context in ue.sm_contexts.values() {
        if sm_context.access_type == access_type {
            status.set(sm_context.pdu_session_id);
        }
    }
    status
}

pub fn registration_accept(
    ue: &AmfUe,
    access_type: AccessType,
    config: &Config,
    pdu_sessions: PduSessionResults,
) -> GmmMessage {
    let mut registration_result = access_type.nas_value();
    if ue.state[access_type.other()] == GmmState::Registered {
        registration_result |= access_type.other().nas_value();
    }

    let (t3512_value, non_3gpp_deregistration_timer_value) = match access_type {
        AccessType::ThreeGpp => (Some(config.t3512_value), None),
        AccessType::NonThreeGpp => (None, Some(config.non_3gpp_deregistration_timer_value)),
    };

    GmmMessage::RegistrationAccept(RegistrationAccept {
        registration_result,
        guti: ue.guti,
        tai_list: ue.registration_area[access_type].clone(),
        allowed_nssai: ue.allowed_nssai[access_type].clone(),
        network_feature_support: network_feature_support(config, access_type),
        pdu_sessions,
        ladn_information: ue.ladn_info.clone(),
        t3502_value: Some(config.t3502_value),
        t3512_value,
        non_3gpp_deregistration_timer_value,
        negotiated_drx_parameters: ue.negotiated_drx,
    })
}

pub fn registration_reject(cause: u8, eap_message: Option<Vec<u8>>) -> GmmMessage {
    GmmMessage::RegistrationReject(RegistrationReject { cause, eap_message })
}

pub fn service_accept(pdu_sessions: PduSessionResults) -> GmmMessage {
    GmmMessage::ServiceAccept(ServiceAccept { pdu_sessions })
}

pub fn service_reject(cause: u8, pdu_session_status: Option<PsiBitmap>) -> GmmMessage {
    GmmMessage::ServiceReject(ServiceReject {
        cause,
        pdu_session_status,
    })
}

pub fn deregistration_accept() -> GmmMessage {
    GmmMessage::DeregistrationAcceptToUe
}

pub fn deregistration_request(
    access_type: DeregistrationAccessType,
    reregistration_required: bool,
    cause: Option<u8>,
) -> GmmMessage {
    GmmMessage::DeregistrationRequestToUe(DeregistrationRequestToUe {
        access_type,
        reregistration_required,
        cause,
    })
}

pub fn configuration_update_command(
    ue: &AmfUe,
    access_type: AccessType,
    config: &Config,
) -> GmmMessage {
    GmmMessage::ConfigurationUpdateCommand(ConfigurationUpdateCommand {
        acknowledgement_requested: true,
        registration_requested: false,
        guti: ue.guti,
        tai_list: ue.registration_area[access_type].clone(),
        allowed_nssai: ue.allowed_nssai[access_type].clone(),
        network_feature_support: network_feature_support(config, access_type),
    })
}

pub fn dl_nas_transport(
    payload_container_type: PayloadContainerType,
    payload_container: Vec<u8>,
    pdu_session_id: Option<u8>,
    cause: Option<u8>,
) -> GmmMessage {
    GmmMessage::DlNasTransport(DlNasTransport {
        payload_container_type,
        payload_container,
        pdu_session_id,
        cause,
    })
}

pub fn notification(access_type: AccessType) -> GmmMessage {
    GmmMessage::Notification(Notification {
        access_type: access_type.nas_value(),
    })
}
