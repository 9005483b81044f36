//! messages - decoded 5GMM messages exchanged with the NAS codec

use crate::data::{Guti, Snssai, Tai};

/// Security header type (TS24.501, 9.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityHeaderType {
    PlainNas,
    IntegrityProtected,
    IntegrityProtectedAndCiphered,
    IntegrityProtectedWithNewContext,
    IntegrityProtectedAndCipheredWithNewContext,
}

impl SecurityHeaderType {
    pub fn is_ciphered(self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedAndCiphered
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNewContext
        )
    }

    pub fn is_new_context(self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedWithNewContext
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNewContext
        )
    }
}

/// Type of security context flag (TS24.501, 9.11.3.32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tsc {
    #[default]
    Native,
    Mapped,
}

/// NAS key set identifier.  KSI 7 means "no key is available".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgKsi {
    pub tsc: Tsc,
    pub ksi: u8,
}

pub const KSI_NO_KEY_AVAILABLE: u8 = 7;

impl Default for NgKsi {
    fn default() -> Self {
        NgKsi {
            tsc: Tsc::Native,
            ksi: KSI_NO_KEY_AVAILABLE,
        }
    }
}

impl NgKsi {
    // KSI values 0..6 are assignable.
    pub fn rotate(&mut self) {
        self.ksi = if self.ksi < 6 { self.ksi + 1 } else { 0 };
    }
}

/// UE security capability (TS24.501, 9.11.3.54).  Bit 8 of each octet is algorithm 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapability {
    pub ea: u8,
    pub ia: u8,
}

impl UeSecurityCapability {
    pub fn supports_ciphering(&self, algorithm: u8) -> bool {
        algorithm < 8 && self.ea & (0x80 >> algorithm) != 0
    }
    pub fn supports_integrity(&self, algorithm: u8) -> bool {
        algorithm < 8 && self.ia & (0x80 >> algorithm) != 0
    }
}

/// 5GS registration type value (TS24.501, 9.11.3.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationType {
    Initial,
    MobilityUpdating,
    PeriodicUpdating,
    Emergency,
    Reserved(u8),
}

/// Service type (TS24.501, 9.11.3.50).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Signalling,
    Data,
    MobileTerminatedServices,
    EmergencyServices,
    EmergencyServicesFallback,
    HighPriorityAccess,
    ElevatedSignalling,
    Other(u8),
}

/// De-registration access type (TS24.501, 9.11.3.20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeregistrationAccessType {
    ThreeGpp,
    NonThreeGpp,
    Both,
}

/// Payload container type (TS24.501, 9.11.3.40).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadContainerType {
    N1SmInformation,
    Sms,
    Lpp,
    Sor,
    UePolicy,
    UeParameterUpdate,
    MultiplePayloads,
    Other(u8),
}

impl PayloadContainerType {
    pub fn value(&self) -> u8 {
        match self {
            PayloadContainerType::N1SmInformation => 0x01,
            PayloadContainerType::Sms => 0x02,
            PayloadContainerType::Lpp => 0x03,
            PayloadContainerType::Sor => 0x04,
            PayloadContainerType::UePolicy => 0x05,
            PayloadContainerType::UeParameterUpdate => 0x06,
            PayloadContainerType::MultiplePayloads => 0x0f,
            PayloadContainerType::Other(x) => *x,
        }
    }
}

/// Request type on UL NAS transport (TS24.501, 9.11.3.47).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    InitialRequest,
    ExistingPduSession,
    InitialEmergencyRequest,
    ExistingEmergencyPduSession,
    ModificationRequest,
    MaPduRequest,
    Reserved(u8),
}

/// Type of identity requested in an Identity Request (TS24.501, 9.11.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityType {
    Suci,
    Guti,
    Imei,
    STmsi,
    Imeisv,
}

/// Bitmap of PDU session identities, bit N = PSI N (TS24.501, 9.11.3.44).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PsiBitmap(pub u16);

impl PsiBitmap {
    pub fn is_set(&self, psi: u8) -> bool {
        psi < 16 && self.0 & (1 << psi) != 0
    }
    pub fn set(&mut self, psi: u8) {
        if psi < 16 {
            self.0 |= 1 << psi;
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (1..16).filter(|psi| self.is_set(*psi))
    }
}

// ---- Uplink 5GMM messages ----

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    pub registration_type: RegistrationType,
    pub follow_on_request_pending: bool,
    pub ngksi: NgKsi,
    pub mobile_identity: Vec<u8>,
    pub ue_security_capability: Option<UeSecurityCapability>,
    pub capability_5gmm: Option<Vec<u8>>,
    pub requested_nssai: Option<Vec<Snssai>>,
    pub last_visited_registered_tai: Option<Tai>,
    pub uplink_data_status: Option<PsiBitmap>,
    pub pdu_session_status: Option<PsiBitmap>,
    pub allowed_pdu_session_status: Option<PsiBitmap>,
    pub requested_drx_parameters: Option<u8>,
    pub ladn_indication: Option<Vec<String>>,
    pub mico_indication: bool,
    pub nas_message_container: Option<Box<GmmMessage>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub ngksi: NgKsi,
    pub service_type: ServiceType,
    pub tmsi_5gs: Vec<u8>,
    pub uplink_data_status: Option<PsiBitmap>,
    pub pdu_session_status: Option<PsiBitmap>,
    pub allowed_pdu_session_status: Option<PsiBitmap>,
    pub nas_message_container: Option<Box<GmmMessage>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthenticationResponse {
    pub res_star: Option<Vec<u8>>,
    pub eap_message: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationFailure {
    pub cause: u8,
    pub auts: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityResponse {
    pub mobile_identity: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecurityModeComplete {
    pub imeisv: Option<Vec<u8>>,
    pub nas_message_container: Option<Box<GmmMessage>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityModeReject {
    pub cause: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegistrationComplete {
    pub sor_transparent_container: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeregistrationRequestFromUe {
    pub switch_off: bool,
    pub access_type: DeregistrationAccessType,
    pub ngksi: NgKsi,
    pub mobile_identity: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status5gmm {
    pub cause: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationResponse {
    pub pdu_session_status: Option<PsiBitmap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload_container: Vec<u8>,
    pub pdu_session_id: Option<u8>,
    pub old_pdu_session_id: Option<u8>,
    pub request_type: Option<RequestType>,
    pub snssai: Option<Snssai>,
    pub dnn: Option<String>,
}

// ---- Downlink 5GMM messages ----

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationRequest {
    pub ngksi: NgKsi,
    pub abba: [u8; 2],
    pub rand: Option<[u8; 16]>,
    pub autn: Option<[u8; 16]>,
    pub eap_message: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthenticationReject {
    pub eap_message: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationResult {
    pub ngksi: NgKsi,
    pub eap_message: Vec<u8>,
    pub abba: Option<[u8; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRequest {
    pub identity_type: IdentityType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityModeCommand {
    pub ciphering_algorithm: u8,
    pub integrity_algorithm: u8,
    pub ngksi: NgKsi,
    pub replayed_ue_security_capability: UeSecurityCapability,
    pub imeisv_request: bool,
    // Additional 5G security information: retransmission of initial NAS message requested.
    pub rinmr: bool,
    pub eap_message: Option<Vec<u8>>,
    pub abba: Option<[u8; 2]>,
}

/// LADN information element entry (TS24.501, 9.11.3.30).
#[derive(Debug, Clone, PartialEq)]
pub struct Ladn {
    pub dnn: String,
    pub tai_list: Vec<Tai>,
}

/// Per-PDU session reactivation failure cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactivationError {
    pub pdu_session_id: u8,
    pub cause: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PduSessionResults {
    pub pdu_session_status: Option<PsiBitmap>,
    pub reactivation_result: Option<PsiBitmap>,
    pub reactivation_errors: Vec<ReactivationError>,
}

/// 5GS network feature support bits (TS24.501, 9.11.3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkFeatureSupport {
    pub ims_vo_ps_3gpp: u8,
    pub ims_vo_ps_n3gpp: u8,
    pub emc: u8,
    pub emf: u8,
    pub iwk_n26: u8,
    pub mpsi: u8,
    pub emc_n3: u8,
    pub mcsi: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationAccept {
    // 5GS registration result: bitmask of AccessType::nas_value().
    pub registration_result: u8,
    pub guti: Option<Guti>,
    pub tai_list: Vec<Tai>,
    pub allowed_nssai: Vec<Snssai>,
    pub network_feature_support: Option<NetworkFeatureSupport>,
    pub pdu_sessions: PduSessionResults,
    pub ladn_information: Vec<Ladn>,
    pub t3502_value: Option<u32>,
    pub t3512_value: Option<u32>,
    pub non_3gpp_deregistration_timer_value: Option<u32>,
    pub negotiated_drx_parameters: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationReject {
    pub cause: u8,
    pub eap_message: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceAccept {
    pub pdu_sessions: PduSessionResults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReject {
    pub cause: u8,
    pub pdu_session_status: Option<PsiBitmap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeregistrationRequestToUe {
    pub access_type: DeregistrationAccessType,
    pub reregistration_required: bool,
    pub cause: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationUpdateCommand {
    pub acknowledgement_requested: bool,
    pub registration_requested: bool,
    pub guti: Option<Guti>,
    pub tai_list: Vec<Tai>,
    pub allowed_nssai: Vec<Snssai>,
    pub network_feature_support: Option<NetworkFeatureSupport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload_container: Vec<u8>,
    pub pdu_session_id: Option<u8>,
    pub cause: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub access_type: u8,
}

/// A decoded 5GMM message, either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum GmmMessage {
    RegistrationRequest(RegistrationRequest),
    RegistrationAccept(RegistrationAccept),
    RegistrationComplete(RegistrationComplete),
    RegistrationReject(RegistrationReject),
    DeregistrationRequestFromUe(DeregistrationRequestFromUe),
    DeregistrationAcceptToUe,
    DeregistrationRequestToUe(DeregistrationRequestToUe),
    DeregistrationAcceptFromUe,
    ServiceRequest(ServiceRequest),
    ServiceReject(ServiceReject),
    ServiceAccept(ServiceAccept),
    ConfigurationUpdateCommand(ConfigurationUpdateCommand),
    ConfigurationUpdateComplete,
    AuthenticationRequest(AuthenticationRequest),
    AuthenticationResponse(AuthenticationResponse),
    AuthenticationReject(AuthenticationReject),
    AuthenticationFailure(AuthenticationFailure),
    AuthenticationResult(AuthenticationResult),
    IdentityRequest(IdentityRequest),
    IdentityResponse(IdentityResponse),
    SecurityModeCommand(SecurityModeCommand),
    SecurityModeComplete(SecurityModeComplete),
    SecurityModeReject(SecurityModeReject),
    Status5gmm(Status5gmm),
    Notification(Notification),
    NotificationResponse(NotificationResponse),
    UlNasTransport(UlNasTransport),
    DlNasTransport(DlNasTransport),
}

impl GmmMessage {
    pub fn name(&self) -> &'static str {
        match self {
            GmmMessage::RegistrationRequest(_) => "RegistrationRequest",
            GmmMessage::RegistrationAccept(_) => "RegistrationAccept",
            GmmMessage::RegistrationComplete(_) => "RegistrationComplete",
            GmmMessage::RegistrationReject(_) => "RegistrationReject",
            GmmMessage::DeregistrationRequestFromUe(_) => "DeregistrationRequestFromUe",
            GmmMessage::DeregistrationAcceptToUe => "DeregistrationAcceptToUe",
            GmmMessage::DeregistrationRequestToUe(_) => "DeregistrationRequestToUe",
            GmmMessage::DeregistrationAcceptFromUe => "DeregistrationAcceptFromUe",
            GmmMessage::ServiceRequest(_) => "ServiceRequest",
            GmmMessage::ServiceReject(_) => "ServiceReject",
            GmmMessage::ServiceAccept(_) => "ServiceAccept",
            GmmMessage::ConfigurationUpdateCommand(_) => "ConfigurationUpdateCommand",
            GmmMessage::ConfigurationUpdateComplete => "ConfigurationUpdateComplete",
            GmmMessage::AuthenticationRequest(_) => "AuthenticationRequest",
            GmmMessage::AuthenticationResponse(_) => "AuthenticationResponse",
            GmmMessage::AuthenticationReject(_) => "AuthenticationReject",
            GmmMessage::AuthenticationFailure(_) => "AuthenticationFailure",
            GmmMessage::AuthenticationResult(_) => "AuthenticationResult",
            GmmMessage::IdentityRequest(_) => "IdentityRequest",
            GmmMessage::IdentityResponse(_) => "IdentityResponse",
            GmmMessage::SecurityModeCommand(_) => "SecurityModeCommand",
            GmmMessage::SecurityModeComplete(_) => "SecurityModeComplete",
            GmmMessage::SecurityModeReject(_) => "SecurityModeReject",
            GmmMessage::Status5gmm(_) => "Status5gmm",
            GmmMessage::Notification(_) => "Notification",
            GmmMessage::NotificationResponse(_) => "NotificationResponse",
            GmmMessage::UlNasTransport(_) => "UlNasTransport",
            GmmMessage::DlNasTransport(_) => "DlNasTransport",
        }
    }
}

/// Security header of a protected uplink message.  `protected_bytes` are the octets covered
/// by the MAC: the sequence number followed by the plain NAS message.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkSecurityHeader {
    pub security_header_type: SecurityHeaderType,
    pub mac: [u8; 4],
    pub sequence_number: u8,
    pub protected_bytes: Vec<u8>,
}

/// An uplink NAS PDU as delivered by the NAS codec.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkNasPdu {
    pub security: Option<UplinkSecurityHeader>,
    pub message: GmmMessage,
}

impl UplinkNasPdu {
    pub fn plain(message: GmmMessage) -> Self {
        UplinkNasPdu {
            security: None,
            message,
        }
    }

    pub fn security_header_type(&self) -> SecurityHeaderType {
        self.security
            .as_ref()
            .map(|s| s.security_header_type)
            .unwrap_or(SecurityHeaderType::PlainNas)
    }
}

/// Keys and counters the NAS codec needs to cipher and integrity protect a downlink message.
#[derive(Debug, Clone, PartialEq)]
pub struct NasProtection {
    pub count: u32,
    pub integrity_algorithm: u8,
    pub ciphering_algorithm: u8,
    pub knas_int: [u8; 16],
    pub knas_enc: [u8; 16],
}

/// A downlink NAS PDU handed to the NAS codec for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DownlinkNasPdu {
    pub security_header_type: SecurityHeaderType,
    pub protection: Option<NasProtection>,
    pub message: GmmMessage,
}
