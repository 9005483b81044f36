//! consumers - contracts of the network functions the AMF calls out to

use crate::data::{AccessType, Guami, PlmnId, Snssai, UserLocation};
use crate::protocols::ngap::NgapPdu;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

// ---- AUSF ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    FiveGAka,
    EapAkaPrime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Success,
    Failure,
    Ongoing,
}

/// 5G HE AV as handed to the SEAF (TS33.501, 6.1.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Av5gAka {
    pub rand: [u8; 16],
    pub autn: [u8; 16],
    /// Hex encoded.
    pub hxres_star: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeAuthenticationCtx {
    pub auth_type: AuthType,
    pub av_5g_aka: Option<Av5gAka>,
    pub eap_payload: Option<Vec<u8>>,
    /// Link used to confirm the authentication.
    pub confirmation_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResynchronizationInfo {
    pub rand: [u8; 16],
    pub auts: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationData {
    pub auth_result: AuthResult,
    pub kseaf: Option<[u8; 32]>,
    pub supi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapSession {
    pub auth_result: AuthResult,
    pub eap_payload: Option<Vec<u8>>,
    pub kseaf: Option<[u8; 32]>,
    pub supi: Option<String>,
}

#[async_trait]
pub trait AusfClient: Send + Sync {
    async fn authenticate(
        &self,
        supi_or_suci: &str,
        serving_network_name: &str,
        resynchronization_info: Option<ResynchronizationInfo>,
    ) -> Result<UeAuthenticationCtx>;
    async fn confirm_5g_aka(
        &self,
        ctx: &UeAuthenticationCtx,
        res_star: &[u8],
    ) -> Result<ConfirmationData>;
    async fn confirm_eap(&self, ctx: &UeAuthenticationCtx, eap_payload: &[u8])
    -> Result<EapSession>;
}

// ---- UDM ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribedSnssai {
    pub snssai: Snssai,
    pub default_indication: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAreaRestriction {
    /// Tracking areas the UE is allowed in.  Empty means no restriction.
    pub allowed_tais: Vec<crate::data::Tai>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmSubscription {
    pub gpsis: Vec<String>,
    pub nssai: Vec<SubscribedSnssai>,
    pub service_area_restriction: Option<ServiceAreaRestriction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnnInfo {
    pub dnn: String,
    pub default_dnn_indicator: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmfSelectionSubscription {
    pub subscribed_snssai_infos: HashMap<Snssai, Vec<DnnInfo>>,
}

impl SmfSelectionSubscription {
    /// The subscriber's default DNN for a slice, if any.
    pub fn default_dnn(&self, snssai: &Snssai) -> Option<&str> {
        self.subscribed_snssai_infos
            .get(snssai)?
            .iter()
            .find(|d| d.default_dnn_indicator)
            .map(|d| d.dnn.as_str())
    }

    pub fn all_dnns(&self) -> impl Iterator<Item = &str> {
        self.subscribed_snssai_infos
            .values()
            .flatten()
            .map(|d| d.dnn.as_str())
    }
}

/// A PDU session the UDM knows of, established through some other AMF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionInSmf {
    pub dnn: String,
    pub snssai: Snssai,
    pub sm_context_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UeContextInSmfData {
    pub pdu_sessions: HashMap<u8, PduSessionInSmf>,
}

#[async_trait]
pub trait UdmClient: Send + Sync {
    async fn uecm_registration(
        &self,
        supi: &str,
        access_type: AccessType,
        guami: &Guami,
    ) -> Result<()>;
    async fn get_am_data(&self, supi: &str, plmn: &PlmnId) -> Result<AmSubscription>;
    async fn get_smf_select_data(&self, supi: &str, plmn: &PlmnId)
    -> Result<SmfSelectionSubscription>;
    async fn get_ue_context_in_smf_data(&self, supi: &str) -> Result<UeContextInSmfData>;
    async fn get_slice_selection_subscription_data(
        &self,
        supi: &str,
        plmn: &PlmnId,
    ) -> Result<Vec<SubscribedSnssai>>;
    async fn sdm_subscribe(&self, supi: &str, plmn: &PlmnId) -> Result<()>;
}

// ---- PCF ----

#[derive(Debug, Clone, PartialEq)]
pub struct AmPolicyRequest {
    pub supi: String,
    pub access_type: AccessType,
    pub pei: Option<String>,
    pub gpsi: Option<String>,
    pub user_location: Option<UserLocation>,
    pub serving_plmn: PlmnId,
    pub guami: Guami,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmPolicyUpdate {
    pub user_location: Option<UserLocation>,
    pub access_type: AccessType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmPolicyAssociation {
    pub association_id: String,
    pub service_area_restriction: Option<ServiceAreaRestriction>,
    pub rfsp: Option<u32>,
}

#[async_trait]
pub trait PcfClient: Send + Sync {
    async fn create_am_policy(&self, request: AmPolicyRequest) -> Result<AmPolicyAssociation>;
    async fn update_am_policy(
        &self,
        association_id: &str,
        update: AmPolicyUpdate,
    ) -> Result<AmPolicyAssociation>;
    async fn delete_am_policy(&self, association_id: &str) -> Result<()>;
}

// ---- NSSF ----

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedNetworkSliceInfo {
    pub allowed_nssai: Vec<(AccessType, Vec<Snssai>)>,
    pub target_amf_set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsiInformation {
    pub nrf_id: String,
    pub nsi_id: Option<String>,
}

#[async_trait]
pub trait NssfClient: Send + Sync {
    async fn get_ns_selection_for_registration(
        &self,
        subscribed_nssai: &[SubscribedSnssai],
        requested_nssai: &[Snssai],
    ) -> Result<AuthorizedNetworkSliceInfo>;
    async fn get_ns_selection_for_pdu_session(&self, snssai: &Snssai) -> Result<NsiInformation>;
}

// ---- SMF ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpCnxState {
    Activated,
    Deactivated,
    Activating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmCause {
    RelDueToDuplicateSessionId,
    RelDueToReactivation,
    RelDueToUeDeregistration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum N2SmInfoType {
    PduResSetupReq,
    PduResModReq,
    PduResRelCmd,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct N2SmInfo {
    pub info_type: N2SmInfoType,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmContextCreateData {
    pub supi: String,
    pub pei: Option<String>,
    pub gpsi: Option<String>,
    pub pdu_session_id: u8,
    pub dnn: String,
    pub snssai: Snssai,
    pub serving_nf_id: String,
    pub guami: Guami,
    pub an_type: AccessType,
    pub ue_location: Option<UserLocation>,
    pub nsi_id: Option<String>,
    pub n1_sm_msg: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateSmContextResponse {
    Created { sm_context_ref: String },
    Rejected { n1_sm_msg: Option<Vec<u8>> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmContextUpdateData {
    pub pei: Option<String>,
    pub gpsi: Option<String>,
    pub ue_location: Option<UserLocation>,
    pub an_type: Option<AccessType>,
    pub up_cnx_state: Option<UpCnxState>,
    pub release: bool,
    pub cause: Option<SmCause>,
    pub n1_sm_msg: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmContextUpdatedData {
    pub up_cnx_state: Option<UpCnxState>,
    pub n1_sm_msg: Option<Vec<u8>>,
    pub n2_sm_info: Option<N2SmInfo>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmContextReleaseData {
    pub cause: Option<SmCause>,
    pub ue_location: Option<UserLocation>,
    pub an_type: Option<AccessType>,
}

#[async_trait]
pub trait SmfClient: Send + Sync {
    async fn create_sm_context(&self, data: SmContextCreateData) -> Result<CreateSmContextResponse>;
    /// An Err covers both transport failures and SMF error responses.
    async fn update_sm_context(
        &self,
        sm_context_ref: &str,
        data: SmContextUpdateData,
    ) -> Result<SmContextUpdatedData>;
    async fn release_sm_context(&self, sm_context_ref: &str, data: SmContextReleaseData)
    -> Result<()>;
}

// ---- NGAP ----

/// Delivers downlink NGAP messages toward the RAN node serving a UE.
#[async_trait]
pub trait NgapSender: Send + Sync {
    async fn send(&self, pdu: NgapPdu) -> Result<()>;
}

/// The set of collaborators the AMF is started with.
#[derive(Clone)]
pub struct Consumers {
    pub ausf: Arc<dyn AusfClient>,
    pub udm: Arc<dyn UdmClient>,
    pub pcf: Arc<dyn PcfClient>,
    pub nssf: Arc<dyn NssfClient>,
    pub smf: Arc<dyn SmfClient>,
    pub ngap: Arc<dyn NgapSender>,
}
