use super::gmm_state::GmmState;
use super::models::{AccessType, Guti, PerAccess, PlmnId, Snssai, Tai, UserLocation};
use super::ran_ue::RanUe;
use super::security_context::SecurityContext;
use super::sm_context::SmContext;
use crate::consumers::{
    AmPolicyAssociation, AmSubscription, SmfSelectionSubscription, SubscribedSnssai,
    UeAuthenticationCtx, UeContextInSmfData,
};
use crate::protocols::nas::{
    DeregistrationAccessType, DownlinkNasPdu, IdentityType, Ladn, RegistrationRequest,
    RegistrationType,
};
use crate::timer::UeTimers;
use std::collections::BTreeMap;

/// Procedure in progress on an access type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnGoing {
    #[default]
    Nothing,
    Registration,
    Paging,
}

/// The AMF's context for one UE, owned by that UE's message handler task.
#[derive(Debug, Default)]
pub struct AmfUe {
    pub ue_id: u32,

    // Identity.  The SUPI is only set after primary authentication.
    pub supi: Option<String>,
    pub suci: Option<String>,
    pub pei: Option<String>,
    pub gpsi: Option<String>,
    pub guti: Option<Guti>,
    pub old_guti: Option<Guti>,
    pub plmn: Option<PlmnId>,
    pub registration_identity: Option<IdentityType>,

    pub security: SecurityContext,
    pub auth_ctx: Option<UeAuthenticationCtx>,
    pub synch_failure_count: u32,
    // EAP-Success to piggy-back on the Security Mode Command.
    pub eap_success: Option<Vec<u8>>,

    pub state: PerAccess<GmmState>,
    pub ran_ue: PerAccess<Option<RanUe>>,
    pub allowed_nssai: PerAccess<Vec<Snssai>>,
    pub ongoing: PerAccess<OnGoing>,
    pub registration_area: PerAccess<Vec<Tai>>,

    pub sm_contexts: BTreeMap<u8, SmContext>,

    // Registration in progress.
    pub registration_request: Option<RegistrationRequest>,
    pub registration_type: Option<RegistrationType>,
    pub retransmission_of_initial_nas: bool,
    pub registration_accept_for_non3gpp: Option<DownlinkNasPdu>,
    pub serving_amf_changed: bool,

    // Subscription and policy.
    pub subscription_data_valid: bool,
    pub subscribed_nssai: Vec<SubscribedSnssai>,
    pub am_subscription: Option<AmSubscription>,
    pub smf_selection_data: Option<SmfSelectionSubscription>,
    pub ue_context_in_smf: Option<UeContextInSmfData>,
    pub am_policy: Option<AmPolicyAssociation>,

    pub capability_5gmm: Option<Vec<u8>>,
    pub location: Option<UserLocation>,
    // Whether the location moved since the AM policy was last told.
    pub location_changed: bool,
    pub tai: Option<Tai>,
    pub last_visited_registered_tai: Option<Tai>,
    pub negotiated_drx: Option<u8>,
    pub ladn_info: Vec<Ladn>,

    pub deregistration_target: Option<DeregistrationAccessType>,
    pub timers: UeTimers,

    // Set once the context is removed.  The UE task exits after the current message.
    pub removed: bool,
}

impl AmfUe {
    pub fn new(ue_id: u32) -> Self {
        AmfUe {
            ue_id,
            ..Default::default()
        }
    }

    /// Identity to present to the AUSF.
    pub fn supi_or_suci(&self) -> Option<&str> {
        self.supi.as_deref().or(self.suci.as_deref())
    }

    pub fn tmsi(&self) -> Option<[u8; 4]> {
        self.guti.map(|g| g.tmsi)
    }

    pub fn is_connected(&self, access_type: AccessType) -> bool {
        self.ran_ue[access_type].is_some()
    }

    /// Deregistered on both access types, treating `access_type` as about to be.
    pub fn deregistered_apart_from(&self, access_type: AccessType) -> bool {
        self.state[access_type.other()] == GmmState::Deregistered
    }

    pub fn fully_deregistered(&self) -> bool {
        AccessType::ALL
            .iter()
            .all(|a| self.state[*a] == GmmState::Deregistered)
    }

    /// Whether any PDU session exists on an access type.
    pub fn has_sessions_on(&self, access_type: AccessType) -> bool {
        self.sm_contexts
            .values()
            .any(|s| s.access_type == access_type)
    }

    /// Drop subscription and slice state ahead of an initial registration.
    pub fn clear_registration_data(&mut self) {
        self.subscribed_nssai.clear();
        for access_type in AccessType::ALL {
            self.allowed_nssai[access_type].clear();
        }
        self.subscription_data_valid = false;
        self.sm_contexts.clear();
    }

    /// Forget the registration in progress on an access type.
    pub fn clear_registration_request_data(&mut self, access_type: AccessType) {
        self.registration_request = None;
        self.registration_type = None;
        self.registration_identity = None;
        self.synch_failure_count = 0;
        self.serving_amf_changed = false;
        self.registration_accept_for_non3gpp = None;
        self.retransmission_of_initial_nas = false;
        if let Some(ran_ue) = &mut self.ran_ue[access_type] {
            ran_ue.ue_context_request = false;
            ran_ue.recvd_initial_context_setup_response = false;
        }
        self.ongoing[access_type] = OnGoing::Nothing;
    }

    /// The default S-NSSAI for a new PDU session when the UE does not request one.
    pub fn default_snssai(&self, access_type: AccessType) -> Option<Snssai> {
        self.allowed_nssai[access_type].first().copied()
    }
}
