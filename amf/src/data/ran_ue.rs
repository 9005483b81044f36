use super::models::{AccessType, Tai, UserLocation};

/// What to do once the RAN confirms a UE Context Release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    N2NormalRelease,
    ReleaseUeContext,
    NwInitiatedDeregistration,
}

/// The NGAP-side peer of a UE on one access type.  The AMF only holds a copy of the identifiers
/// the NGAP layer gave it; the NGAP association itself is owned elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct RanUe {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u64,
    pub access_type: AccessType,
    pub location: Option<UserLocation>,
    pub tai: Option<Tai>,
    pub ue_context_request: bool,
    pub recvd_initial_context_setup_response: bool,
    pub release_action: Option<ReleaseAction>,
}

impl RanUe {
    pub fn new(amf_ue_ngap_id: u64, ran_ue_ngap_id: u64, access_type: AccessType) -> Self {
        RanUe {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            access_type,
            location: None,
            tai: None,
            ue_context_request: false,
            recvd_initial_context_setup_response: false,
            release_action: None,
        }
    }

    pub fn with_location(mut self, location: UserLocation) -> Self {
        self.tai = Some(location.tai);
        self.location = Some(location);
        self
    }
}
