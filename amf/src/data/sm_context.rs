use super::models::{AccessType, Snssai, UserLocation};

/// The AMF's view of one PDU session, created before CreateSmContext is sent to the SMF.
#[derive(Debug, Clone, PartialEq)]
pub struct SmContext {
    pub pdu_session_id: u8,
    pub access_type: AccessType,
    pub snssai: Snssai,
    pub dnn: String,
    /// Reference returned by the SMF.  None until the SMF has created the context.
    pub sm_context_ref: Option<String>,
    pub user_location: Option<UserLocation>,
    pub nsi_id: Option<String>,
}

impl SmContext {
    pub fn new(
        pdu_session_id: u8,
        access_type: AccessType,
        snssai: Snssai,
        dnn: String,
        user_location: Option<UserLocation>,
    ) -> Self {
        SmContext {
            pdu_session_id,
            access_type,
            snssai,
            dnn,
            sm_context_ref: None,
            user_location,
            nsi_id: None,
        }
    }
}
