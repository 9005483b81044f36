pub mod build;
mod messages;
pub mod parse;

pub use messages::*;

#[macro_export]
macro_rules! expect_nas {
    ($t:ident, $m:expr) => {
        match $m {
            $crate::protocols::nas::GmmMessage::$t(message) => Ok(message),
            m => Err(anyhow!("Expected Nas {} but got {}", stringify!($t), m.name())),
        }
    };
}

/// 5GMM cause values (TS24.501, 9.11.3.2).
pub mod cause {
    pub const ILLEGAL_UE: u8 = 0x03;
    pub const FIVEGS_SERVICES_NOT_ALLOWED: u8 = 0x07;
    pub const UE_IDENTITY_CANNOT_BE_DERIVED: u8 = 0x09;
    pub const IMPLICITLY_DEREGISTERED: u8 = 0x0a;
    pub const TRACKING_AREA_NOT_ALLOWED: u8 = 0x0c;
    pub const MAC_FAILURE: u8 = 0x14;
    pub const SYNCH_FAILURE: u8 = 0x15;
    pub const SECURITY_MODE_REJECTED_UNSPECIFIED: u8 = 0x18;
    pub const NON_5G_AUTHENTICATION_UNACCEPTABLE: u8 = 0x1a;
    pub const RESTRICTED_SERVICE_AREA: u8 = 0x1c;
    pub const NGKSI_ALREADY_IN_USE: u8 = 0x47;
    pub const PAYLOAD_WAS_NOT_FORWARDED: u8 = 0x5a;
    pub const DNN_NOT_SUPPORTED_OR_NOT_SUBSCRIBED: u8 = 0x5b;
    pub const MESSAGE_NOT_COMPATIBLE_WITH_PROTOCOL_STATE: u8 = 0x65;
    pub const PROTOCOL_ERROR_UNSPECIFIED: u8 = 0x6f;
}

// TS24.501, 9.7: 5GSM messages start EPD, PDU session ID, PTI, message type.
const FGSM_STATUS: u8 = 0xd6;

pub fn is_5gsm_status(n1_sm_payload: &[u8]) -> bool {
    n1_sm_payload.get(3) == Some(&FGSM_STATUS)
}
