mod keygen;
pub mod nia2;

pub use keygen::*;

// TS33.501, Annex A.7.1: ABBA parameter value for this release.
pub const NAS_ABBA: [u8; 2] = [0x00, 0x00];

// Access type distinguishers for KgNB/KN3IWF derivation (TS33.501, table A.9-1).
pub const ACCESS_TYPE_3GPP: u8 = 0x01;
pub const ACCESS_TYPE_NON_3GPP: u8 = 0x02;
