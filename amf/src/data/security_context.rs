use super::models::AccessType;
use crate::protocols::nas::{
    DownlinkNasPdu, GmmMessage, NasProtection, NgKsi, SecurityHeaderType, UeSecurityCapability,
    UplinkSecurityHeader, KSI_NO_KEY_AVAILABLE,
};
use anyhow::{Result, bail, ensure};
use security::nia2::verify_nia2_mac;

pub const NIA0: u8 = 0;
pub const NIA2: u8 = 2;
pub const NEA0: u8 = 0;

// TS33.501, 6.4.3.1: the DIRECTION bit is 0 for uplink and 1 for downlink.
const DIRECTION_UPLINK: u8 = 0;

/// NAS connection identifier used as the BEARER input (TS33.501, 6.4.2.2).
fn bearer(access_type: AccessType) -> u8 {
    match access_type {
        AccessType::ThreeGpp => 1,
        AccessType::NonThreeGpp => 2,
    }
}

fn access_type_distinguisher(access_type: AccessType) -> u8 {
    match access_type {
        AccessType::ThreeGpp => security::ACCESS_TYPE_3GPP,
        AccessType::NonThreeGpp => security::ACCESS_TYPE_NON_3GPP,
    }
}

/// NAS COUNT, 16 bit overflow counter and 8 bit sequence number (TS33.501, 6.4.3.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NasCount(u32);

impl NasCount {
    pub fn value(&self) -> u32 {
        self.0
    }
    pub fn sqn(&self) -> u8 {
        (self.0 & 0xff) as u8
    }
    pub fn overflow(&self) -> u16 {
        ((self.0 >> 8) & 0xffff) as u16
    }

    // Estimate the full COUNT of a received message from its 8 bit sequence number.
    fn estimate(&self, sqn: u8) -> NasCount {
        let overflow = if self.sqn() > sqn {
            self.overflow().wrapping_add(1)
        } else {
            self.overflow()
        };
        NasCount(((overflow as u32) << 8) | sqn as u32)
    }

    fn increment(&mut self) {
        self.0 = (self.0 + 1) & 0xffffff;
    }
}

/// The 5G NAS security context of a UE (TS33.501, 6.3).
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    pub available: bool,
    pub mac_failed: bool,
    pub ngksi: NgKsi,
    pub abba: [u8; 2],
    pub kseaf: Option<[u8; 32]>,
    pub kamf: [u8; 32],
    pub knas_int: [u8; 16],
    pub knas_enc: [u8; 16],
    pub kgnb: [u8; 32],
    pub kn3iwf: [u8; 32],
    pub nh: [u8; 32],
    pub ncc: u8,
    pub integrity_algorithm: u8,
    pub ciphering_algorithm: u8,
    pub ul_count: NasCount,
    pub dl_count: NasCount,
    pub ue_security_capability: Option<UeSecurityCapability>,
}

impl SecurityContext {
    /// Whether the authentication procedure may be skipped.
    pub fn is_valid(&self) -> bool {
        self.available && self.ngksi.ksi != KSI_NO_KEY_AVAILABLE && !self.mac_failed
    }

    /// Derive Kamf from Kseaf and the SUPI (TS33.501, A.7).
    pub fn derive_kamf(&mut self, kseaf: &[u8; 32], supi: &str) -> Result<()> {
        let digits = supi.strip_prefix("imsi-").unwrap_or(supi);
        ensure!(
            (5..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()),
            "Cannot derive Kamf from SUPI {supi}"
        );
        self.kseaf = Some(*kseaf);
        self.kamf = security::derive_kamf(kseaf, digits.as_bytes(), &self.abba);
        Ok(())
    }

    /// Pick the first algorithm in each preference order that the UE supports.  Falls back to
    /// the null algorithms.
    pub fn select_algorithms(&mut self, integrity_order: &[u8], ciphering_order: &[u8]) {
        let Some(capability) = self.ue_security_capability else {
            self.integrity_algorithm = NIA0;
            self.ciphering_algorithm = NEA0;
            return;
        };
        self.integrity_algorithm = integrity_order
            .iter()
            .copied()
            .find(|alg| capability.supports_integrity(*alg))
            .unwrap_or(NIA0);
        self.ciphering_algorithm = ciphering_order
            .iter()
            .copied()
            .find(|alg| capability.supports_ciphering(*alg))
            .unwrap_or(NEA0);
    }

    pub fn is_null_security(&self) -> bool {
        self.integrity_algorithm == NIA0 && self.ciphering_algorithm == NEA0
    }

    pub fn derive_algorithm_keys(&mut self) {
        self.knas_int = security::derive_knasint(&self.kamf, self.integrity_algorithm);
        self.knas_enc = security::derive_knasenc(&self.kamf, self.ciphering_algorithm);
    }

    /// Derive KgNB or KN3IWF from the current uplink count, and the initial NH from that.
    pub fn update_for_access(&mut self, access_type: AccessType) {
        let key = security::derive_kgnb(
            &self.kamf,
            self.ul_count.value(),
            access_type_distinguisher(access_type),
        );
        match access_type {
            AccessType::ThreeGpp => self.kgnb = key,
            AccessType::NonThreeGpp => self.kn3iwf = key,
        }
        self.nh = security::derive_nh(&self.kamf, &key);
        self.ncc = 1;
    }

    /// The access network key for the Initial Context Setup Request.
    pub fn access_key(&self, access_type: AccessType) -> [u8; 32] {
        match access_type {
            AccessType::ThreeGpp => self.kgnb,
            AccessType::NonThreeGpp => self.kn3iwf,
        }
    }

    /// Wrap a downlink message with the security header that applies to it.  A Security Mode
    /// Command starts a new context, so the counts are reset and the context becomes available.
    pub fn protect(&mut self, message: GmmMessage) -> DownlinkNasPdu {
        let security_header_type = if matches!(message, GmmMessage::SecurityModeCommand(_)) {
            self.available = true;
            self.ul_count = NasCount::default();
            self.dl_count = NasCount::default();
            SecurityHeaderType::IntegrityProtectedWithNewContext
        } else if self.available {
            SecurityHeaderType::IntegrityProtectedAndCiphered
        } else {
            return DownlinkNasPdu {
                security_header_type: SecurityHeaderType::PlainNas,
                protection: None,
                message,
            };
        };

        let protection = NasProtection {
            count: self.dl_count.value(),
            integrity_algorithm: self.integrity_algorithm,
            ciphering_algorithm: self.ciphering_algorithm,
            knas_int: self.knas_int,
            knas_enc: self.knas_enc,
        };
        self.dl_count.increment();
        DownlinkNasPdu {
            security_header_type,
            protection: Some(protection),
            message,
        }
    }

    /// Check the integrity of an uplink message and set `mac_failed` accordingly.  Errors mean
    /// the message must be dropped.
    pub fn check_uplink(
        &mut self,
        security: Option<&UplinkSecurityHeader>,
        access_type: AccessType,
    ) -> Result<()> {
        let Some(header) = security else {
            // Plain NAS is only acceptable to a UE with no security context.
            self.mac_failed = self.available;
            return Ok(());
        };

        if header.security_header_type == SecurityHeaderType::PlainNas {
            bail!("Security header says plain NAS but carries a MAC");
        }

        if !self.available {
            if header.security_header_type.is_ciphered() {
                bail!("Ciphered NAS message with no security context");
            }
            self.mac_failed = true;
            return Ok(());
        }

        let base = if header.security_header_type.is_new_context() {
            NasCount::default()
        } else {
            self.ul_count
        };
        let count = base.estimate(header.sequence_number);

        let mac_ok = match self.integrity_algorithm {
            NIA0 => true,
            NIA2 => verify_nia2_mac(
                &self.knas_int,
                count.value().to_be_bytes(),
                bearer(access_type),
                DIRECTION_UPLINK,
                &header.protected_bytes,
                &header.mac,
            ),
            alg => bail!("Unsupported integrity algorithm {alg}"),
        };

        if !mac_ok {
            if header.security_header_type.is_ciphered() {
                bail!("Integrity check failed on ciphered NAS message");
            }
            self.mac_failed = true;
            return Ok(());
        }

        self.mac_failed = false;
        self.ul_count = count;
        Ok(())
    }
}

/// Messages a UE may legitimately send without integrity protection (TS24.501, 4.4.4.3).
pub fn allowed_without_integrity(message: &GmmMessage) -> bool {
    matches!(
        message,
        GmmMessage::RegistrationRequest(_)
            | GmmMessage::IdentityResponse(_)
            | GmmMessage::AuthenticationResponse(_)
            | GmmMessage::AuthenticationFailure(_)
            | GmmMessage::SecurityModeReject(_)
            | GmmMessage::ServiceRequest(_)
            | GmmMessage::DeregistrationRequestFromUe(_)
            | GmmMessage::DeregistrationAcceptFromUe
    )
}
