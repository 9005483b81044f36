use crate::data::{Guami, Guti, PlmnId, plmn_to_string};
use anyhow::{Result, bail};
use std::fmt::Write;

/// A decoded 5GS mobile identity (TS24.501, 9.11.3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MobileIdentity {
    NoIdentity,
    Suci { suci: String, plmn: PlmnId },
    Guti(Guti),
    Imei(String),
    STmsi { amf_set_pointer: [u8; 2], tmsi: [u8; 4] },
    Imeisv(String),
}

impl MobileIdentity {
    /// Identity type name for logging and for recording what the UE identified itself with.
    pub fn type_name(&self) -> &'static str {
        match self {
            MobileIdentity::NoIdentity => "NoIdentity",
            MobileIdentity::Suci { .. } => "SUCI",
            MobileIdentity::Guti(_) => "5G-GUTI",
            MobileIdentity::Imei(_) => "IMEI",
            MobileIdentity::STmsi { .. } => "5G-S-TMSI",
            MobileIdentity::Imeisv(_) => "IMEISV",
        }
    }
}

const TYPE_NO_IDENTITY: u8 = 0b000;
const TYPE_SUCI: u8 = 0b001;
const TYPE_GUTI: u8 = 0b010;
const TYPE_IMEI: u8 = 0b011;
const TYPE_S_TMSI: u8 = 0b100;
const TYPE_IMEISV: u8 = 0b101;

// SUPI format IMSI and the null protection scheme.
const SUPI_FORMAT_IMSI: u8 = 0b000;
const NULL_SCHEME: u8 = 0;

pub fn mobile_identity(ie: &[u8]) -> Result<MobileIdentity> {
    let Some(first) = ie.first() else {
        bail!("Empty mobile identity IE")
    };
    match first & 0b111 {
        TYPE_NO_IDENTITY => Ok(MobileIdentity::NoIdentity),
        TYPE_SUCI => suci(ie),
        TYPE_GUTI => {
            // Figure 9.11.3.4.1
            if ie.len() < 11 {
                bail!("5G-GUTI is too short: {ie:?}")
            }
            Ok(MobileIdentity::Guti(Guti {
                guami: Guami {
                    plmn: [ie[1], ie[2], ie[3]],
                    amf_ids: [ie[4], ie[5], ie[6]],
                },
                tmsi: [ie[7], ie[8], ie[9], ie[10]],
            }))
        }
        TYPE_S_TMSI => {
            // Figure 9.11.3.4.5
            if ie.len() < 7 {
                bail!("5G-S-TMSI is too short: {ie:?}")
            }
            Ok(MobileIdentity::STmsi {
                amf_set_pointer: [ie[1], ie[2]],
                tmsi: [ie[3], ie[4], ie[5], ie[6]],
            })
        }
        TYPE_IMEI => Ok(MobileIdentity::Imei(format!("imei-{}", imei_digits(ie)))),
        TYPE_IMEISV => Ok(MobileIdentity::Imeisv(format!(
            "imeisv-{}",
            imei_digits(ie)
        ))),
        x => bail!("Unknown mobile identity type {x}"),
    }
}

// Figure 9.11.3.4.3.  The first digit sits in the top nibble of octet 4.
fn imei_digits(ie: &[u8]) -> String {
    let mut digits = String::new();
    push_digit(&mut digits, ie[0] >> 4);
    for byte in &ie[1..] {
        push_digit(&mut digits, byte & 0xf);
        push_digit(&mut digits, byte >> 4);
    }
    digits
}

fn push_digit(s: &mut String, d: u8) {
    if d < 10 {
        let _ = write!(s, "{d}");
    }
}

// Figure 9.11.3.4.2
fn suci(ie: &[u8]) -> Result<MobileIdentity> {
    if ie.len() < 9 {
        bail!("SUCI is too short: {ie:?}")
    }
    let supi_format = (ie[0] >> 4) & 0b111;
    if supi_format != SUPI_FORMAT_IMSI {
        bail!("SUPI format {supi_format} not implemented");
    }
    let plmn: PlmnId = [ie[1], ie[2], ie[3]];
    let digits = plmn_to_string(&plmn);
    let (mcc, mnc) = digits.split_at(3);

    let mut routing_indicator = String::new();
    for byte in &ie[4..6] {
        push_digit(&mut routing_indicator, byte & 0xf);
        push_digit(&mut routing_indicator, byte >> 4);
    }
    let protection_scheme = ie[6] & 0xf;
    let home_network_public_key_id = ie[7];
    let scheme_output = &ie[8..];

    let output = if protection_scheme == NULL_SCHEME {
        let mut msin = String::new();
        for byte in scheme_output {
            push_digit(&mut msin, byte & 0xf);
            push_digit(&mut msin, byte >> 4);
        }
        msin
    } else {
        hex::encode(scheme_output)
    };

    Ok(MobileIdentity::Suci {
        suci: format!(
            "suci-0-{mcc}-{mnc}-{routing_indicator}-{protection_scheme}-{home_network_public_key_id}-{output}"
        ),
        plmn,
    })
}

/// The IMSI carried in a null-scheme SUCI, e.g. "imsi-208930000000001".
pub fn supi_from_null_scheme_suci(suci: &str) -> Option<String> {
    let parts: Vec<&str> = suci.split('-').collect();
    match parts.as_slice() {
        ["suci", "0", mcc, mnc, _, "0", _, msin] => Some(format!("imsi-{mcc}{mnc}{msin}")),
        _ => None,
    }
}
