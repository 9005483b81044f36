use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    #[serde(rename = "3GPP_ACCESS")]
    ThreeGpp,
    #[serde(rename = "NON_3GPP_ACCESS")]
    NonThreeGpp,
}

impl AccessType {
    pub const ALL: [AccessType; 2] = [AccessType::ThreeGpp, AccessType::NonThreeGpp];

    pub fn other(self) -> AccessType {
        match self {
            AccessType::ThreeGpp => AccessType::NonThreeGpp,
            AccessType::NonThreeGpp => AccessType::ThreeGpp,
        }
    }

    pub fn index(self) -> usize {
        match self {
            AccessType::ThreeGpp => 0,
            AccessType::NonThreeGpp => 1,
        }
    }

    // TS24.501, 9.11.3.20 / 9.11.3.6 access type values.
    pub fn nas_value(self) -> u8 {
        match self {
            AccessType::ThreeGpp => 0b01,
            AccessType::NonThreeGpp => 0b10,
        }
    }
}

/// A pair of values, one per access type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerAccess<T>([T; 2]);

impl<T> std::ops::Index<AccessType> for PerAccess<T> {
    type Output = T;
    fn index(&self, access_type: AccessType) -> &T {
        &self.0[access_type.index()]
    }
}

impl<T> std::ops::IndexMut<AccessType> for PerAccess<T> {
    fn index_mut(&mut self, access_type: AccessType) -> &mut T {
        &mut self.0[access_type.index()]
    }
}

/// BCD coded PLMN as it appears on the wire (TS24.008, 10.5.1.13).
pub type PlmnId = [u8; 3];

pub fn plmn_to_string(plmn: &PlmnId) -> String {
    let digit = |d: u8| char::from_digit((d & 0xf) as u32, 10);
    [
        digit(plmn[0]),
        digit(plmn[0] >> 4),
        digit(plmn[1]),
        digit(plmn[2]),
        digit(plmn[2] >> 4),
        digit(plmn[1] >> 4),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snssai {
    pub sst: u8,
    #[serde(default, with = "optional_hex3")]
    pub sd: Option<[u8; 3]>,
}

impl Snssai {
    pub fn new(sst: u8, sd: Option<[u8; 3]>) -> Self {
        Snssai { sst, sd }
    }
}

impl fmt::Display for Snssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "{:02x}{}", self.sst, hex::encode(sd)),
            None => write!(f, "{:02x}", self.sst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tai {
    #[serde(with = "hex")]
    pub plmn: PlmnId,
    #[serde(with = "hex")]
    pub tac: [u8; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NrCgi {
    pub plmn: PlmnId,
    pub nr_cell_identity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLocation {
    pub tai: Tai,
    pub nr_cgi: NrCgi,
}

/// Globally unique AMF identifier (TS23.003, 2.10.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guami {
    #[serde(with = "hex")]
    pub plmn: PlmnId,
    /// AMF region ID (8 bits), AMF set ID (10 bits), AMF pointer (6 bits).
    #[serde(with = "hex")]
    pub amf_ids: [u8; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guti {
    pub guami: Guami,
    pub tmsi: [u8; 4],
}

impl fmt::Display for Guti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            plmn_to_string(&self.guami.plmn),
            hex::encode(self.guami.amf_ids),
            hex::encode(self.tmsi)
        )
    }
}

mod optional_hex3 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<[u8; 3]>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(sd) => s.serialize_some(&hex::encode(sd)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 3]>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let mut sd = [0u8; 3];
        hex::decode_to_slice(&s, &mut sd).map_err(serde::de::Error::custom)?;
        Ok(Some(sd))
    }
}
