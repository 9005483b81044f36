//! mock_network - the AUSF, UDM, PCF, NSSF and SMF as seen by the AMF

use amf::consumers::*;
use amf::data::{AccessType, Guami, PlmnId, Snssai};
use amf::protocols::nas::parse::supi_from_null_scheme_suci;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

// TS35.208, test set 1.  Every simulated subscriber shares these.
const K: [u8; 16] = [
    0x46, 0x5b, 0x5c, 0xe8, 0xb1, 0x99, 0xb4, 0x9f, 0xaa, 0x5f, 0x0a, 0x2e, 0xe2, 0x38, 0xa6, 0xbc,
];
const OPC: [u8; 16] = [
    0xcd, 0x63, 0xcb, 0x71, 0x95, 0x4a, 0x9f, 0x4e, 0x48, 0xa5, 0x99, 0x4e, 0x37, 0xa0, 0x2b, 0xaf,
];

pub const DEFAULT_DNN: &str = "internet";

pub fn subscribed_snssai() -> Snssai {
    Snssai::new(1, Some([0x01, 0x02, 0x03]))
}

struct IssuedChallenge {
    supi: String,
    rand: [u8; 16],
    xres_star: [u8; 16],
    kseaf: [u8; 32],
}

#[derive(Default)]
struct State {
    sqn: [u8; 6],
    challenges: HashMap<String, IssuedChallenge>,
    uecm_registrations: Vec<String>,
    am_policies: HashMap<String, String>,
    sm_contexts: HashMap<String, SmContextCreateData>,
    next_sm_context: u32,
    sm_context_updates: Vec<SmContextUpdateData>,
    resynchronizations: u32,
}

/// Simulated network functions.  Requests are answered from a fixed subscription and
/// recorded so that tests can check what the AMF asked for.
#[derive(Default)]
pub struct MockNetwork {
    state: Mutex<State>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mock UE has no USIM, so it takes RES* and Kseaf from the AUSF's record of the
    /// challenge it was sent.
    pub fn usim_response(&self, rand: &[u8; 16]) -> Result<([u8; 16], [u8; 32])> {
        let state = self.state.lock().unwrap();
        state
            .challenges
            .values()
            .find(|c| c.rand == *rand)
            .map(|c| (c.xres_star, c.kseaf))
            .ok_or_else(|| anyhow!("No challenge issued with RAND {}", hex::encode(rand)))
    }

    pub fn is_registered_at_udm(&self, supi: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .uecm_registrations
            .iter()
            .any(|s| s == supi)
    }

    pub fn am_policy_count(&self) -> usize {
        self.state.lock().unwrap().am_policies.len()
    }

    pub fn sm_contexts(&self) -> Vec<SmContextCreateData> {
        self.state
            .lock()
            .unwrap()
            .sm_contexts
            .values()
            .cloned()
            .collect()
    }

    pub fn sm_contexts_created(&self) -> u32 {
        self.state.lock().unwrap().next_sm_context
    }

    pub fn resynchronization_count(&self) -> u32 {
        self.state.lock().unwrap().resynchronizations
    }

    pub fn sm_context_updates(&self) -> Vec<SmContextUpdateData> {
        self.state.lock().unwrap().sm_context_updates.clone()
    }
}

#[async_trait]
impl AusfClient for MockNetwork {
    async fn authenticate(
        &self,
        supi_or_suci: &str,
        serving_network_name: &str,
        resynchronization_info: Option<ResynchronizationInfo>,
    ) -> Result<UeAuthenticationCtx> {
        let supi = if supi_or_suci.starts_with("suci-") {
            supi_from_null_scheme_suci(supi_or_suci)
                .ok_or_else(|| anyhow!("Cannot deconceal {supi_or_suci}"))?
        } else {
            supi_or_suci.to_string()
        };

        let mut state = self.state.lock().unwrap();
        // The AUTS is not checked.  A resynchronized subscriber just gets a fresh vector.
        if resynchronization_info.is_some() {
            state.resynchronizations += 1;
        }
        let challenge =
            security::generate_challenge(&K, &OPC, serving_network_name.as_bytes(), &mut state.sqn);
        let confirmation_ref = format!(
            "/nausf-auth/v1/ue-authentications/{}/5g-aka-confirmation",
            hex::encode(challenge.rand)
        );
        let ctx = UeAuthenticationCtx {
            auth_type: AuthType::FiveGAka,
            av_5g_aka: Some(Av5gAka {
                rand: challenge.rand,
                autn: challenge.autn,
                hxres_star: hex::encode(security::hres_star(
                    &challenge.rand,
                    &challenge.xres_star,
                )),
            }),
            eap_payload: None,
            confirmation_ref: confirmation_ref.clone(),
        };
        state.challenges.insert(
            confirmation_ref,
            IssuedChallenge {
                supi,
                rand: challenge.rand,
                xres_star: challenge.xres_star,
                kseaf: challenge.kseaf,
            },
        );
        Ok(ctx)
    }

    async fn confirm_5g_aka(
        &self,
        ctx: &UeAuthenticationCtx,
        res_star: &[u8],
    ) -> Result<ConfirmationData> {
        let state = self.state.lock().unwrap();
        let challenge = state
            .challenges
            .get(&ctx.confirmation_ref)
            .ok_or_else(|| anyhow!("Unknown confirmation {}", ctx.confirmation_ref))?;
        if challenge.xres_star[..] != *res_star {
            return Ok(ConfirmationData {
                auth_result: AuthResult::Failure,
                kseaf: None,
                supi: None,
            });
        }
        Ok(ConfirmationData {
            auth_result: AuthResult::Success,
            kseaf: Some(challenge.kseaf),
            supi: Some(challenge.supi.clone()),
        })
    }

    async fn confirm_eap(
        &self,
        _ctx: &UeAuthenticationCtx,
        _eap_payload: &[u8],
    ) -> Result<EapSession> {
        bail!("EAP-AKA' is not simulated")
    }
}

#[async_trait]
impl UdmClient for MockNetwork {
    async fn uecm_registration(
        &self,
        supi: &str,
        _access_type: AccessType,
        _guami: &Guami,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.uecm_registrations.push(supi.to_string());
        Ok(())
    }

    async fn get_am_data(&self, _supi: &str, _plmn: &PlmnId) -> Result<AmSubscription> {
        Ok(AmSubscription {
            gpsis: vec!["msisdn-447700900123".to_string()],
            nssai: subscribed_nssai(),
            service_area_restriction: None,
        })
    }

    async fn get_smf_select_data(
        &self,
        _supi: &str,
        _plmn: &PlmnId,
    ) -> Result<SmfSelectionSubscription> {
        let dnns = vec![DnnInfo {
            dnn: DEFAULT_DNN.to_string(),
            default_dnn_indicator: true,
        }];
        Ok(SmfSelectionSubscription {
            subscribed_snssai_infos: HashMap::from([(subscribed_snssai(), dnns)]),
        })
    }

    async fn get_ue_context_in_smf_data(&self, _supi: &str) -> Result<UeContextInSmfData> {
        Ok(UeContextInSmfData::default())
    }

    async fn get_slice_selection_subscription_data(
        &self,
        _supi: &str,
        _plmn: &PlmnId,
    ) -> Result<Vec<SubscribedSnssai>> {
        Ok(subscribed_nssai())
    }

    async fn sdm_subscribe(&self, _supi: &str, _plmn: &PlmnId) -> Result<()> {
        Ok(())
    }
}

fn subscribed_nssai() -> Vec<SubscribedSnssai> {
    vec![SubscribedSnssai {
        snssai: subscribed_snssai(),
        default_indication: true,
    }]
}

#[async_trait]
impl PcfClient for MockNetwork {
    async fn create_am_policy(&self, request: AmPolicyRequest) -> Result<AmPolicyAssociation> {
        let association_id = format!("am-policy-{}", request.supi);
        let mut state = self.state.lock().unwrap();
        state
            .am_policies
            .insert(association_id.clone(), request.supi);
        Ok(AmPolicyAssociation {
            association_id,
            service_area_restriction: None,
            rfsp: None,
        })
    }

    async fn update_am_policy(
        &self,
        association_id: &str,
        _update: AmPolicyUpdate,
    ) -> Result<AmPolicyAssociation> {
        let state = self.state.lock().unwrap();
        if !state.am_policies.contains_key(association_id) {
            bail!("No AM policy association {association_id}");
        }
        Ok(AmPolicyAssociation {
            association_id: association_id.to_string(),
            service_area_restriction: None,
            rfsp: None,
        })
    }

    async fn delete_am_policy(&self, association_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .am_policies
            .remove(association_id)
            .ok_or_else(|| anyhow!("No AM policy association {association_id}"))?;
        Ok(())
    }
}

#[async_trait]
impl NssfClient for MockNetwork {
    async fn get_ns_selection_for_registration(
        &self,
        subscribed_nssai: &[SubscribedSnssai],
        requested_nssai: &[Snssai],
    ) -> Result<AuthorizedNetworkSliceInfo> {
        let allowed = requested_nssai
            .iter()
            .filter(|r| subscribed_nssai.iter().any(|s| s.snssai == **r))
            .copied()
            .collect();
        Ok(AuthorizedNetworkSliceInfo {
            allowed_nssai: vec![(AccessType::ThreeGpp, allowed)],
            target_amf_set: None,
        })
    }

    async fn get_ns_selection_for_pdu_session(&self, _snssai: &Snssai) -> Result<NsiInformation> {
        Ok(NsiInformation {
            nrf_id: "http://nrf.example:8000/nnrf-nfm/v1/nf-instances".to_string(),
            nsi_id: Some("1".to_string()),
        })
    }
}

#[async_trait]
impl SmfClient for MockNetwork {
    async fn create_sm_context(&self, data: SmContextCreateData) -> Result<CreateSmContextResponse> {
        let mut state = self.state.lock().unwrap();
        if data.dnn != DEFAULT_DNN {
            return Ok(CreateSmContextResponse::Rejected {
                n1_sm_msg: Some(data.n1_sm_msg),
            });
        }
        state.next_sm_context += 1;
        let sm_context_ref = format!("sm-context-{}", state.next_sm_context);
        state.sm_contexts.insert(sm_context_ref.clone(), data);
        Ok(CreateSmContextResponse::Created { sm_context_ref })
    }

    // 5GSM payloads come straight back to the UE.
    async fn update_sm_context(
        &self,
        sm_context_ref: &str,
        data: SmContextUpdateData,
    ) -> Result<SmContextUpdatedData> {
        let mut state = self.state.lock().unwrap();
        if !state.sm_contexts.contains_key(sm_context_ref) {
            bail!("No SM context {sm_context_ref}");
        }
        state.sm_context_updates.push(data.clone());
        if data.release {
            state.sm_contexts.remove(sm_context_ref);
            return Ok(SmContextUpdatedData {
                up_cnx_state: None,
                n1_sm_msg: None,
                n2_sm_info: Some(N2SmInfo {
                    info_type: N2SmInfoType::PduResRelCmd,
                    content: vec![0x00],
                }),
            });
        }
        Ok(SmContextUpdatedData {
            up_cnx_state: data.up_cnx_state,
            n1_sm_msg: data.n1_sm_msg,
            n2_sm_info: None,
        })
    }

    async fn release_sm_context(
        &self,
        sm_context_ref: &str,
        _data: SmContextReleaseData,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .sm_contexts
            .remove(sm_context_ref)
            .ok_or_else(|| anyhow!("No SM context {sm_context_ref}"))?;
        Ok(())
    }
}
