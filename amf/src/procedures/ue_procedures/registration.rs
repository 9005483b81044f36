//! registration - initial and mobility / periodic registration (TS23.502, 4.2.2.2.2)

use super::{GmmAction, NotImplemented, UeProcedure};
use crate::HandlerApi;
use crate::consumers::{
    AmPolicyRequest, AmPolicyUpdate, SmfSelectionSubscription, SubscribedSnssai,
};
use crate::data::{
    AccessType, Config, GmmEvent, GmmState, Guti, PlmnId, ReleaseAction, Snssai, Tai,
};
use crate::protocols::nas::{
    IdentityType, Ladn, PduSessionResults, RegistrationComplete,
    RegistrationRequest, RegistrationType, build, cause,
};
use crate::protocols::ngap::{NasCause, NgapMessage, PduSessionResourceItem};
use crate::timer::TimerKind;
use anyhow::{Context, Result, anyhow, bail, ensure};
use derive_deref::{Deref, DerefMut};
use slog::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};

// TS24.501, 9.11.3.2A: DRX cycle parameter T = 32, 64, 128, 256.
const DRX_VALUE_NOT_SPECIFIED: u8 = 0;
const DRX_MAX_VALUE: u8 = 4;

const WILDCARD_DNN: &str = "*";

#[derive(Deref, DerefMut)]
pub struct RegistrationProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> RegistrationProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        RegistrationProcedure(inner)
    }

    /// Continue the stored registration once the UE is authenticated and its NAS secured.
    pub async fn run(mut self, access_type: AccessType) -> Result<()> {
        let request = self
            .ue
            .registration_request
            .clone()
            .ok_or_else(|| anyhow!("No registration request to continue"))?;
        match self.ue.registration_type {
            Some(RegistrationType::Initial) | None => self.initial(access_type, request).await,
            Some(RegistrationType::MobilityUpdating | RegistrationType::PeriodicUpdating) => {
                self.mobility_and_periodic(access_type, request).await
            }
            Some(other) => bail!("Cannot continue {other:?} registration"),
        }
    }

    async fn initial(&mut self, access_type: AccessType, request: RegistrationRequest) -> Result<()> {
        info!(self.logger, "Initial registration");
        self.ue.clear_registration_data();
        self.ue.security.update_for_access(access_type);

        self.select_slices(access_type, &request).await?;
        if let Some(capability) = &request.capability_5gmm {
            self.ue.capability_5gmm = Some(capability.clone());
        }

        if self.ue.allowed_nssai[access_type].is_empty() {
            warn!(self.logger, "No allowed NSSAI - reject and remove the UE");
            if let Err(e) = self
                .send_nas(
                    access_type,
                    build::registration_reject(cause::FIVEGS_SERVICES_NOT_ALLOWED, None),
                )
                .await
            {
                warn!(self.logger, "Failed to send Registration Reject - {e:#}");
            }
            if let Err(e) = self
                .release_ue_context(
                    access_type,
                    ReleaseAction::N2NormalRelease,
                    NasCause::NormalRelease,
                )
                .await
            {
                warn!(self.logger, "Failed to release UE context - {e:#}");
            }
            self.remove_ue();
            bail!("No allowed NSSAI");
        }

        self.take_optional_ies(&request);
        if self.ue.serving_amf_changed {
            debug!(self.logger, "Serving AMF changed - no registration status update sent");
        }
        if self.needs_subscription_data() {
            self.communicate_with_udm(access_type).await?;
        }

        if let Err(e) = self.create_am_policy(access_type).await {
            warn!(self.logger, "AM policy association failed - {e:#}");
            self.send_nas(
                access_type,
                build::registration_reject(cause::FIVEGS_SERVICES_NOT_ALLOWED, None),
            )
            .await?;
            return Err(e);
        }

        self.finish_and_accept(access_type, &request, PduSessionResults::default(), vec![])
            .await
    }

    async fn mobility_and_periodic(
        &mut self,
        access_type: AccessType,
        request: RegistrationRequest,
    ) -> Result<()> {
        info!(self.logger, "Mobility / periodic registration update");
        self.select_slices(access_type, &request).await?;

        match &request.capability_5gmm {
            Some(capability) => self.ue.capability_5gmm = Some(capability.clone()),
            None if self.ue.registration_type != Some(RegistrationType::PeriodicUpdating) => {
                self.send_nas(
                    access_type,
                    build::registration_reject(cause::PROTOCOL_ERROR_UNSPECIFIED, None),
                )
                .await?;
                bail!("Registration rejected - no 5GMM capability");
            }
            None => {}
        }
        self.take_optional_ies(&request);

        // The Identity Response brings us back here.
        if self.ue.pei.is_none() {
            self.send_nas(access_type, build::identity_request(IdentityType::Imei))
                .await?;
            return Ok(());
        }

        if self.needs_subscription_data() {
            self.communicate_with_udm(access_type).await?;
        }

        let mut results = PduSessionResults::default();
        let mut sessions = Vec::new();
        if let Some(uplink_data_status) = request.uplink_data_status {
            sessions = self
                .reactivate_pdu_sessions(access_type, uplink_data_status, &mut results)
                .await;
        }
        if let Some(status) = request.pdu_session_status {
            results.pdu_session_status =
                Some(self.reconcile_pdu_session_status(access_type, status).await);
        }
        if request.allowed_pdu_session_status.is_some() {
            debug!(self.logger, "Allowed PDU session status ignored - no downlink data held");
        }
        self.update_am_policy(access_type).await;

        self.finish_and_accept(access_type, &request, results, sessions)
            .await
    }

    // Steps common to the end of both registration types.
    async fn finish_and_accept(
        &mut self,
        access_type: AccessType,
        request: &RegistrationRequest,
        results: PduSessionResults,
        sessions: Vec<PduSessionResourceItem>,
    ) -> Result<()> {
        let api = self.api;
        let config = api.config();
        self.ue.registration_area[access_type] = registration_area(config, self.ue.tai);
        self.ensure_guti();
        self.ue.ladn_info = ladn_info(
            &config.ladn_pool,
            request.ladn_indication.as_deref(),
            self.ue.smf_selection_data.as_ref(),
            &self.ue.registration_area[access_type],
        );
        self.send_registration_accept(access_type, results, sessions)
            .await
    }

    fn take_optional_ies(&mut self, request: &RegistrationRequest) {
        if let Some(tai) = request.last_visited_registered_tai {
            self.ue.last_visited_registered_tai = Some(tai);
        }
        if request.mico_indication {
            warn!(self.logger, "MICO mode requested but not supported");
        }
        if let Some(drx) = request.requested_drx_parameters {
            self.ue.negotiated_drx = Some(negotiate_drx(drx));
        }
    }

    fn needs_subscription_data(&self) -> bool {
        self.ue.serving_amf_changed
            || self.ue.state[AccessType::NonThreeGpp] == GmmState::Registered
            || !self.ue.subscription_data_valid
    }

    fn supi(&self) -> Result<String> {
        self.ue
            .supi
            .clone()
            .ok_or_else(|| anyhow!("UE has no SUPI"))
    }

    // TS23.502, 4.2.2.2.3 steps 1-4: Allowed NSSAI from the Requested NSSAI, else the
    // subscriber's default slices.
    async fn select_slices(
        &mut self,
        access_type: AccessType,
        request: &RegistrationRequest,
    ) -> Result<()> {
        if self.ue.subscribed_nssai.is_empty() {
            self.get_subscribed_nssai().await;
        }

        if let Some(requested) = &request.requested_nssai {
            info!(self.logger, "Requested NSSAI {requested:?}");
            let subscribed = |s: &Snssai| self.ue.subscribed_nssai.iter().any(|x| x.snssai == *s);
            if requested.iter().all(subscribed) {
                self.ue.allowed_nssai[access_type] = requested.clone();
            } else {
                self.log_message("<< Nssf NSSelectionGet (registration)");
                match self
                    .consumers()
                    .nssf
                    .get_ns_selection_for_registration(&self.ue.subscribed_nssai, requested)
                    .await
                {
                    Ok(info) => {
                        self.log_message(">> Nssf AuthorizedNetworkSliceInfo");
                        if let Some(target) = info.target_amf_set {
                            debug!(self.logger, "NSSF suggests AMF set {target} - not rerouting");
                        }
                        self.ue.allowed_nssai[access_type] = info
                            .allowed_nssai
                            .into_iter()
                            .filter(|(a, _)| *a == access_type)
                            .flat_map(|(_, nssai)| nssai)
                            .collect();
                    }
                    Err(e) => {
                        self.send_nas(
                            access_type,
                            build::registration_reject(cause::PROTOCOL_ERROR_UNSPECIFIED, None),
                        )
                        .await?;
                        return Err(e.context("Network slice selection failed"));
                    }
                }
            }
        }

        if self.ue.allowed_nssai[access_type].is_empty() {
            let api = self.api;
            self.ue.allowed_nssai[access_type] =
                default_allowed_nssai(&self.ue.subscribed_nssai, api.config());
        }
        Ok(())
    }

    async fn get_subscribed_nssai(&mut self) {
        let (Some(supi), Some(plmn)) = (self.ue.supi.clone(), self.serving_plmn()) else {
            return;
        };
        self.log_message("<< Udm SliceSelectionSubscriptionDataGet");
        match self
            .consumers()
            .udm
            .get_slice_selection_subscription_data(&supi, &plmn)
            .await
        {
            Ok(nssai) => self.ue.subscribed_nssai = nssai,
            Err(e) => warn!(self.logger, "Failed to get subscribed NSSAI - {e:#}"),
        }
    }

    fn serving_plmn(&self) -> Option<PlmnId> {
        self.ue.plmn.or(Some(self.config().plmn))
    }

    async fn communicate_with_udm(&mut self, access_type: AccessType) -> Result<()> {
        let supi = self.supi()?;
        let api = self.api;
        let plmn = self.ue.plmn.unwrap_or(api.config().plmn);
        let udm = &api.consumers().udm;

        if access_type == AccessType::ThreeGpp {
            self.log_message("<< Udm UecmRegistration");
            if let Err(e) = udm
                .uecm_registration(&supi, access_type, &api.config().guami)
                .await
            {
                warn!(self.logger, "UECM registration failed - {e:#}");
            }
        } else {
            warn!(self.logger, "{}", NotImplemented::Non3gppUecmRegistration);
        }

        self.log_message("<< Udm AmDataGet");
        let am_data = udm.get_am_data(&supi, &plmn).await.context("SDM get AM data")?;
        if let Some(gpsi) = am_data.gpsis.first() {
            self.ue.gpsi = Some(gpsi.clone());
        }
        self.ue.am_subscription = Some(am_data);

        self.log_message("<< Udm SmfSelectDataGet");
        self.ue.smf_selection_data = Some(
            udm.get_smf_select_data(&supi, &plmn)
                .await
                .context("SDM get SMF selection data")?,
        );

        self.log_message("<< Udm UeContextInSmfDataGet");
        self.ue.ue_context_in_smf = Some(
            udm.get_ue_context_in_smf_data(&supi)
                .await
                .context("SDM get UE context in SMF data")?,
        );

        self.log_message("<< Udm SdmSubscribe");
        udm.sdm_subscribe(&supi, &plmn)
            .await
            .context("SDM subscribe")?;

        self.ue.subscription_data_valid = true;
        Ok(())
    }

    async fn create_am_policy(&mut self, access_type: AccessType) -> Result<()> {
        let api = self.api;
        let request = AmPolicyRequest {
            supi: self.supi()?,
            access_type,
            pei: self.ue.pei.clone(),
            gpsi: self.ue.gpsi.clone(),
            user_location: self.ue.location,
            serving_plmn: api.config().plmn,
            guami: api.config().guami,
        };
        self.log_message("<< Pcf AmPolicyControlCreate");
        let association = api.consumers().pcf.create_am_policy(request).await?;
        self.log_message(">> Pcf PolicyAssociation");
        debug!(self.logger, "AM policy association {}", association.association_id);
        self.ue.am_policy = Some(association);
        self.ue.location_changed = false;
        Ok(())
    }

    // Best effort.  A failure does not hold up the registration.
    async fn update_am_policy(&mut self, access_type: AccessType) {
        if !self.ue.location_changed {
            return;
        }
        let Some(association_id) = self.ue.am_policy.as_ref().map(|p| p.association_id.clone())
        else {
            return;
        };
        let update = AmPolicyUpdate {
            user_location: self.ue.location,
            access_type,
        };
        self.log_message("<< Pcf AmPolicyControlUpdate");
        match self
            .consumers()
            .pcf
            .update_am_policy(&association_id, update)
            .await
        {
            Ok(association) => {
                self.ue.am_policy = Some(association);
                self.ue.location_changed = false;
            }
            Err(e) => warn!(self.logger, "AM policy update failed - {e:#}"),
        }
    }

    // A UE registering for the first time gets a GUTI here.
    fn ensure_guti(&mut self) {
        if self.ue.guti.is_some() {
            return;
        }
        let ue_id = self.ue.ue_id;
        let tmsi = self.allocate_tmsi(ue_id);
        let guami = self.config().guami;
        let guti = Guti { guami, tmsi };
        info!(self.logger, "Allocated GUTI {guti}");
        self.ue.guti = Some(guti);
    }

    /// Send Registration Accept and start T3550.  Over non-3GPP access the N3IWF gets an Initial
    /// Context Setup Request first, and the accept follows its response.
    async fn send_registration_accept(
        &mut self,
        access_type: AccessType,
        results: PduSessionResults,
        sessions: Vec<PduSessionResourceItem>,
    ) -> Result<()> {
        let ue_context_request = self.ran_ue(access_type)?.ue_context_request;
        let api = self.api;
        let message = build::registration_accept(&*self.ue, access_type, api.config(), results);
        let pdu = self.protect(message);

        if access_type == AccessType::NonThreeGpp {
            // TS23.502, 4.12.2.2 steps 10a-13
            self.send_initial_context_setup(access_type, None, sessions)
                .await?;
            self.ue.registration_accept_for_non3gpp = Some(pdu);
            return Ok(());
        }

        if ue_context_request {
            self.send_initial_context_setup(access_type, Some(pdu.clone()), sessions)
                .await?;
        } else if !sessions.is_empty() {
            let nas = Some(pdu.clone());
            self.send_ngap(
                access_type,
                NgapMessage::PduSessionResourceSetupRequest { nas, sessions },
            )
            .await?;
        } else {
            self.send_ngap(access_type, NgapMessage::DownlinkNasTransport(pdu.clone()))
                .await?;
        }
        self.start_timer(TimerKind::T3550, access_type, Some(pdu));
        Ok(())
    }

    pub async fn handle_complete(
        mut self,
        access_type: AccessType,
        r: RegistrationComplete,
    ) -> Result<Option<GmmAction>> {
        self.log_message(">> Nas RegistrationComplete");
        ensure!(
            !self.ue.security.mac_failed,
            "NAS message integrity check failed"
        );
        self.stop_timer(TimerKind::T3550);
        if r.sor_transparent_container.is_some() {
            debug!(self.logger, "Ignoring SOR transparent container");
        }
        self.ue.old_guti = None;

        let release = self
            .ue
            .registration_request
            .as_ref()
            .is_some_and(|request| {
                release_after_registration(request, self.ue.has_sessions_on(access_type))
            });
        if release {
            self.release_ue_context(
                access_type,
                ReleaseAction::N2NormalRelease,
                NasCause::NormalRelease,
            )
            .await?;
        }
        Ok(Some(GmmAction::Event(GmmEvent::ContextSetupSuccess, None)))
    }
}

/// TS24.501, 5.5.1.2.4: keep the signalling connection if the UE has more to do.
fn release_after_registration(request: &RegistrationRequest, has_sessions: bool) -> bool {
    !request.follow_on_request_pending && request.uplink_data_status.is_none() && !has_sessions
}

fn negotiate_drx(requested: u8) -> u8 {
    match requested & 0x0f {
        v @ 1..=DRX_MAX_VALUE => v,
        _ => DRX_VALUE_NOT_SPECIFIED,
    }
}

// The registration area is the UE's current TA, if we serve it.
fn registration_area(config: &Config, tai: Option<Tai>) -> Vec<Tai> {
    config
        .supported_tai_list
        .iter()
        .filter(|t| Some(**t) == tai)
        .copied()
        .collect()
}

fn default_allowed_nssai(subscribed: &[SubscribedSnssai], config: &Config) -> Vec<Snssai> {
    subscribed
        .iter()
        .filter(|s| s.default_indication && config.in_plmn_support(&s.snssai))
        .map(|s| s.snssai)
        .collect()
}

/// TS23.501, 5.6.5: the LADNs to tell the UE about.  A LADN is only included if the whole of
/// its service area is inside the registration area.
fn ladn_info(
    pool: &HashMap<String, Vec<Tai>>,
    ladn_indication: Option<&[String]>,
    smf_selection: Option<&SmfSelectionSubscription>,
    registration_area: &[Tai],
) -> Vec<Ladn> {
    let subscribed: BTreeSet<&str> = smf_selection
        .map(|s| s.all_dnns().collect())
        .unwrap_or_default();

    let candidates: BTreeSet<&str> = match ladn_indication {
        Some([]) if subscribed.contains(WILDCARD_DNN) => {
            pool.keys().map(String::as_str).collect()
        }
        Some([]) => subscribed,
        Some(requested) => requested.iter().map(String::as_str).collect(),
        None => subscribed
            .into_iter()
            .filter(|dnn| *dnn != WILDCARD_DNN)
            .collect(),
    };

    candidates
        .into_iter()
        .filter_map(|dnn| {
            let tai_list = pool.get(dnn)?;
            tai_list
                .iter()
                .all(|t| registration_area.contains(t))
                .then(|| Ladn {
                    dnn: dnn.to_string(),
                    tai_list: tai_list.clone(),
                })
        })
        .collect()
}
