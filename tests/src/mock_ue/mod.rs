use crate::{MockGnb, MockNetwork};
use amf::data::{AccessType, Guti, SecurityContext};
use amf::expect_nas;
use amf::protocols::nas::*;
use amf::protocols::ngap::{InitialContextSetupRequest, NasCause, NgapMessage};
use amf::Amf;
use anyhow::{Result, anyhow, bail, ensure};
use security::nia2::calculate_nia2_mac;
use slog::{Logger, info, o};

// TS33.501, 6.4.2.2 and 6.4.3.1
const BEARER_3GPP: u8 = 1;
const DIRECTION_UPLINK: u8 = 0;

pub struct MockUe<'a> {
    subscriber: u8,
    pub imsi: String,
    ran_ue_ngap_id: u64,
    amf: &'a Amf,
    gnb: &'a MockGnb,
    network: &'a MockNetwork,
    ue_id: Option<u32>,
    security: SecurityContext,
    ul_count: u32,
    pub guti: Option<Guti>,
    /// Camp on this tracking area instead of the one the AMF serves.
    pub tac: Option<[u8; 3]>,
    logger: Logger,
}

impl<'a> MockUe<'a> {
    /// `subscriber` is 1..=9 and picks the IMSI.
    pub fn new(
        subscriber: u8,
        amf: &'a Amf,
        gnb: &'a MockGnb,
        network: &'a MockNetwork,
        logger: &Logger,
    ) -> Self {
        MockUe {
            subscriber,
            imsi: format!("imsi-20893000000000{subscriber}"),
            ran_ue_ngap_id: subscriber as u64,
            amf,
            gnb,
            network,
            ue_id: None,
            security: SecurityContext::default(),
            ul_count: 0,
            guti: None,
            tac: None,
            logger: logger.new(o!("ue" => subscriber)),
        }
    }

    /// Register from scratch.  With `follow_on_request_pending` the AMF keeps the signalling
    /// connection up afterwards.
    pub async fn register(&mut self, follow_on_request_pending: bool) -> Result<RegistrationAccept> {
        self.send_registration_request(follow_on_request_pending)
            .await?;
        self.handle_authentication().await?;
        self.handle_security_mode().await?;
        self.handle_registration_accept().await
    }

    pub async fn send_registration_request(&mut self, follow_on_request_pending: bool) -> Result<()> {
        let message = build_nas::registration_request(self.subscriber, follow_on_request_pending);
        info!(&self.logger, "NAS Registration Request >>");
        self.send_initial(UplinkNasPdu::plain(message), false).await
    }

    pub async fn handle_authentication(&mut self) -> Result<AuthenticationRequest> {
        let request = self.receive_authentication_request().await?;
        let (res_star, kseaf) = self.network.usim_response(&rand(&request)?)?;
        self.security.abba = request.abba;
        self.security.derive_kamf(&kseaf, &self.imsi)?;
        info!(&self.logger, "NAS Authentication Response >>");
        self.send_uplink(UplinkNasPdu::plain(build_nas::authentication_response(
            &res_star,
        )))
        .await?;
        Ok(request)
    }

    /// Answer the challenge as if the USIM held the wrong key.
    pub async fn fail_authentication(&mut self) -> Result<()> {
        let _ = self.receive_authentication_request().await?;
        info!(&self.logger, "NAS Authentication Response (wrong RES*) >>");
        self.send_uplink(UplinkNasPdu::plain(build_nas::authentication_response(
            &[0u8; 16],
        )))
        .await
    }

    /// Refuse the next challenge with an Authentication Failure.  Returns the challenge's RAND.
    pub async fn refuse_authentication(
        &mut self,
        cause: u8,
        auts: Option<Vec<u8>>,
    ) -> Result<[u8; 16]> {
        let request = self.receive_authentication_request().await?;
        info!(&self.logger, "NAS Authentication Failure (cause {cause:#04x}) >>");
        self.send_uplink(UplinkNasPdu::plain(build_nas::authentication_failure(
            cause, auts,
        )))
        .await?;
        rand(&request)
    }

    pub async fn receive_authentication_request(&mut self) -> Result<AuthenticationRequest> {
        let request = expect_nas!(AuthenticationRequest, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Authentication Request <<");
        Ok(request)
    }

    pub async fn receive_authentication_reject(&mut self) -> Result<()> {
        let _reject = expect_nas!(AuthenticationReject, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Authentication Reject <<");
        Ok(())
    }

    pub async fn handle_security_mode(&mut self) -> Result<()> {
        let nas = self.receive_nas().await?;
        ensure!(
            nas.security_header_type == SecurityHeaderType::IntegrityProtectedWithNewContext,
            "Security Mode Command sent with {:?}",
            nas.security_header_type
        );
        let protection = nas
            .protection
            .ok_or_else(|| anyhow!("Security Mode Command is not protected"))?;
        let command = expect_nas!(SecurityModeCommand, nas.message)?;
        info!(&self.logger, "NAS Security Mode Command <<");

        self.security.integrity_algorithm = command.integrity_algorithm;
        self.security.ciphering_algorithm = command.ciphering_algorithm;
        self.security.derive_algorithm_keys();
        ensure!(
            protection.knas_int == self.security.knas_int,
            "UE and AMF derived different KNASint"
        );

        // The new context starts from COUNT 0 in both directions.
        self.ul_count = 0;
        let nas = self.protect(
            build_nas::security_mode_complete(),
            SecurityHeaderType::IntegrityProtectedAndCipheredWithNewContext,
        );
        info!(&self.logger, "NAS Security Mode Complete >>");
        self.send_uplink(nas).await
    }

    pub async fn reject_security_mode(&mut self) -> Result<()> {
        let _command = expect_nas!(SecurityModeCommand, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Security Mode Command <<");
        info!(&self.logger, "NAS Security Mode Reject >>");
        self.send_uplink(UplinkNasPdu::plain(build_nas::security_mode_reject(
            cause::SECURITY_MODE_REJECTED_UNSPECIFIED,
        )))
        .await
    }

    pub async fn handle_registration_accept(&mut self) -> Result<RegistrationAccept> {
        let accept = expect_nas!(RegistrationAccept, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Registration Accept <<");
        self.guti = accept.guti;
        let nas = self.protect(
            build_nas::registration_complete(),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
        );
        info!(&self.logger, "NAS Registration Complete >>");
        self.send_uplink(nas).await?;
        Ok(accept)
    }

    pub async fn receive_registration_reject(&mut self) -> Result<u8> {
        let reject = expect_nas!(RegistrationReject, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Registration Reject <<");
        Ok(reject.cause)
    }

    pub async fn send_pdu_session_establishment_request(&mut self, pdu_session_id: u8) -> Result<()> {
        let payload = build_nas::pdu_session_establishment_request(pdu_session_id);
        info!(&self.logger, "NAS UL NAS Transport (PDU session establishment) >>");
        self.send_5gsm(pdu_session_id, RequestType::InitialRequest, payload)
            .await
    }

    pub async fn send_5gsm(
        &mut self,
        pdu_session_id: u8,
        request_type: RequestType,
        payload: Vec<u8>,
    ) -> Result<()> {
        let nas = self.protect(
            build_nas::ul_nas_transport(pdu_session_id, request_type, payload),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
        );
        self.send_uplink(nas).await
    }

    pub async fn receive_dl_nas_transport(&mut self) -> Result<DlNasTransport> {
        let transport = expect_nas!(DlNasTransport, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS DL NAS Transport <<");
        Ok(transport)
    }

    pub async fn send_deregistration_request(&mut self, switch_off: bool) -> Result<()> {
        let guti = self.guti()?;
        let nas = self.protect(
            build_nas::deregistration_request(switch_off, &guti),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
        );
        info!(&self.logger, "NAS Deregistration Request >>");
        self.send_uplink(nas).await
    }

    pub async fn receive_deregistration_accept(&mut self) -> Result<()> {
        let nas = self.receive_nas().await?;
        let GmmMessage::DeregistrationAcceptToUe = nas.message else {
            bail!("Expected Deregistration Accept, got {}", nas.message.name())
        };
        info!(&self.logger, "NAS Deregistration Accept <<");
        Ok(())
    }

    /// Network initiated deregistration: accept it.
    pub async fn handle_deregistration_request(&mut self) -> Result<DeregistrationRequestToUe> {
        let request = expect_nas!(DeregistrationRequestToUe, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Deregistration Request <<");
        let nas = self.protect(
            GmmMessage::DeregistrationAcceptFromUe,
            SecurityHeaderType::IntegrityProtectedAndCiphered,
        );
        info!(&self.logger, "NAS Deregistration Accept >>");
        self.send_uplink(nas).await?;
        Ok(request)
    }

    /// Come back from idle.  The 5G-S-TMSI in the Initial UE Message finds the UE's context,
    /// and the gNB asks for the UE context to be set up.
    pub async fn send_service_request(
        &mut self,
        service_type: ServiceType,
        pdu_session_status: Option<PsiBitmap>,
    ) -> Result<()> {
        let nas = self.service_request(service_type, pdu_session_status)?;
        info!(&self.logger, "NAS Service Request >>");
        self.send_initial(nas, true).await
    }

    /// Service Request on a signalling connection that is already up.
    pub async fn send_connected_service_request(&mut self, service_type: ServiceType) -> Result<()> {
        let nas = self.service_request(service_type, None)?;
        info!(&self.logger, "NAS Service Request (connected) >>");
        self.send_uplink(nas).await
    }

    fn service_request(
        &mut self,
        service_type: ServiceType,
        pdu_session_status: Option<PsiBitmap>,
    ) -> Result<UplinkNasPdu> {
        let guti = self.guti()?;
        Ok(self.protect(
            build_nas::service_request(service_type, &guti, pdu_session_status),
            SecurityHeaderType::IntegrityProtected,
        ))
    }

    pub async fn receive_service_reject(&mut self) -> Result<u8> {
        let reject = expect_nas!(ServiceReject, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Service Reject <<");
        Ok(reject.cause)
    }

    pub async fn handle_configuration_update_command(
        &mut self,
    ) -> Result<ConfigurationUpdateCommand> {
        let command = expect_nas!(ConfigurationUpdateCommand, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Configuration Update Command <<");
        if command.acknowledgement_requested {
            let nas = self.protect(
                GmmMessage::ConfigurationUpdateComplete,
                SecurityHeaderType::IntegrityProtectedAndCiphered,
            );
            info!(&self.logger, "NAS Configuration Update Complete >>");
            self.send_uplink(nas).await?;
        }
        Ok(command)
    }

    pub async fn handle_notification(&mut self) -> Result<Notification> {
        let notification = expect_nas!(Notification, self.receive_nas().await?.message)?;
        info!(&self.logger, "NAS Notification <<");
        let nas = self.protect(
            GmmMessage::NotificationResponse(NotificationResponse::default()),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
        );
        info!(&self.logger, "NAS Notification Response >>");
        self.send_uplink(nas).await?;
        Ok(notification)
    }

    /// Respond to the Initial Context Setup Request that sets up the RAN side of the UE.
    pub async fn handle_initial_context_setup(&mut self) -> Result<InitialContextSetupRequest> {
        let pdu = self.gnb.receive_ngap().await?;
        self.check_addressed_to_me(pdu.ran_ue_ngap_id)?;
        let NgapMessage::InitialContextSetupRequest(request) = pdu.message else {
            bail!("Expected Initial Context Setup Request, got {}", pdu.message.name())
        };
        info!(&self.logger, "Ngap InitialContextSetupRequest <<");
        self.amf
            .handle_initial_context_setup_response(self.ue_id()?, AccessType::ThreeGpp)
            .await?;
        info!(&self.logger, "Ngap InitialContextSetupResponse >>");
        Ok(*request)
    }

    pub async fn handle_ue_context_release(&mut self) -> Result<NasCause> {
        let pdu = self.gnb.receive_ngap().await?;
        self.check_addressed_to_me(pdu.ran_ue_ngap_id)?;
        let NgapMessage::UeContextReleaseCommand(cause) = pdu.message else {
            bail!("Expected UE Context Release Command, got {}", pdu.message.name())
        };
        info!(&self.logger, "Ngap UeContextReleaseCommand <<");
        self.amf
            .handle_ue_context_release_complete(self.ue_id()?, AccessType::ThreeGpp)
            .await?;
        info!(&self.logger, "Ngap UeContextReleaseComplete >>");
        Ok(cause)
    }

    /// The next NAS message, unwrapped from whichever NGAP message carries it.
    pub async fn receive_nas(&mut self) -> Result<DownlinkNasPdu> {
        let pdu = self.gnb.receive_ngap().await?;
        self.check_addressed_to_me(pdu.ran_ue_ngap_id)?;
        match pdu.message {
            NgapMessage::DownlinkNasTransport(nas) => Ok(nas),
            NgapMessage::PduSessionResourceSetupRequest { nas: Some(nas), .. } => Ok(nas),
            NgapMessage::InitialContextSetupRequest(request) => {
                let nas = request
                    .nas
                    .ok_or_else(|| anyhow!("Initial Context Setup Request has no NAS"))?;
                self.amf
                    .handle_initial_context_setup_response(self.ue_id()?, AccessType::ThreeGpp)
                    .await?;
                Ok(nas)
            }
            m => bail!("Expected NAS, got {}", m.name()),
        }
    }

    fn check_addressed_to_me(&self, ran_ue_ngap_id: u64) -> Result<()> {
        ensure!(
            ran_ue_ngap_id == self.ran_ue_ngap_id,
            "NGAP message for RAN UE {ran_ue_ngap_id}, expected {}",
            self.ran_ue_ngap_id
        );
        Ok(())
    }

    // There is no NAS codec in the loop, so the message name stands in for its encoding
    // under the MAC.
    fn protect(
        &mut self,
        message: GmmMessage,
        security_header_type: SecurityHeaderType,
    ) -> UplinkNasPdu {
        let sequence_number = (self.ul_count & 0xff) as u8;
        let mut protected_bytes = vec![sequence_number];
        protected_bytes.extend_from_slice(message.name().as_bytes());
        let mac = calculate_nia2_mac(
            &self.security.knas_int,
            self.ul_count.to_be_bytes(),
            BEARER_3GPP,
            DIRECTION_UPLINK,
            &protected_bytes,
        );
        self.ul_count = (self.ul_count + 1) & 0xffffff;
        UplinkNasPdu {
            security: Some(UplinkSecurityHeader {
                security_header_type,
                mac,
                sequence_number,
                protected_bytes,
            }),
            message,
        }
    }

    async fn send_initial(&mut self, nas: UplinkNasPdu, ue_context_request: bool) -> Result<()> {
        let s_tmsi = self.guti.map(|guti| guti.tmsi);
        let mut ran_ue = self.ran_ue();
        ran_ue.ue_context_request = ue_context_request;
        let ue_id = self
            .amf
            .handle_initial_ue_message(ran_ue, nas, s_tmsi)
            .await?;
        self.ue_id = Some(ue_id);
        Ok(())
    }

    async fn send_uplink(&self, nas: UplinkNasPdu) -> Result<()> {
        self.amf
            .handle_uplink_nas_transport(self.ue_id()?, self.ran_ue(), nas)
            .await
    }

    fn ran_ue(&self) -> amf::data::RanUe {
        self.gnb.ran_ue(self.ran_ue_ngap_id, self.tac)
    }

    fn ue_id(&self) -> Result<u32> {
        self.ue_id
            .ok_or_else(|| anyhow!("UE has no signalling connection"))
    }

    fn guti(&self) -> Result<Guti> {
        self.guti.ok_or_else(|| anyhow!("UE has no GUTI"))
    }
}

fn rand(request: &AuthenticationRequest) -> Result<[u8; 16]> {
    request
        .rand
        .ok_or_else(|| anyhow!("No RAND in Authentication Request"))
}
