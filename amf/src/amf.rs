use crate::consumers::Consumers;
use crate::data::{AccessType, Config, GmmFsm, RanUe, new_gmm_fsm};
use crate::procedures::{HandlerApi, UeMessage, UeMessageHandler};
use crate::protocols::nas::parse::{MobileIdentity, mobile_identity};
use crate::protocols::nas::{GmmMessage, UplinkNasPdu};
use crate::protocols::ngap::NgapPdu;
use anyhow::{Result, anyhow, bail};
use async_channel::Sender;
use async_trait::async_trait;
use dashmap::DashMap;
use slog::{Logger, debug, info, o, warn};
use std::sync::Arc;

/// The AMF's GMM core.  Each UE context lives in its own task; this struct routes NGAP
/// events and SBI triggers to the right task.
#[derive(Clone)]
pub struct Amf {
    config: Arc<Config>,
    gmm_fsm: Arc<GmmFsm>,
    consumers: Consumers,
    logger: Logger,
    ue_tasks: Arc<DashMap<u32, Sender<UeMessage>>>,
    tmsi_index: Arc<DashMap<[u8; 4], u32>>,
    supi_index: Arc<DashMap<String, u32>>,
}

impl Amf {
    pub fn start(config: Config, consumers: Consumers, logger: Logger) -> Result<Self> {
        config.validate()?;
        let gmm_fsm = new_gmm_fsm()?;
        info!(
            &logger,
            "Started {} serving {} TAIs", config.name, config.supported_tai_list.len()
        );
        Ok(Amf {
            config: Arc::new(config),
            gmm_fsm: Arc::new(gmm_fsm),
            consumers,
            logger,
            ue_tasks: Arc::new(DashMap::new()),
            tmsi_index: Arc::new(DashMap::new()),
            supi_index: Arc::new(DashMap::new()),
        })
    }

    /// NAS from an Initial UE Message.  The UE is found by its 5G-S-TMSI or GUTI if it has
    /// one of ours, otherwise it gets a new context.  Returns the UE ID to route later
    /// messages with.
    pub async fn handle_initial_ue_message(
        &self,
        ran_ue: RanUe,
        nas: UplinkNasPdu,
        five_g_s_tmsi: Option<[u8; 4]>,
    ) -> Result<u32> {
        let known = five_g_s_tmsi
            .or_else(|| self.tmsi_in_message(&nas.message))
            .and_then(|tmsi| self.tmsi_index.get(&tmsi).map(|e| *e.value()))
            .filter(|ue_id| self.ue_tasks.contains_key(ue_id));
        let ue_id = match known {
            Some(ue_id) => {
                debug!(self.logger, "Initial UE message for known UE {ue_id}");
                ue_id
            }
            None => self.spawn_ue_message_handler(),
        };
        self.dispatch_ue_message(ue_id, UeMessage::InitialUeMessage { ran_ue, nas })
            .await?;
        Ok(ue_id)
    }

    pub async fn handle_uplink_nas_transport(
        &self,
        ue_id: u32,
        ran_ue: RanUe,
        nas: UplinkNasPdu,
    ) -> Result<()> {
        self.dispatch_ue_message(ue_id, UeMessage::UplinkNasTransport { ran_ue, nas })
            .await
    }

    pub async fn handle_initial_context_setup_response(
        &self,
        ue_id: u32,
        access_type: AccessType,
    ) -> Result<()> {
        self.dispatch_ue_message(ue_id, UeMessage::InitialContextSetupResponse { access_type })
            .await
    }

    pub async fn handle_ue_context_release_complete(
        &self,
        ue_id: u32,
        access_type: AccessType,
    ) -> Result<()> {
        self.dispatch_ue_message(ue_id, UeMessage::UeContextReleaseComplete { access_type })
            .await
    }

    /// Deregister a subscriber on one access type, for example on a UDM deregistration
    /// notification.
    pub async fn network_initiated_deregistration(
        &self,
        supi: &str,
        access_type: AccessType,
    ) -> Result<()> {
        let ue_id = self.ue_by_supi(supi)?;
        self.dispatch_ue_message(ue_id, UeMessage::NetworkInitiatedDeregistration { access_type })
            .await
    }

    /// Ask a UE connected over 3GPP access to re-establish a session on `access_type`.
    pub async fn send_notification(&self, supi: &str, access_type: AccessType) -> Result<()> {
        let ue_id = self.ue_by_supi(supi)?;
        self.dispatch_ue_message(ue_id, UeMessage::Notification { access_type })
            .await
    }

    pub async fn configuration_update(&self, supi: &str, access_type: AccessType) -> Result<()> {
        let ue_id = self.ue_by_supi(supi)?;
        self.dispatch_ue_message(ue_id, UeMessage::ConfigurationUpdate { access_type })
            .await
    }

    pub fn ue_count(&self) -> usize {
        self.ue_tasks.len()
    }

    /// Close every UE channel.  Each UE task finishes its current message and exits.
    pub async fn graceful_shutdown(self) {
        info!(&self.logger, "Shutting down");
        for entry in self.ue_tasks.iter() {
            entry.value().close();
        }
        self.ue_tasks.clear();
    }

    fn ue_by_supi(&self, supi: &str) -> Result<u32> {
        self.supi_index
            .get(supi)
            .map(|e| *e.value())
            .ok_or_else(|| anyhow!("No UE context for {supi}"))
    }

    // A Registration Request carries the old GUTI in the clear.
    fn tmsi_in_message(&self, message: &GmmMessage) -> Option<[u8; 4]> {
        let GmmMessage::RegistrationRequest(r) = message else {
            return None;
        };
        match mobile_identity(&r.mobile_identity) {
            Ok(MobileIdentity::Guti(guti)) if guti.guami == self.config.guami => Some(guti.tmsi),
            _ => None,
        }
    }
}

#[async_trait]
impl HandlerApi for Amf {
    fn config(&self) -> &Config {
        &self.config
    }

    fn gmm_fsm(&self) -> &GmmFsm {
        &self.gmm_fsm
    }

    fn consumers(&self) -> &Consumers {
        &self.consumers
    }

    fn spawn_ue_message_handler(&self) -> u32 {
        let mut ue_id = rand::random::<u32>();
        while self.ue_tasks.contains_key(&ue_id) {
            ue_id = rand::random::<u32>();
        }

        let sender =
            UeMessageHandler::spawn(ue_id, self.clone(), self.logger.new(o!("ue_id" => ue_id)));
        self.ue_tasks.insert(ue_id, sender);
        ue_id
    }

    async fn dispatch_ue_message(&self, ue_id: u32, message: UeMessage) -> Result<()> {
        // Clone the sender so that the map shard is not locked across the await.
        let Some(sender) = self.ue_tasks.get(&ue_id).map(|s| s.value().clone()) else {
            bail!("UE {ue_id} not found");
        };
        sender.send(message).await?;
        Ok(())
    }

    fn delete_ue_channel(&self, ue_id: u32) {
        self.ue_tasks.remove(&ue_id);
    }

    fn allocate_tmsi(&self, ue_id: u32) -> [u8; 4] {
        loop {
            let tmsi = rand::random::<[u8; 4]>();
            if let dashmap::mapref::entry::Entry::Vacant(e) = self.tmsi_index.entry(tmsi) {
                e.insert(ue_id);
                return tmsi;
            }
        }
    }

    fn free_tmsi(&self, tmsi: [u8; 4], ue_id: u32) {
        self.tmsi_index.remove_if(&tmsi, |_, owner| *owner == ue_id);
    }

    fn register_supi(&self, supi: &str, ue_id: u32) {
        if let Some(old) = self.supi_index.insert(supi.to_string(), ue_id) {
            if old != ue_id {
                warn!(self.logger, "{supi} moved from UE {old} to UE {ue_id}");
            }
        }
    }

    fn deregister_supi(&self, supi: &str, ue_id: u32) {
        self.supi_index.remove_if(supi, |_, owner| *owner == ue_id);
    }

    async fn ngap_send(&self, pdu: NgapPdu, _logger: &Logger) -> Result<()> {
        self.consumers.ngap.send(pdu).await
    }
}
