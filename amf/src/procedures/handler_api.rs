use super::UeMessage;
use crate::consumers::Consumers;
use crate::data::{Config, GmmFsm};
use crate::protocols::ngap::NgapPdu;
use anyhow::Result;
use async_trait::async_trait;
use slog::Logger;

/// Trait representing the collection of services needed by AMF handlers.
#[async_trait]
pub trait HandlerApi: Send + Sync + Clone + 'static {
    fn config(&self) -> &Config;
    fn gmm_fsm(&self) -> &GmmFsm;
    fn consumers(&self) -> &Consumers;

    fn spawn_ue_message_handler(&self) -> u32;
    async fn dispatch_ue_message(&self, ue_id: u32, message: UeMessage) -> Result<()>;
    fn delete_ue_channel(&self, ue_id: u32);

    /// Allocate a 5G-TMSI not in use by any other UE and index it to this one.
    fn allocate_tmsi(&self, ue_id: u32) -> [u8; 4];
    /// Drop a 5G-TMSI from the index, if it still belongs to this UE.
    fn free_tmsi(&self, tmsi: [u8; 4], ue_id: u32);
    fn register_supi(&self, supi: &str, ue_id: u32);
    fn deregister_supi(&self, supi: &str, ue_id: u32);

    async fn ngap_send(&self, pdu: NgapPdu, logger: &Logger) -> Result<()>;
}
