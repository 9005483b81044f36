use amf::consumers::NgapSender;
use amf::data::{AccessType, NrCgi, RanUe, Tai, UserLocation};
use amf::protocols::ngap::NgapPdu;
use anyhow::{Context, Result, bail};
use async_channel::{Receiver, Sender};
use async_std::future;
use async_trait::async_trait;
use slog::{Logger, debug, o};
use std::time::Duration;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Stands in for the NGAP layer and the gNB behind it.  Everything the AMF sends downlink
/// lands on one queue, in order.
#[derive(Clone)]
pub struct MockGnb {
    tai: Tai,
    sender: Sender<NgapPdu>,
    receiver: Receiver<NgapPdu>,
    logger: Logger,
}

impl MockGnb {
    pub fn new(tai: Tai, logger: &Logger) -> Self {
        let (sender, receiver) = async_channel::unbounded();
        MockGnb {
            tai,
            sender,
            receiver,
            logger: logger.new(o!("gnb" => 1)),
        }
    }

    /// The RAN side of a UE's signalling connection in tracking area `tac`.
    pub fn ran_ue(&self, ran_ue_ngap_id: u64, tac: Option<[u8; 3]>) -> RanUe {
        let tai = Tai {
            plmn: self.tai.plmn,
            tac: tac.unwrap_or(self.tai.tac),
        };
        RanUe::new(ran_ue_ngap_id, ran_ue_ngap_id, AccessType::ThreeGpp).with_location(
            UserLocation {
                tai,
                nr_cgi: NrCgi {
                    plmn: tai.plmn,
                    nr_cell_identity: 0x10,
                },
            },
        )
    }

    pub async fn receive_ngap(&self) -> Result<NgapPdu> {
        let pdu = future::timeout(RECEIVE_TIMEOUT, self.receiver.recv())
            .await
            .context("Timed out waiting for NGAP message")??;
        debug!(
            self.logger,
            "<< Ngap {} for RAN UE {}",
            pdu.message.name(),
            pdu.ran_ue_ngap_id
        );
        Ok(pdu)
    }

    pub async fn expect_no_ngap(&self) -> Result<()> {
        if let Ok(pdu) = future::timeout(QUIET_PERIOD, self.receiver.recv()).await {
            bail!("Unexpected NGAP message {:?}", pdu?.message)
        }
        Ok(())
    }
}

#[async_trait]
impl NgapSender for MockGnb {
    async fn send(&self, pdu: NgapPdu) -> Result<()> {
        self.sender.send(pdu).await?;
        Ok(())
    }
}
