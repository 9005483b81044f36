use super::{
    ConfigurationUpdateProcedure, DeregistrationProcedure, NotificationProcedure, TimerProcedure,
    UeContextReleaseProcedure, UeProcedure, UplinkNasProcedure,
};
use crate::HandlerApi;
use crate::data::{AccessType, AmfUe};
use crate::procedures::UeMessage;
use anyhow::Result;
use async_channel::{Receiver, Sender};
use slog::{Logger, debug, info, warn};

/// Owns one UE's context and runs every procedure on it, one message at a time.
pub struct UeMessageHandler<A: HandlerApi> {
    receiver: Receiver<UeMessage>,
    api: A,
    logger: Logger,
}

impl<A: HandlerApi> UeMessageHandler<A> {
    pub fn spawn(ue_id: u32, api: A, logger: Logger) -> Sender<UeMessage> {
        let (sender, receiver) = async_channel::unbounded();
        let handler = UeMessageHandler {
            receiver,
            api,
            logger,
        };
        async_std::task::spawn(async move {
            handler.run(ue_id).await;
        });
        sender
    }

    async fn run(&self, ue_id: u32) {
        let mut ue = AmfUe::new(ue_id);
        while let Ok(message) = self.receiver.recv().await {
            let name = message.name();
            if let Err(e) = self.handle(&mut ue, message).await {
                warn!(
                    self.logger,
                    "{name} failed in {:?} / {:?} - {e:#}",
                    ue.state[AccessType::ThreeGpp],
                    ue.state[AccessType::NonThreeGpp]
                );
            }
            if ue.removed {
                break;
            }
        }
        self.destroy(&mut ue);
    }

    async fn handle(&self, ue: &mut AmfUe, message: UeMessage) -> Result<()> {
        let ue_procedure = UeProcedure::new(&self.api, ue, &self.logger);
        match message {
            UeMessage::InitialUeMessage { ran_ue, nas } => {
                ue_procedure.log_message(">> Ngap InitialUeMessage");
                UplinkNasProcedure::new(ue_procedure)
                    .run(ran_ue, nas, true)
                    .await
            }
            UeMessage::UplinkNasTransport { ran_ue, nas } => {
                ue_procedure.log_message(">> Ngap UplinkNasTransport");
                UplinkNasProcedure::new(ue_procedure)
                    .run(ran_ue, nas, false)
                    .await
            }
            UeMessage::InitialContextSetupResponse { access_type } => {
                UeContextReleaseProcedure::new(ue_procedure)
                    .initial_context_setup_response(access_type)
                    .await
            }
            UeMessage::UeContextReleaseComplete { access_type } => {
                UeContextReleaseProcedure::new(ue_procedure).release_complete(access_type);
                Ok(())
            }
            UeMessage::NetworkInitiatedDeregistration { access_type } => {
                DeregistrationProcedure::new(ue_procedure)
                    .network_initiated(access_type)
                    .await
            }
            UeMessage::Notification { access_type } => {
                NotificationProcedure::new(ue_procedure)
                    .send(access_type)
                    .await
            }
            UeMessage::ConfigurationUpdate { access_type } => {
                ConfigurationUpdateProcedure::new(ue_procedure)
                    .send_command(access_type)
                    .await
            }
            UeMessage::Timer(event) => TimerProcedure::new(ue_procedure).run(event).await,
        }
    }

    fn destroy(&self, ue: &mut AmfUe) {
        debug!(self.logger, "Destroy UE context");
        ue.timers.stop_all();
        if let Some(tmsi) = ue.tmsi() {
            self.api.free_tmsi(tmsi, ue.ue_id);
        }
        if let Some(supi) = &ue.supi {
            self.api.deregister_supi(supi, ue.ue_id);
        }

        // Remove the channel to this UE.  Anything still queued is dropped.
        self.api.delete_ue_channel(ue.ue_id);
        info!(self.logger, "UE context removed");
    }
}
