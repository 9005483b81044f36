//! timers - retransmission and abort on NAS timer expiry (TS24.501, 10.2)

use super::UeProcedure;
use crate::HandlerApi;
use crate::data::{AccessType, GmmState, OnGoing, ReleaseAction};
use crate::protocols::ngap::{InitialContextSetupRequest, NasCause, NgapMessage};
use crate::timer::{TimerEvent, TimerFired, TimerKind};
use anyhow::Result;
use derive_deref::{Deref, DerefMut};
use slog::{debug, warn};

#[derive(Deref, DerefMut)]
pub struct TimerProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> TimerProcedure<'a, A> {
    pub fn new(inner: UeProcedure<'a, A>) -> Self {
        TimerProcedure(inner)
    }

    pub async fn run(mut self, event: TimerEvent) -> Result<()> {
        let Some(timer) = self.ue.timers.current(&event) else {
            debug!(self.logger, "Stale {:?} event ignored", event.kind);
            return Ok(());
        };
        let access_type = timer.access_type;
        let pdu = timer.pdu.clone();

        match event.fired {
            TimerFired::Expired(n) => {
                warn!(self.logger, "{:?} expired, retransmission {n}", event.kind);
                let Some(pdu) = pdu else {
                    return Ok(());
                };
                self.log_message(&format!("<< Nas {} (retransmission)", pdu.message.name()));
                let rebuild = event.kind == TimerKind::T3550
                    && self.accept_needs_context_setup(access_type)?;
                let message = if rebuild {
                    let api = self.api;
                    let request = InitialContextSetupRequest::new(
                        &*self.ue,
                        access_type,
                        api.config().guami,
                        Some(pdu),
                        vec![],
                    );
                    NgapMessage::InitialContextSetupRequest(Box::new(request))
                } else {
                    NgapMessage::DownlinkNasTransport(pdu)
                };
                self.send_ngap(access_type, message).await
            }
            TimerFired::Exhausted => {
                warn!(self.logger, "{:?} expired too many times - abort", event.kind);
                self.ue.timers.stop(event.kind);
                self.abort(event.kind, access_type).await
            }
        }
    }

    // The RAN never set up the UE context, so the accept goes round again in a new request.
    fn accept_needs_context_setup(&self, access_type: AccessType) -> Result<bool> {
        let ran_ue = self.ran_ue(access_type)?;
        Ok(ran_ue.ue_context_request && !ran_ue.recvd_initial_context_setup_response)
    }

    async fn abort(&mut self, kind: TimerKind, access_type: AccessType) -> Result<()> {
        match kind {
            TimerKind::T3560 => {
                if self.ue.is_connected(access_type) {
                    if let Err(e) = self
                        .release_ue_context(
                            access_type,
                            ReleaseAction::ReleaseUeContext,
                            NasCause::Unspecified,
                        )
                        .await
                    {
                        warn!(self.logger, "Failed to release UE context - {e:#}");
                    }
                }
                self.remove_ue();
            }
            TimerKind::T3550 => {
                self.ue.state[access_type] = GmmState::Registered;
                self.ue.clear_registration_request_data(access_type);
            }
            TimerKind::T3522 => {
                self.ue.state[access_type] = GmmState::Deregistered;
                self.remove_ue();
            }
            TimerKind::T3513 | TimerKind::T3565 => {
                self.ue.ongoing[access_type] = OnGoing::Nothing;
                warn!(self.logger, "UE did not respond to paging");
            }
            TimerKind::T3555 => {
                warn!(self.logger, "UE did not acknowledge the configuration update");
            }
        }
        Ok(())
    }
}
