//! timer - NAS retransmission timers run as tasks that notify the owning UE task

use crate::data::{AccessType, Config, TimerConfig};
use crate::procedures::{HandlerApi, UeMessage};
use crate::protocols::nas::DownlinkNasPdu;
use std::collections::HashMap;
use stop_token::StopSource;
use stop_token::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    T3513,
    T3522,
    T3550,
    T3555,
    T3560,
    T3565,
}

impl TimerKind {
    pub fn config(self, config: &Config) -> TimerConfig {
        match self {
            TimerKind::T3513 => config.t3513,
            TimerKind::T3522 => config.t3522,
            TimerKind::T3550 => config.t3550,
            TimerKind::T3555 => config.t3555,
            TimerKind::T3560 => config.t3560,
            TimerKind::T3565 => config.t3565,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    /// The nth expiry, n <= max retries.  The guarded message is resent.
    Expired(u32),
    /// The expiry after the last retry.  The procedure is aborted.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub kind: TimerKind,
    pub generation: u64,
    pub fired: TimerFired,
}

/// A running timer.  Dropping it stops the timer task.
pub struct RetransmissionTimer {
    generation: u64,
    pub access_type: AccessType,
    pub pdu: Option<DownlinkNasPdu>,
    _stop_source: StopSource,
}

impl RetransmissionTimer {
    fn start<A: HandlerApi>(
        api: &A,
        ue_id: u32,
        kind: TimerKind,
        generation: u64,
        access_type: AccessType,
        pdu: Option<DownlinkNasPdu>,
        config: TimerConfig,
    ) -> Self {
        let stop_source = StopSource::new();
        let stop_token = stop_source.token();
        let api = api.clone();
        async_std::task::spawn(async move {
            for n in 1..=config.max_retry_times + 1 {
                if async_std::task::sleep(config.expire_time())
                    .timeout_at(stop_token.clone())
                    .await
                    .is_err()
                {
                    return;
                }
                let fired = if n <= config.max_retry_times {
                    TimerFired::Expired(n)
                } else {
                    TimerFired::Exhausted
                };
                let event = TimerEvent {
                    kind,
                    generation,
                    fired,
                };
                // The UE has gone away.
                if api
                    .dispatch_ue_message(ue_id, UeMessage::Timer(event))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
        RetransmissionTimer {
            generation,
            access_type,
            pdu,
            _stop_source: stop_source,
        }
    }
}

/// The running timers of one UE, at most one per kind.
#[derive(Default)]
pub struct UeTimers {
    running: HashMap<TimerKind, RetransmissionTimer>,
    next_generation: u64,
}

impl std::fmt::Debug for UeTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.running.keys()).finish()
    }
}

impl UeTimers {
    /// Start (or restart) a timer.  A disabled timer is not started.
    pub fn start<A: HandlerApi>(
        &mut self,
        api: &A,
        ue_id: u32,
        kind: TimerKind,
        access_type: AccessType,
        pdu: Option<DownlinkNasPdu>,
        config: TimerConfig,
    ) {
        if !config.enable {
            self.running.remove(&kind);
            return;
        }
        self.next_generation += 1;
        let timer = RetransmissionTimer::start(
            api,
            ue_id,
            kind,
            self.next_generation,
            access_type,
            pdu,
            config,
        );
        self.running.insert(kind, timer);
    }

    /// Stop a timer.  Returns whether it was running.
    pub fn stop(&mut self, kind: TimerKind) -> bool {
        self.running.remove(&kind).is_some()
    }

    /// The timer an event belongs to, or None if the event is from a timer since stopped or
    /// restarted.
    pub fn current(&self, event: &TimerEvent) -> Option<&RetransmissionTimer> {
        self.running
            .get(&event.kind)
            .filter(|t| t.generation == event.generation)
    }

    pub fn stop_all(&mut self) {
        self.running.clear();
    }
}
