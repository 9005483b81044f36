use crate::fsm::{Fsm, FsmError, Transition};

/// 5GMM states per access type (TS24.501, 5.1.3.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GmmState {
    #[default]
    Deregistered,
    Authentication,
    SecurityMode,
    ContextSetup,
    Registered,
    DeregistrationInitiated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GmmEvent {
    StartAuth,
    AuthRestart,
    AuthSuccess,
    AuthFail,
    AuthError,
    SecurityModeSuccess,
    SecuritySkip,
    SecurityModeFail,
    SecurityModeAbort,
    ContextSetupSuccess,
    ContextSetupFail,
    InitDeregistration,
    DeregistrationAccept,
}

pub type GmmFsm = Fsm<GmmState, GmmEvent>;

use GmmEvent::*;
use GmmState::*;

const fn t(event: GmmEvent, from: GmmState, to: GmmState) -> Transition<GmmState, GmmEvent> {
    Transition { event, from, to }
}

pub const GMM_TRANSITIONS: &[Transition<GmmState, GmmEvent>] = &[
    t(StartAuth, Deregistered, Authentication),
    t(StartAuth, Registered, Authentication),
    t(AuthRestart, Authentication, Authentication),
    t(AuthSuccess, Authentication, SecurityMode),
    t(AuthFail, Authentication, Deregistered),
    t(AuthError, Authentication, Deregistered),
    t(SecurityModeSuccess, SecurityMode, ContextSetup),
    t(SecuritySkip, SecurityMode, ContextSetup),
    t(SecurityModeFail, SecurityMode, Deregistered),
    t(SecurityModeAbort, SecurityMode, Deregistered),
    t(ContextSetupSuccess, ContextSetup, Registered),
    t(ContextSetupFail, ContextSetup, Deregistered),
    t(InitDeregistration, Registered, DeregistrationInitiated),
    t(DeregistrationAccept, DeregistrationInitiated, Deregistered),
];

const GMM_CALLBACK_STATES: &[GmmState] = &[
    Deregistered,
    Authentication,
    SecurityMode,
    ContextSetup,
    Registered,
    DeregistrationInitiated,
];

/// Build the GMM state machine.  Called once at startup.
pub fn new_gmm_fsm() -> Result<GmmFsm, FsmError> {
    Fsm::new(GMM_TRANSITIONS, GMM_CALLBACK_STATES)
}
