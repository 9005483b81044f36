use crate::data::{AccessType, RanUe};
use crate::protocols::nas::UplinkNasPdu;
use crate::timer::TimerEvent;

/// Everything that is delivered to a UE's message handler task.
#[derive(Debug)]
pub enum UeMessage {
    /// NAS from an NGAP Initial UE Message.
    InitialUeMessage { ran_ue: RanUe, nas: UplinkNasPdu },
    /// NAS from an NGAP Uplink NAS Transport.
    UplinkNasTransport { ran_ue: RanUe, nas: UplinkNasPdu },
    InitialContextSetupResponse { access_type: AccessType },
    UeContextReleaseComplete { access_type: AccessType },
    NetworkInitiatedDeregistration { access_type: AccessType },
    /// Ask a UE that is idle on 3GPP access to come back for a session on `access_type`.
    Notification { access_type: AccessType },
    /// Resend the UE its registration parameters in a Configuration Update Command.
    ConfigurationUpdate { access_type: AccessType },
    Timer(TimerEvent),
}

impl UeMessage {
    pub fn name(&self) -> &'static str {
        match self {
            UeMessage::InitialUeMessage { .. } => "InitialUeMessage",
            UeMessage::UplinkNasTransport { .. } => "UplinkNasTransport",
            UeMessage::InitialContextSetupResponse { .. } => "InitialContextSetupResponse",
            UeMessage::UeContextReleaseComplete { .. } => "UeContextReleaseComplete",
            UeMessage::NetworkInitiatedDeregistration { .. } => "NetworkInitiatedDeregistration",
            UeMessage::Notification { .. } => "Notification",
            UeMessage::ConfigurationUpdate { .. } => "ConfigurationUpdate",
            UeMessage::Timer(_) => "Timer",
        }
    }
}
