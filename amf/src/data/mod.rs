mod amf_ue;
mod config;
mod gmm_state;
mod models;
mod ran_ue;
mod security_context;
mod sm_context;

pub use amf_ue::*;
pub use config::*;
pub use gmm_state::*;
pub use models::*;
pub use ran_ue::*;
pub use security_context::*;
pub use sm_context::*;
