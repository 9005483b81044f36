mod amf;
pub mod consumers;
pub mod data;
mod fsm;
mod procedures;
pub mod protocols;
mod timer;

use procedures::HandlerApi;

pub use amf::Amf;
pub use data::{Config, load_config_file};
pub use fsm::{Fsm, FsmError, Transition};
pub use procedures::NotImplemented;
