mod handler_api;
mod ue_message;
mod ue_procedures;

pub use handler_api::HandlerApi;
pub use ue_message::UeMessage;
pub use ue_procedures::{NotImplemented, UeMessageHandler};
