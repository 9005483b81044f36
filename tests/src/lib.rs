mod mock_gnb;
mod mock_network;
mod mock_ue;
pub mod framework;

pub use mock_gnb::MockGnb;
pub use mock_network::{DEFAULT_DNN, MockNetwork, subscribed_snssai};
pub use mock_ue::MockUe;
