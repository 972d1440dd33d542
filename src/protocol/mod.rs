mod messages;

pub use messages::{
    ConnectionStatus, Envelope, Outbound, GAME_ENDED, PEER_LEFT, SERVER_CLOSING,
};
