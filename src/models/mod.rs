mod ids;

pub use ids::{validate_identity, ConnectionId, Identity, Token};
