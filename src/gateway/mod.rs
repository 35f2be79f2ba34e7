//! Gateway server implementation

mod acceptor;
pub mod auth;
mod router;
mod server;

pub use acceptor::{PeerCertAcceptor, PeerConnection};
pub use auth::{PUBLIC_PATHS, mtls_auth_middleware};
pub use router::{AppState, create_router};
pub use server::Gateway;
