pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod setup;
pub mod transport;

pub use connection::{Connection, ExitReason};
pub use error::{Result, RtspError};
pub use server::{Server, ServerConfig};
pub use session::{Session, SessionRegistry};
pub use setup::{DefaultTrackSetup, SetupOutcome, TrackSetup};
