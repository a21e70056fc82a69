pub mod connection;
pub mod session;

pub use connection::ConnectionState;
pub use session::{Session, SessionMonitor, SessionSnapshot};
