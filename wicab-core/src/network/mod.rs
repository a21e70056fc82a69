pub mod connection;

pub use connection::{CabConnection, Connection, ConnectionInfo, LineSink, LineStream};
