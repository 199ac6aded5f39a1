pub mod error;
pub mod mysql;
pub mod ssh;
pub mod vm;

pub use error::RemoteError;
pub use mysql::ExecutionsDb;
pub use ssh::{
    ExecOutput,
    SshSession,
};
