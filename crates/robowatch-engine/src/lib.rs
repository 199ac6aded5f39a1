pub mod harvester;
pub mod poller;
pub mod reconciler;
pub mod shutdown;
pub mod views;

pub use shutdown::Shutdown;
