pub mod client;
pub mod cronjobs;
pub mod deployments;
pub mod error;
pub mod jobs;
pub mod pods;
pub mod top;

pub use client::KubeClient;
pub use cronjobs::CronjobManifest;
pub use deployments::DeploymentManifest;
pub use error::KubeError;
pub use jobs::CreateJobParams;
