mod build;
mod deploy;
mod modules;
mod prune;
mod status;

pub use build::{BuildArgs, ProjectArgs, cmd_build};
pub use deploy::{DeployArgs, cmd_deploy};
pub use modules::cmd_modules;
pub use prune::{PruneArgs, cmd_prune};
pub use status::{StatusArgs, cmd_status};
