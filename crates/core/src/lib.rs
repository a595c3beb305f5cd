//! Provisioning engine for command-line tools.
//!
//! Given a list of tool names and a bin directory, `clis-core` makes sure
//! each tool is present in that directory at a compatible version: already
//! installed tools are left alone, tools found elsewhere on `PATH` are linked,
//! and everything else is downloaded (directly or out of a `.tar.gz`) and
//! self-tested.
//!
//! ```no_run
//! use clis_core::{EnvironmentFacts, ProvisionConfig, ProvisionRequest, Provisioner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> clis_core::Result<()> {
//! let provisioner =
//!     Provisioner::from_config(&ProvisionConfig::default(), EnvironmentFacts::detect())?;
//! let report = provisioner
//!     .provision(ProvisionRequest::new(["helm"], "bin"), &CancellationToken::new())
//!     .await?;
//! println!("{}", report.id());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod lock;
pub mod orchestrator;
pub mod platform;
pub mod presence;
pub mod process;
pub mod release;
pub mod request;
pub mod version;

pub use config::ProvisionConfig;
pub use error::{Error, Result};
pub use fetch::{ExtractOutcome, Fetcher};
pub use installer::{DEFAULT_TOOLS, DefaultVersions, InstallOutcome, Installer, InstallerRegistry};
pub use lock::KeyedLocks;
pub use orchestrator::{ProvisionReport, ProvisionRequest, Provisioner, ToolOutcome};
pub use platform::EnvironmentFacts;
pub use process::ToolEnv;
pub use release::{ReleaseInfo, ReleaseResolver, ReleaseStrategy};
pub use request::ToolRequest;
pub use version::SemanticVersion;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
