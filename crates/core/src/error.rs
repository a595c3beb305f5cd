//! Error types for tool provisioning.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while provisioning tools.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No installer is registered for the requested tool.
    #[error("unable to find installer for cli: {name}")]
    #[diagnostic(
        code(clis::no_installer),
        help("Run 'clis list' to see the tools that can be provisioned")
    )]
    NoInstaller {
        /// The requested tool name.
        name: String,
    },

    /// A tool request could not be parsed into a name and version.
    #[error("unable to parse versioned cli string: {request}")]
    #[diagnostic(
        code(clis::invalid_request),
        help("Versioned requests look like 'openshift-install-4.10'")
    )]
    InvalidToolRequest {
        /// The raw request string.
        request: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(clis::config))]
    Config {
        /// The error message.
        message: String,
        /// The configuration file, when one was involved.
        path: Option<PathBuf>,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP request failed for {url}: {source}")]
    #[diagnostic(
        code(clis::http),
        help("Check network connectivity to the download host")
    )]
    Http {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// A download returned a non-200 status.
    #[error("bad status retrieving {what} from url: {status}, {url}")]
    #[diagnostic(code(clis::bad_status))]
    BadStatus {
        /// What was being fetched (a tool name or a description).
        what: String,
        /// The response status text.
        status: String,
        /// The requested URL.
        url: String,
    },

    /// The latest-release redirect carried no Location header.
    #[error("unable to retrieve location header from url: {url}")]
    #[diagnostic(code(clis::release::no_location))]
    NoLocation {
        /// The latest-release URL.
        url: String,
    },

    /// The latest-release Location did not end in a tag.
    #[error("unable to parse latest tag from url: {location}")]
    #[diagnostic(code(clis::release::unparseable_tag))]
    UnparseableTag {
        /// The Location header value.
        location: String,
    },

    /// Release metadata from the API could not be decoded.
    #[error("unable to decode release metadata for {repo}: {message}")]
    #[diagnostic(code(clis::release::metadata))]
    ReleaseMetadata {
        /// The `org/repo` pair.
        repo: String,
        /// The error message.
        message: String,
    },

    /// Reading the gzip/tar stream failed.
    #[error("unable to extract tgz from url: {url}: {message}")]
    #[diagnostic(code(clis::extract))]
    Extraction {
        /// The archive URL.
        url: String,
        /// The error message.
        message: String,
    },

    /// The requested member was not present in the archive.
    #[error("member '{member}' not found in archive: {url}")]
    #[diagnostic(
        code(clis::extract::member_not_found),
        help("The archive layout for this release may have changed")
    )]
    MemberNotFound {
        /// The in-archive path that was requested.
        member: String,
        /// The archive URL.
        url: String,
    },

    /// The installed binary failed its self-test.
    #[error("unable to validate downloaded cli: {}, {stderr}", path.display())]
    #[diagnostic(code(clis::validation))]
    Validation {
        /// The tool name.
        tool: String,
        /// The validated executable.
        path: PathBuf,
        /// Captured standard error of the self-test.
        stderr: String,
    },

    /// Creating a link to a system binary failed.
    #[error("unable to create symlink {} -> {}: {source}", link.display(), target.display())]
    #[diagnostic(code(clis::symlink))]
    Symlink {
        /// The link being created under the bin directory.
        link: PathBuf,
        /// The system binary the link points at.
        target: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A subprocess could not be spawned or awaited.
    #[error("failed to run {program}: {source}")]
    #[diagnostic(code(clis::command))]
    Command {
        /// The program that was launched.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A subprocess ran but exited unsuccessfully.
    #[error("{program} {args} failed: {stderr}")]
    #[diagnostic(code(clis::command_failed))]
    CommandFailed {
        /// The program that was launched.
        program: String,
        /// Space-joined arguments.
        args: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Version text could not be parsed.
    #[error("unable to parse version from: {input}")]
    #[diagnostic(code(clis::version))]
    VersionParse {
        /// The text that was parsed.
        input: String,
    },

    /// The run was cancelled.
    #[error("operation cancelled")]
    #[diagnostic(code(clis::cancelled))]
    Cancelled,

    /// A tool failed to install; wraps the step-specific error.
    #[error("failed to provision cli '{tool}': {source}")]
    #[diagnostic(code(clis::install))]
    Install {
        /// The tool that failed.
        tool: String,
        /// The step-specific error.
        #[source]
        source: Box<Error>,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(clis::io))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error tied to a file.
    #[must_use]
    pub fn config_file(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create an HTTP transport error.
    #[must_use]
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }

    /// Create an extraction error.
    #[must_use]
    pub fn extraction(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a subprocess launch error.
    #[must_use]
    pub fn command(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Command {
            program: program.into(),
            source,
        }
    }

    /// Wrap an error with the tool it belongs to.
    #[must_use]
    pub fn install(tool: impl Into<String>, source: Self) -> Self {
        Self::Install {
            tool: tool.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error (or the error it wraps) is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Install { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_installer_message() {
        let error = Error::NoInstaller {
            name: "nope".to_string(),
        };
        assert_eq!(error.to_string(), "unable to find installer for cli: nope");
    }

    #[test]
    fn test_install_wraps_step() {
        let error = Error::install(
            "helm",
            Error::MemberNotFound {
                member: "linux-amd64/helm".to_string(),
                url: "https://get.helm.sh/helm.tar.gz".to_string(),
            },
        );
        let message = error.to_string();
        assert!(message.contains("helm"));
        assert!(message.contains("linux-amd64/helm"));
    }

    #[test]
    fn test_is_cancelled_through_install() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(Error::install("jq", Error::Cancelled).is_cancelled());
        assert!(!Error::config("bad").is_cancelled());
    }

    #[test]
    fn test_validation_message_includes_stderr() {
        let error = Error::Validation {
            tool: "jq".to_string(),
            path: PathBuf::from("/tmp/bin/jq"),
            stderr: "exec format error".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "unable to validate downloaded cli: /tmp/bin/jq, exec format error"
        );
    }
}
