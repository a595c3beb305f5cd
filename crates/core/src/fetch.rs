//! Artifact retrieval: direct binaries and single members of `.tar.gz` archives.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use reqwest::{Client, Response, StatusCode, redirect};
use std::fs::OpenOptions;
use std::future::Future;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::{Archive, EntryType};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Permission bits given to every file written into the bin directory.
#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o755;

/// Result of looking for one member inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The member was written to the destination.
    Extracted {
        /// Bytes written.
        bytes: u64,
    },
    /// The archive ended without an entry of that name. Nothing was written.
    MemberMissing,
}

/// Build an HTTP client with the run's timeout and user agent.
///
/// Release resolution needs to read the redirect itself, so redirects can be
/// switched off.
pub fn http_client(timeout: Duration, user_agent: &str, follow_redirects: bool) -> Result<Client> {
    let policy = if follow_redirects {
        redirect::Policy::default()
    } else {
        redirect::Policy::none()
    };
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(policy)
        .build()
        .map_err(|e| Error::http("client", e))
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Downloads artifacts over HTTP.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher around an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// GET `url`, requiring `200 OK`.
    async fn get(&self, url: &str, what: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(url, e))?;

        if response.status() != StatusCode::OK {
            return Err(Error::BadStatus {
                what: what.to_string(),
                status: response.status().to_string(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Stream the body of `url` into `dest`, truncating it and marking it executable.
    pub async fn fetch_binary(
        &self,
        url: &str,
        dest: &Path,
        what: &str,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        debug!(%url, dest = %dest.display(), "Downloading binary");

        until_cancelled(cancel, async {
            let mut response = self.get(url, what).await?;
            let mut file = open_executable_async(dest).await?;

            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await.map_err(|e| Error::http(url, e))? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;

            trace!(%url, bytes = written, "Download complete");
            Ok(written)
        })
        .await
    }

    /// Fetch a small text document, trimmed of surrounding whitespace.
    pub async fn fetch_text(
        &self,
        url: &str,
        what: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        until_cancelled(cancel, async {
            let response = self.get(url, what).await?;
            let text = response.text().await.map_err(|e| Error::http(url, e))?;
            Ok(text.trim().to_string())
        })
        .await
    }

    /// Download a gzip-compressed tar archive and write the entry named
    /// exactly `member` to `dest`.
    ///
    /// The archive is spooled to a hidden file next to `dest`, which is
    /// removed once extraction finishes or the download is abandoned.
    pub async fn fetch_archive_member(
        &self,
        url: &str,
        member: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractOutcome> {
        debug!(%url, member, dest = %dest.display(), "Downloading archive");

        let spool_dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let (file, spool) = tempfile::Builder::new()
            .prefix(".clis-download-")
            .tempfile_in(spool_dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        until_cancelled(cancel, async {
            let mut response = self.get(url, member).await?;
            let mut spooled = 0u64;
            while let Some(chunk) = response.chunk().await.map_err(|e| Error::http(url, e))? {
                file.write_all(&chunk).await?;
                spooled += chunk.len() as u64;
            }
            file.flush().await?;
            trace!(%url, bytes = spooled, "Archive downloaded");
            Ok(())
        })
        .await?;

        let mut file = file.into_std().await;
        let member_owned = member.to_string();
        let dest_owned: PathBuf = dest.to_path_buf();
        let extraction = tokio::task::spawn_blocking(move || {
            let _spool = spool;
            file.rewind()?;
            extract_member(GzDecoder::new(BufReader::new(file)), &member_owned, &dest_owned)
        });

        until_cancelled(cancel, async {
            extraction
                .await
                .map_err(|e| Error::extraction(url, e.to_string()))?
                .map_err(|e| Error::extraction(url, e.to_string()))
        })
        .await
    }
}

/// Walk a tar stream and copy the first regular file named `member` to `dest`.
///
/// Directory entries and other members are skipped; the walk stops at the
/// first match. An archive without the member yields
/// [`ExtractOutcome::MemberMissing`] rather than an error.
pub fn extract_member<R: Read>(reader: R, member: &str, dest: &Path) -> io::Result<ExtractOutcome> {
    let mut archive = Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();

        match entry_type {
            EntryType::Directory => {}
            EntryType::Regular => {
                if *entry.path_bytes() != *member.as_bytes() {
                    trace!(
                        entry = %String::from_utf8_lossy(&entry.path_bytes()),
                        "Skipping archive entry"
                    );
                    continue;
                }

                debug!(member, dest = %dest.display(), "Extracting archive member");
                let mut out = open_executable(dest)?;
                let bytes = io::copy(&mut entry, &mut out)?;
                return Ok(ExtractOutcome::Extracted { bytes });
            }
            other => {
                warn!(
                    entry = %String::from_utf8_lossy(&entry.path_bytes()),
                    kind = ?other,
                    "Ignoring unsupported archive entry"
                );
            }
        }
    }

    Ok(ExtractOutcome::MemberMissing)
}

fn open_executable(path: &Path) -> io::Result<std::fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(EXECUTABLE_MODE);
    }
    options.open(path)
}

async fn open_executable_async(path: &Path) -> io::Result<tokio::fs::File> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(EXECUTABLE_MODE);
    options.open(path).await
}
