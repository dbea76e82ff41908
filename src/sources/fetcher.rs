//! Standard source fetcher backed by reqwest and the local filesystem

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::traits::{Acquired, SourceFetcher};
use crate::config::{HttpConfig, ProviderConfig};
use crate::errors::{SourceError, SourceResult};
use crate::models::{Source, SourceRole, SourceTarget};
use crate::utils::human_format::format_bytes;
use crate::utils::{DecompressionService, UrlUtils};

const FALLBACK_IP: &str = "127.0.0.1";

/// Substitute `$ID`, `$IP` and `$FILE` (and their `%24` encoded forms) in a
/// provider location template. The IP is only looked up when referenced.
pub fn expand_template<F: FnOnce() -> String>(
    template: &str,
    id: &str,
    ip: F,
    dest: &Path,
) -> String {
    let mut location = template.replace("$ID", id).replace("%24ID", id);

    if location.contains("$IP") || location.contains("%24IP") {
        let ip = ip();
        location = location.replace("$IP", &ip).replace("%24IP", &ip);
    }

    if location.contains("$FILE") || location.contains("%24FILE") {
        let file = urlencoding::encode(&dest.to_string_lossy()).into_owned();
        location = location.replace("$FILE", &file).replace("%24FILE", &file);
    }

    location.trim().to_string()
}

fn local_ip() -> String {
    local_ip_address::local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| FALLBACK_IP.to_string())
}

pub struct StandardFetcher {
    client: Client,
    providers: BTreeMap<String, ProviderConfig>,
}

impl StandardFetcher {
    pub fn new(
        http: &HttpConfig,
        providers: BTreeMap<String, ProviderConfig>,
    ) -> SourceResult<Self> {
        let client = Client::builder()
            .user_agent(http.user_agent.clone())
            .connect_timeout(http.connect_timeout)
            .timeout(http.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, providers })
    }

    /// Location template for a provider source
    fn provider_location(
        &self,
        provider: &str,
        role: SourceRole,
        dest: &Path,
    ) -> SourceResult<String> {
        let config = self
            .providers
            .get(provider)
            .ok_or_else(|| SourceError::UnknownProvider {
                provider: provider.to_string(),
            })?;

        let template = match (role, &config.playlist, &config.guide) {
            (SourceRole::Playlist, Some(template), _) => template,
            (SourceRole::Guide, _, Some(template)) => template,
            (SourceRole::Guide, Some(_), None) => {
                return Err(SourceError::GuideFromPlaylist {
                    provider: provider.to_string(),
                });
            }
            (role, _, _) => {
                return Err(SourceError::MethodUnavailable {
                    method: role.to_string(),
                    provider: provider.to_string(),
                });
            }
        };

        Ok(expand_template(template, provider, local_ip, dest))
    }

    /// Stream a remote file to `dest`; returns the final URL after redirects
    async fn download(&self, url: &str, dest: &Path) -> SourceResult<String> {
        debug!("Downloading: {} > {}", UrlUtils::obfuscate_credentials(url), dest.display());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: UrlUtils::obfuscate_credentials(url),
            });
        }
        let final_url = response.url().to_string();

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(final_url)
    }

    async fn copy_local(path: &str, dest: &Path) -> SourceResult<String> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(SourceError::LocalPathMissing {
                path: path.to_string(),
            });
        }
        debug!("Copying: {} > {}", path, dest.display());
        tokio::fs::copy(path, dest).await?;
        Ok(path.to_string())
    }

    async fn fetch_location(&self, location: &str, dest: &Path) -> SourceResult<String> {
        if UrlUtils::is_remote(location) {
            self.download(location, dest).await
        } else {
            Self::copy_local(location, dest).await
        }
    }
}

#[async_trait]
impl SourceFetcher for StandardFetcher {
    async fn acquire(&self, source: &Source, dest: &Path) -> SourceResult<Acquired> {
        match tokio::fs::remove_file(dest).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let origin = match source.target() {
            SourceTarget::Url(url) => self.download(url, dest).await?,
            SourceTarget::File(path) => Self::copy_local(path, dest).await?,
            SourceTarget::Provider(provider) => {
                let location = self.provider_location(provider, source.role, dest)?;
                self.fetch_location(&location, dest).await?
            }
            SourceTarget::Custom => {
                return Err(SourceError::NotAcquirable {
                    source_id: source.id,
                });
            }
        };

        let archive = source.archive;
        let path = dest.to_path_buf();
        let format = tokio::task::spawn_blocking(move || {
            DecompressionService::decompress_in_place(&path, archive)
        })
        .await
        .map_err(|e| SourceError::Io(std::io::Error::other(e)))??;

        let bytes = tokio::fs::metadata(dest).await?.len();
        info!(
            "Acquired {} ({}, archive: {})",
            UrlUtils::obfuscate_credentials(&origin),
            format_bytes(bytes),
            format.name()
        );

        Ok(Acquired {
            path: dest.to_path_buf(),
            bytes,
            origin,
            format,
        })
    }
}
