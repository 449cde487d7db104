use crate::error::{Result, UpdaterError};
use crate::release::Release;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Url};

/// Release index of the node project.
pub const DEFAULT_RELEASE_URL: &str = "https://api.github.com/repos/node-project/node/releases/latest";

/// Media type requested from the release index.
pub const RELEASE_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// Upper bound on the number of archive bytes kept in memory (32 MiB).
pub const DEFAULT_MAX_ARCHIVE_BYTES: usize = 1 << 25;

/// Abstraction over where releases and their archives come from.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch metadata for the most recent published release.
    async fn fetch_latest_release(&self) -> Result<Release>;

    /// Download a release archive, keeping at most the configured byte cap.
    async fn download_archive(&self, url: &str) -> Result<Vec<u8>>;
}

/// Builder for [`GithubReleaseClient`].
#[derive(Default)]
pub struct GithubReleaseClientBuilder {
    release_url: Option<Url>,
    client: Option<Client>,
    max_archive_bytes: Option<usize>,
}

impl GithubReleaseClientBuilder {
    /// Set the release index endpoint.
    pub fn release_url(mut self, url: Url) -> Self {
        self.release_url = Some(url);
        self
    }

    /// Provide a custom reqwest client instance.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the in-memory archive cap.
    pub fn max_archive_bytes(mut self, limit: usize) -> Self {
        self.max_archive_bytes = Some(limit);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GithubReleaseClient> {
        let release_url = match self.release_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_RELEASE_URL)
                .map_err(|err| UpdaterError::validation(format!("invalid release URL: {err}")))?,
        };
        let client = self.client.unwrap_or_else(Client::new);

        Ok(GithubReleaseClient {
            release_url,
            client,
            max_archive_bytes: self.max_archive_bytes.unwrap_or(DEFAULT_MAX_ARCHIVE_BYTES),
        })
    }
}

/// Release source backed by the GitHub releases API.
#[derive(Clone)]
pub struct GithubReleaseClient {
    release_url: Url,
    client: Client,
    max_archive_bytes: usize,
}

impl GithubReleaseClient {
    /// Create a new builder.
    pub fn builder() -> GithubReleaseClientBuilder {
        GithubReleaseClientBuilder::default()
    }

    /// Endpoint queried for the latest release.
    pub fn release_url(&self) -> &Url {
        &self.release_url
    }
}

#[async_trait]
impl ReleaseSource for GithubReleaseClient {
    async fn fetch_latest_release(&self) -> Result<Release> {
        // The status is deliberately not checked: the index answers 404 with a
        // JSON body when nothing has been published, which decodes as empty.
        let response = self
            .client
            .get(self.release_url.clone())
            .header(ACCEPT, RELEASE_MEDIA_TYPE)
            .header(USER_AGENT, user_agent())
            .send()
            .await?;
        let body = response.bytes().await?;
        let release: Release = serde_json::from_slice(&body)?;
        if release.is_empty() {
            return Err(UpdaterError::EmptyRelease);
        }
        Ok(release)
    }

    async fn download_archive(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent())
            .send()
            .await?
            .error_for_status()?;

        let mut content = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_archive_bytes - content.len();
            if chunk.len() > room {
                content.extend_from_slice(&chunk[..room]);
                tracing::warn!(
                    limit = self.max_archive_bytes,
                    "release archive exceeds the download cap, truncating"
                );
                break;
            }
            content.extend_from_slice(&chunk);
        }
        Ok(content)
    }
}

fn user_agent() -> String {
    format!("node-updater/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, cap: usize) -> GithubReleaseClient {
        let url = Url::parse(&format!("{}/releases/latest", server.uri())).unwrap();
        GithubReleaseClient::builder()
            .release_url(url)
            .max_archive_bytes(cap)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn fetches_release_with_media_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .and(header("accept", RELEASE_MEDIA_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"tag_name":"v1.3.0","assets":[{"name":"a.zip","browser_download_url":"http://x/a.zip"}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let release = client_for(&server, 1024).await.fetch_latest_release().await.unwrap();
        assert_eq!(release.tag, "v1.3.0");
        assert_eq!(release.assets[0].name, "a.zip");
    }

    #[tokio::test]
    async fn empty_release_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"tag_name":"","assets":[]}"#),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, 1024).await.fetch_latest_release().await.unwrap_err();
        assert!(matches!(err, UpdaterError::EmptyRelease), "got {err}");
    }

    #[tokio::test]
    async fn non_json_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, 1024).await.fetch_latest_release().await.unwrap_err();
        assert!(matches!(err, UpdaterError::Decode(_)), "got {err}");
    }

    #[tokio::test]
    async fn unreachable_index_is_a_network_error() {
        let client = GithubReleaseClient::builder()
            .release_url(Url::parse("http://127.0.0.1:9/releases/latest").unwrap())
            .build()
            .unwrap();
        let err = client.fetch_latest_release().await.unwrap_err();
        assert!(matches!(err, UpdaterError::Network(_)), "got {err}");
    }

    #[tokio::test]
    async fn archive_download_is_truncated_at_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/asset.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let client = client_for(&server, 1000).await;
        let bytes = client
            .download_archive(&format!("{}/asset.zip", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 1000);
    }

    #[tokio::test]
    async fn archive_below_cap_is_kept_whole() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/asset.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-small".to_vec()))
            .mount(&server)
            .await;

        let client = client_for(&server, 1000).await;
        let bytes = client
            .download_archive(&format!("{}/asset.zip", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"PK-small");
    }

    #[tokio::test]
    async fn missing_archive_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/asset.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server, 1000)
            .await
            .download_archive(&format!("{}/asset.zip", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Network(_)), "got {err}");
    }
}
