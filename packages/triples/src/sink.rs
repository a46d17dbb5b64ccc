//! SPARQL store sink.
//!
//! Quads are appended to a namespace in batches. A batch is one HTTP
//! request and is either committed whole or retried whole; nothing is
//! assumed committed from a failed request. Connection errors, timeouts,
//! HTTP 429 and 5xx are retried with exponential backoff. Any other 4xx
//! is permanent.

use std::time::Duration;

use plot_gfa_config::StoreConfig;

use crate::SinkError;
use crate::quad::QuadSet;

/// Longest response body kept in an error message.
const BODY_PREVIEW_LEN: usize = 500;

/// Outcome of a namespace creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceStatus {
    /// The namespace was created.
    Created,
    /// The namespace already existed.
    AlreadyExists,
}

/// Quad-store namespace properties.
#[must_use]
pub fn namespace_properties(namespace: &str) -> String {
    [
        "com.bigdata.rdf.sail.truthMaintenance=false".to_string(),
        "com.bigdata.rdf.store.AbstractTripleStore.textIndex=true".to_string(),
        "com.bigdata.rdf.store.AbstractTripleStore.justify=false".to_string(),
        "com.bigdata.rdf.store.AbstractTripleStore.statementIdentifiers=false".to_string(),
        "com.bigdata.rdf.store.AbstractTripleStore.axiomsClass=com.bigdata.rdf.axioms.NoAxioms"
            .to_string(),
        format!("com.bigdata.rdf.sail.namespace={namespace}"),
        "com.bigdata.rdf.store.AbstractTripleStore.quads=true".to_string(),
        "com.bigdata.rdf.store.AbstractTripleStore.geoSpatial=true".to_string(),
        "com.bigdata.journal.Journal.groupCommit=false".to_string(),
        "com.bigdata.rdf.sail.isolatableIndices=false".to_string(),
    ]
    .join("\n")
}

/// Delay before retry `attempt` (1-based): 2s, 4s, 8s, ...
#[must_use]
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.clamp(1, 6))
}

/// What [`StoreSink`] does with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Hand the response to the caller.
    Accept,
    /// Send the whole request again after a backoff.
    Retry,
    /// Give up.
    Fail,
}

fn disposition(status: reqwest::StatusCode) -> Disposition {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Disposition::Retry
    } else if status.is_client_error() && status != reqwest::StatusCode::CONFLICT {
        Disposition::Fail
    } else {
        Disposition::Accept
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}

async fn preview(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    if text.len() > BODY_PREVIEW_LEN {
        let mut end = BODY_PREVIEW_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text
    }
}

/// HTTP client for one store.
pub struct StoreSink {
    client: reqwest::Client,
    base_url: String,
    batch_size: usize,
    max_retries: u32,
}

impl StoreSink {
    /// Creates a sink for the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &StoreConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    /// Namespace management URL.
    #[must_use]
    pub fn namespace_url(&self) -> String {
        format!("{}/namespace", self.base_url)
    }

    /// SPARQL endpoint of a namespace.
    #[must_use]
    pub fn sparql_url(&self, namespace: &str) -> String {
        format!("{}/namespace/{namespace}/sparql", self.base_url)
    }

    /// Creates a quad-mode namespace. An existing namespace is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the store is unreachable or refuses the
    /// request.
    pub async fn create_namespace(&self, namespace: &str) -> Result<NamespaceStatus, SinkError> {
        let url = self.namespace_url();
        let body = namespace_properties(namespace);
        log::info!("Creating namespace '{namespace}' at {url}");

        let response = self
            .send(|| {
                self.client
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "text/plain")
                    .body(body.clone())
            })
            .await?;

        match response.status().as_u16() {
            409 => {
                log::info!("Namespace '{namespace}' already exists");
                Ok(NamespaceStatus::AlreadyExists)
            }
            status if (200..300).contains(&status) => {
                log::info!("Namespace '{namespace}' created");
                Ok(NamespaceStatus::Created)
            }
            _ => Err(SinkError::Status {
                url,
                status: response.status().as_u16(),
                body: preview(response).await,
            }),
        }
    }

    /// Uploads `quads` to `namespace` in batches. Returns the number of
    /// quads sent.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when a batch still fails after all retries.
    /// Earlier batches may have been committed; re-running the upload
    /// sends identical quads.
    pub async fn upload(&self, namespace: &str, quads: &QuadSet) -> Result<usize, SinkError> {
        if quads.is_empty() {
            log::info!("Nothing to upload to '{namespace}'");
            return Ok(0);
        }

        let url = self.sparql_url(namespace);
        let batches = quads.batches(self.batch_size);
        let total = batches.len();

        for (i, batch) in batches.into_iter().enumerate() {
            let response = self
                .send(|| {
                    self.client
                        .post(&url)
                        .header(reqwest::header::CONTENT_TYPE, "application/n-quads")
                        .body(batch.clone())
                })
                .await?;

            if !response.status().is_success() {
                return Err(SinkError::Status {
                    url,
                    status: response.status().as_u16(),
                    body: preview(response).await,
                });
            }
            log::info!("Uploaded batch {}/{total} to '{namespace}'", i + 1);
        }

        log::info!("Uploaded {} quads to '{namespace}'", quads.len());
        Ok(quads.len())
    }

    /// Sends the request built by `build`, retrying transient failures.
    /// Returns 2xx, 3xx and 409 responses; other statuses are errors.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, SinkError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = backoff(attempt);
                log::warn!("  retry {attempt}/{} in {delay:?}...", self.max_retries);
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Err(e) if is_transient(&e) && attempt < self.max_retries => {
                    log::warn!("  transient error: {e}");
                }
                Err(e) => return Err(SinkError::Http(e)),
                Ok(response) => match disposition(response.status()) {
                    Disposition::Accept => return Ok(response),
                    Disposition::Retry if attempt < self.max_retries => {
                        log::warn!("  HTTP {}", response.status());
                    }
                    Disposition::Retry | Disposition::Fail => {
                        return Err(SinkError::Status {
                            url: response.url().to_string(),
                            status: response.status().as_u16(),
                            body: preview(response).await,
                        });
                    }
                },
            }

            attempt += 1;
        }
    }
}
