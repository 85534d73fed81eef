//! Docker Engine HTTP client

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use http::StatusCode;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use swarm_api::{
    ContainerInspect, ContainersPruneReport, ErrorResponse, EventMessage, ExecCreateRequest,
    ExecInspect, ExecStartRequest, IdResponse, ImageInspect, ImageLoadMessage, ImageSummary,
    ImagesPruneReport, Network, NetworkCreateRequest, NetworksPruneReport, SecretSpec, Service,
    ServiceSpec, SwarmInitRequest, SystemInfo, Task, VolumesPruneReport,
};
use tracing::{debug, error};
use url::Url;

use crate::docker::{
    encode_filters, ControlPlane, EventFilter, EventStream, ImageArchive, TaskFilter,
};
use crate::errors::ControlPlaneError;

/// Engine API version the requests are pinned to
pub const DEFAULT_API_VERSION: &str = "v1.43";

/// Docker Engine client options
#[derive(Debug, Clone)]
pub struct Options {
    /// Engine address, `tcp://host:port` or `http(s)://host:port`
    pub host: String,

    /// API version path prefix
    pub api_version: String,

    /// Timeout for request/response calls (not applied to the event stream)
    pub request_timeout: Duration,

    pub connect_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: "tcp://127.0.0.1:2375".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Client for the Docker Engine API
pub struct DockerClient {
    client: Client,
    stream_client: Client,
    base_url: String,
}

impl DockerClient {
    /// Create a new client
    pub fn new(options: &Options) -> Result<Self, ControlPlaneError> {
        let host = normalize_host(&options.host)?;

        let client = Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .build()?;

        // the event feed stays open for the whole rollout
        let stream_client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;

        let base_url = match options.api_version.trim_matches('/') {
            "" => host,
            version => format!("{}/{}", host, version),
        };

        Ok(Self {
            client,
            stream_client,
            base_url,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ControlPlaneError> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self.client.get(&url).query(query).send().await?;
        let response = check_response("GET", &url, response).await?;
        Ok(response.json().await?)
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ControlPlaneError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self.client.post(&url).query(query).json(body).send().await?;
        let response = check_response("POST", &url, response).await?;
        Ok(response.json().await?)
    }

    /// POST whose response body is irrelevant
    async fn post_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<(), ControlPlaneError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self.client.post(&url).query(query).json(body).send().await?;
        check_response("POST", &url, response).await?;
        Ok(())
    }

    /// POST without a request body
    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ControlPlaneError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self.client.post(&url).send().await?;
        let response = check_response("POST", &url, response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<(), ControlPlaneError> {
        let url = self.url(path);
        debug!("DELETE {}", url);

        let response = self.client.delete(&url).send().await?;
        check_response("DELETE", &url, response).await?;
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for DockerClient {
    async fn list_services(&self, name: &str) -> Result<Vec<Service>, ControlPlaneError> {
        let filters = encode_filters(&[("name", vec![name])].into_iter().collect());
        self.get("/services", &[("filters", filters)]).await
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<String, ControlPlaneError> {
        let response: IdResponse = self.post("/services/create", &[], spec).await?;
        for warning in response.warnings.unwrap_or_default() {
            debug!("Service create warning: {}", warning);
        }
        Ok(response.id)
    }

    async fn update_service(
        &self,
        id: &str,
        version: u64,
        spec: &ServiceSpec,
    ) -> Result<(), ControlPlaneError> {
        self.post_unit(
            &format!("/services/{}/update", id),
            &[("version", version.to_string())],
            spec,
        )
        .await
    }

    async fn inspect_service(&self, id: &str) -> Result<Service, ControlPlaneError> {
        self.get(&format!("/services/{}", id), &[]).await
    }

    async fn remove_service(&self, id: &str) -> Result<(), ControlPlaneError> {
        self.delete(&format!("/services/{}", id)).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ControlPlaneError> {
        self.get("/tasks", &[("filters", filter.to_query())]).await
    }

    async fn create_secret(&self, spec: &SecretSpec) -> Result<String, ControlPlaneError> {
        let response: IdResponse = self.post("/secrets/create", &[], spec).await?;
        Ok(response.id)
    }

    async fn subscribe_events(
        &self,
        filter: &EventFilter,
    ) -> Result<EventStream, ControlPlaneError> {
        let url = self.url("/events");
        debug!("GET {} (stream)", url);

        let response = self
            .stream_client
            .get(&url)
            .query(&[("filters", filter.to_query())])
            .send()
            .await?;
        let response = check_response("GET", &url, response).await?;

        Ok(decode_event_lines(Box::pin(response.bytes_stream())))
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspect, ControlPlaneError> {
        self.get(&format!("/containers/{}/json", id), &[]).await
    }

    async fn system_info(&self) -> Result<SystemInfo, ControlPlaneError> {
        self.get("/info", &[]).await
    }

    async fn init_swarm(&self, request: &SwarmInitRequest) -> Result<(), ControlPlaneError> {
        self.post_unit("/swarm/init", &[], request).await
    }

    async fn list_networks(&self) -> Result<Vec<Network>, ControlPlaneError> {
        self.get("/networks", &[]).await
    }

    async fn create_network(
        &self,
        request: &NetworkCreateRequest,
    ) -> Result<String, ControlPlaneError> {
        let response: IdResponse = self.post("/networks/create", &[], request).await?;
        Ok(response.id)
    }

    async fn create_exec(
        &self,
        container_id: &str,
        cmd: &[String],
    ) -> Result<String, ControlPlaneError> {
        let request = ExecCreateRequest {
            cmd: cmd.to_vec(),
            attach_stdout: false,
            attach_stderr: false,
        };
        let response: IdResponse = self
            .post(&format!("/containers/{}/exec", container_id), &[], &request)
            .await?;
        Ok(response.id)
    }

    async fn start_exec(&self, exec_id: &str) -> Result<(), ControlPlaneError> {
        let request = ExecStartRequest {
            detach: true,
            tty: false,
        };
        self.post_unit(&format!("/exec/{}/start", exec_id), &[], &request)
            .await
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecInspect, ControlPlaneError> {
        self.get(&format!("/exec/{}/json", exec_id), &[]).await
    }

    async fn inspect_image(&self, name: &str) -> Result<ImageInspect, ControlPlaneError> {
        self.get(&format!("/images/{}/json", name), &[]).await
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, ControlPlaneError> {
        self.get("/images/json", &[]).await
    }

    async fn save_image(&self, name: &str) -> Result<ImageArchive, ControlPlaneError> {
        let url = self.url("/images/get");
        debug!("GET {} (stream)", url);

        let response = self
            .stream_client
            .get(&url)
            .query(&[("names", name)])
            .send()
            .await?;
        let response = check_response("GET", &url, response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ControlPlaneError::from))
            .boxed())
    }

    async fn load_image(&self, archive: ImageArchive) -> Result<(), ControlPlaneError> {
        let url = self.url("/images/load");
        debug!("POST {} (stream)", url);

        let response = self
            .stream_client
            .post(&url)
            .query(&[("quiet", "1")])
            .header(http::header::CONTENT_TYPE, "application/x-tar")
            .body(reqwest::Body::wrap_stream(archive))
            .send()
            .await?;
        let response = check_response("POST", &url, response).await?;
        let status = response.status();

        // failures after the upload are reported inside the progress stream
        let body = response.text().await?;
        match load_error(&body) {
            Some(message) => Err(ControlPlaneError::Api {
                status: status.as_u16(),
                message,
            }),
            None => Ok(()),
        }
    }

    async fn prune_containers(&self) -> Result<ContainersPruneReport, ControlPlaneError> {
        self.post_empty("/containers/prune").await
    }

    async fn prune_images(&self) -> Result<ImagesPruneReport, ControlPlaneError> {
        self.post_empty("/images/prune").await
    }

    async fn prune_volumes(&self) -> Result<VolumesPruneReport, ControlPlaneError> {
        self.post_empty("/volumes/prune").await
    }

    async fn prune_networks(&self) -> Result<NetworksPruneReport, ControlPlaneError> {
        self.post_empty("/networks/prune").await
    }
}

/// First error message of an image load progress stream
pub fn load_error(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| serde_json::from_str::<ImageLoadMessage>(line.trim()).ok())
        .find_map(|message| message.error)
}

async fn check_response(
    method: &str,
    url: &str,
    response: Response,
) -> Result<Response, ControlPlaneError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("HTTP {} {} failed: {} - {}", method, url, status, body);
    Err(error_from_response(status, &body))
}

/// Map a non-2xx engine response onto a `ControlPlaneError`
pub fn error_from_response(status: StatusCode, body: &str) -> ControlPlaneError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string());

    if status == StatusCode::NOT_FOUND {
        return ControlPlaneError::NotFound(message);
    }
    // swarm reports stale versions as a 500 with this message on older engines
    if status == StatusCode::CONFLICT || message.contains("update out of sequence") {
        return ControlPlaneError::Conflict(message);
    }
    ControlPlaneError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Normalize an engine address into an HTTP base URL
pub fn normalize_host(host: &str) -> Result<String, ControlPlaneError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ControlPlaneError::InvalidHost("empty address".to_string()));
    }

    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("tcp://{}", host)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| ControlPlaneError::InvalidHost(format!("{}: {}", host, e)))?;

    let (scheme, port) = match url.scheme() {
        "tcp" => ("http", url.port().unwrap_or(2375)),
        "http" | "https" => (url.scheme(), url.port_or_known_default().unwrap_or(2375)),
        other => {
            return Err(ControlPlaneError::InvalidHost(format!(
                "unsupported scheme '{}' in {}, expose the engine over tcp",
                other, host
            )))
        }
    };

    let hostname = url
        .host_str()
        .ok_or_else(|| ControlPlaneError::InvalidHost(format!("missing host in {}", host)))?;

    Ok(format!("{}://{}:{}", scheme, hostname, port))
}

/// Split a byte stream of newline-delimited JSON into event messages
fn decode_event_lines<S, B>(bytes: S) -> EventStream
where
    S: futures::Stream<Item = Result<B, reqwest::Error>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    futures::stream::unfold((bytes, Vec::<u8>::new()), |(mut bytes, mut buf)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = line.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                let item = serde_json::from_slice::<EventMessage>(line)
                    .map_err(ControlPlaneError::from);
                return Some((item, (bytes, buf)));
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(ControlPlaneError::from(e)), (bytes, buf))),
                None => return None,
            }
        }
    })
    .boxed()
}
