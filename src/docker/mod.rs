pub mod stats;

use std::collections::HashMap;
use std::sync::Arc;

use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerInspectResponse, ContainerUpdateBody, CreateImageInfo,
    HostConfig, NetworkCreateRequest, PortBinding,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, ListContainersOptions, ListNetworksOptions,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::Docker;
use dashmap::DashMap;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Container engine is unreachable: {0}")]
    Unavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePull { image: String, reason: String },
    #[error("Host port conflict: {0}")]
    PortConflict(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Container engine error: {0}")]
    Api(String),
}

fn map_engine_error(err: BollardError) -> DockerError {
    match err {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => match status_code {
            404 => DockerError::NotFound(message),
            409 if message.contains("port is already allocated")
                || message.contains("address already in use") =>
            {
                DockerError::PortConflict(message)
            }
            409 => DockerError::Conflict(message),
            500 if message.contains("port is already allocated")
                || message.contains("address already in use") =>
            {
                DockerError::PortConflict(message)
            }
            _ => DockerError::Api(message),
        },
        // Everything else (socket missing, connection refused, hyper errors)
        // means we could not talk to the daemon.
        other => DockerError::Unavailable(other.to_string()),
    }
}

/// A single host-to-container port binding, always expressed explicitly
/// instead of the engine's "8096/tcp" string keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

impl PortMapping {
    pub fn tcp(host_port: u16, container_port: u16) -> Self {
        Self {
            host_port,
            container_port,
            protocol: default_protocol(),
        }
    }

    /// Engine wire key, e.g. `8096/tcp`.
    pub fn container_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Everything needed to create and start one container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    pub ports: Vec<PortMapping>,
    /// Bind mounts in `host_path:container_path` form.
    pub volumes: Vec<String>,
}

impl ContainerSpec {
    fn create_body(&self) -> ContainerCreateBody {
        let mut exposed_ports: Vec<String> = Vec::new();
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for mapping in &self.ports {
            let key = mapping.container_key();
            exposed_ports.push(key.clone());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(mapping.host_port.to_string()),
                }]),
            );
        }

        let host_config = HostConfig {
            binds: if self.volumes.is_empty() {
                None
            } else {
                Some(self.volumes.clone())
            },
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            ..Default::default()
        };

        ContainerCreateBody {
            image: Some(self.image.clone()),
            env: if self.env.is_empty() {
                None
            } else {
                Some(self.env.clone())
            },
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        }
    }
}

/// A live view of one engine container. Never cached: the engine is the
/// single source of truth for container state.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub ports: Vec<PortMapping>,
    pub created: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
}

/// Thin adapter over the Docker Engine API.
///
/// Lifecycle operations against one container id are serialized through a
/// per-id mutex so that concurrent start+stop requests on the same id cannot
/// interleave at the adapter level.
pub struct DockerManager {
    docker: Docker,
    container_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DockerManager {
    pub fn connect() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::Unavailable(e.to_string()))?;
        Ok(Self {
            docker,
            container_locks: DashMap::new(),
        })
    }

    pub async fn ping(&self) -> Result<(), DockerError> {
        self.docker.ping().await.map_err(map_engine_error)?;
        Ok(())
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.container_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn list_containers(&self) -> Result<Vec<ContainerRecord>, DockerError> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(map_engine_error)?;

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let id = summary.id.unwrap_or_default();
            let name = summary
                .names
                .and_then(|names| names.into_iter().next())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default();
            let ports = summary
                .ports
                .unwrap_or_default()
                .into_iter()
                .filter_map(|p| {
                    p.public_port.map(|public| PortMapping {
                        host_port: public,
                        container_port: p.private_port,
                        protocol: p
                            .typ
                            .map(|t| t.to_string())
                            .unwrap_or_else(default_protocol),
                    })
                })
                .collect();
            records.push(ContainerRecord {
                id: short_id(&id),
                name,
                image: summary.image.unwrap_or_else(|| "unknown".to_string()),
                status: summary
                    .state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                ports,
                created: summary
                    .created
                    .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
                    .map(|ts| ts.to_rfc3339()),
            });
        }
        Ok(records)
    }

    /// Creates and starts a container. Returns the full engine id.
    pub async fn create_container(&self, spec: &ContainerSpec) -> Result<String, DockerError> {
        let options = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container(Some(options), spec.create_body())
            .await
            .map_err(map_engine_error)?;

        debug!(container_id = %created.id, name = %spec.name, "Container created, starting it.");
        self.start_container(&created.id).await?;
        Ok(created.id)
    }

    pub async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        match self
            .docker
            .start_container(id, None::<StartContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            // 304: already running, which is what the caller wanted.
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_engine_error(e)),
        }
    }

    pub async fn stop_container(&self, id: &str) -> Result<(), DockerError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        match self
            .docker
            .stop_container(id, None::<StopContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped.
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_engine_error(e)),
        }
    }

    pub async fn remove_container(&self, id: &str) -> Result<(), DockerError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(map_engine_error)?;
        self.container_locks.remove(id);
        Ok(())
    }

    pub async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        self.docker
            .inspect_container(id, None)
            .await
            .map_err(map_engine_error)
    }

    /// Point-in-time CPU and memory usage for one container.
    pub async fn stats(&self, id: &str) -> Result<ContainerStats, DockerError> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker.stats(id, Some(options));
        let sample = stream
            .next()
            .await
            .ok_or_else(|| DockerError::Api("engine returned no stats sample".to_string()))?
            .map_err(map_engine_error)?;

        let (memory_usage, memory_limit) = stats::memory_usage(&sample);
        let memory_percent = if memory_limit > 0 {
            (memory_usage as f64 / memory_limit as f64) * 100.0
        } else {
            0.0
        };
        Ok(ContainerStats {
            cpu_percent: stats::cpu_percent(&sample),
            memory_usage,
            memory_limit,
            memory_percent,
        })
    }

    /// Pulls an image tag from its registry, draining the progress stream.
    pub async fn pull_image(&self, image: &str) -> Result<(), DockerError> {
        let options = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            match progress {
                Ok(info) => {
                    if let Some(reason) = pull_failure(&info) {
                        return Err(DockerError::ImagePull {
                            image: image.to_string(),
                            reason,
                        });
                    }
                }
                Err(e) => {
                    return Err(DockerError::ImagePull {
                        image: image.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Applies new resource limits to a running container.
    pub async fn update_resources(
        &self,
        id: &str,
        body: ContainerUpdateBody,
    ) -> Result<(), DockerError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.docker
            .update_container(id, body)
            .await
            .map_err(map_engine_error)?;
        Ok(())
    }

    /// Content-addressable id of a locally present image.
    pub async fn image_id(&self, image: &str) -> Result<String, DockerError> {
        let inspected = self
            .docker
            .inspect_image(image)
            .await
            .map_err(map_engine_error)?;
        inspected
            .id
            .ok_or_else(|| DockerError::Api(format!("image '{image}' has no id")))
    }

    /// Live log tail: the last 100 lines followed by new output, one line per
    /// item. The stream ends when the receiver is dropped or the engine
    /// closes the connection; reconnecting starts over from "now".
    pub fn stream_logs(&self, id: &str) -> ReceiverStream<Result<String, DockerError>> {
        let docker = self.docker.clone();
        let id = id.to_string();
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let options = LogsOptions {
                follow: true,
                stdout: true,
                stderr: true,
                tail: "100".to_string(),
                ..Default::default()
            };
            let mut stream = docker.logs(&id, Some(options));
            while let Some(item) = stream.next().await {
                let line = match item {
                    Ok(chunk) => Ok(String::from_utf8_lossy(&chunk.into_bytes())
                        .trim_end()
                        .to_string()),
                    Err(e) => Err(map_engine_error(e)),
                };
                let is_err = line.is_err();
                if tx.send(line).await.is_err() {
                    debug!(container_id = %id, "Log stream receiver dropped, stopping tail.");
                    break;
                }
                if is_err {
                    break;
                }
            }
        });
        ReceiverStream::new(rx)
    }

    pub async fn list_networks(&self) -> Result<Vec<NetworkRecord>, DockerError> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions>)
            .await
            .map_err(map_engine_error)?;
        Ok(networks
            .into_iter()
            .map(|net| NetworkRecord {
                id: short_id(&net.id.unwrap_or_default()),
                name: net.name.unwrap_or_default(),
                driver: net.driver.unwrap_or_default(),
                scope: net.scope.unwrap_or_default(),
            })
            .collect())
    }

    pub async fn create_network(&self, name: &str, driver: &str) -> Result<String, DockerError> {
        let request = NetworkCreateRequest {
            name: name.to_string(),
            driver: Some(driver.to_string()),
            ..Default::default()
        };
        let response = self
            .docker
            .create_network(request)
            .await
            .map_err(map_engine_error)?;
        if !response.warning.is_empty() {
            warn!(network = name, warning = %response.warning, "Engine warning while creating network.");
        }
        Ok(short_id(&response.id))
    }

    pub async fn remove_network(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .remove_network(id)
            .await
            .map_err(map_engine_error)
    }
}

/// The 12-character id prefix the dashboard displays everywhere.
pub fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}

/// The registry reports in-stream pull failures as a progress item carrying
/// an error detail instead of failing the HTTP request.
fn pull_failure(info: &CreateImageInfo) -> Option<String> {
    info.error_detail.as_ref().map(|detail| {
        detail
            .message
            .clone()
            .unwrap_or_else(|| "unknown registry error".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builds_port_bindings_and_exposed_ports() {
        let spec = ContainerSpec {
            name: "jellyfin-abc123".to_string(),
            image: "jellyfin/jellyfin:latest".to_string(),
            env: vec!["TZ=UTC".to_string()],
            ports: vec![PortMapping::tcp(8096, 8096)],
            volumes: vec!["/mnt/media:/media".to_string()],
        };
        let body = spec.create_body();

        assert_eq!(body.image.as_deref(), Some("jellyfin/jellyfin:latest"));
        assert_eq!(body.env.as_deref(), Some(&["TZ=UTC".to_string()][..]));
        let exposed = body.exposed_ports.expect("exposed ports");
        assert_eq!(exposed, vec!["8096/tcp".to_string()]);

        let host_config = body.host_config.expect("host config");
        let bindings = host_config.port_bindings.expect("port bindings");
        let binding = bindings["8096/tcp"].as_ref().expect("binding list");
        assert_eq!(binding[0].host_port.as_deref(), Some("8096"));
        assert_eq!(
            host_config.binds.as_deref(),
            Some(&["/mnt/media:/media".to_string()][..])
        );
    }

    #[test]
    fn empty_spec_omits_optional_sections() {
        let spec = ContainerSpec {
            name: "minimal".to_string(),
            image: "busybox:latest".to_string(),
            ..Default::default()
        };
        let body = spec.create_body();
        assert!(body.env.is_none());
        assert!(body.exposed_ports.is_none());
        let host_config = body.host_config.expect("host config");
        assert!(host_config.binds.is_none());
        assert!(host_config.port_bindings.is_none());
    }

    #[test]
    fn server_errors_map_to_the_taxonomy() {
        let not_found = map_engine_error(BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container: abc".to_string(),
        });
        assert!(matches!(not_found, DockerError::NotFound(_)));

        let conflict = map_engine_error(BollardError::DockerResponseServerError {
            status_code: 500,
            message: "Bind for 0.0.0.0:8096 failed: port is already allocated".to_string(),
        });
        assert!(matches!(conflict, DockerError::PortConflict(_)));

        let name_taken = map_engine_error(BollardError::DockerResponseServerError {
            status_code: 409,
            message: "Conflict. The container name \"/jellyfin\" is already in use".to_string(),
        });
        assert!(matches!(name_taken, DockerError::Conflict(_)));
    }

    #[test]
    fn pull_stream_errors_carry_the_registry_message() {
        let progress = CreateImageInfo {
            status: Some("Downloading".to_string()),
            ..Default::default()
        };
        assert!(pull_failure(&progress).is_none());

        let failed = CreateImageInfo {
            error_detail: Some(bollard::models::ErrorDetail {
                message: Some("manifest unknown".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(pull_failure(&failed).as_deref(), Some("manifest unknown"));
    }

    #[test]
    fn short_id_truncates_to_twelve_chars() {
        assert_eq!(
            short_id("0123456789abcdef0123456789abcdef"),
            "0123456789ab"
        );
        assert_eq!(short_id("abc"), "abc");
    }
}
