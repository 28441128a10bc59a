//! Image update checks and destructive container recreation.

use bollard::models::ContainerInspectResponse;
use tracing::{info, warn};

use crate::docker::{short_id, ContainerSpec, DockerManager, PortMapping};
use crate::web::error::AppError;
use crate::web::models::{UpdateApplyResponse, UpdateCheckResponse};

/// Compares the image a container runs against the registry's current tag.
/// Pulls the tag but never touches the container itself.
pub async fn check_for_update(
    docker: &DockerManager,
    id: &str,
) -> Result<UpdateCheckResponse, AppError> {
    let inspected = docker.inspect(id).await?;
    let image_tag = image_tag_of(&inspected)
        .ok_or_else(|| AppError::Validation("Container has no image tag to check".to_string()))?;
    let current_id = inspected.image.clone().unwrap_or_default();

    docker.pull_image(&image_tag).await?;
    let latest_id = docker.image_id(&image_tag).await?;

    Ok(UpdateCheckResponse {
        container_id: short_id(id),
        name: container_name_of(&inspected),
        image: image_tag,
        update_available: current_id != latest_id,
    })
}

/// Update availability for every container on the engine. Containers whose
/// tag cannot be pulled are skipped with a warning instead of failing the
/// whole report.
pub async fn check_all_updates(
    docker: &DockerManager,
) -> Result<Vec<UpdateCheckResponse>, AppError> {
    let containers = docker.list_containers().await?;
    let mut report = Vec::with_capacity(containers.len());
    for container in containers {
        match check_for_update(docker, &container.id).await {
            Ok(check) => report.push(check),
            Err(e) => {
                warn!(container_id = %container.id, error = %e, "Skipping container in update check.");
            }
        }
    }
    Ok(report)
}

/// Recreates a container on the newest image of its tag. When the running
/// image already matches the registry, nothing is stopped or removed and the
/// container id is unchanged. Otherwise the container is stopped, removed
/// and recreated with the same name, environment, port bindings and binds;
/// a failure after removal is terminal, there is no rollback.
pub async fn apply_update(
    docker: &DockerManager,
    id: &str,
) -> Result<UpdateApplyResponse, AppError> {
    let inspected = docker.inspect(id).await?;
    let image_tag = image_tag_of(&inspected)
        .ok_or_else(|| AppError::Validation("Container has no image tag to update".to_string()))?;
    let current_id = inspected.image.clone().unwrap_or_default();

    docker.pull_image(&image_tag).await?;
    let latest_id = docker.image_id(&image_tag).await?;
    if current_id == latest_id {
        return Ok(UpdateApplyResponse {
            updated: false,
            container_id: short_id(id),
            message: format!("'{image_tag}' is already up to date"),
        });
    }

    let spec = spec_from_inspect(&inspected);
    info!(container = %spec.name, image = %image_tag, "Recreating container on updated image.");
    docker.stop_container(id).await?;
    docker.remove_container(id).await?;
    let new_id = docker
        .create_container(&spec)
        .await
        .map_err(|e| AppError::UpdateFailed(format!("Recreate after removal failed: {e}")))?;

    Ok(UpdateApplyResponse {
        updated: true,
        container_id: short_id(&new_id),
        message: format!("'{}' updated to the latest '{image_tag}'", spec.name),
    })
}

fn container_name_of(inspected: &ContainerInspectResponse) -> String {
    inspected
        .name
        .as_deref()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default()
}

fn image_tag_of(inspected: &ContainerInspectResponse) -> Option<String> {
    inspected
        .config
        .as_ref()
        .and_then(|c| c.image.clone())
        .filter(|image| !image.starts_with("sha256:"))
}

/// Captures the subset of a running container's configuration the recreate
/// needs: name, image, env, port bindings and bind mounts.
fn spec_from_inspect(inspected: &ContainerInspectResponse) -> ContainerSpec {
    let mut ports = Vec::new();
    if let Some(bindings) = inspected
        .host_config
        .as_ref()
        .and_then(|hc| hc.port_bindings.as_ref())
    {
        for (key, hosts) in bindings {
            let Some((container_port, protocol)) = parse_port_key(key) else {
                continue;
            };
            let Some(host_port) = hosts
                .as_ref()
                .and_then(|list| list.first())
                .and_then(|b| b.host_port.as_deref())
                .and_then(|p| p.parse().ok())
            else {
                continue;
            };
            ports.push(PortMapping {
                host_port,
                container_port,
                protocol,
            });
        }
    }
    ports.sort_by_key(|p| (p.container_port, p.host_port));

    ContainerSpec {
        name: container_name_of(inspected),
        image: inspected
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default(),
        env: inspected
            .config
            .as_ref()
            .and_then(|c| c.env.clone())
            .unwrap_or_default(),
        ports,
        volumes: inspected
            .host_config
            .as_ref()
            .and_then(|hc| hc.binds.clone())
            .unwrap_or_default(),
    }
}

fn parse_port_key(key: &str) -> Option<(u16, String)> {
    let (port, protocol) = key.split_once('/')?;
    Some((port.parse().ok()?, protocol.to_string()))
}
