//! Turns an application template plus user overrides into a running
//! container.

use std::collections::BTreeMap;

use sea_orm::DatabaseConnection;
use tracing::info;
use uuid::Uuid;

use crate::db::entities::app_template;
use crate::db::services::template_service;
use crate::docker::{short_id, ContainerSpec, DockerManager, PortMapping};
use crate::web::error::AppError;
use crate::web::models::{InstallAppRequest, InstalledAppResponse};

/// Installs one app: resolve the template, merge overrides, pull the image,
/// then create and start the container. Pull and port-conflict failures
/// surface verbatim so the user can adjust the request and resubmit; a
/// failed create leaves nothing behind on the engine.
pub async fn install_app(
    db: &DatabaseConnection,
    docker: &DockerManager,
    template_id: &str,
    overrides: InstallAppRequest,
) -> Result<InstalledAppResponse, AppError> {
    let template = template_service::get_template(db, template_id).await?;
    let spec = build_spec(&template, overrides)?;

    info!(template = %template.id, image = %spec.image, name = %spec.name, "Installing application.");
    docker.pull_image(&spec.image).await?;
    let container_id = docker.create_container(&spec).await?;

    Ok(InstalledAppResponse {
        container_id: short_id(&container_id),
        name: spec.name,
        image: spec.image,
        ports: spec.ports,
    })
}

/// Merges template defaults with request overrides into a container spec.
/// Overridden ports and volumes replace the template's; environment entries
/// are merged with the override winning per key.
fn build_spec(
    template: &app_template::Model,
    overrides: InstallAppRequest,
) -> Result<ContainerSpec, AppError> {
    let name = match overrides.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => generated_name(&template.name),
    };

    let ports = match overrides.ports {
        Some(ports) => ports,
        None => template_ports(template)?,
    };

    let mut env: BTreeMap<String, String> = BTreeMap::new();
    if let Some(value) = &template.environment {
        let defaults: BTreeMap<String, String> = serde_json::from_value(value.clone())?;
        env.extend(defaults);
    }
    if let Some(requested) = overrides.environment {
        env.extend(requested);
    }

    let volumes = match overrides.volumes {
        Some(volumes) => volumes,
        None => match &template.volumes {
            Some(value) => serde_json::from_value(value.clone())?,
            None => Vec::new(),
        },
    };

    Ok(ContainerSpec {
        name,
        image: template.docker_image.clone(),
        env: env.into_iter().map(|(k, v)| format!("{k}={v}")).collect(),
        ports,
        volumes,
    })
}

/// Template ports are bare container ports; the host side defaults to the
/// same number.
fn template_ports(template: &app_template::Model) -> Result<Vec<PortMapping>, AppError> {
    match &template.ports {
        Some(value) => {
            let ports: Vec<u16> = serde_json::from_value(value.clone())?;
            Ok(ports.into_iter().map(|p| PortMapping::tcp(p, p)).collect())
        }
        None => Ok(Vec::new()),
    }
}

fn generated_name(template_name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slug(template_name), &suffix[..8])
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn jellyfin_template() -> app_template::Model {
        app_template::Model {
            id: "jellyfin".to_string(),
            name: "Jellyfin".to_string(),
            description: String::new(),
            icon: None,
            category: "Media Server".to_string(),
            docker_image: "jellyfin/jellyfin:latest".to_string(),
            github_repo: None,
            ports: Some(serde_json::json!([8096])),
            environment: Some(serde_json::json!({"TZ": "UTC"})),
            volumes: Some(serde_json::json!(["/srv/media:/media"])),
            official: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn defaults_mirror_the_template() {
        let spec = build_spec(&jellyfin_template(), InstallAppRequest::default()).expect("spec");
        assert_eq!(spec.image, "jellyfin/jellyfin:latest");
        assert!(spec.name.starts_with("jellyfin-"));
        assert_eq!(spec.ports, vec![PortMapping::tcp(8096, 8096)]);
        assert_eq!(spec.env, vec!["TZ=UTC".to_string()]);
        assert_eq!(spec.volumes, vec!["/srv/media:/media".to_string()]);
    }

    #[test]
    fn overrides_replace_ports_and_merge_environment() {
        let overrides = InstallAppRequest {
            name: Some("media-main".to_string()),
            ports: Some(vec![PortMapping::tcp(9096, 8096)]),
            environment: Some(
                [("TZ".to_string(), "Europe/Berlin".to_string())]
                    .into_iter()
                    .collect(),
            ),
            volumes: None,
        };
        let spec = build_spec(&jellyfin_template(), overrides).expect("spec");
        assert_eq!(spec.name, "media-main");
        assert_eq!(spec.ports, vec![PortMapping::tcp(9096, 8096)]);
        assert_eq!(spec.env, vec!["TZ=Europe/Berlin".to_string()]);
    }

    #[test]
    fn blank_override_name_falls_back_to_a_generated_one() {
        let overrides = InstallAppRequest {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        let spec = build_spec(&jellyfin_template(), overrides).expect("spec");
        assert!(spec.name.starts_with("jellyfin-"));
        assert_eq!(spec.name.len(), "jellyfin-".len() + 8);
    }

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slug("Plex Media Server"), "plex-media-server");
        assert_eq!(slug("Jellyfin"), "jellyfin");
        assert_eq!(slug("  Sonarr!  "), "sonarr");
    }
}
