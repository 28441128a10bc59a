//! Built-in application catalog. Entries use fixed slug ids so the
//! dashboard can install them by name and reseeding stays idempotent.

pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub image: &'static str,
    pub github_repo: &'static str,
    pub ports: &'static [u16],
}

pub fn builtin_templates() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            id: "jellyfin",
            name: "Jellyfin",
            description: "Free software media server for streaming movies, shows and music.",
            category: "Media Server",
            image: "jellyfin/jellyfin:latest",
            github_repo: "https://github.com/jellyfin/jellyfin",
            ports: &[8096],
        },
        CatalogEntry {
            id: "jellyseerr",
            name: "Jellyseerr",
            description: "Request management and media discovery for Jellyfin.",
            category: "Media Management",
            image: "fallenbagel/jellyseerr:latest",
            github_repo: "https://github.com/Fallenbagel/jellyseerr",
            ports: &[5055],
        },
        CatalogEntry {
            id: "transmission",
            name: "Transmission",
            description: "Fast, easy BitTorrent client with a web interface.",
            category: "Download Client",
            image: "linuxserver/transmission:latest",
            github_repo: "https://github.com/transmission/transmission",
            ports: &[9091],
        },
        CatalogEntry {
            id: "sonarr",
            name: "Sonarr",
            description: "Smart PVR for TV shows: monitors feeds and grabs new episodes.",
            category: "Media Management",
            image: "linuxserver/sonarr:latest",
            github_repo: "https://github.com/Sonarr/Sonarr",
            ports: &[8989],
        },
        CatalogEntry {
            id: "radarr",
            name: "Radarr",
            description: "Movie collection manager for Usenet and BitTorrent users.",
            category: "Media Management",
            image: "linuxserver/radarr:latest",
            github_repo: "https://github.com/Radarr/Radarr",
            ports: &[7878],
        },
        CatalogEntry {
            id: "plex",
            name: "Plex",
            description: "Media server that organizes and streams your personal library.",
            category: "Media Server",
            image: "plexinc/pms-docker:latest",
            github_repo: "https://github.com/plexinc/pms-docker",
            ports: &[32400],
        },
        CatalogEntry {
            id: "portainer",
            name: "Portainer",
            description: "Lightweight management UI for Docker environments.",
            category: "Management",
            image: "portainer/portainer-ce:latest",
            github_repo: "https://github.com/portainer/portainer",
            ports: &[9000],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique_slugs() {
        let entries = builtin_templates();
        let mut ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), entries.len());
        assert!(ids
            .iter()
            .all(|id| id.chars().all(|c| c.is_ascii_lowercase())));
    }

    #[test]
    fn every_entry_has_an_image_and_a_port() {
        for entry in builtin_templates() {
            assert!(entry.image.contains(':'), "{} image is untagged", entry.id);
            assert!(!entry.ports.is_empty(), "{} has no ports", entry.id);
        }
    }
}
