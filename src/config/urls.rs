//! External service URLs

/// Image-count badge service (count is appended, then the colour)
pub const HUB_BADGE: &str = "https://badgen.net/badge/Hub%20Images";

/// Per-component status badge service
pub const SHIELDS_BADGE: &str = "https://img.shields.io/badge";

/// Registry repository page linked from each badge
pub const REGISTRY_REPOSITORY: &str = "https://hub.docker.com/repository/docker/jinaai";

/// Helper image that uploads a readme to the registry
pub const README_PUSH_IMAGE: &str = "peterevans/dockerhub-description:2.1";
