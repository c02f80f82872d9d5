//! Network-related constants.

/// Default address of the orchestrator API server that serves the endpoint watch.
pub const DEFAULT_WATCH_ADDR: &str = "127.0.0.1:8080";

/// Path of the endpoints watch stream on the API server.
pub const WATCH_ENDPOINTS_PATH: &str = "/api/v1/watch/endpoints";

/// Origin header sent on the websocket handshake.
pub const WATCH_ORIGIN: &str = "http://localhost";

/// Admin interface path returning the current upstream mapping.
pub const ADMIN_STATUS_PATH: &str = "/status";

/// Admin interface path accepting add/remove mutations.
pub const ADMIN_UPSTREAM_CONF_PATH: &str = "/upstream_conf";

/// Port assumed for every endpoint address when forming backend server strings.
pub const DEFAULT_BACKEND_PORT: u16 = 80;
