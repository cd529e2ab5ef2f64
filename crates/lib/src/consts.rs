//! Well-known names shared by the library and the CLI.

/// Crate version, printed in the bootstrap banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration file looked up in the project directory.
pub const CONFIG_FILENAME: &str = "kiln.lua";

/// Default directory (relative to the project) for generated artifacts.
pub const DEFAULT_TEMP_DIR: &str = ".kiln";

/// Artifact re-emitted on every hot-reload broadcast.
pub const LIVE_ARTIFACT: &str = "now.js";

/// Route table artifact.
pub const ROUTES_ARTIFACT: &str = "routes.json";

/// Queued asset list artifact.
pub const ASSETS_ARTIFACT: &str = "assets.json";

/// Index of the phase that builds the query schema.
pub const SCHEMA_PHASE: usize = 2;

/// Index of the last default phase (code generation).
pub const LAST_PHASE: usize = 3;

/// Path of the live-reload WebSocket endpoint on the dev server.
pub const LIVE_ENDPOINT: &str = "/_kiln/live";
