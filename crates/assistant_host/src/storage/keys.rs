//! Dot-namespaced storage keys and the reset-to-defaults policy.

use super::StorageAdapter;

/// Overleaf project id of the last opened project.
pub const PROJECT_ID_KEY: &str = "pd.projectId";
/// Prefix shared by every authentication key.
pub const AUTH_PREFIX: &str = "pd.auth.";
/// Overleaf session cookie captured for API calls.
pub const AUTH_OVERLEAF_SESSION_KEY: &str = "pd.auth.overleafSession";
/// Load-balancer affinity cookie captured alongside the session.
pub const AUTH_GCLB_KEY: &str = "pd.auth.gclb";
/// Access token.
pub const AUTH_TOKEN_KEY: &str = "pd.auth.token";
/// Refresh token.
pub const AUTH_REFRESH_TOKEN_KEY: &str = "pd.auth.refreshToken";
/// Persisted id for hosts without a native document id.
pub const DOCUMENT_ID_KEY: &str = "pd.documentId";
/// Document URL that produced [`DOCUMENT_ID_KEY`].
pub const DOCUMENT_URL_KEY: &str = "pd.documentUrl";
/// Prefix for developer-tool toggles.
pub const DEVTOOL_PREFIX: &str = "pd.devtool.";

/// Returns whether `key` survives [`reset_to_defaults`].
pub fn is_preserved_on_reset(key: &str) -> bool {
    key == PROJECT_ID_KEY || key.starts_with(AUTH_PREFIX) || key.starts_with(DEVTOOL_PREFIX)
}

/// Clears every setting except credentials, developer toggles, and the project id.
pub fn reset_to_defaults(storage: &dyn StorageAdapter) {
    for key in storage.keys() {
        if !is_preserved_on_reset(&key) {
            storage.remove_item(&key);
        }
    }
}
