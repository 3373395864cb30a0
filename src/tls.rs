use std::sync::Once;

/// reqwest is built without a bundled crypto provider; install ring once per process.
pub fn ensure_rustls_provider_installed() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Someone else may have installed one already.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
