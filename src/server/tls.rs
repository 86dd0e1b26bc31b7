//! TLS certificate loading for connectors.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::{ConfigError, TlsConfig};

/// Load the certificate/key pair for a TLS connector.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, ConfigError> {
    let cert_path = Path::new(&tls.cert_path);
    let key_path = Path::new(&tls.key_path);

    if !cert_path.exists() {
        return Err(ConfigError::Tls(format!(
            "certificate file not found: {}",
            tls.cert_path
        )));
    }
    if !key_path.exists() {
        return Err(ConfigError::Tls(format!(
            "private key file not found: {}",
            tls.key_path
        )));
    }

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| {
            ConfigError::Tls(format!(
                "failed to load {} / {}: {e}",
                tls.cert_path, tls.key_path
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_certificate_fails_before_binding() {
        let tls = TlsConfig {
            cert_path: "/nonexistent/cert.pem".to_string(),
            key_path: "/nonexistent/key.pem".to_string(),
        };
        let error = load_tls_config(&tls).await.unwrap_err();
        assert!(matches!(error, ConfigError::Tls(message) if message.contains("certificate")));
    }

    #[tokio::test]
    async fn garbage_pem_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "not a certificate").unwrap();
        std::fs::write(&key, "not a key").unwrap();

        let tls = TlsConfig {
            cert_path: cert.display().to_string(),
            key_path: key.display().to_string(),
        };
        assert!(load_tls_config(&tls).await.is_err());
    }
}
