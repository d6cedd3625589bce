use crate::config::SftpConfig;
use crate::error::{SyncError, SyncResult};
use crate::logging::log_info;
use ssh2::Session;
use std::io::Write as _;
use std::net::{TcpStream, ToSocketAddrs};

/// Uploads `content` to the engagement platform's SFTP drop. Key auth is
/// preferred; `ssh2` doesn't distinguish Ed25519 from RSA up front the way
/// the reference client tries Ed25519-then-RSA, so the private key type is
/// inferred from the PEM itself during `userauth_pubkey_memory`.
pub fn upload_csv(config: &SftpConfig, content: &str) -> SyncResult<()> {
    config
        .validate()
        .map_err(|e| SyncError::sftp(format!("invalid sftp configuration: {e}")))?;

    let host = config.host.trim_end_matches('.');
    let addr = format!("{host}:22");
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| SyncError::sftp(format!("could not resolve {addr}: {e}")))?
        .next()
        .ok_or_else(|| SyncError::sftp(format!("no address resolved for {addr}")))?;
    let tcp = TcpStream::connect_timeout(&socket_addr, config.connect_timeout)
        .map_err(|e| SyncError::sftp(format!("tcp connect to {addr} failed: {e}")))?;
    tcp.set_read_timeout(Some(config.banner_timeout)).ok();

    let mut session = Session::new().map_err(|e| SyncError::sftp(format!("session init failed: {e}")))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| SyncError::sftp(format!("ssh handshake failed: {e}")))?;

    authenticate(&session, config)?;

    let sftp = session
        .sftp()
        .map_err(|e| SyncError::sftp(format!("sftp channel open failed: {e}")))?;

    ensure_parent_dirs(&sftp, &config.remote_path);

    let mut file = sftp
        .create(std::path::Path::new(&config.remote_path))
        .map_err(|e| SyncError::sftp(format!("could not open {}: {e}", config.remote_path)))?;
    file.write_all(content.as_bytes())
        .map_err(|e| SyncError::sftp(format!("write to {} failed: {e}", config.remote_path)))?;

    log_info!(host = %config.host, path = %config.remote_path, bytes = content.len(), "uploaded roster export via sftp");
    Ok(())
}

fn authenticate(session: &Session, config: &SftpConfig) -> SyncResult<()> {
    if let Some(key_pem) = &config.private_key_pem {
        session
            .userauth_pubkey_memory(
                &config.username,
                None,
                key_pem,
                config.passphrase.as_deref(),
            )
            .map_err(|e| SyncError::sftp(format!("key authentication failed: {e}")))
    } else if let Some(password) = &config.password {
        session
            .userauth_password(&config.username, password)
            .map_err(|e| SyncError::sftp(format!("password authentication failed: {e}")))
    } else {
        Err(SyncError::configuration("sftp needs either a private key or a password"))
    }
}

/// The engagement platform only permits uploads to `/`; creating
/// directories is a no-op there. Kept generic so this client still works
/// against an SFTP endpoint that does allow nested paths.
fn ensure_parent_dirs(sftp: &ssh2::Sftp, remote_path: &str) {
    let dir = std::path::Path::new(remote_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    if dir.is_empty() || dir == "/" {
        return;
    }
    let mut built = String::new();
    for segment in dir.trim_matches('/').split('/') {
        built.push('/');
        built.push_str(segment);
        if sftp.stat(std::path::Path::new(&built)).is_err() {
            let _ = sftp.mkdir(std::path::Path::new(&built), 0o755);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_rejects_unconfigured_host() {
        let config = SftpConfig::default();
        let err = upload_csv(&config, "a,b\n1,2\n").unwrap_err();
        assert!(matches!(err, SyncError::Sftp { .. } | SyncError::Configuration { .. }));
    }

    #[test]
    fn upload_rejects_missing_credentials() {
        let config = SftpConfig {
            host: "sftp.example.com".to_string(),
            username: "acme".to_string(),
            ..SftpConfig::default()
        };
        let err = upload_csv(&config, "a,b\n1,2\n").unwrap_err();
        assert!(matches!(err, SyncError::Sftp { .. } | SyncError::Configuration { .. }));
    }
}

