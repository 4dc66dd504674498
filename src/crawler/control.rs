//! Minimal Tor control-channel client: `rotate_identity` signals a new
//! circuit over the control port. No ecosystem crate in this stack speaks
//! the control protocol, so it is a thin line-oriented client over TCP.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests a new circuit from the control channel at `endpoint` (`host:port`),
/// authenticating with `password` if given.
///
/// Failures are the caller's to log; they are never fatal to the crawl, per
/// §4.A: "failures on rotation are logged but non-fatal."
pub async fn rotate_identity(endpoint: &str, password: Option<&str>) -> Result<(), String> {
    timeout(CONTROL_TIMEOUT, rotate_identity_inner(endpoint, password))
        .await
        .map_err(|_| format!("control channel {endpoint} timed out"))?
}

async fn rotate_identity_inner(endpoint: &str, password: Option<&str>) -> Result<(), String> {
    let stream = TcpStream::connect(endpoint)
        .await
        .map_err(|e| format!("failed to connect to control channel {endpoint}: {e}"))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let auth_cmd = match password {
        Some(p) => format!("AUTHENTICATE \"{}\"\r\n", p.replace('"', "\\\"")),
        None => "AUTHENTICATE\r\n".to_string(),
    };
    write_half
        .write_all(auth_cmd.as_bytes())
        .await
        .map_err(|e| format!("AUTHENTICATE write failed: {e}"))?;

    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| format!("AUTHENTICATE read failed: {e}"))?;
    if !line.starts_with("250") {
        return Err(format!("AUTHENTICATE rejected: {}", line.trim_end()));
    }

    write_half
        .write_all(b"SIGNAL NEWNYM\r\n")
        .await
        .map_err(|e| format!("SIGNAL NEWNYM write failed: {e}"))?;

    let mut reply = String::new();
    reader
        .read_line(&mut reply)
        .await
        .map_err(|e| format!("SIGNAL NEWNYM read failed: {e}"))?;
    if !reply.starts_with("250") {
        return Err(format!("SIGNAL NEWNYM rejected: {}", reply.trim_end()));
    }

    Ok(())
}
