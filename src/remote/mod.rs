//! 远端播放器层：MediaRemote 抽象、Mock 实现、可达性检查

pub mod mock;
pub mod traits;

pub use mock::{MockRemote, RemoteCommand};
pub use traits::{MediaRemote, RemoteMediaState, RemoteStatus};

use std::time::Duration;

use crate::core::{RepError, Result};

/// 检查远端播放器端口是否可达；连接失败即 RemoteUnavailable（不自动重连）
pub async fn check_reachable(host: &str, port: u16, timeout: Duration) -> Result<()> {
    let addr = format!("{host}:{port}");
    tracing::info!("Connecting to remote player on {}...", addr);
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => {
            tracing::info!("Remote player reachable at {}", addr);
            Ok(())
        }
        Ok(Err(e)) => Err(RepError::RemoteUnavailable(format!("{addr}: {e}"))),
        Err(_) => Err(RepError::RemoteUnavailable(format!(
            "{addr}: timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reachable_listener_passes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        check_reachable("127.0.0.1", port, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_port_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = check_reachable("127.0.0.1", port, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RepError::RemoteUnavailable(_)));
    }
}
