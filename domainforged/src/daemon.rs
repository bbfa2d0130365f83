use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use crate::broadcast;
use crate::config::Config;
use crate::proxy::RouteSync;
use crate::registry::Registry;
use crate::server;

/// A daemon that passed its startup checks and owns a bound admin listener.
pub struct Daemon {
    listener: TcpListener,
    registry: Arc<Registry>,
    config: Config,
}

impl Daemon {
    /// Check the reverse proxy is reachable, then bind the admin listener.
    /// Nothing is served if either step fails.
    pub async fn bind(config: Config, registry: Arc<Registry>, routes: &dyn RouteSync) -> Result<Self> {
        routes.ping().await.with_context(|| {
            format!(
                "Reverse proxy admin API at {} is not reachable",
                config.proxy.admin_endpoint
            )
        })?;

        let listener = TcpListener::bind(&config.admin.listen)
            .await
            .with_context(|| format!("Failed to bind to {}", config.admin.listen))?;

        Ok(Self {
            listener,
            registry,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read admin listener address")
    }

    /// Serve until `shutdown` resolves or a client sends `stop`, then stop
    /// accepting, let in-flight requests finish, and release every
    /// advertisement.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tracing::info!("domainforge listening on {}", self.local_addr()?);

        let cancel = CancellationToken::new();
        let stop = CancellationToken::new();

        let broadcast_handle = tokio::spawn(broadcast::run(
            self.registry.clone(),
            self.config.broadcast.interval(),
            cancel.clone(),
        ));

        let server_handle = tokio::spawn(server::serve(
            self.listener,
            self.registry.clone(),
            stop.clone(),
            cancel.clone(),
        ));

        tokio::select! {
            _ = shutdown => tracing::info!("Shutdown signal received"),
            _ = stop.cancelled() => tracing::info!("Stop command received"),
        }

        tracing::info!("Shutting down domainforge");
        cancel.cancel();

        let (server_result, broadcast_result) = tokio::join!(server_handle, broadcast_handle);
        if let Err(e) = server_result {
            tracing::error!("Admin server task failed: {}", e);
        }
        if let Err(e) = broadcast_result {
            tracing::error!("Broadcaster task failed: {}", e);
        }

        let released = self.registry.shutdown().await;
        tracing::info!("Released {} advertisements", released);
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use crate::testing::Fakes;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.admin.listen = "127.0.0.1:0".to_string();
        config
    }

    async fn send(addr: SocketAddr, line: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_stop_command_shuts_down() {
        let fakes = Fakes::new();
        let registry = fakes.registry();
        let daemon = Daemon::bind(test_config(), registry.clone(), fakes.routes.as_ref())
            .await
            .unwrap();
        let addr = daemon.local_addr().unwrap();
        let task = tokio::spawn(daemon.run(std::future::pending()));

        assert_eq!(
            send(addr, "add hello --port 3000").await,
            "Added domain: hello.local with port: 3000\n"
        );
        assert_eq!(send(addr, "add api --port 8080").await.lines().count(), 1);
        assert_eq!(fakes.advertiser.live().len(), 2);

        assert_eq!(send(addr, "stop").await, "");
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("daemon did not stop")
            .unwrap()
            .unwrap();

        assert!(fakes.advertiser.live().is_empty());
        assert!(registry.list().await.is_empty());
        // Routes stay on the reverse proxy after shutdown
        assert_eq!(fakes.routes.routes().len(), 2);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_signal_shuts_down() {
        let fakes = Fakes::new();
        let daemon = Daemon::bind(test_config(), fakes.registry(), fakes.routes.as_ref())
            .await
            .unwrap();
        let addr = daemon.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(daemon.run(async {
            let _ = rx.await;
        }));

        send(addr, "add hello --port 3000").await;
        tx.send(()).unwrap();
        task.await.unwrap().unwrap();

        assert!(fakes.advertiser.live().is_empty());
        assert_eq!(fakes.advertiser.releases(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_proxy_fails_fast() {
        let fakes = Fakes::new();
        fakes.routes.set_unreachable(true);

        let err = Daemon::bind(test_config(), fakes.registry(), fakes.routes.as_ref())
            .await
            .err()
            .expect("bind should fail");
        assert!(err.to_string().contains("not reachable"), "got {err:#}");
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let fakes = Fakes::new();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config();
        config.admin.listen = taken.local_addr().unwrap().to_string();

        let err = Daemon::bind(config, fakes.registry(), fakes.routes.as_ref())
            .await
            .err()
            .expect("bind should fail");
        assert!(err.to_string().starts_with("Failed to bind to"), "got {err:#}");
    }
}
