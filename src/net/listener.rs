//! TCP listener that accepts parent and API connections.
//!
//! Binds the configured tree address and spawns one dispatch task per
//! accepted connection. The accept loop never waits on a connection task,
//! so a slow peer cannot hold up the next accept.
//!
//! An accept error ends the loop for good: there is no retry, and the node
//! stops receiving connections until restarted.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::dispatch::{handle_connection, NodeContext};
use crate::config::NodeConfig;
use crate::error::NetError;

/// Bound tree listener, ready to accept.
#[derive(Debug)]
pub struct ParentListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    ctx: Arc<NodeContext>,
}

impl ParentListener {
    /// Resolve the configured address and bind it.
    ///
    /// A zero or missing port resolves to the default tree port.
    pub async fn bind(config: &NodeConfig, ctx: Arc<NodeContext>) -> Result<Self, NetError> {
        let target = config.bind_target();
        let resolved = tokio::net::lookup_host(target.as_str())
            .await
            .and_then(|mut addrs| {
                addrs.next().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        "address resolved to nothing",
                    )
                })
            });

        match resolved {
            Ok(addr) => Self::bind_addr(addr, ctx).await,
            Err(source) => {
                let err = NetError::ListenFailure { addr: target, source };
                log::error!("[Listener] {}: {err}", err.kind());
                Err(err)
            }
        }
    }

    /// Bind an explicit socket address (port 0 picks an ephemeral port).
    pub async fn bind_addr(addr: SocketAddr, ctx: Arc<NodeContext>) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            let err = NetError::ListenFailure {
                addr: addr.to_string(),
                source,
            };
            log::error!("[Listener] {}: {err}", err.kind());
            err
        })?;
        let local_addr = listener.local_addr().map_err(|source| NetError::ListenFailure {
            addr: addr.to_string(),
            source,
        })?;

        log::info!("[Listener] {} listening on {}", ctx.local_name(), local_addr);
        Ok(Self {
            listener,
            local_addr,
            ctx,
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections on the current task until accept fails.
    ///
    /// Only returns on an accept error, which is logged and returned as
    /// [`NetError::AcceptFailure`].
    pub async fn run(self) -> NetError {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote_addr)) => {
                    log::debug!("[Listener] Accepted {}", remote_addr);
                    tokio::spawn(handle_connection(stream, remote_addr, Arc::clone(&self.ctx)));
                }
                Err(source) => {
                    let err = NetError::AcceptFailure(source);
                    log::error!("[Listener] {}: {err}", err.kind());
                    return err;
                }
            }
        }
    }

    /// Spawn the accept loop as a background task.
    pub fn spawn(self) -> ListenerHandle {
        let local_addr = self.local_addr;
        let ctx = Arc::clone(&self.ctx);
        let accept_handle = tokio::spawn(self.run());
        ListenerHandle {
            local_addr,
            ctx,
            accept_handle,
        }
    }

    /// Bind the configured address and spawn the accept loop.
    pub async fn start(config: &NodeConfig, ctx: Arc<NodeContext>) -> Result<ListenerHandle, NetError> {
        Ok(Self::bind(config, ctx).await?.spawn())
    }
}

/// Handle to a running accept loop.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    ctx: Arc<NodeContext>,
    accept_handle: JoinHandle<NetError>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Context shared with the connection tasks.
    pub fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    /// Wait for the accept loop to end.
    ///
    /// Returns the accept error, or `None` if the loop was aborted.
    pub async fn join(self) -> Option<NetError> {
        self.accept_handle.await.ok()
    }

    /// Stop accepting. Established connections keep running.
    pub fn shutdown(self) {
        self.accept_handle.abort();
    }
}

/// Process-lifetime entry point: bind, then accept until failure.
///
/// Returns the [`NetError::ListenFailure`] or [`NetError::AcceptFailure`]
/// that ended serving.
pub async fn listen(config: &NodeConfig, ctx: Arc<NodeContext>) -> NetError {
    match ParentListener::bind(config, ctx).await {
        Ok(listener) => listener.run().await,
        Err(err) => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::events::NoopEventBus;
    use crate::net::handler::LoggingHandler;

    fn context() -> Arc<NodeContext> {
        Arc::new(NodeContext::new(
            "root",
            Arc::new(NoopEventBus),
            Arc::new(LoggingHandler),
        ))
    }

    #[tokio::test]
    async fn test_bind_addr_reports_local_addr() {
        let listener = ParentListener::bind_addr("127.0.0.1:0".parse().unwrap(), context())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_listen_failure() {
        let first = ParentListener::bind_addr("127.0.0.1:0".parse().unwrap(), context())
            .await
            .unwrap();
        let err = ParentListener::bind_addr(first.local_addr(), context())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ListenFailure");
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_listen_failure() {
        let config = NodeConfig {
            name: "root".to_string(),
            tree_ip: "definitely-not-a-host.invalid".to_string(),
            tree_port: 0,
        };
        let err = listen(&config, context()).await;
        assert_eq!(err.kind(), "ListenFailure");
        assert!(err.to_string().contains(":8888"), "default port expected: {err}");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let handle = ParentListener::bind_addr("127.0.0.1:0".parse().unwrap(), context())
            .await
            .unwrap()
            .spawn();
        let addr = handle.local_addr();
        handle.shutdown();

        // Give the runtime a moment to drop the aborted listener
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
