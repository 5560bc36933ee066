//! Shared coordinator machinery for both cluster generations.
//!
//! The coordinator speaks a line protocol: every accepted connection
//! receives a `GRIDSTONE/1 <total-slots>` hello, then one command per
//! line (`PING`, `SUBMIT <name>`, `QUIT`) until EOF.

use crate::executor::{GridEndpoint, PROTOCOL_ID};
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Binds a coordinator listener. Port 0 requests an ephemeral port; the
/// actual port is read back from the returned endpoint.
pub(crate) async fn bind(host: &str, port: u16) -> Result<(TcpListener, GridEndpoint)> {
    let requested = format!("{host}:{port}");
    let listener = TcpListener::bind(&requested).await.map_err(|source| Error::Bind {
        addr: requested,
        source,
    })?;
    let endpoint = GridEndpoint::from(listener.local_addr()?);
    Ok((listener, endpoint))
}

/// Runtime state shared by both engine generations: the bound endpoints,
/// the shutdown signal, and the component tasks joined on close.
pub(crate) struct GridCore {
    endpoint: GridEndpoint,
    web_endpoint: Option<GridEndpoint>,
    total_slots: u32,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl GridCore {
    pub(crate) fn new(
        endpoint: GridEndpoint,
        web_endpoint: Option<GridEndpoint>,
        total_slots: u32,
        shutdown_tx: watch::Sender<bool>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            endpoint,
            web_endpoint,
            total_slots,
            shutdown_tx,
            tasks: Mutex::new(tasks),
            running: AtomicBool::new(true),
        }
    }

    pub(crate) fn endpoint(&self) -> GridEndpoint {
        self.endpoint.clone()
    }

    pub(crate) fn web_endpoint(&self) -> Option<GridEndpoint> {
        self.web_endpoint.clone()
    }

    pub(crate) fn total_slots(&self) -> u32 {
        self.total_slots
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signals shutdown and joins every component task. Only the first
    /// call does work; later calls return `Ok(())`.
    pub(crate) async fn close(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(true);

        let mut first_failure = None;
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(join_error) = task.await {
                if !join_error.is_cancelled() {
                    warn!(error = %join_error, "cluster component task failed during shutdown");
                    first_failure.get_or_insert_with(|| Error::Shutdown(join_error.to_string()));
                }
            }
        }

        match first_failure {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

/// Spawns the coordinator accept loop.
///
/// `client_capable` is false for shared-context clusters: those still
/// greet connections but refuse commands, which is what makes the
/// "administrative client requires separate execution contexts"
/// constraint observable.
pub(crate) fn spawn_accept_loop(
    listener: TcpListener,
    total_slots: u32,
    client_capable: bool,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(accept_loop(listener, total_slots, client_capable, shutdown))
}

async fn accept_loop(
    listener: TcpListener,
    total_slots: u32,
    client_capable: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let next_job_id = Arc::new(AtomicU64::new(1));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "coordinator accepted connection");
                    let job_ids = Arc::clone(&next_job_id);
                    let conn_shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(error) =
                            serve_connection(stream, total_slots, client_capable, job_ids, conn_shutdown).await
                        {
                            debug!(error = %error, "coordinator connection ended with error");
                        }
                    });
                }
                Err(error) => warn!(error = %error, "coordinator accept failed"),
            },
        }
    }
    debug!("coordinator accept loop stopped");
}

async fn serve_connection(
    stream: TcpStream,
    total_slots: u32,
    client_capable: bool,
    next_job_id: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half
        .write_all(format!("{PROTOCOL_ID} {total_slots}\n").as_bytes())
        .await?;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = line.trim_end();
                let reply = match command {
                    "QUIT" => break,
                    _ if !client_capable => "ERR shared-context".to_string(),
                    "PING" => "PONG".to_string(),
                    _ if command.starts_with("SUBMIT ") => {
                        let id = next_job_id.fetch_add(1, Ordering::Relaxed);
                        format!("ACK job-{id}")
                    }
                    _ => "ERR unknown-command".to_string(),
                };
                write_half.write_all(format!("{reply}\n").as_bytes()).await?;
            }
        }
    }

    Ok(())
}

/// Spawns a dedicated execution context for one task manager. The context
/// parks until the cluster-wide shutdown signal fires.
pub(crate) fn spawn_task_manager(id: u32, slots: u32, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(task_manager = id, slots, "task manager context up");
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        debug!(task_manager = id, "task manager context down");
    })
}

/// Spawns the web endpoint loop: hello line only, then the connection is
/// dropped.
pub(crate) fn spawn_web_loop(
    listener: TcpListener,
    total_slots: u32,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((mut stream, _)) => {
                        let _ = stream
                            .write_all(format!("{PROTOCOL_ID} {total_slots}\n").as_bytes())
                            .await;
                    }
                    Err(error) => warn!(error = %error, "web endpoint accept failed"),
                },
            }
        }
    })
}
