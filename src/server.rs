// SPDX-License-Identifier: MIT

use crate::config::Config;
use crate::documents::DocumentService;
use crate::error::AppError;
use crate::handlers::register_routes;
use crate::http::handle_client;
use crate::router::Router;
use crate::store::{DocumentStore, JsonFileStore};
use log::{debug, error, info, trace, warn};
use std::fs;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

/// Request and upload counters, shared between workers.
#[derive(Debug)]
pub struct ServerStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    error_requests: AtomicU64,
    successful_uploads: AtomicU64,
    failed_uploads: AtomicU64,
    upload_bytes: AtomicU64,
    start_time: Instant,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            error_requests: AtomicU64::new(0),
            successful_uploads: AtomicU64::new(0),
            failed_uploads: AtomicU64::new(0),
            upload_bytes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self, success: bool) {
        trace!("Recording request: success={success}");
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_upload(&self, success: bool, bytes: u64) {
        trace!("Recording upload: success={success}, bytes={bytes}");
        if success {
            self.successful_uploads.fetch_add(1, Ordering::Relaxed);
            self.upload_bytes.fetch_add(bytes, Ordering::Relaxed);
        } else {
            self.failed_uploads.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// (total, successful, errors, uptime)
    pub fn request_totals(&self) -> (u64, u64, u64, Duration) {
        (
            self.total_requests.load(Ordering::Relaxed),
            self.successful_requests.load(Ordering::Relaxed),
            self.error_requests.load(Ordering::Relaxed),
            self.start_time.elapsed(),
        )
    }

    /// (successful, failed)
    pub fn upload_totals(&self) -> (u64, u64) {
        (
            self.successful_uploads.load(Ordering::Relaxed),
            self.failed_uploads.load(Ordering::Relaxed),
        )
    }

    pub fn upload_bytes(&self) -> u64 {
        self.upload_bytes.load(Ordering::Relaxed)
    }
}

/// Simple native thread pool implementation
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<mpsc::Sender<Job>>,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

impl ThreadPool {
    /// Create a pool with `size` workers; a size of zero is raised to one.
    pub fn new(size: usize) -> ThreadPool {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            workers.push(Worker::new(id, Arc::clone(&receiver)));
        }

        ThreadPool {
            workers,
            sender: Some(sender),
        }
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(f);

        if let Some(ref sender) = self.sender
            && sender.send(job).is_err()
        {
            warn!("Failed to send job to thread pool");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take()
                && thread.join().is_err()
            {
                warn!("Worker thread {} panicked", worker.id);
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) -> Worker {
        let thread = thread::spawn(move || {
            loop {
                let message = match receiver.lock() {
                    Ok(guard) => guard.recv(),
                    Err(_) => break,
                };

                match message {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            }
            trace!("Worker {id} exiting");
        });

        Worker {
            id,
            thread: Some(thread),
        }
    }
}

/// Number of regular files directly inside `dir`, zero when unreadable
fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
                .count()
        })
        .unwrap_or(0)
}

/// Bind, serve until `shutdown_rx` fires, then log final statistics.
///
/// `addr_tx` receives the bound address once the listener is ready, which
/// lets callers bind port 0 and discover the real port.
pub fn run_server(
    config: Config,
    shutdown_rx: Option<mpsc::Receiver<()>>,
    addr_tx: Option<mpsc::Sender<SocketAddr>>,
) -> Result<(), AppError> {
    debug!(
        "Starting server with configuration: verbose={}, detailed_logging={}",
        config.verbose, config.detailed_logging
    );

    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::open(
        &config.database_path,
        &config.admin_password,
    )?);
    let documents = Arc::new(
        DocumentService::new(&config.uploads_dir, store, &config.admin_password)?
            .with_allowed_extensions(&config.allowed_extensions.join(","))?
            .with_file_fields(config.file_fields.clone())
            .with_max_upload_size(config.max_upload_size),
    );

    let bind_address = format!("{}:{}", config.listen, config.port);
    debug!("Binding server to address: {bind_address}");
    let listener = TcpListener::bind(&bind_address)?;
    let local_addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;
    debug!("Server bound successfully to: {local_addr}");

    let stats = Arc::new(ServerStats::new());

    debug!("Registering routes");
    let mut router = Router::new();
    register_routes(
        &mut router,
        documents.clone(),
        Arc::new(config.frontend_dir.clone()),
        stats.clone(),
    );
    let shared_router = Arc::new(router);

    if let Some(tx) = addr_tx
        && tx.send(local_addr).is_err()
    {
        return Err(AppError::InternalServerError(
            "Failed to send server address to caller".to_string(),
        ));
    }

    info!("Document server listening on http://{local_addr}");
    info!("Admin panel: http://{local_addr}/admin.html");
    info!("Database: {}", config.database_path.display());
    info!(
        "Documents in database: {}",
        documents.list().map(|docs| docs.len()).unwrap_or(0)
    );
    info!(
        "Files in {}: {}",
        config.uploads_dir.display(),
        count_files(&config.uploads_dir)
    );

    debug!("Creating thread pool with {} threads", config.threads);
    let pool = ThreadPool::new(config.threads);
    let max_body_size = config.max_upload_size;

    debug!("Entering main server loop");
    'server_loop: loop {
        if let Some(ref rx) = shutdown_rx
            && rx.try_recv().is_ok()
        {
            info!("Shutdown signal received. Shutting down gracefully.");
            break 'server_loop;
        }

        match listener.accept() {
            Ok((stream, peer_addr)) => {
                trace!("Accepted connection from: {peer_addr}");

                // Accepted sockets inherit non-blocking mode on some platforms
                if let Err(e) = stream.set_nonblocking(false) {
                    error!("Failed to set stream to blocking mode: {e}");
                    continue;
                }

                let (stats, router) = (stats.clone(), shared_router.clone());
                pool.execute(move || {
                    handle_client_with_stats(stream, peer_addr, &router, &stats, max_body_size);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                error!("Error accepting connection: {e}");
            }
        }
    }

    // Let in-flight requests finish before reporting
    drop(pool);

    let (total, successful, errors, uptime) = stats.request_totals();
    let (uploads_ok, uploads_failed) = stats.upload_totals();
    info!(
        "Final request stats: {total} total ({successful} successful, {errors} errors), uptime: {}s",
        uptime.as_secs()
    );
    info!(
        "Final upload stats: {uploads_ok} stored, {uploads_failed} rejected, {:.2} MB received",
        stats.upload_bytes() as f64 / 1024.0 / 1024.0
    );
    info!("Server shut down gracefully.");
    Ok(())
}

/// Run one connection, recording the outcome and surviving handler panics
fn handle_client_with_stats(
    stream: TcpStream,
    peer_addr: SocketAddr,
    router: &Router,
    stats: &ServerStats,
    max_body_size: u64,
) {
    let start = Instant::now();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        handle_client(stream, router, max_body_size)
    }));

    match result {
        Ok(success) => stats.record_request(success),
        Err(_) => {
            error!("Client {peer_addr} handler panicked, recording failure");
            stats.record_request(false);
        }
    }

    let processing_time = start.elapsed();
    if processing_time > Duration::from_millis(1000) {
        warn!(
            "Slow request from {}: {}ms",
            peer_addr.ip(),
            processing_time.as_millis()
        );
    } else {
        trace!("Request from {peer_addr} took {processing_time:?}");
    }
}
