//! WebDriver process management - spawning and health checking the driver binary

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BrowserKind;
use crate::error::{E2eError, E2eResult};

/// Handle to a running chromedriver/geckodriver process
pub struct DriverHandle {
    child: Child,
    pub url: String,
    pub port: u16,
}

impl DriverHandle {
    /// Spawn the driver binary and wait until it accepts sessions
    pub async fn spawn(config: DriverConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let url = format!("http://127.0.0.1:{}", port);
        let binary = config.binary();

        info!("Spawning {} on port {}", binary.display(), port);

        let mut cmd = Command::new(&binary);
        match config.kind {
            BrowserKind::Chrome => cmd.arg(format!("--port={}", port)),
            BrowserKind::Firefox => cmd.arg("--port").arg(port.to_string()),
        };
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::DriverStartup(format!("Failed to spawn {}: {}", binary.display(), e))
        })?;
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, binary.display().to_string());
        }

        let handle = DriverHandle { child, url, port };
        handle.wait_for_ready(config.startup_timeout).await?;

        info!("Driver is ready at {}", handle.url);
        Ok(handle)
    }

    /// Poll `/status` until the driver reports `ready`
    async fn wait_for_ready(&self, timeout_duration: Duration) -> E2eResult<()> {
        let status_url = format!("{}/status", self.url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: serde_json::Value = resp.json().await?;
                    if body["value"]["ready"].as_bool().unwrap_or(true) {
                        return Ok(());
                    }
                    debug!("Driver not ready yet: {}", body["value"]["message"]);
                }
                Ok(resp) => {
                    warn!("Driver status returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for driver to start...");
                    }
                    if !e.is_connect() {
                        warn!("Driver status error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::DriverHealthCheck(attempts))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the driver, SIGTERM first
    pub fn stop(&mut self) -> E2eResult<()> {
        info!("Stopping driver (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(300));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub kind: BrowserKind,

    /// Driver binary (None = `chromedriver` or `geckodriver` from PATH)
    pub binary_path: Option<PathBuf>,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    pub startup_timeout: Duration,
}

impl DriverConfig {
    pub fn new(kind: BrowserKind) -> Self {
        Self {
            kind,
            binary_path: None,
            port: None,
            startup_timeout: Duration::from_secs(30),
        }
    }

    pub fn binary(&self) -> PathBuf {
        match (&self.binary_path, self.kind) {
            (Some(path), _) => path.clone(),
            (None, BrowserKind::Chrome) => PathBuf::from("chromedriver"),
            (None, BrowserKind::Firefox) => PathBuf::from("geckodriver"),
        }
    }
}

/// Drain the driver's output into the log so a chatty driver never blocks on
/// a full pipe. Returns the number of lines forwarded once the stream closes.
fn forward_output<R: Read + Send + 'static>(output: R, source: String) -> std::thread::JoinHandle<usize> {
    std::thread::spawn(move || {
        let mut lines = 0;
        for line in BufReader::new(output).lines() {
            match line {
                Ok(line) => {
                    debug!(target: "osd_e2e::driver::output", "[{}] {}", source, line);
                    lines += 1;
                }
                Err(_) => break,
            }
        }
        lines
    })
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
