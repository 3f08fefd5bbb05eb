//! One-shot `kubectl` reads used by status synchronization.

use std::{future::Future, time::Duration};

use tokio::process::Command;

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl Output {
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

/// Runs a kubectl subcommand against a namespace in a context.
pub trait Runner: Send + Sync + 'static {
    fn run(
        &self,
        namespace: &str,
        context: &str,
        args: &[&str],
    ) -> impl Future<Output = Output> + Send;
}

/// [`Runner`] spawning the `kubectl` binary.
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
    request_timeout: Duration,
}

impl Kubectl {
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the timeout passed to kubectl for each API request.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn request_timeout_arg(&self) -> String {
        format!("--request-timeout={}ms", self.request_timeout.as_millis())
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl Runner for Kubectl {
    async fn run(&self, namespace: &str, context: &str, args: &[&str]) -> Output {
        let result = Command::new(&self.binary)
            .args(args)
            .arg("--namespace")
            .arg(namespace)
            .arg("--context")
            .arg(context)
            .arg(self.request_timeout_arg())
            .kill_on_drop(true)
            .output()
            .await;

        match result {
            Ok(output) => Output {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                success: output.status.success(),
            },
            Err(err) => {
                log::debug!("Failed to run {} {}: {err}", self.binary, args.join(" "));
                Output::failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Kubectl;

    #[test]
    fn request_timeout_keeps_subsecond_precision() {
        let kubectl = Kubectl::default();
        assert_eq!(kubectl.request_timeout_arg(), "--request-timeout=30000ms");

        let kubectl = kubectl.request_timeout(Duration::from_millis(500));
        assert_eq!(kubectl.request_timeout_arg(), "--request-timeout=500ms");
    }
}
