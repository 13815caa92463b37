//! Script sandboxes for `python_script` nodes.
//!
//! Every sandbox runs the same Python harness: it receives
//! `{"script", "context"}` as JSON, executes the script with `context`
//! and an empty `results` dict in scope, and prints
//! `{"context", "results", "error"}` back as JSON. The script's own
//! prints go to stderr so they cannot corrupt the reply.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use wozif_core::config::{SandboxConfig, SandboxMode};
use wozif_core::error::{Result, WozifError};
use wozif_core::traits::{ScriptOutcome, ScriptSandbox};

const HARNESS: &str = r#"
import json, sys
payload = json.loads(sys.argv[1] if len(sys.argv) > 1 else sys.stdin.buffer.read().decode("utf-8"))
reply_to = sys.stdout
sys.stdout = sys.stderr
context = payload["context"]
scope = {"__name__": "__main__", "context": context, "results": {}}
error = None
try:
    exec(payload["script"], scope)
except BaseException as e:
    error = str(e) or type(e).__name__
results = scope.get("results", {})
if not isinstance(results, dict):
    if error is None:
        error = "results must be a dict, got " + type(results).__name__
    results = {}
reply_to.write(json.dumps({"context": context, "results": results, "error": error}, default=str))
reply_to.flush()
"#;

#[derive(Deserialize)]
struct HarnessReply {
    #[serde(default)]
    context: Map<String, Value>,
    #[serde(default)]
    results: Map<String, Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Build the sandbox selected by `[sandbox] mode`.
pub fn create_sandbox(config: &SandboxConfig) -> Arc<dyn ScriptSandbox> {
    match config.mode {
        SandboxMode::Process => Arc::new(ProcessSandbox::new(config)),
        SandboxMode::Docker => Arc::new(DockerSandbox::new(config)),
        SandboxMode::Disabled => Arc::new(DisabledSandbox),
    }
}

fn payload(script: &str, context: &Map<String, Value>) -> Result<String> {
    Ok(serde_json::to_string(&json!({
        "script": script,
        "context": context,
    }))?)
}

/// Turn the harness output into an outcome. Output that is not a reply
/// means the interpreter itself failed.
fn decode_reply(stdout: &[u8], stderr: &str, exit_code: Option<i64>) -> Result<ScriptOutcome> {
    let text = String::from_utf8_lossy(stdout);
    match serde_json::from_str::<HarnessReply>(text.trim()) {
        Ok(reply) => Ok(ScriptOutcome {
            context: reply.context,
            results: reply.results,
            error: reply.error,
        }),
        Err(e) => {
            let detail = stderr.trim();
            let detail = detail
                .lines()
                .last()
                .filter(|l| !l.is_empty())
                .unwrap_or("no output");
            Err(WozifError::Sandbox(match exit_code {
                Some(code) if code != 0 => format!("interpreter exited with {}: {}", code, detail),
                _ => format!("unreadable script reply ({}): {}", e, detail),
            }))
        }
    }
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> std::io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    (&mut reader).take(limit as u64).read_to_end(&mut buf).await?;
    let overflow = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok((buf, overflow > 0))
}

/// Runs scripts in an isolated `python3 -I` child process with an empty
/// environment and a throwaway working directory.
pub struct ProcessSandbox {
    python: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessSandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            python: config.python.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
        }
    }

    async fn execute(&self, script: &str, context: &Map<String, Value>) -> Result<ScriptOutcome> {
        let payload = payload(script, context)?;
        let workdir = tempfile::tempdir()?;

        let mut child = tokio::process::Command::new(&self.python)
            .arg("-I")
            .arg("-c")
            .arg(HARNESS)
            .env_clear()
            .current_dir(workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WozifError::Sandbox(format!("failed to start {}: {}", self.python, e)))?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(WozifError::Sandbox("child process pipes unavailable".into()));
        };

        let limit = self.max_output_bytes;
        let run = async {
            let write = async move {
                stdin.write_all(payload.as_bytes()).await?;
                stdin.shutdown().await
            };
            let (written, out, err) =
                tokio::join!(write, read_capped(stdout, limit), read_capped(stderr, limit));
            // The interpreter may exit before reading stdin.
            if let Err(e) = written {
                debug!(error = %e, "Script stdin closed early");
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out?, err?))
        };

        let finished = tokio::time::timeout(self.timeout, run).await;
        let (status, (stdout, stdout_overflow), (stderr, _)) = match finished {
            Ok(result) => result?,
            Err(_) => {
                child.start_kill().ok();
                return Err(WozifError::SandboxTimeout(self.timeout.as_secs()));
            }
        };

        let stderr = String::from_utf8_lossy(&stderr);
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "Script stderr");
        }
        if stdout_overflow {
            return Err(WozifError::Sandbox(format!(
                "script output exceeded {} bytes",
                limit
            )));
        }
        decode_reply(&stdout, &stderr, status.code().map(i64::from))
    }
}

impl ScriptSandbox for ProcessSandbox {
    fn run<'a>(
        &'a self,
        script: &'a str,
        context: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<ScriptOutcome>> {
        Box::pin(self.execute(script, context))
    }
}

/// Runs scripts in a throwaway container: no network, memory-capped,
/// killed on timeout and always force-removed.
pub struct DockerSandbox {
    python: String,
    image: String,
    memory_mb: u64,
    timeout_secs: u64,
    max_output_bytes: usize,
}

impl DockerSandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            python: config.python.clone(),
            image: config.image.clone(),
            memory_mb: config.memory_mb,
            timeout_secs: config.timeout_secs,
            max_output_bytes: config.max_output_bytes,
        }
    }

    async fn execute(&self, script: &str, context: &Map<String, Value>) -> Result<ScriptOutcome> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| WozifError::Sandbox(format!("Docker connect failed: {}", e)))?;

        let container_config = bollard::container::Config {
            image: Some(self.image.clone()),
            cmd: Some(vec![
                self.python.clone(),
                "-I".to_string(),
                "-c".to_string(),
                HARNESS.to_string(),
                payload(script, context)?,
            ]),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                memory: Some((self.memory_mb as i64) * 1024 * 1024),
                network_mode: Some("none".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = docker
            .create_container::<&str, String>(None, container_config)
            .await
            .map_err(|e| WozifError::Sandbox(format!("Docker create failed: {}", e)))?;

        let result = self.run_container(&docker, &container.id).await;

        let remove_options = bollard::container::RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = docker
            .remove_container(&container.id, Some(remove_options))
            .await
        {
            warn!(container = %container.id, error = %e, "Failed to remove script container");
        }

        result
    }

    async fn run_container(&self, docker: &bollard::Docker, id: &str) -> Result<ScriptOutcome> {
        docker
            .start_container::<String>(id, None)
            .await
            .map_err(|e| WozifError::Sandbox(format!("Docker start failed: {}", e)))?;

        let timeout = Duration::from_secs(self.timeout_secs);
        let wait_result = tokio::time::timeout(timeout, async {
            let mut stream = docker.wait_container::<String>(
                id,
                None::<bollard::container::WaitContainerOptions<String>>,
            );
            stream.next().await
        })
        .await;

        let exit_code = match wait_result {
            Ok(Some(Ok(exit))) => Some(exit.status_code),
            // A non-zero exit is reported as an error by the wait stream.
            Ok(Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. }))) => Some(code),
            Ok(Some(Err(e))) => {
                return Err(WozifError::Sandbox(format!("Docker wait failed: {}", e)));
            }
            Ok(None) => None,
            Err(_) => {
                docker.kill_container::<String>(id, None).await.ok();
                return Err(WozifError::SandboxTimeout(self.timeout_secs));
            }
        };

        let log_options = bollard::container::LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut log_stream = docker.logs(id, Some(log_options));
        let mut stdout = Vec::new();
        let mut stderr = String::new();
        while let Some(Ok(log)) = log_stream.next().await {
            match log {
                bollard::container::LogOutput::StdOut { message } => {
                    stdout.extend_from_slice(&message);
                    if stdout.len() > self.max_output_bytes {
                        return Err(WozifError::Sandbox(format!(
                            "script output exceeded {} bytes",
                            self.max_output_bytes
                        )));
                    }
                }
                bollard::container::LogOutput::StdErr { message } => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                _ => {}
            }
        }

        if !stderr.is_empty() {
            debug!(stderr = %stderr, "Script stderr");
        }
        decode_reply(&stdout, &stderr, exit_code)
    }
}

impl ScriptSandbox for DockerSandbox {
    fn run<'a>(
        &'a self,
        script: &'a str,
        context: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<ScriptOutcome>> {
        Box::pin(self.execute(script, context))
    }
}

/// Refuses every script. The context is left untouched.
pub struct DisabledSandbox;

impl ScriptSandbox for DisabledSandbox {
    fn run<'a>(
        &'a self,
        _script: &'a str,
        context: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<ScriptOutcome>> {
        let outcome = ScriptOutcome {
            context: context.clone(),
            results: Map::new(),
            error: Some("l'exécution de scripts est désactivée".to_string()),
        };
        Box::pin(async move { Ok(outcome) })
    }
}
