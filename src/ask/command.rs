use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use super::{AskCapability, TokenObserver};
use crate::error::BoxError;
use crate::host::SystemHost;
use crate::types::ResourceTimingEntry;

const READ_CHUNK: usize = 4096;

/// How the prompt reaches the child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Appended as the final command-line argument
    Argument,
    /// Written to stdin, which is then closed
    Stdin,
}

/// Ask capability backed by an external command, e.g. a local model CLI.
///
/// Every stdout chunk the child emits is reported as one streamed token and
/// the whole stdout becomes the response. A nonzero exit status is an error.
pub struct CommandAsk {
    program: PathBuf,
    args: Vec<String>,
    prompt_mode: PromptMode,
    host: Option<SystemHost>,
    registered: AtomicBool,
}

impl CommandAsk {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            prompt_mode: PromptMode::Argument,
            host: None,
            registered: AtomicBool::new(false),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prompt_mode(mut self, mode: PromptMode) -> Self {
        self.prompt_mode = mode;
        self
    }

    /// Register the executable as a `"script"` resource on `host` after the first spawn
    pub fn with_host(mut self, host: SystemHost) -> Self {
        self.host = Some(host);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn register_executable(&self, spawn_ms: f64) {
        let Some(host) = &self.host else { return };
        if self.registered.swap(true, Ordering::SeqCst) {
            return;
        }

        let resolved = resolve_program(&self.program)
            .unwrap_or_else(|| self.program.clone());
        let transfer_size = std::fs::metadata(&resolved).map(|m| m.len()).unwrap_or(0);
        host.record_resource(ResourceTimingEntry::new(
            resolved.display().to_string(),
            "script",
            transfer_size,
            spawn_ms,
        ));
    }
}

#[async_trait::async_trait]
impl AskCapability for CommandAsk {
    async fn ask(&self, prompt: &str, tokens: &dyn TokenObserver) -> Result<String, BoxError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match self.prompt_mode {
            PromptMode::Argument => {
                command.arg(prompt).stdin(Stdio::null());
            }
            PromptMode::Stdin => {
                command.stdin(Stdio::piped());
            }
        }

        let spawn_start = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {}", self.program.display(), e))?;
        self.register_executable(spawn_start.elapsed().as_secs_f64() * 1000.0);
        debug!(program = %self.program.display(), "Spawned ask command");

        // Fed from its own task so a child that writes while reading cannot
        // stall on a full stdout pipe
        let stdin_task = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.as_bytes().to_vec();
            tokio::spawn(async move {
                let written = match stdin.write_all(&prompt).await {
                    Ok(()) => stdin.shutdown().await,
                    Err(e) => Err(e),
                };
                match written {
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!("Ask command closed stdin before reading the whole prompt");
                        Ok(())
                    }
                    other => other,
                }
            })
        });

        let mut stderr = child.stderr.take().ok_or("child stderr was not captured")?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.map(|_| buf)
        });

        let mut stdout = child.stdout.take().ok_or("child stdout was not captured")?;
        let mut output = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = stdout.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            output.extend_from_slice(&chunk[..n]);
            tokens.on_token(&String::from_utf8_lossy(&chunk[..n]));
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await??;
        if !status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                self.program.display(),
                status,
                stderr.trim()
            )
            .into());
        }
        if let Some(task) = stdin_task {
            task.await??;
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

/// Locate `program` the way the shell would: as-is when it has a path, else on `PATH`
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
