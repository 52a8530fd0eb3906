//! `opendsscmd` child process as a [`CommandChannel`].
//!
//! The console prints a prompt, reads one command line from stdin, writes
//! the command's result to stdout, and prints the prompt again. Everything
//! between two prompts is the reply to the command sent in between.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, info, trace};

use crate::{CommandChannel, EngineError, EngineResult, DEFAULT_BINARY};

/// A running simulator console.
pub struct DssProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    prompt: Vec<u8>,
    binary_path: PathBuf,
}

impl DssProcess {
    /// Find the simulator executable.
    ///
    /// Search order:
    /// 1. `configured`, when set
    /// 2. ~/.vds/bin/opendsscmd
    /// 3. System PATH
    pub fn find_binary(configured: Option<&Path>) -> EngineResult<PathBuf> {
        if let Some(path) = configured {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            // A bare name is looked up on PATH
            return which::which(path).map_err(|_| EngineError::NotInstalled {
                binary: path.display().to_string(),
            });
        }

        if let Some(home) = dirs::home_dir() {
            let local = home.join(".vds").join("bin").join(DEFAULT_BINARY);
            if local.exists() {
                return Ok(local);
            }
        }

        if let Ok(path) = which::which(DEFAULT_BINARY) {
            return Ok(path);
        }

        Err(EngineError::NotInstalled {
            binary: DEFAULT_BINARY.to_string(),
        })
    }

    /// Start the console at `binary_path` and wait for its first prompt.
    pub fn spawn(binary_path: &Path, prompt: &str) -> EngineResult<Self> {
        Self::from_command(Command::new(binary_path), prompt)
    }

    /// Start a prepared command as the console.
    pub fn from_command(mut command: Command, prompt: &str) -> EngineResult<Self> {
        if prompt.is_empty() {
            return Err(EngineError::Protocol("empty prompt marker".to_string()));
        }
        let binary_path = PathBuf::from(command.get_program());
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EngineError::ProcessStart {
                path: binary_path.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Protocol(
                "simulator pipes were not captured".to_string(),
            ));
        };

        let mut process = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            prompt: prompt.as_bytes().to_vec(),
            binary_path,
        };
        let banner = process.read_reply("<startup>")?;
        debug!(
            "Started simulator {} (pid {}){}",
            process.binary_path.display(),
            process.child.id(),
            if banner.is_empty() {
                String::new()
            } else {
                format!(": {banner}")
            }
        );
        Ok(process)
    }

    /// Read stdout up to and including the next prompt, returning what came before it.
    fn read_reply(&mut self, command: &str) -> EngineResult<String> {
        let last = self.prompt[self.prompt.len() - 1];
        let mut buf = Vec::new();
        loop {
            let read = self.stdout.read_until(last, &mut buf)?;
            if read == 0 {
                return Err(EngineError::ProcessExited {
                    command: command.to_string(),
                });
            }
            if buf.ends_with(&self.prompt) {
                buf.truncate(buf.len() - self.prompt.len());
                return Ok(String::from_utf8_lossy(&buf).trim().to_string());
            }
        }
    }
}

impl CommandChannel for DssProcess {
    fn run(&mut self, command: &str) -> EngineResult<String> {
        if command.contains('\n') {
            return Err(EngineError::Protocol(format!(
                "command spans multiple lines: {command:?}"
            )));
        }
        trace!("dss> {command}");
        self.stdin
            .write_all(command.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush())
            .map_err(|_| EngineError::ProcessExited {
                command: command.to_string(),
            })?;
        let reply = self.read_reply(command)?;
        trace!("dss< {reply}");
        Ok(reply)
    }
}

impl Drop for DssProcess {
    fn drop(&mut self) {
        let _ = self.stdin.write_all(b"quit\n");
        let _ = self.stdin.flush();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Console that is located and started on its first command.
///
/// Lets callers build an engine up front and still fail on bad inputs
/// before any simulator is required.
pub struct LazyProcess {
    binary: Option<PathBuf>,
    prompt: String,
    process: Option<DssProcess>,
}

impl LazyProcess {
    pub fn new(binary: Option<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            binary,
            prompt: prompt.into(),
            process: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.process.is_some()
    }

    fn start(&self) -> EngineResult<DssProcess> {
        let path = DssProcess::find_binary(self.binary.as_deref())?;
        info!("Starting OpenDSS console {}", path.display());
        DssProcess::spawn(&path, &self.prompt)
    }
}

impl CommandChannel for LazyProcess {
    fn run(&mut self, command: &str) -> EngineResult<String> {
        if self.process.is_none() {
            self.process = Some(self.start()?);
        }
        match self.process.as_mut() {
            Some(process) => process.run(command),
            None => Err(EngineError::Protocol("simulator is not running".to_string())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::DEFAULT_PROMPT;
    use tempfile::tempdir;

    /// Shell stand-in for the console: echoes each command as its reply.
    const FAKE_CONSOLE: &str = r#"printf 'OpenDSS console\n>>'
while read -r line; do
  case "$line" in
    quit) exit 0 ;;
    solve) printf '\n>>' ;;
    crash) exit 3 ;;
    *) printf 'got %s\n>>' "$line" ;;
  esac
done
"#;

    fn fake_console(dir: &Path) -> Command {
        let script = dir.join("console.sh");
        std::fs::write(&script, FAKE_CONSOLE).unwrap();
        let mut command = Command::new("sh");
        command.arg(script);
        command
    }

    #[test]
    fn test_round_trip_commands() {
        let dir = tempdir().unwrap();
        let mut process = DssProcess::from_command(fake_console(dir.path()), ">>").unwrap();
        assert_eq!(process.run("? load.l1.kw").unwrap(), "got ? load.l1.kw");
        assert_eq!(process.run("solve").unwrap(), "");
        assert_eq!(process.run("voltages").unwrap(), "got voltages");
    }

    #[test]
    fn test_exit_is_reported() {
        let dir = tempdir().unwrap();
        let mut process = DssProcess::from_command(fake_console(dir.path()), ">>").unwrap();
        let err = process.run("crash").unwrap_err();
        assert!(matches!(err, EngineError::ProcessExited { ref command } if command == "crash"));
    }

    #[test]
    fn test_multiline_command_rejected() {
        let dir = tempdir().unwrap();
        let mut process = DssProcess::from_command(fake_console(dir.path()), ">>").unwrap();
        assert!(matches!(
            process.run("solve\nsolve"),
            Err(EngineError::Protocol(_))
        ));
    }

    #[test]
    fn test_missing_binary() {
        let err = DssProcess::spawn(Path::new("/nonexistent/opendsscmd"), DEFAULT_PROMPT)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::ProcessStart { .. }));

        let err = DssProcess::find_binary(Some(Path::new("vds-no-such-console-binary")))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotInstalled { .. }));
    }

    #[test]
    fn test_lazy_process_starts_on_first_command() {
        let mut lazy = LazyProcess::new(Some(PathBuf::from("vds-no-such-console-binary")), ">>");
        assert!(!lazy.is_started());
        let err = lazy.run("solve").unwrap_err();
        assert!(matches!(err, EngineError::NotInstalled { .. }));
        assert!(!lazy.is_started());
    }
}
