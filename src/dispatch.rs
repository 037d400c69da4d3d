//! Local command post-processing
//!
//! Hands a finalized command recording to an external script and captures
//! the recognized text from its standard output. The script sees four
//! positional arguments: recording path, encoded output path, locale, and
//! sample rate. Exit 0 plus nonempty output means a command was understood.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::DialogConfig;
use crate::{Error, Result};

/// Most output bytes read from the script before it is cut off
const OUTPUT_LIMIT: u64 = 4096;

/// Runs the configured command-processor script on a recording
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    script: PathBuf,
    encoded_path: PathBuf,
    lang: String,
    sample_rate: u32,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(config: &DialogConfig) -> Self {
        Self {
            script: config.command_processor.clone(),
            encoded_path: config.encoded_path.clone(),
            lang: config.lang.clone(),
            sample_rate: config.sample_rate,
        }
    }

    /// Run the script on `recording` and return the recognized text
    ///
    /// Blocks until the script exits. Output is trimmed and capped at 4 KiB.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dispatch`] when the script cannot be spawned or its
    /// output cannot be read, and [`Error::NoCommand`] when it exits nonzero
    /// or prints nothing.
    pub fn run(&self, recording: &Path) -> Result<String> {
        tracing::debug!(
            script = %self.script.display(),
            recording = %recording.display(),
            "running command processor"
        );

        let mut child = Command::new(&self.script)
            .arg(recording)
            .arg(&self.encoded_path)
            .arg(&self.lang)
            .arg(self.sample_rate.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Dispatch(format!("cannot run {}: {e}", self.script.display())))?;

        let mut output = String::new();
        if let Some(stdout) = child.stdout.take() {
            stdout
                .take(OUTPUT_LIMIT)
                .read_to_string(&mut output)
                .map_err(|e| Error::Dispatch(format!("cannot read script output: {e}")))?;
        }

        let status = child
            .wait()
            .map_err(|e| Error::Dispatch(format!("cannot wait for script: {e}")))?;

        let text = output.trim();
        if status.success() && !text.is_empty() {
            Ok(text.to_string())
        } else {
            tracing::debug!(status = %status, bytes = output.len(), "script produced no command");
            Err(Error::NoCommand)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[cfg(unix)]
    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("processcmd.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    fn dispatcher_for(script: PathBuf) -> CommandDispatcher {
        let config = DialogConfig {
            command_processor: script,
            ..DialogConfig::default()
        };
        CommandDispatcher::new(&config)
    }

    #[cfg(unix)]
    #[test]
    fn successful_script_output_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_for(script(dir.path(), "echo '  turn on light  '"));

        let text = dispatcher.run(Path::new("/tmp/input.wav")).unwrap();
        assert_eq!(text, "turn on light");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_means_no_command() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_for(script(dir.path(), "echo noise\nexit 1"));

        let err = dispatcher.run(Path::new("/tmp/input.wav")).unwrap_err();
        assert!(matches!(err, Error::NoCommand));
    }

    #[cfg(unix)]
    #[test]
    fn empty_output_means_no_command() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_for(script(dir.path(), "exit 0"));

        let err = dispatcher.run(Path::new("/tmp/input.wav")).unwrap_err();
        assert!(matches!(err, Error::NoCommand));
    }

    #[test]
    fn missing_script_is_a_dispatch_error() {
        let config = DialogConfig {
            command_processor: PathBuf::from("/nonexistent/processcmd.sh"),
            ..DialogConfig::default()
        };
        let dispatcher = CommandDispatcher::new(&config);

        let err = dispatcher.run(Path::new("/tmp/input.wav")).unwrap_err();
        assert!(matches!(err, Error::Dispatch(_)));
    }
}
