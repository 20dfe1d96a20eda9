//! External tool invocation
//!
//! Every call to the tunnel daemon's tooling or the firewall goes through
//! one runner. The runner optionally wraps the command in `docker exec`
//! (for deployments where the daemon lives in a container) and bounds each
//! call with a timeout. A timed-out call fails closed: the caller sees an
//! error and commits nothing.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandRunner {
    container: Option<String>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(container: Option<String>, timeout_secs: u64) -> Self {
        Self {
            container,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run a program with arguments; returns its stdout.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let desc = format!("{} {}", program, args.join(" "));
        self.exec(self.argv(program, args), &desc).await
    }

    /// Run a shell script line through bash (needed for pipes and process
    /// substitution). The description logged and reported on failure is the
    /// first word only, since scripts may carry key material.
    pub async fn shell(&self, script: &str) -> Result<String> {
        let desc = script.split_whitespace().next().unwrap_or("bash").to_string();
        self.exec(self.argv("bash", &["-c", script]), &desc).await
    }

    fn argv(&self, program: &str, args: &[&str]) -> Vec<String> {
        let mut argv = match &self.container {
            Some(name) => vec![
                "docker".to_string(),
                "exec".to_string(),
                name.clone(),
                program.to_string(),
            ],
            None => vec![program.to_string()],
        };
        argv.extend(args.iter().map(|s| s.to_string()));
        argv
    }

    async fn exec(&self, argv: Vec<String>, desc: &str) -> Result<String> {
        debug!("Running {}", desc);
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        cmd.kill_on_drop(true);

        let seconds = self.timeout.as_secs();
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout { seconds })?
            .map_err(|e| Error::Sync(format!("{}: {}", desc, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Sync(format!("{} failed: {}", desc, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_local() {
        let runner = CommandRunner::new(None, 5);
        assert_eq!(
            runner.argv("wg", &["genkey"]),
            vec!["wg".to_string(), "genkey".to_string()]
        );
    }

    #[test]
    fn test_argv_docker_wrapped() {
        let runner = CommandRunner::new(Some("wireguard".to_string()), 5);
        assert_eq!(
            runner.argv("iptables", &["-L"]),
            vec![
                "docker".to_string(),
                "exec".to_string(),
                "wireguard".to_string(),
                "iptables".to_string(),
                "-L".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = CommandRunner::new(None, 5);
        let out = runner.run("printf", &["hello"]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_shell_pipes() {
        let runner = CommandRunner::new(None, 5);
        let out = runner.shell("printf 'a b' | tr ' ' '\\n'").await.unwrap();
        assert_eq!(out, "a\nb");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_sync_error() {
        let runner = CommandRunner::new(None, 5);
        let err = runner.run("false", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Sync(_)));
    }

    #[tokio::test]
    async fn test_timeout_fails_closed() {
        let runner = CommandRunner::new(None, 1);
        let err = runner.run("sleep", &["5"]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { seconds: 1 }));
    }
}
