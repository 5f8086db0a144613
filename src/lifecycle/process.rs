//! Service supervising one external command.

use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::lifecycle::runner::{Service, ServiceError};

/// Runs a configured command as the subsystem; stopping kills it.
#[derive(Debug)]
pub struct ProcessService {
    name: String,
    command: Vec<String>,
    child: Option<Child>,
}

impl ProcessService {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            child: None,
        }
    }
}

impl Service for ProcessService {
    async fn start(&mut self) -> Result<(), ServiceError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(ServiceError::NotConfigured)?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ServiceError::Spawn {
                program: program.clone(),
                source,
            })?;

        tracing::info!(service = %self.name, program = %program, pid = ?child.id(), "Process started");
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServiceError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        child.kill().await.map_err(ServiceError::Stop)?;
        tracing::info!(service = %self.name, "Process stopped");
        Ok(())
    }

    async fn exited(&mut self) -> String {
        let Some(child) = self.child.as_mut() else {
            return std::future::pending().await;
        };

        let exit = match child.wait().await {
            Ok(status) => status.to_string(),
            Err(e) => format!("wait failed: {}", e),
        };
        self.child = None;
        exit
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_command_is_not_configured() {
        let mut service = ProcessService::new("dns", vec![]);
        assert!(matches!(
            service.start().await,
            Err(ServiceError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let mut service = ProcessService::new("dns", vec!["/nonexistent/program".to_string()]);
        assert!(matches!(
            service.start().await,
            Err(ServiceError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn observes_exit() {
        let mut service = ProcessService::new("updater", vec!["true".to_string()]);
        service.start().await.unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), service.exited())
            .await
            .unwrap();
        assert!(exit.contains('0'), "unexpected exit description {}", exit);
        assert!(service.child.is_none());
    }

    #[tokio::test]
    async fn stop_kills_process() {
        let mut service = ProcessService::new(
            "vpn",
            vec!["sleep".to_string(), "30".to_string()],
        );
        service.start().await.unwrap();
        service.stop().await.unwrap();
        assert!(service.child.is_none());
        // Stopping twice is harmless.
        service.stop().await.unwrap();
    }
}
