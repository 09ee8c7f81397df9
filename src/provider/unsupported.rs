// ABOUTME: Placeholder backend for targets keel can detect but not yet drive.
// ABOUTME: Reports its CLI as a prerequisite and refuses every operation with Unsupported.

use async_trait::async_trait;

use super::{
    BackupArtifact, DeploymentStatus, DeploymentTarget, InstallSpec, Prerequisite, ProviderKind,
};
use crate::config::DeploymentRecord;
use crate::deploy::DeployError;
use crate::diagnostics::Warning;
use crate::runner::{LineStream, find_on_path};

#[derive(Debug, Clone)]
pub struct UnsupportedTarget {
    kind: ProviderKind,
}

impl UnsupportedTarget {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    /// Client tool each platform is driven through, with where to get it.
    fn tool(&self) -> (&'static str, &'static str) {
        match self.kind {
            ProviderKind::Vps => ("ssh", "Install an OpenSSH client"),
            ProviderKind::Azure => (
                "az",
                "Install the Azure CLI: https://learn.microsoft.com/cli/azure/install-azure-cli",
            ),
            ProviderKind::Aws => (
                "aws",
                "Install the AWS CLI: https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
            ),
            ProviderKind::Fly => ("fly", "Install flyctl: https://fly.io/docs/flyctl/install/"),
            ProviderKind::Railway => (
                "railway",
                "Install the Railway CLI: https://docs.railway.com/guides/cli",
            ),
            ProviderKind::Docker => ("docker", "Install Docker"),
        }
    }

    fn unsupported<T>(&self, operation: &'static str) -> Result<T, DeployError> {
        Err(DeployError::Unsupported {
            provider: self.kind.id().to_string(),
            operation,
        })
    }
}

#[async_trait]
impl DeploymentTarget for UnsupportedTarget {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn detect(&self) -> bool {
        find_on_path(self.tool().0).is_some()
    }

    async fn prerequisites(&self) -> Vec<Prerequisite> {
        let (tool, hint) = self.tool();
        vec![Prerequisite {
            name: format!("{} CLI", tool),
            description: format!("{} is driven through the {} command", self.name(), tool),
            met: self.detect(),
            hint: hint.to_string(),
        }]
    }

    async fn install(&mut self, _spec: &InstallSpec) -> Result<DeploymentRecord, DeployError> {
        self.unsupported("install")
    }

    async fn update(&mut self, _version: &str) -> Result<DeploymentRecord, DeployError> {
        self.unsupported("update")
    }

    async fn status(&self) -> Result<DeploymentStatus, DeployError> {
        self.unsupported("status")
    }

    async fn logs(&self, _follow: bool) -> Result<LineStream, DeployError> {
        self.unsupported("logs")
    }

    async fn backup(&mut self) -> Result<BackupArtifact, DeployError> {
        self.unsupported("backup")
    }

    async fn list_backups(&self) -> Result<Vec<BackupArtifact>, DeployError> {
        self.unsupported("listing backups")
    }

    async fn restore(&mut self, _backup_id: &str) -> Result<(), DeployError> {
        self.unsupported("restore")
    }

    async fn rollback(&mut self) -> Result<DeploymentRecord, DeployError> {
        self.unsupported("rollback")
    }

    async fn destroy(&mut self) -> Result<(), DeployError> {
        self.unsupported("destroy")
    }

    fn take_warnings(&mut self) -> Vec<Warning> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeployErrorKind;

    #[tokio::test]
    async fn mutating_operations_are_unsupported() {
        let mut target = UnsupportedTarget::new(ProviderKind::Azure);

        let err = target.update("1.1.0").await.unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::Precondition);
        assert_eq!(
            err.to_string(),
            "update is not supported by the azure provider yet"
        );
        assert!(target.rollback().await.is_err());
        assert!(target.destroy().await.is_err());
    }

    #[tokio::test]
    async fn vps_prerequisite_names_ssh() {
        let target = UnsupportedTarget::new(ProviderKind::Vps);
        let prereqs = target.prerequisites().await;
        assert_eq!(prereqs.len(), 1);
        assert_eq!(prereqs[0].name, "ssh CLI");
        assert_eq!(prereqs[0].met, target.detect());
    }
}
