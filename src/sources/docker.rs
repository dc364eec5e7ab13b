use log::{debug, trace};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::record::{ImageRecord, InspectedImage};

/// Image store backed by the local `docker` CLI
pub struct DockerStore {
    /// Daemon address handed to `docker --host`, `None` for the CLI default
    host: Option<String>,
    program: PathBuf,
}

impl DockerStore {
    /// Connects to the daemon at `host` and checks that it answers
    pub fn new(host: Option<String>) -> StoreResult<Self> {
        Self::unchecked(host).probe()
    }

    /// Builds a store without probing the daemon
    pub fn unchecked(host: Option<String>) -> Self {
        Self {
            host,
            program: PathBuf::from("docker"),
        }
    }

    /// Runs `program` instead of the `docker` found on `PATH`
    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    /// Asks the daemon for its version. Any failure means the daemon is unreachable.
    pub fn probe(self) -> StoreResult<Self> {
        let version = self
            .run_command(&["version", "--format", "{{.Server.Version}}"])
            .map_err(|err| match err {
                unreachable @ StoreError::Unreachable(_) => unreachable,
                other => StoreError::Unreachable(other.to_string()),
            })?;
        debug!("Docker daemon version: {}", version.trim());
        Ok(self)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    fn run_command(&self, args: &[&str]) -> StoreResult<String> {
        let mut command = Command::new(&self.program);
        if let Some(host) = &self.host {
            command.arg("--host").arg(host);
        }
        trace!("Running {} {:?}", self.program.display(), args);

        let output = command.args(args).output().map_err(|err| {
            StoreError::Unreachable(format!(
                "failed to execute docker command. Is Docker installed? ({})",
                err
            ))
        })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(error.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Maps docker CLI stderr onto a store error
fn classify_failure(stderr: &str) -> StoreError {
    if stderr.contains("No such image") || stderr.contains("No such object") {
        StoreError::NotFound(stderr.to_string())
    } else if stderr.contains("Cannot connect to the Docker daemon")
        || stderr.contains("error during connect")
    {
        StoreError::Unreachable(stderr.to_string())
    } else {
        StoreError::CommandFailed(stderr.to_string())
    }
}

/// Keeps the first occurrence of every id; docker lists an image once per tag
fn dedup_ids(listing: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    listing
        .lines()
        .map(str::trim)
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

impl Store for DockerStore {
    fn name(&self) -> &str {
        "docker"
    }

    fn list_ids(&self, include_intermediate: bool) -> StoreResult<Vec<String>> {
        let mut args = vec!["image", "ls", "--quiet", "--no-trunc"];
        if include_intermediate {
            args.push("--all");
        }
        let ids = dedup_ids(&self.run_command(&args)?);
        debug!("Docker listed {} image(s)", ids.len());
        Ok(ids)
    }

    fn inspect(&self, id: &str) -> StoreResult<ImageRecord> {
        let stdout = self
            .run_command(&["image", "inspect", id])
            .map_err(|err| match err {
                StoreError::NotFound(_) => StoreError::NotFound(id.to_string()),
                other => other,
            })?;
        let inspected: Vec<InspectedImage> = serde_json::from_str(&stdout)?;
        inspected
            .into_iter()
            .next()
            .map(ImageRecord::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// One `docker image inspect` for all ids
    fn inspect_many(&self, ids: &[String]) -> StoreResult<Vec<ImageRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["image", "inspect"];
        args.extend(ids.iter().map(String::as_str));
        let stdout = self.run_command(&args)?;
        let inspected: Vec<InspectedImage> = serde_json::from_str(&stdout)?;
        Ok(inspected.into_iter().map(ImageRecord::from).collect())
    }
}
