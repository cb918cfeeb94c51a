//! Directory-backed durable job queue
//!
//! Layout of a spool directory:
//!
//! ```text
//! spool/
//!   1718000000000-run-42-9f2c1a0b.json              pending
//!   1718000000123-run-43-77d0e5aa.json.processing   claimed by a consumer
//!   dead-letter/
//!     1717999999000-run-41-0c4d1e22.json            rejected
//! ```
//!
//! A consumer claims a message by renaming it; the rename is atomic, so two
//! consumers never get the same file. Claimed files left behind by a crash
//! are put back on [`SpoolQueue::open`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{Acknowledgement, Delivery, IntakeError, JobSource};
use crate::models::Job;

const MESSAGE_EXT: &str = ".json";
const CLAIMED_EXT: &str = ".processing";
const DEAD_LETTER_DIR: &str = "dead-letter";

/// Spool directory queue
#[derive(Clone, Debug)]
pub struct SpoolQueue {
    dir: PathBuf,
}

impl SpoolQueue {
    /// Open (creating if needed) a spool and requeue abandoned claims.
    ///
    /// Every `*.processing` file counts as abandoned, including claims a
    /// still-running process is working on. Only one worker process may
    /// consume a spool at a time; a second one started on the same
    /// directory re-runs those jobs.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(dir.join(DEAD_LETTER_DIR))
            .await
            .with_context(|| format!("Failed to create spool directory {}", dir.display()))?;

        let queue = Self { dir };
        let recovered = queue.recover().await?;
        if recovered > 0 {
            info!(
                "Requeued {} unfinished message(s) in {}",
                recovered,
                queue.dir.display()
            );
        }
        Ok(queue)
    }

    pub fn dead_letter_dir(&self) -> PathBuf {
        self.dir.join(DEAD_LETTER_DIR)
    }

    /// Write a job as a new pending message
    pub async fn enqueue(&self, job: &Job) -> Result<PathBuf> {
        let payload = job.to_payload().context("Failed to encode job")?;
        let stem = format!(
            "{:013}-{}-{:08x}",
            Utc::now().timestamp_millis(),
            sanitize(&job.run_id),
            rand::random::<u32>()
        );

        // Written under a name consumers ignore, then renamed into place.
        let staging = self.dir.join(format!(".{stem}.tmp"));
        let target = self.dir.join(format!("{stem}{MESSAGE_EXT}"));
        fs::write(&staging, &payload)
            .await
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &target)
            .await
            .with_context(|| format!("Failed to publish {}", target.display()))?;

        debug!("Enqueued {} as {}", job, target.display());
        Ok(target)
    }

    /// Number of pending (unclaimed) messages
    pub async fn pending(&self) -> Result<usize> {
        Ok(self.list_with_suffix(MESSAGE_EXT).await?.len())
    }

    async fn recover(&self) -> Result<usize> {
        let claimed = self.list_with_suffix(CLAIMED_EXT).await?;
        for path in &claimed {
            let name = file_name(path);
            let original = self.dir.join(name.trim_end_matches(CLAIMED_EXT));
            fs::rename(path, &original)
                .await
                .with_context(|| format!("Failed to requeue {}", path.display()))?;
        }
        Ok(claimed.len())
    }

    async fn list_with_suffix(&self, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(suffix)
                && !name.starts_with('.')
                && entry.file_type().await?.is_file()
            {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn claimed_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{CLAIMED_EXT}"))
    }
}

#[async_trait]
impl JobSource for SpoolQueue {
    async fn next(&self) -> Result<Option<Delivery>, IntakeError> {
        for path in self.list_with_suffix(MESSAGE_EXT).await? {
            let id = file_name(&path);
            let claimed = self.claimed_path(&id);

            match fs::rename(&path, &claimed).await {
                Ok(()) => {}
                // Another consumer got there first.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            let payload = fs::read(&claimed).await?;
            debug!("Claimed {}", id);
            return Ok(Some(Delivery::new(id, payload)));
        }
        Ok(None)
    }

    async fn settle(&self, delivery: &Delivery, ack: Acknowledgement) -> Result<(), IntakeError> {
        let claimed = self.claimed_path(&delivery.id);
        let result = match ack {
            Acknowledgement::Ack => fs::remove_file(&claimed).await,
            Acknowledgement::Reject => {
                let target = self.dead_letter_dir().join(&delivery.id);
                warn!("Dead-lettering {} to {}", delivery.id, target.display());
                fs::rename(&claimed, &target).await
            }
        };

        result.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                IntakeError::UnknownDelivery(delivery.id.clone())
            } else {
                IntakeError::Io(e)
            }
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
