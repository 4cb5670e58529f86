use crate::database::Database;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::storage::{ObjectStorage, StoredObject};
use std::collections::HashSet;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Key prefixes of cover images
const COVER_AREAS: [&str; 2] = ["recipes/", "collections/"];

/// Keys of cover objects that nothing references and that are older than
/// the grace period
///
/// The grace period protects uploads whose entity row has not been patched
/// with the new path yet.
pub fn plan_sweep(
    objects: &[StoredObject],
    referenced: &HashSet<String>,
    now: DateTime<Utc>,
    grace: Duration,
) -> Vec<String> {
    let cutoff = now - grace;

    objects
        .iter()
        .filter(|obj| COVER_AREAS.iter().any(|area| obj.key.starts_with(area)))
        .filter(|obj| !referenced.contains(&obj.key))
        .filter(|obj| obj.last_modified < cutoff)
        .map(|obj| obj.key.clone())
        .collect()
}

/// Outcome of one sweep
#[derive(Debug, Default, PartialEq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Sweeper {
    storage: ObjectStorage,
    database: Database,
    grace: Duration,
}

impl Sweeper {
    pub fn new(storage: ObjectStorage, database: Database, grace_seconds: i64) -> Self {
        Self {
            storage,
            database,
            grace: Duration::seconds(grace_seconds),
        }
    }

    /// Remove orphaned covers; a failed removal is logged and retried on the
    /// next run
    pub async fn sweep(&self) -> Result<SweepReport> {
        info!("Sweeping bucket: {}", self.storage.bucket());

        // Objects are listed before references are read, so a cover saved in
        // between is seen as referenced.
        let objects = self.storage.list_objects(None).await?;
        let referenced = self.database.referenced_image_paths().await?;

        let orphans = plan_sweep(&objects, &referenced, Utc::now(), self.grace);
        let mut report = SweepReport {
            scanned: objects.len(),
            ..Default::default()
        };

        for key in orphans {
            match self.storage.remove(std::slice::from_ref(&key)).await {
                Ok(()) => {
                    info!("Removed orphaned cover {}", key);
                    report.removed += 1;
                }
                Err(e) => {
                    warn!("Failed to remove orphaned cover {}: {}", key, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    pub async fn start(&self, schedule: &str) -> Result<JobScheduler> {
        let sweeper = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                match sweeper.sweep().await {
                    Ok(report) => info!(
                        "Sweep finished: scanned {}, removed {}, failed {}",
                        report.scanned, report.removed, report.failed
                    ),
                    Err(e) => error!("Sweep failed: {}", e),
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started orphan sweeper with schedule: {}", schedule);
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(key: &str, age_hours: i64, now: DateTime<Utc>) -> StoredObject {
        StoredObject {
            key: key.to_string(),
            size: 1024,
            last_modified: now - Duration::hours(age_hours),
        }
    }

    #[test]
    fn test_plan_sweep_keeps_referenced_and_recent_objects() {
        let now = Utc::now();
        let objects = vec![
            object("recipes/u/r1/cover.jpg", 48, now),
            object("recipes/u/r2/cover.png", 48, now),
            object("collections/u/c1/cover.webp", 1, now),
            object("collections/u/c2/cover.jpg", 72, now),
        ];
        let referenced: HashSet<String> = ["recipes/u/r1/cover.jpg".to_string()].into();

        let orphans = plan_sweep(&objects, &referenced, now, Duration::hours(24));
        assert_eq!(
            orphans,
            vec![
                "recipes/u/r2/cover.png".to_string(),
                "collections/u/c2/cover.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_plan_sweep_ignores_foreign_keys() {
        let now = Utc::now();
        let objects = vec![object("backups/dump.sql", 1000, now)];

        assert!(plan_sweep(&objects, &HashSet::new(), now, Duration::zero()).is_empty());
    }
}
