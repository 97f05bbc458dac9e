use chrono::{Local, Utc};
use tokio::signal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{MaterialRecord, TimeRange};
use crate::source::{FetchError, RecordSource, Subscription};
use crate::stats;
use crate::store::MaterialStore;

/// Opens the delta stream before fetching the snapshot, so nothing pushed
/// while the fetch is in flight can be missed; deltas queue in the channel
/// and the store's idempotent apply absorbs any overlap with the snapshot.
pub async fn load_with_live_updates<S: RecordSource>(
    source: &S,
    owner: Uuid,
) -> Result<(MaterialStore, Subscription), FetchError> {
    let subscription = source.subscribe(owner).await?;
    let mut store = MaterialStore::new();
    store.finish_load(source.fetch_all(owner).await?);
    Ok((store, subscription))
}

/// Renders the dashboard once, then re-renders on every applied delta
/// until the stream ends or the user interrupts. Dropping the
/// subscription on the way out releases the listener.
pub async fn run_watch<S: RecordSource>(
    source: &S,
    owner: Uuid,
    range: TimeRange,
) -> anyhow::Result<()> {
    let (mut store, mut subscription) = match load_with_live_updates(source, owner).await {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!(error = %err, "initial load failed");
            render(&[], range);
            println!("Could not load your materials right now. Try again later.");
            return Ok(());
        }
    };

    render(store.records(), range);

    loop {
        tokio::select! {
            delta = subscription.next_delta() => {
                match delta {
                    Some(delta) => {
                        info!(id = delta.record_id(), "live update");
                        if store.apply(delta) {
                            render(store.records(), range);
                        }
                    }
                    None => {
                        warn!("live update stream ended");
                        break;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("stopping watch");
                break;
            }
        }
    }

    Ok(())
}

pub fn render(records: &[MaterialRecord], range: TimeRange) {
    let filtered = stats::filter_by_range(records, range, Utc::now());
    let summary = stats::summarize(&filtered);
    let series = stats::daily_series(&filtered, range, Local::now().date_naive());

    println!();
    println!("My Materials ({})", range.slug());
    println!(
        "{} materials, {} diamonds, ${:.2} earned, {} views, {} downloads",
        summary.materials, summary.diamonds, summary.earnings, summary.views, summary.downloads
    );

    let active: Vec<_> = series
        .iter()
        .filter(|bucket| bucket.diamonds > 0 || bucket.earnings > 0.0)
        .collect();
    if active.is_empty() {
        println!("No activity in this window.");
    } else {
        for bucket in active {
            println!(
                "  {:>6}: {} diamonds, ${:.2}",
                bucket.label, bucket.diamonds, bucket.earnings
            );
        }
    }

    for record in filtered.iter().take(10) {
        println!(
            "- {} ({}, {}) {} views / {} downloads",
            record.title, record.category, record.course, record.views, record.downloads
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaterialDelta;
    use crate::source::DeleteError;
    use tokio::sync::mpsc;

    struct StaticSource {
        records: Vec<MaterialRecord>,
        early_deltas: Vec<MaterialDelta>,
        fail_fetch: bool,
    }

    impl RecordSource for StaticSource {
        async fn fetch_all(&self, _owner: Uuid) -> Result<Vec<MaterialRecord>, FetchError> {
            if self.fail_fetch {
                return Err(FetchError::Backend(sqlx::Error::PoolClosed));
            }
            Ok(self.records.clone())
        }

        async fn subscribe(&self, _owner: Uuid) -> Result<Subscription, FetchError> {
            let (sender, receiver) = mpsc::channel(16);
            for delta in self.early_deltas.clone() {
                sender.send(delta).await.unwrap();
            }
            // sender drops with the task, ending the stream after the
            // queued deltas are drained
            let task = tokio::spawn(async move { drop(sender) });
            Ok(Subscription::new(receiver, task))
        }

        async fn delete_record(&self, _id: &str) -> Result<(), DeleteError> {
            Ok(())
        }
    }

    fn material(id: &str) -> MaterialRecord {
        MaterialRecord {
            id: id.to_string(),
            owner_id: Uuid::nil(),
            title: format!("Material {id}"),
            category: "Notes".to_string(),
            school: "UNILAG".to_string(),
            course: "MTH 202".to_string(),
            views: 0,
            downloads: 0,
            diamonds: 1,
            earnings: 0.0,
            created_at: Utc::now(),
        }
    }

    // A delta racing the initial fetch is neither dropped nor applied
    // twice: the queued insert for a record already in the snapshot is a
    // no-op, the genuinely new one lands once.
    #[tokio::test]
    async fn deltas_racing_the_fetch_apply_exactly_once() {
        let source = StaticSource {
            records: vec![material("overlap")],
            early_deltas: vec![
                MaterialDelta::Inserted(material("overlap")),
                MaterialDelta::Inserted(material("fresh")),
            ],
            fail_fetch: false,
        };

        let (mut store, mut subscription) =
            load_with_live_updates(&source, Uuid::nil()).await.unwrap();
        assert_eq!(store.len(), 1);

        while let Some(delta) = subscription.next_delta().await {
            store.apply(delta);
        }

        let ids: Vec<&str> = store.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["fresh", "overlap"]);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_no_store_behind() {
        let source = StaticSource {
            records: vec![],
            early_deltas: vec![],
            fail_fetch: true,
        };
        assert!(load_with_live_updates(&source, Uuid::nil()).await.is_err());
    }
}
