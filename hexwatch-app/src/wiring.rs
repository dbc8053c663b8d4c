use anyhow::{Context, Result};
use hexwatch_config::{HexwatchConfig, OverlapSetting};
use hexwatch_ingest::{CycleReport, OverlapPolicy, Pipeline, Scheduler, Store};
use hexwatch_social::twitter::TwitterScraper;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Hexwatch {
    pipeline: Pipeline,
    scheduler: Scheduler,
}

fn overlap_policy(setting: OverlapSetting) -> OverlapPolicy {
    match setting {
        OverlapSetting::Skip => OverlapPolicy::Skip,
        OverlapSetting::Queue => OverlapPolicy::Queue,
        OverlapSetting::Concurrent => OverlapPolicy::Concurrent,
    }
}

/// Cancel once `signal` fires. If the signal cannot be installed, keep running;
/// the process then only stops when killed.
fn cancel_on_signal<S>(signal: S, cancel: CancellationToken) -> JoinHandle<()>
where
    S: Future<Output = io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("app.shutdown.signal");
                cancel.cancel();
            }
            Err(err) => warn!(error=%err, "app.shutdown.signal_unavailable"),
        }
    })
}

impl Hexwatch {
    pub async fn build_from_config(cfg: &HexwatchConfig) -> Result<Self> {
        let store = Store::connect(&cfg.database.url, cfg.database.max_connections)
            .await
            .context("opening database")?;
        store.migrate().await.context("applying migrations")?;

        let scraper = TwitterScraper::new(
            &cfg.scraper.base_url,
            &cfg.scraper.actor_id,
            &cfg.scraper.api_token,
        )?
        .with_timeout(Duration::from_secs(cfg.scraper.timeout_secs));

        let pipeline = Pipeline::new(Arc::new(scraper), store, cfg.scheduler.task_name.clone());
        let scheduler = Scheduler::new(Duration::from_secs(cfg.scheduler.interval_secs))
            .with_overlap(overlap_policy(cfg.scheduler.overlap));

        info!(
            task=%pipeline.task_name(),
            actor=%cfg.scraper.actor_id,
            interval_secs=cfg.scheduler.interval_secs,
            "app.wired"
        );
        Ok(Self { pipeline, scheduler })
    }

    pub async fn run_once(&self) -> Result<CycleReport> {
        Ok(self.pipeline.run_cycle().await?)
    }

    /// Schedule cycles until Ctrl-C, then wait for the in-flight cycle.
    pub async fn run_until_ctrl_c(self) -> Result<()> {
        cancel_on_signal(tokio::signal::ctrl_c(), self.scheduler.cancellation());

        let pipeline = self.pipeline;
        self.scheduler
            .run(move || {
                let pipeline = pipeline.clone();
                async move { pipeline.run_cycle().await }
            })
            .await;
        info!("app.stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_settings_map_one_to_one() {
        assert_eq!(overlap_policy(OverlapSetting::Skip), OverlapPolicy::Skip);
        assert_eq!(overlap_policy(OverlapSetting::Queue), OverlapPolicy::Queue);
        assert_eq!(
            overlap_policy(OverlapSetting::Concurrent),
            OverlapPolicy::Concurrent
        );
    }

    #[tokio::test]
    async fn signal_cancels_the_scheduler() {
        let cancel = CancellationToken::new();
        cancel_on_signal(async { Ok::<_, io::Error>(()) }, cancel.clone())
            .await
            .unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn unavailable_signal_leaves_the_scheduler_running() {
        let cancel = CancellationToken::new();
        cancel_on_signal(
            async { Err(io::Error::other("no signal handler")) },
            cancel.clone(),
        )
        .await
        .unwrap();
        assert!(!cancel.is_cancelled());
    }
}
