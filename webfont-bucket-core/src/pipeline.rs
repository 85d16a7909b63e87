//! High-level pipeline: decode → download → synthesize → extract map → upload → reclaim.
//!
//! One [`Pipeline::run`] handles one trigger event. Phases run strictly one after
//! the other; inside the download and upload phases every object is handled
//! concurrently and the phase only ends once all of them have settled.
//!
//! # Outcomes
//! - [`RunOutcome::Skipped`]: the event does not concern a source file in a named
//!   folder. No object store call is made.
//! - [`RunOutcome::Completed`]: artifacts published, scratch reclaimed. Items that
//!   failed to download or upload are listed in the [`RunReport`].
//! - `Err(PipelineError)`: a phase-fatal failure. Remaining phases are skipped and
//!   the run's scratch directory is discarded. Artifacts uploaded before the failure
//!   stay published.
//!
//! Retrying is left to whoever delivers the event.

use std::path::PathBuf;

use aws_lambda_events::event::s3::S3Event;
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

use crate::batch::{BatchOutcome, ItemFailure};
use crate::config::PipelineConfig;
use crate::contract::{FontSynthesizer, GeneratedFont, ObjectStore};
use crate::download::download_sources;
use crate::error::PipelineError;
use crate::icon_map::IconMap;
use crate::scratch::ScratchDir;
use crate::synthesize::FontConfig;
use crate::trigger::{decide, CollectionContext, Decision, SkipReason, TriggerRecord};
use crate::upload::upload_artifacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Decode,
    Download,
    Synthesize,
    ExtractMap,
    Upload,
    Reclaim,
    Done,
}

/// Summary of a completed run; also the success payload returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub collection: CollectionContext,
    pub downloaded: Vec<PathBuf>,
    pub download_failures: Vec<ItemFailure>,
    pub icons: usize,
    pub manifest: Vec<String>,
    pub upload_failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub enum RunOutcome {
    Skipped(SkipReason),
    Completed(RunReport),
}

impl RunOutcome {
    pub fn message(&self) -> String {
        match self {
            RunOutcome::Skipped(reason) => format!("Skipped: {reason}"),
            RunOutcome::Completed(report) => format!(
                "Finished generating web font {}: {} files published",
                report.collection.collection_name,
                report.manifest.len()
            ),
        }
    }
}

/// State carried from one phase to the next.
enum Step {
    Download,
    Synthesize { files: Vec<PathBuf> },
    ExtractMap { font: Box<dyn GeneratedFont> },
    Upload,
    Reclaim,
    Done,
}

impl Step {
    fn phase(&self) -> Phase {
        match self {
            Step::Download => Phase::Download,
            Step::Synthesize { .. } => Phase::Synthesize,
            Step::ExtractMap { .. } => Phase::ExtractMap,
            Step::Upload => Phase::Upload,
            Step::Reclaim => Phase::Reclaim,
            Step::Done => Phase::Done,
        }
    }
}

pub struct Pipeline<S, F> {
    config: PipelineConfig,
    store: S,
    synthesizer: F,
}

impl<S, F> Pipeline<S, F>
where
    S: ObjectStore,
    F: FontSynthesizer,
{
    pub fn new(config: PipelineConfig, store: S, synthesizer: F) -> Self {
        Self {
            config,
            store,
            synthesizer,
        }
    }

    /// Handle one S3 notification. Only its first record is considered.
    pub async fn run(&self, event: &S3Event) -> Result<RunOutcome, PipelineError> {
        match TriggerRecord::from_event(event) {
            Ok(record) => self.run_record(&record).await,
            Err(reason) => {
                info!(%reason, "Nothing to do for event");
                Ok(RunOutcome::Skipped(reason))
            }
        }
    }

    pub async fn run_record(&self, record: &TriggerRecord) -> Result<RunOutcome, PipelineError> {
        info!(bucket = %record.bucket, key = %record.object_key, "Handling trigger record");
        match decide(record, &self.config.source_extension) {
            Decision::Skip(reason) => {
                info!(%reason, key = %record.object_key, "Skipping trigger");
                Ok(RunOutcome::Skipped(reason))
            }
            Decision::Process(context) => self.process(context).await.map(RunOutcome::Completed),
        }
    }

    async fn process(&self, context: CollectionContext) -> Result<RunReport, PipelineError> {
        let scratch = ScratchDir::create(&self.config.scratch_root).await?;
        info!(
            run_id = %scratch.run_id(),
            bucket = %context.bucket,
            prefix = %context.source_prefix,
            font_name = %context.collection_name,
            "Generating webfont"
        );

        let mut report = RunReport {
            run_id: scratch.run_id().to_string(),
            collection: context,
            downloaded: Vec::new(),
            download_failures: Vec::new(),
            icons: 0,
            manifest: Vec::new(),
            upload_failures: Vec::new(),
        };

        let mut step = Step::Download;
        loop {
            let phase = step.phase();
            let span = info_span!("phase", ?phase, run_id = %scratch.run_id());
            match self
                .advance(step, &scratch, &mut report)
                .instrument(span)
                .await
            {
                Ok(Step::Done) => {
                    info!(
                        run_id = %report.run_id,
                        published = report.manifest.len(),
                        "Finished generating web font"
                    );
                    return Ok(report);
                }
                Ok(next) => step = next,
                Err(e) => {
                    error!(
                        error = %e,
                        ?phase,
                        run_id = %report.run_id,
                        "An error occurred while generating the webfont"
                    );
                    scratch.discard().await;
                    return Err(e);
                }
            }
        }
    }

    async fn advance(
        &self,
        step: Step,
        scratch: &ScratchDir,
        report: &mut RunReport,
    ) -> Result<Step, PipelineError> {
        let context = &report.collection;
        match step {
            Step::Download => {
                let outcome = download_sources(
                    &self.store,
                    context,
                    &self.config.source_extension,
                    scratch.path(),
                )
                .await;
                check_failure_ratio(
                    Phase::Download,
                    &outcome,
                    self.config.failure_policy.max_download_failure_ratio,
                )?;
                let files = outcome.succeeded.clone();
                report.downloaded = outcome.succeeded;
                report.download_failures = outcome.failed;
                Ok(Step::Synthesize { files })
            }
            Step::Synthesize { files } => {
                if files.is_empty() {
                    return Err(PipelineError::NothingToSynthesize);
                }
                let font_config =
                    FontConfig::for_collection(&self.config.style, context, scratch.path(), files);
                let font = self.synthesizer.generate(&font_config).await?;
                Ok(Step::ExtractMap { font })
            }
            Step::ExtractMap { font } => {
                let map = IconMap::from_font(font.as_ref());
                if map.is_empty() && self.config.failure_policy.fail_on_empty_icon_map {
                    return Err(PipelineError::EmptyIconMap);
                }
                map.write(scratch.path(), &context.collection_name).await?;
                report.icons = map.len();
                Ok(Step::Upload)
            }
            Step::Upload => {
                let outcome = upload_artifacts(&self.store, context, scratch.path()).await;
                check_failure_ratio(
                    Phase::Upload,
                    &outcome,
                    self.config.failure_policy.max_upload_failure_ratio,
                )?;
                report.manifest = outcome.succeeded;
                report.upload_failures = outcome.failed;
                Ok(Step::Reclaim)
            }
            Step::Reclaim => {
                scratch.reclaim().await?;
                Ok(Step::Done)
            }
            Step::Done => Ok(Step::Done),
        }
    }
}

fn check_failure_ratio<T>(
    phase: Phase,
    outcome: &BatchOutcome<T>,
    allowed: Option<f64>,
) -> Result<(), PipelineError> {
    match allowed {
        Some(allowed) if outcome.failure_ratio() > allowed => Err(PipelineError::TooManyFailures {
            phase,
            failed: outcome.failed.len(),
            total: outcome.total(),
            allowed,
        }),
        _ => Ok(()),
    }
}
