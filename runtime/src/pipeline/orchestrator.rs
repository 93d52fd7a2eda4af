//! Per-task extraction: prepare the page, run the field cascade, capture.

use super::artifacts::RunDirectory;
use super::prepare::{prepare, PrepareOutcome};
use super::{BatchError, ResourceResult};
use crate::config::CaptureConfig;
use crate::extract::rules::{normalize_domain, RuleBook};
use crate::extract::{body_scan, cascade, fragment, Field, FieldExtractionResult, SourceTier};
use crate::manifest::ExtractionTask;
use crate::progress::TaskStatus;
use crate::renderer::RenderContext;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Runs single tasks against a render context. Shared by every worker.
pub struct Orchestrator<'a> {
    pub rules: &'a RuleBook,
    pub config: &'a CaptureConfig,
    pub run_dir: &'a RunDirectory,
}

impl<'a> Orchestrator<'a> {
    pub fn new(rules: &'a RuleBook, config: &'a CaptureConfig, run_dir: &'a RunDirectory) -> Self {
        Self {
            rules,
            config,
            run_dir,
        }
    }

    /// Current time in the configured zone, RFC 3339.
    pub fn now_local(&self) -> String {
        Utc::now().with_timezone(&self.config.timezone).to_rfc3339()
    }

    /// Process one task. Every task-scoped failure ends up in the returned
    /// result and the run directory; only a lost session is an error, whether
    /// it surfaces during navigation or during the capture.
    pub async fn process_task(
        &self,
        ctx: &mut dyn RenderContext,
        task: &ExtractionTask,
    ) -> Result<ResourceResult, BatchError> {
        let domain = normalize_domain(&task.url);

        match prepare(ctx, &task.url, self.config).await? {
            PrepareOutcome::NavigationFailed(reason) => {
                self.run_dir.write_navigation_error(&task.url, &reason);
                return Ok(ResourceResult::navigation_failed(
                    task,
                    domain,
                    self.now_local(),
                    reason,
                ));
            }
            PrepareOutcome::Ready(_) => {}
        }

        let fields = self.extract_fields(&*ctx, task, &domain).await;
        let captured_at_local = self.now_local();

        let shot_path = self.run_dir.screenshot_path(&domain, &task.url);
        let capture = match ctx.screenshot_full_page(self.config.nav_timeout).await {
            Ok(png) => tokio::fs::write(&shot_path, &png)
                .await
                .map_err(|e| format!("failed to write {}: {e}", shot_path.display())),
            Err(e) if e.is_fatal() => {
                warn!("browser session lost while capturing {}: {e}", task.url);
                return Err(BatchError::session_lost(&e));
            }
            Err(e) => Err(e.to_string()),
        };

        let (screenshot_path, capture_error, status) = match capture {
            Ok(()) => (Some(shot_path), None, TaskStatus::Completed),
            Err(reason) => {
                warn!("screenshot of {} failed: {reason}", task.url);
                self.run_dir.write_capture_error(&task.url, &reason);
                (None, Some(reason), TaskStatus::CaptureFailed)
            }
        };

        Ok(ResourceResult {
            domain,
            url: task.url.clone(),
            captured_at_local,
            fields,
            screenshot_path,
            navigation_error: None,
            capture_error,
            status,
        })
    }

    /// Resolve every field through selectors, then the URL fragment, then
    /// the page body, and normalize what was found.
    pub async fn extract_fields(
        &self,
        ctx: &dyn RenderContext,
        task: &ExtractionTask,
        domain: &str,
    ) -> BTreeMap<Field, FieldExtractionResult> {
        let candidates = self.rules.resolve(domain, &task.overrides);

        let mut raw: BTreeMap<Field, (String, SourceTier)> = BTreeMap::new();
        for field in Field::ALL {
            let text =
                cascade::extract_text(ctx, candidates.get(field), self.config.selector_wait).await;
            raw.insert(field, (text, SourceTier::Selector));
        }

        let is_empty = |raw: &BTreeMap<Field, (String, SourceTier)>, field: Field| {
            raw.get(&field).map_or(true, |(text, _)| text.is_empty())
        };

        if is_empty(&raw, Field::Price) || is_empty(&raw, Field::ChangePct) {
            let frag = fragment::extract_from_fragment(&task.url);
            fill(&mut raw, Field::Price, frag.price, SourceTier::UrlFragment);
            fill(&mut raw, Field::ChangePct, frag.change_pct, SourceTier::UrlFragment);
        }

        let limit = self.config.body_scan_limit;
        if is_empty(&raw, Field::Price) {
            let body = body_scan::read_body(ctx, limit).await;
            fill(
                &mut raw,
                Field::ChangePct,
                body_scan::find_percentage(&body),
                SourceTier::BodyScan,
            );
            fill(
                &mut raw,
                Field::Price,
                body_scan::find_price(&body),
                SourceTier::BodyScan,
            );
        } else if is_empty(&raw, Field::ChangePct) {
            let pct = body_scan::scan_body_for_percentage(ctx, limit).await;
            fill(&mut raw, Field::ChangePct, pct, SourceTier::BodyScan);
        }

        raw.into_iter()
            .map(|(field, (text, tier))| {
                let result = FieldExtractionResult::new(field, text, tier);
                debug!(
                    "{} {field} = {:?} ({})",
                    task.url, result.normalized_value, result.source_tier
                );
                (field, result)
            })
            .collect()
    }
}

/// Set `field` from a fallback source if it is still empty.
fn fill(
    raw: &mut BTreeMap<Field, (String, SourceTier)>,
    field: Field,
    value: String,
    tier: SourceTier,
) {
    if value.is_empty() {
        return;
    }
    let slot = raw
        .entry(field)
        .or_insert_with(|| (String::new(), SourceTier::None));
    if slot.0.is_empty() {
        *slot = (value, tier);
    }
}
