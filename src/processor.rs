//! The "images" operation: store listing → lineage forest → rendered report.
//!
//! [`DiskUsageProcessor`] ties a concrete [`Store`] to the lineage builder and renderer:
//! - lists image ids from the store (optionally including intermediate layers),
//! - fetches their records in one batch, falling back to one inspect per id when the batch fails,
//! - feeds them to [`LineageBuilder`], which resolves ancestors through [`Store::inspect`],
//! - writes the forest as indented text or JSON, followed by a [`Summary`].
//!
//! Only a store that cannot be reached at all fails the run. Per-image problems end up in
//! the summary counters and in warnings.

use crate::lineage::{BuildOptions, BuildReport, Forest, LineageBuilder};
use crate::notifier::Notifier;
use crate::record::ImageRecord;
use crate::render::{render, to_megabytes, to_structured, StructuredNode};
use crate::sources::Store;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImagesOptions {
    /// List intermediate layers too, not only top-level images
    pub include_intermediate: bool,
    pub format: OutputFormat,
    pub count_references: bool,
}

/// Totals printed after the forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub trees: usize,
    /// Images returned by the store listing
    pub listed: usize,
    /// Distinct layers in the forest
    pub layers: usize,
    /// Bytes occupied by all distinct layers
    pub total_size: u64,
    pub skipped: usize,
    pub truncated: usize,
}

impl Summary {
    fn new(forest: &Forest, report: &BuildReport, listed: usize) -> Self {
        Self {
            trees: forest.len(),
            listed,
            layers: forest.node_count(),
            total_size: forest.total_size(),
            skipped: report.skipped(),
            truncated: report.truncated(),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    forest: Vec<StructuredNode>,
    summary: &'a Summary,
}

pub struct DiskUsageProcessor<S: Store> {
    store: S,
    notifier: Notifier,
}

impl<S: Store> DiskUsageProcessor<S> {
    pub fn new(store: S, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Lists images and builds their lineage forest.
    ///
    /// Returns the forest, the build report and the number of listed images.
    pub fn analyze(&self, options: &ImagesOptions) -> Result<(Forest, BuildReport, usize)> {
        self.notifier.info(&format!(
            "Listing images from {} store...",
            self.store.name()
        ));
        let ids = self
            .store
            .list_ids(options.include_intermediate)
            .with_context(|| format!("Failed to list images from {} store", self.store.name()))?;
        let listed = ids.len();
        self.notifier
            .debug(&format!("Store listed {} image(s)", listed));

        let mut records: HashMap<String, ImageRecord> = match self.store.inspect_many(&ids) {
            Ok(records) => records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect(),
            Err(err) if err.is_fatal() => {
                return Err(err).with_context(|| {
                    format!("Failed to inspect images from {} store", self.store.name())
                })
            }
            Err(err) => {
                self.notifier.warn(&format!(
                    "Batch inspect failed ({}), resolving images one by one",
                    err
                ));
                HashMap::new()
            }
        };

        let build_options = BuildOptions {
            count_references: options.count_references,
        };
        let mut builder =
            LineageBuilder::with_options(|id: &str| self.store.inspect(id), build_options);

        self.notifier
            .start_progress(listed as u64, "Resolving image lineage");
        for (i, id) in ids.iter().enumerate() {
            self.notifier
                .trace(&format!("Image {}/{}: {}", i + 1, listed, id));
            // Ids without a batch record are resolved on their own
            match records.remove(id) {
                Some(record) => builder.add_image(record),
                None => builder.add_image_id(id),
            }
            self.notifier
                .progress(i as u64 + 1, listed as u64, "Resolving image lineage");
        }
        self.notifier.finish_progress();

        let (forest, report) = builder.finish();
        for issue in &report.issues {
            self.notifier.debug(&issue.to_string());
        }
        if report.skipped() > 0 {
            self.notifier.warn(&format!(
                "Skipped {} image(s) that could not be inspected",
                report.skipped()
            ));
        }
        self.notifier.info(&format!(
            "Built {} tree(s) with {} layer(s)",
            forest.len(),
            forest.node_count()
        ));

        Ok((forest, report, listed))
    }

    /// Runs the "images" operation, writing the report to `out`
    pub fn images<W: Write>(&self, options: &ImagesOptions, out: &mut W) -> Result<Summary> {
        let (forest, report, listed) = self.analyze(options)?;
        let summary = Summary::new(&forest, &report, listed);

        match options.format {
            OutputFormat::Text => write_text(&forest, &summary, out)?,
            OutputFormat::Json => {
                let json = JsonReport {
                    forest: to_structured(&forest),
                    summary: &summary,
                };
                serde_json::to_writer_pretty(&mut *out, &json)
                    .context("Failed to serialize forest")?;
                writeln!(out)?;
            }
        }
        out.flush().context("Failed to flush output")?;

        Ok(summary)
    }
}

const SEPARATOR: &str = "---------------------------";

fn write_text<W: Write>(forest: &Forest, summary: &Summary, out: &mut W) -> Result<()> {
    let mut first = true;
    for line in render(forest) {
        if line.depth == 0 {
            if !first {
                writeln!(out, "{}", SEPARATOR)?;
            }
            first = false;
        }
        writeln!(out, "{}", line)?;
    }
    if !first {
        writeln!(out, "{}", SEPARATOR)?;
    }

    writeln!(
        out,
        "Trees: {}  Images: {}  Layers: {}  Disk usage: {} MB",
        summary.trees,
        summary.listed,
        summary.layers,
        to_megabytes(summary.total_size)
    )?;
    if summary.skipped > 0 {
        writeln!(out, "Skipped images: {}", summary.skipped)?;
    }
    if summary.truncated > 0 {
        writeln!(out, "Truncated chains: {}", summary.truncated)?;
    }
    Ok(())
}
