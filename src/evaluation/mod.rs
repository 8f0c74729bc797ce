//! Offline quality evaluation of the recommendation pipeline.
//!
//! Two modes, both writing a CSV report:
//!
//! - **Self-evaluation** (no query file): every catalog item's name is run as
//!   a query, with a ground truth derived from the catalog itself: the items
//!   sharing the candidate's category are the relevant set. Recall@k against
//!   that set measures whether retrieval plus reranking keeps same-category
//!   assessments on top. The ground truth is simulated, so the absolute
//!   number only matters relative to previous runs of the same catalog.
//! - **Batch mode** (query file, one query per line): each query's final
//!   recommendations are written as `query,assessment_url` rows, the exchange
//!   format downstream graders consume.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::search::Recommender;
use crate::search::retriever::DEFAULT_RETRIEVE_K;

#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub data_dir: PathBuf,
    /// Embedder name or id; `None` selects the best available.
    pub embedder: Option<String>,
    /// Batch query file (one query per line). `None` runs self-evaluation
    /// over the whole catalog.
    pub queries_path: Option<PathBuf>,
    /// CSV report destination.
    pub output_path: PathBuf,
    /// Recommendations per query (the `k` of recall@k).
    pub top_k: usize,
    /// Suppress the progress bar.
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalSummary {
    pub queries_run: usize,
    pub rows_written: usize,
    /// Mean recall@k over all queries; `None` in batch mode, which has no
    /// ground truth.
    pub average_recall: Option<f64>,
    pub output_path: PathBuf,
}

/// Fraction of the relevant set found in the first `k` recommendations.
pub fn recall_at_k(recommended: &[&str], relevant: &HashSet<&str>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top: HashSet<&str> = recommended.iter().take(k).copied().collect();
    let hits = top.intersection(relevant).count();
    hits as f64 / relevant.len() as f64
}

pub fn run_evaluate(options: &EvalOptions) -> Result<EvalSummary> {
    let recommender = Recommender::open(&options.data_dir, options.embedder.as_deref())?;
    info!(
        embedder = recommender.embedder_id(),
        catalog = recommender.catalog_size(),
        "running evaluation"
    );

    match &options.queries_path {
        Some(path) => run_batch(options, &recommender, path),
        None => run_self_evaluation(options, &recommender),
    }
}

/// Catalog-derived relevant sets: item name to the names of every item in
/// the same category.
fn build_ground_truth(recommender: &Recommender) -> HashMap<String, HashSet<String>> {
    let mut by_category: HashMap<_, HashSet<String>> = HashMap::new();
    for item in recommender.catalog().iter() {
        by_category
            .entry(item.category_code)
            .or_default()
            .insert(item.name.clone());
    }
    recommender
        .catalog()
        .iter()
        .map(|item| {
            let relevant = by_category
                .get(&item.category_code)
                .cloned()
                .unwrap_or_default();
            (item.name.clone(), relevant)
        })
        .collect()
}

fn run_self_evaluation(options: &EvalOptions, recommender: &Recommender) -> Result<EvalSummary> {
    let ground_truth = build_ground_truth(recommender);
    let queries: Vec<String> = recommender
        .catalog()
        .iter()
        .map(|item| item.name.clone())
        .collect();
    if queries.is_empty() {
        bail!("catalog is empty, nothing to evaluate");
    }

    let progress = eval_progress(options.quiet, queries.len());
    let mut writer = create_report(&options.output_path)?;
    writeln!(writer, "query,recommended_assessment,category,score")?;

    let mut rows_written = 0usize;
    let mut recall_sum = 0.0f64;
    for query in &queries {
        let ranked = recommender.recommend_ranked(
            query,
            DEFAULT_RETRIEVE_K.max(options.top_k),
            options.top_k,
        )?;

        let recommended: Vec<&str> = ranked.iter().map(|c| c.item.name.as_str()).collect();
        let relevant: HashSet<&str> = ground_truth
            .get(query)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default();
        recall_sum += recall_at_k(&recommended, &relevant, options.top_k);

        for candidate in &ranked {
            writeln!(
                writer,
                "{},{},{:?},{:.4}",
                csv_field(query),
                csv_field(&candidate.item.name),
                candidate.item.category_code,
                candidate.score
            )?;
            rows_written += 1;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    writer.flush()?;

    let average_recall = recall_sum / queries.len() as f64;
    info!(
        queries = queries.len(),
        recall = average_recall,
        "self-evaluation complete"
    );

    Ok(EvalSummary {
        queries_run: queries.len(),
        rows_written,
        average_recall: Some(average_recall),
        output_path: options.output_path.clone(),
    })
}

fn run_batch(
    options: &EvalOptions,
    recommender: &Recommender,
    queries_path: &Path,
) -> Result<EvalSummary> {
    let contents = std::fs::read_to_string(queries_path)
        .with_context(|| format!("read query file {}", queries_path.display()))?;
    let queries: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if queries.is_empty() {
        bail!("query file {} contains no queries", queries_path.display());
    }

    let progress = eval_progress(options.quiet, queries.len());
    let mut writer = create_report(&options.output_path)?;
    writeln!(writer, "query,assessment_url")?;

    let mut rows_written = 0usize;
    for query in &queries {
        let ranked = recommender.recommend_ranked(
            query,
            DEFAULT_RETRIEVE_K.max(options.top_k),
            options.top_k,
        )?;
        for candidate in &ranked {
            writeln!(
                writer,
                "{},{}",
                csv_field(query),
                csv_field(&candidate.item.url)
            )?;
            rows_written += 1;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    writer.flush()?;

    info!(queries = queries.len(), rows = rows_written, "batch evaluation complete");

    Ok(EvalSummary {
        queries_run: queries.len(),
        rows_written,
        average_recall: None,
        output_path: options.output_path.clone(),
    })
}

fn eval_progress(quiet: bool, total: usize) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    bar.set_message("Evaluating queries...");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn create_report(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file =
        File::create(path).with_context(|| format!("create report file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_counts_hits_within_k() {
        let relevant: HashSet<&str> = ["a", "b", "c", "d"].into_iter().collect();
        let recommended = ["a", "x", "c", "d", "y"];
        assert!((recall_at_k(&recommended, &relevant, 3) - 0.5).abs() < 1e-9);
        assert!((recall_at_k(&recommended, &relevant, 5) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn recall_with_empty_relevant_set_is_zero() {
        let relevant = HashSet::new();
        assert_eq!(recall_at_k(&["a", "b"], &relevant, 2), 0.0);
    }

    #[test]
    fn recall_is_bounded_by_one() {
        let relevant: HashSet<&str> = ["a"].into_iter().collect();
        assert_eq!(recall_at_k(&["a", "a"], &relevant, 2), 1.0);
    }

    #[test]
    fn csv_fields_quote_delimiters_and_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
