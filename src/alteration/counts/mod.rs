//! Code implementing the "alteration counts" sub command.

pub mod db;
pub mod enrichment;
pub mod schema;
pub mod service;
pub mod store;

use std::fs::File;
use std::io::Write;
use std::time::Instant;

use clap::Parser;
use thousands::Separable;

use crate::common::io::open_write_maybe_gz;
use crate::common::select::Select;
use crate::common::{numeric_gene_id, trace_rss_now, worker_version};

use self::db::{load_alteration_db, AlterationDb};
use self::schema::{CaseGrouping, CaseQuery, CohortCounts, CountKind};
use self::service::AlterationCounter;

/// Command line arguments for `alteration counts` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run alteration count query", long_about = None)]
pub struct Args {
    /// Path to the alteration TSV file (possibly gzipped).
    #[arg(long, required = true)]
    pub path_alterations: String,
    /// Path to the gene panel metadata JSON file.
    #[arg(long, required = true)]
    pub path_panels: String,
    /// Path to query JSON file.
    #[arg(long, required = true)]
    pub path_query_json: String,
    /// Path to the output JSON file (possibly gzipped).
    #[arg(long, required = true)]
    pub path_output: String,
}

/// Header and payload of one result file.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ResultRecord<T> {
    /// UUID of this result set.
    pub result_set_id: uuid::Uuid,
    /// Version of the worker that produced the result.
    pub version: String,
    /// Number of cohort cases profiled in the queried profiles.
    pub total_profiled_cases: u64,
    /// The per-gene counts.
    pub gene_counts: Vec<T>,
}

impl<T> ResultRecord<T> {
    /// Construct from a result envelope.
    fn with_counts(counts: CohortCounts<T>) -> Self {
        Self {
            result_set_id: uuid::Uuid::new_v4(),
            version: worker_version().to_string(),
            total_profiled_cases: counts.total_profiled_cases,
            gene_counts: counts.gene_counts,
        }
    }
}

/// Translate the query gene list into an Entrez gene ID selection.
///
/// Entries may be plain Entrez IDs, `ENSG`-prefixed identifiers, or HUGO
/// symbols; symbols that cannot be resolved against the database are logged
/// and skipped.
fn translate_gene_filter(genes: &Option<Vec<String>>, db: &AlterationDb) -> Select<u32> {
    let Some(genes) = genes else {
        return Select::all();
    };

    let re_numeric = regex::Regex::new(r"^\d+$").expect("invalid regex in source code");
    let re_ensembl = regex::Regex::new(r"^ENSG\d+$").expect("invalid regex in source code");

    let mut gene_ids = Vec::new();
    for gene in genes {
        let gene = gene.trim();
        if re_numeric.is_match(gene) || re_ensembl.is_match(gene) {
            match numeric_gene_id(gene) {
                Ok(gene_id) => gene_ids.push(gene_id),
                Err(_) => tracing::warn!("Cannot parse gene identifier {:?}; skipping", gene),
            }
        } else if let Some(gene_id) = db.gene_id_for_symbol(gene) {
            gene_ids.push(gene_id);
        } else {
            tracing::warn!("Could not map gene symbol {:?}; skipping", gene);
        }
    }

    Select::by_values(gene_ids)
}

/// Serialize the result envelope to `path_output` and return its totals for
/// the summary log line.
fn write_result<T>(path_output: &str, counts: CohortCounts<T>) -> Result<(u64, usize), anyhow::Error>
where
    T: serde::Serialize,
{
    let record = ResultRecord::with_counts(counts);
    let mut writer = open_write_maybe_gz(path_output)?;
    serde_json::to_writer_pretty(&mut writer, &record)?;
    writer.flush()?;
    Ok((record.total_profiled_cases, record.gene_counts.len()))
}

/// Dispatch `query` to the operation it describes and write out the result.
fn run_query(
    db: &AlterationDb,
    query: &CaseQuery,
    path_output: &str,
) -> Result<(u64, usize), anyhow::Error> {
    let counter = AlterationCounter::new(db, db);

    let genes = translate_gene_filter(&query.genes, db);
    let mutation_types = Select::from(query.mutation_types.clone());
    let cna_types = Select::from(query.cna_types.clone());
    let include_frequency = query.include_frequency;
    let include_missing = query.include_missing_alterations_from_gene_panel;

    match (query.kind, query.grouping) {
        (CountKind::Alteration, CaseGrouping::Sample) => write_result(
            path_output,
            counter.sample_alteration_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
                &mutation_types,
                &cna_types,
                query.call_status,
            )?,
        ),
        (CountKind::Alteration, CaseGrouping::Patient) => write_result(
            path_output,
            counter.patient_alteration_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
                &mutation_types,
                &cna_types,
                query.call_status,
            )?,
        ),
        (CountKind::Mutation, CaseGrouping::Sample) => write_result(
            path_output,
            counter.sample_mutation_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
                &mutation_types,
            )?,
        ),
        (CountKind::Mutation, CaseGrouping::Patient) => write_result(
            path_output,
            counter.patient_mutation_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
                &mutation_types,
            )?,
        ),
        (CountKind::StructuralVariant, CaseGrouping::Sample) => write_result(
            path_output,
            counter.sample_structural_variant_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
            )?,
        ),
        (CountKind::StructuralVariant, CaseGrouping::Patient) => write_result(
            path_output,
            counter.patient_structural_variant_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
            )?,
        ),
        (CountKind::Cna, CaseGrouping::Sample) => write_result(
            path_output,
            counter.sample_cna_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
                &cna_types,
            )?,
        ),
        (CountKind::Cna, CaseGrouping::Patient) => write_result(
            path_output,
            counter.patient_cna_counts(
                &query.cohort,
                &genes,
                include_frequency,
                include_missing,
                &cna_types,
            )?,
        ),
    }
}

/// Main entry point for `alteration counts` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    tracing::info!("Loading query...");
    let query: CaseQuery = serde_json::from_reader(File::open(&args.path_query_json)?)?;
    tracing::info!(
        "... done loading query = {}",
        &serde_json::to_string(&query)?
    );

    tracing::info!("Loading alteration database...");
    let before_loading = Instant::now();
    let db = load_alteration_db(&args.path_alterations, &args.path_panels)?;
    tracing::info!(
        "... done loading database in {:?}",
        before_loading.elapsed()
    );

    trace_rss_now();

    tracing::info!("Running query...");
    let before_query = Instant::now();
    let (total_profiled_cases, gene_count) = run_query(&db, &query, &args.path_output)?;
    tracing::info!("... done running query in {:?}", before_query.elapsed());
    tracing::info!(
        "summary: {} gene rows, {} profiled cases",
        gene_count.separate_with_commas(),
        total_profiled_cases.separate_with_commas()
    );

    trace_rss_now();

    tracing::info!(
        "All of `alteration counts` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
