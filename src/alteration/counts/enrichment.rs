//! Frequency enrichment: annotate per-gene counts with profiled-case
//! denominators and alteration frequencies.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::schema::{AlterationCounts, CaseGrouping, CasePanelCoverage, PanelCoverage};

/// Merged assay coverage of one case.
#[derive(Debug, Default)]
struct CaseCoverage {
    /// Whether any assay of the case was whole exome/genome.
    whole_exome: bool,
    /// Union of panel gene IDs over the case's panel-bound assays.
    panel_genes: HashSet<u32>,
}

impl CaseCoverage {
    fn merge(&mut self, coverage: &PanelCoverage) {
        match coverage {
            PanelCoverage::WholeExome => self.whole_exome = true,
            PanelCoverage::GenePanel(gene_ids) => {
                self.panel_genes.extend(gene_ids.iter().copied())
            }
        }
    }
}

/// Count the distinct case identities among `coverage` rows under `grouping`.
pub fn distinct_profiled_cases(coverage: &[CasePanelCoverage], grouping: CaseGrouping) -> u64 {
    coverage
        .iter()
        .map(|row| grouping.case_key(row))
        .collect::<HashSet<_>>()
        .len() as u64
}

/// Annotate `counts` with per-gene profiled-case denominators and the derived
/// alteration frequencies.
///
/// The denominator of a gene is the number of cohort cases whose assay covers
/// the gene; whole exome/genome assays cover every gene, and a patient is
/// covered if at least one of its samples is. Genes without any covered case
/// are dropped unless `include_missing_from_panel` is given, in which case the
/// denominator falls back to `cohort_size`. Altered-case counts are never
/// modified.
pub fn include_frequency<C>(
    coverage: &[CasePanelCoverage],
    counts: &mut Vec<C>,
    grouping: CaseGrouping,
    cohort_size: u32,
    include_missing_from_panel: bool,
) where
    C: AlterationCounts,
{
    // Merge coverage rows into one coverage per case identity; for patients
    // this is the union over all samples of the patient.
    let mut by_case: IndexMap<&str, CaseCoverage> = IndexMap::new();
    for row in coverage {
        by_case
            .entry(grouping.case_key(row))
            .or_default()
            .merge(&row.coverage);
    }

    let whole_exome_cases = by_case
        .values()
        .filter(|case_coverage| case_coverage.whole_exome)
        .count() as u32;

    // Per-gene covered-case counts over panel-bound cases, restricted to the
    // genes appearing in the raw counts.
    let gene_ids = counts
        .iter()
        .map(|count| count.entrez_gene_id())
        .collect::<HashSet<_>>();
    let mut panel_cases_by_gene: HashMap<u32, u32> = HashMap::new();
    for case_coverage in by_case.values() {
        if case_coverage.whole_exome {
            continue;
        }
        for gene_id in &case_coverage.panel_genes {
            if gene_ids.contains(gene_id) {
                *panel_cases_by_gene.entry(*gene_id).or_default() += 1;
            }
        }
    }

    counts.retain_mut(|count| {
        let gene_id = count.entrez_gene_id();
        let mut profiled = whole_exome_cases
            + panel_cases_by_gene.get(&gene_id).copied().unwrap_or_default();
        if profiled == 0 {
            if !include_missing_from_panel {
                if count.number_of_altered_cases() > 0 {
                    tracing::warn!(
                        "gene {} has {} altered but no profiled cases; dropping from result",
                        gene_id,
                        count.number_of_altered_cases()
                    );
                }
                return false;
            }
            // No panel tracks this gene at all; assume the whole cohort was
            // profiled for it.
            profiled = cohort_size;
        }

        count.set_number_of_profiled_cases(profiled);
        if profiled == 0 || count.number_of_altered_cases() > profiled {
            if count.number_of_altered_cases() > 0 {
                tracing::warn!(
                    "gene {}: {} altered cases exceed {} profiled cases; reporting frequency as absent",
                    gene_id,
                    count.number_of_altered_cases(),
                    profiled
                );
            }
            count.set_alteration_frequency(None);
        } else {
            count.set_alteration_frequency(Some(
                f64::from(count.number_of_altered_cases()) / f64::from(profiled),
            ));
        }
        true
    });
}
