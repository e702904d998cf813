//! In-memory alteration database loaded from the worker input files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::common::io::open_read_maybe_gz;
use crate::common::select::Select;

use super::schema::{
    AlterationCountByGene, CallStatus, CaseGrouping, CasePanelCoverage, CnaEventType,
    CopyNumberCountByGene, MutationEventType, PanelCoverage, ProfileCaseIdentifier,
};
use super::store::{AlterationStore, GenePanelResolver, StoreError};

/// Class of an alteration call in the alteration TSV file.
#[derive(Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantClass {
    /// Point mutation call.
    Mutation,
    /// Structural variant / fusion call.
    StructuralVariant,
    /// Copy number alteration call.
    Cna,
}

/// One alteration call as read from the alteration TSV file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AlterationRecord {
    /// Molecular profile the call was made in.
    pub molecular_profile_id: String,
    /// Sample the call was made for.
    pub sample_id: String,
    /// Patient the sample belongs to.
    pub patient_id: String,
    /// Entrez gene ID of the altered gene.
    pub entrez_gene_id: u32,
    /// HUGO symbol of the altered gene.
    pub hugo_gene_symbol: String,
    /// Class of the call.
    pub variant_class: VariantClass,
    /// Subtype of the call within its class; empty for structural variants.
    #[serde(default)]
    pub variant_type: String,
}

/// One alteration call with its subtype decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterationCall {
    /// Point mutation with subtype.
    Mutation(MutationEventType),
    /// Structural variant / fusion call.
    StructuralVariant,
    /// Copy number alteration with subtype.
    CopyNumber(CnaEventType),
}

/// Decode a CNA subtype from its name or its integer copy number code.
fn decode_cna_type(variant_type: &str) -> Result<CnaEventType, anyhow::Error> {
    if let Ok(cna_type) = variant_type.parse() {
        return Ok(cna_type);
    }
    variant_type
        .parse::<i8>()
        .ok()
        .and_then(CnaEventType::from_code)
        .ok_or_else(|| anyhow::anyhow!("invalid CNA type: {:?}", variant_type))
}

impl TryFrom<&AlterationRecord> for AlterationCall {
    type Error = anyhow::Error;

    fn try_from(record: &AlterationRecord) -> Result<Self, Self::Error> {
        Ok(match record.variant_class {
            VariantClass::Mutation => {
                AlterationCall::Mutation(record.variant_type.parse().map_err(|_| {
                    anyhow::anyhow!("invalid mutation type: {:?}", &record.variant_type)
                })?)
            }
            VariantClass::StructuralVariant => AlterationCall::StructuralVariant,
            VariantClass::Cna => AlterationCall::CopyNumber(decode_cna_type(&record.variant_type)?),
        })
    }
}

/// Assignment of one profiled sample to a gene panel.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PanelAssignment {
    /// Molecular profile the sample was profiled in.
    pub molecular_profile_id: String,
    /// Sample identifier.
    pub sample_id: String,
    /// Patient the sample belongs to.
    pub patient_id: String,
    /// Panel the sample was assayed with; absent for whole exome/genome
    /// assays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_panel_id: Option<String>,
}

/// Gene panel metadata as read from the panel JSON file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PanelMeta {
    /// All known molecular profile IDs.
    pub molecular_profiles: Vec<String>,
    /// Gene panel definitions, panel ID to Entrez gene IDs.
    pub gene_panels: IndexMap<String, HashSet<u32>>,
    /// Per-sample panel assignment.
    pub panel_assignments: Vec<PanelAssignment>,
}

/// One decoded alteration call held in memory.
#[derive(Debug, Clone)]
struct Call {
    molecular_profile_id: String,
    sample_id: String,
    patient_id: String,
    entrez_gene_id: u32,
    hugo_gene_symbol: String,
    call: AlterationCall,
}

/// In-memory alteration database implementing the store and resolver
/// contracts.
#[derive(Debug, Default)]
pub struct AlterationDb {
    /// Known molecular profile IDs.
    molecular_profiles: HashSet<String>,
    /// Decoded alteration calls.
    calls: Vec<Call>,
    /// Gene panel definitions.
    gene_panels: IndexMap<String, HashSet<u32>>,
    /// Per-sample panel assignments.
    panel_assignments: Vec<PanelAssignment>,
    /// HUGO symbol to Entrez ID mapping derived from the alteration calls.
    symbol_to_gene: HashMap<String, u32>,
}

/// Load the alteration database from the worker input files.
pub fn load_alteration_db<P, Q>(
    path_alterations: P,
    path_panels: Q,
) -> Result<AlterationDb, anyhow::Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .from_reader(open_read_maybe_gz(path_alterations.as_ref())?);

    let mut calls = Vec::new();
    let mut symbol_to_gene = HashMap::new();
    for record in csv_reader.deserialize() {
        let record: AlterationRecord = record?;
        let call = AlterationCall::try_from(&record)?;
        symbol_to_gene.insert(record.hugo_gene_symbol.clone(), record.entrez_gene_id);
        calls.push(Call {
            molecular_profile_id: record.molecular_profile_id,
            sample_id: record.sample_id,
            patient_id: record.patient_id,
            entrez_gene_id: record.entrez_gene_id,
            hugo_gene_symbol: record.hugo_gene_symbol,
            call,
        });
    }

    let panel_meta: PanelMeta = serde_json::from_reader(File::open(path_panels.as_ref())?)?;

    Ok(AlterationDb {
        molecular_profiles: panel_meta.molecular_profiles.into_iter().collect(),
        calls,
        gene_panels: panel_meta.gene_panels,
        panel_assignments: panel_meta.panel_assignments,
        symbol_to_gene,
    })
}

/// Per-gene accumulator during counting.
#[derive(Debug, Default)]
struct GeneAccumulator<'a> {
    hugo_gene_symbol: &'a str,
    altered_cases: HashSet<&'a str>,
    total_count: u32,
}

impl AlterationDb {
    /// Resolve a HUGO symbol to an Entrez gene ID via the loaded calls.
    pub fn gene_id_for_symbol(&self, hugo_gene_symbol: &str) -> Option<u32> {
        self.symbol_to_gene.get(hugo_gene_symbol).copied()
    }

    /// Fail with `ProfileNotFound` if any cohort entry references an unknown
    /// molecular profile.
    fn check_profiles(&self, cohort: &[ProfileCaseIdentifier]) -> Result<(), StoreError> {
        for case in cohort {
            if !self.molecular_profiles.contains(&case.molecular_profile_id) {
                return Err(StoreError::ProfileNotFound {
                    molecular_profile_id: case.molecular_profile_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether `call` matches the type filters and call status.
    ///
    /// Structural variant calls carry no mutation subtype; they are only
    /// reachable through an unrestricted mutation type filter. The call
    /// status gates mutation and structural variant calls but not CNA calls.
    fn call_matches(
        call: &AlterationCall,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
    ) -> bool {
        match call {
            AlterationCall::Mutation(mutation_type) => {
                call_status != CallStatus::Active && mutation_types.passes(mutation_type)
            }
            AlterationCall::StructuralVariant => {
                call_status != CallStatus::Inactive && mutation_types.is_all()
            }
            AlterationCall::CopyNumber(cna_type) => cna_types.passes(cna_type),
        }
    }

    fn alteration_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
        grouping: CaseGrouping,
    ) -> Result<Vec<AlterationCountByGene>, StoreError> {
        self.check_profiles(cohort)?;
        if genes.is_none() {
            return Ok(Vec::new());
        }

        let cohort_cases = cohort
            .iter()
            .map(|case| (case.molecular_profile_id.as_str(), case.case_id.as_str()))
            .collect::<HashSet<_>>();

        let mut by_gene: BTreeMap<u32, GeneAccumulator> = BTreeMap::new();
        for call in &self.calls {
            let case_key = match grouping {
                CaseGrouping::Sample => call.sample_id.as_str(),
                CaseGrouping::Patient => call.patient_id.as_str(),
            };
            if !cohort_cases.contains(&(call.molecular_profile_id.as_str(), case_key)) {
                continue;
            }
            if !genes.passes(&call.entrez_gene_id)
                || !Self::call_matches(&call.call, mutation_types, cna_types, call_status)
            {
                continue;
            }
            let accumulator = by_gene.entry(call.entrez_gene_id).or_default();
            accumulator.hugo_gene_symbol = &call.hugo_gene_symbol;
            accumulator.altered_cases.insert(case_key);
            accumulator.total_count += 1;
        }

        Ok(by_gene
            .into_iter()
            .map(|(entrez_gene_id, accumulator)| AlterationCountByGene {
                entrez_gene_id,
                hugo_gene_symbol: accumulator.hugo_gene_symbol.to_owned(),
                number_of_altered_cases: accumulator.altered_cases.len() as u32,
                total_count: accumulator.total_count,
                number_of_profiled_cases: None,
                alteration_frequency: None,
            })
            .collect())
    }

    fn cna_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        cna_types: &Select<CnaEventType>,
        grouping: CaseGrouping,
    ) -> Result<Vec<CopyNumberCountByGene>, StoreError> {
        self.check_profiles(cohort)?;
        if genes.is_none() || cna_types.is_none() {
            return Ok(Vec::new());
        }

        let cohort_cases = cohort
            .iter()
            .map(|case| (case.molecular_profile_id.as_str(), case.case_id.as_str()))
            .collect::<HashSet<_>>();

        // Counted independently per (gene, CNA kind) pair.
        let mut by_gene_and_kind: BTreeMap<(u32, CnaEventType), GeneAccumulator> = BTreeMap::new();
        for call in &self.calls {
            let AlterationCall::CopyNumber(cna_type) = &call.call else {
                continue;
            };
            let case_key = match grouping {
                CaseGrouping::Sample => call.sample_id.as_str(),
                CaseGrouping::Patient => call.patient_id.as_str(),
            };
            if !cohort_cases.contains(&(call.molecular_profile_id.as_str(), case_key)) {
                continue;
            }
            if !genes.passes(&call.entrez_gene_id) || !cna_types.passes(cna_type) {
                continue;
            }
            let accumulator = by_gene_and_kind
                .entry((call.entrez_gene_id, *cna_type))
                .or_default();
            accumulator.hugo_gene_symbol = &call.hugo_gene_symbol;
            accumulator.altered_cases.insert(case_key);
            accumulator.total_count += 1;
        }

        Ok(by_gene_and_kind
            .into_iter()
            .map(
                |((entrez_gene_id, alteration), accumulator)| CopyNumberCountByGene {
                    entrez_gene_id,
                    hugo_gene_symbol: accumulator.hugo_gene_symbol.to_owned(),
                    alteration,
                    number_of_altered_cases: accumulator.altered_cases.len() as u32,
                    number_of_profiled_cases: None,
                    alteration_frequency: None,
                },
            )
            .collect())
    }

    fn panel_coverage(
        &self,
        cohort: &[ProfileCaseIdentifier],
        grouping: CaseGrouping,
    ) -> Result<Vec<CasePanelCoverage>, StoreError> {
        self.check_profiles(cohort)?;

        let cohort_cases = cohort
            .iter()
            .map(|case| (case.molecular_profile_id.as_str(), case.case_id.as_str()))
            .collect::<HashSet<_>>();

        let mut result = Vec::new();
        for assignment in &self.panel_assignments {
            let case_key = match grouping {
                CaseGrouping::Sample => assignment.sample_id.as_str(),
                CaseGrouping::Patient => assignment.patient_id.as_str(),
            };
            if !cohort_cases.contains(&(assignment.molecular_profile_id.as_str(), case_key)) {
                continue;
            }
            let coverage = match &assignment.gene_panel_id {
                Some(gene_panel_id) => PanelCoverage::GenePanel(
                    self.gene_panels
                        .get(gene_panel_id)
                        .cloned()
                        .ok_or_else(|| StoreError::GenePanelNotFound {
                            gene_panel_id: gene_panel_id.clone(),
                        })?,
                ),
                None => PanelCoverage::WholeExome,
            };
            result.push(CasePanelCoverage::new(
                assignment.molecular_profile_id.clone(),
                assignment.sample_id.clone(),
                assignment.patient_id.clone(),
                coverage,
            ));
        }

        Ok(result)
    }
}

impl AlterationStore for AlterationDb {
    fn sample_alteration_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
    ) -> Result<Vec<AlterationCountByGene>, StoreError> {
        self.alteration_counts(
            cohort,
            genes,
            mutation_types,
            cna_types,
            call_status,
            CaseGrouping::Sample,
        )
    }

    fn patient_alteration_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
    ) -> Result<Vec<AlterationCountByGene>, StoreError> {
        self.alteration_counts(
            cohort,
            genes,
            mutation_types,
            cna_types,
            call_status,
            CaseGrouping::Patient,
        )
    }

    fn sample_cna_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        cna_types: &Select<CnaEventType>,
    ) -> Result<Vec<CopyNumberCountByGene>, StoreError> {
        self.cna_counts(cohort, genes, cna_types, CaseGrouping::Sample)
    }

    fn patient_cna_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        cna_types: &Select<CnaEventType>,
    ) -> Result<Vec<CopyNumberCountByGene>, StoreError> {
        self.cna_counts(cohort, genes, cna_types, CaseGrouping::Patient)
    }
}

impl GenePanelResolver for AlterationDb {
    fn sample_panel_coverage(
        &self,
        cohort: &[ProfileCaseIdentifier],
    ) -> Result<Vec<CasePanelCoverage>, StoreError> {
        self.panel_coverage(cohort, CaseGrouping::Sample)
    }

    fn patient_panel_coverage(
        &self,
        cohort: &[ProfileCaseIdentifier],
    ) -> Result<Vec<CasePanelCoverage>, StoreError> {
        self.panel_coverage(cohort, CaseGrouping::Patient)
    }
}
