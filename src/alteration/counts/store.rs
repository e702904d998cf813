//! Contracts of the counting backend and of gene panel coverage resolution.

use crate::common::select::Select;

use super::schema::{
    AlterationCountByGene, CallStatus, CasePanelCoverage, CnaEventType, CopyNumberCountByGene,
    MutationEventType, ProfileCaseIdentifier,
};

/// Error type for store and panel resolver operations.
#[derive(thiserror::Error, Debug, Clone)]
pub enum StoreError {
    /// A cohort entry referenced a molecular profile that does not exist.
    #[error("molecular profile not found: {molecular_profile_id}")]
    ProfileNotFound {
        /// The offending profile ID.
        molecular_profile_id: String,
    },
    /// A sample was assigned a gene panel with no known definition.
    #[error("gene panel not found: {gene_panel_id}")]
    GenePanelNotFound {
        /// The offending panel ID.
        gene_panel_id: String,
    },
}

/// Counting backend executing filtered alteration count queries.
pub trait AlterationStore {
    /// Count alterations per gene over a cohort of samples.
    fn sample_alteration_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
    ) -> Result<Vec<AlterationCountByGene>, StoreError>;

    /// Count alterations per gene over a cohort of patients.
    fn patient_alteration_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
    ) -> Result<Vec<AlterationCountByGene>, StoreError>;

    /// Count copy number alterations per gene and CNA kind over a cohort of
    /// samples.
    fn sample_cna_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        cna_types: &Select<CnaEventType>,
    ) -> Result<Vec<CopyNumberCountByGene>, StoreError>;

    /// Count copy number alterations per gene and CNA kind over a cohort of
    /// patients.
    fn patient_cna_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        cna_types: &Select<CnaEventType>,
    ) -> Result<Vec<CopyNumberCountByGene>, StoreError>;
}

/// Resolution of gene panel coverage for cohort cases.
pub trait GenePanelResolver {
    /// Return one coverage row per profiled sample of a sample cohort.
    fn sample_panel_coverage(
        &self,
        cohort: &[ProfileCaseIdentifier],
    ) -> Result<Vec<CasePanelCoverage>, StoreError>;

    /// Return one coverage row per profiled sample belonging to the patients
    /// of a patient cohort.
    fn patient_panel_coverage(
        &self,
        cohort: &[ProfileCaseIdentifier],
    ) -> Result<Vec<CasePanelCoverage>, StoreError>;
}
