//! Data structures for alteration counting queries and results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// Identifier of one case (sample or patient) within one molecular profile.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Clone, derive_new::new)]
pub struct ProfileCaseIdentifier {
    /// Identifier of the molecular profile the case was assayed in.
    pub molecular_profile_id: String,
    /// Identifier of the sample or patient.
    pub case_id: String,
}

/// Subtype of a point mutation call.
#[derive(
    Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Hash, Debug, Clone, Copy,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationEventType {
    /// Amino-acid changing SNV.
    MissenseMutation,
    /// Premature stop codon.
    NonsenseMutation,
    /// Lost stop codon.
    NonstopMutation,
    /// Variant in a splice site.
    SpliceSite,
    /// Frameshift by deletion.
    FrameShiftDel,
    /// Frameshift by insertion.
    FrameShiftIns,
    /// In-frame deletion.
    InFrameDel,
    /// In-frame insertion.
    InFrameIns,
    /// Variant at the translation start site.
    TranslationStartSite,
    /// Synonymous variant.
    Silent,
    /// Any other mutation subtype.
    Other,
}

/// Subtype of a copy number alteration call.
#[derive(
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Clone,
    Copy,
    Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CnaEventType {
    /// High-level amplification.
    Amp,
    /// Low-level gain.
    Gain,
    /// Normal copy number.
    #[default]
    Diploid,
    /// Heterozygous deletion.
    Hetloss,
    /// Homozygous deletion.
    Homdel,
}

impl CnaEventType {
    /// Integer copy number code as used in portal data files.
    pub fn code(&self) -> i8 {
        match self {
            CnaEventType::Amp => 2,
            CnaEventType::Gain => 1,
            CnaEventType::Diploid => 0,
            CnaEventType::Hetloss => -1,
            CnaEventType::Homdel => -2,
        }
    }

    /// Resolve a CNA kind from its integer copy number code.
    pub fn from_code(code: i8) -> Option<Self> {
        Self::iter().find(|cna_type| cna_type.code() == code)
    }
}

/// Which category of alteration calls a query targets.
///
/// `Pass` places no restriction on the call category. `Active` restricts a
/// query to structural variant calls flagged as significant while `Inactive`
/// excludes structural variant calls altogether.
#[derive(
    Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Debug, Clone, Copy, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    /// Default, unrestricted call category.
    #[default]
    Pass,
    /// Only calls flagged as biologically significant (structural variants).
    Active,
    /// Exclude calls subject to significance flagging (structural variants).
    Inactive,
}

/// Per-gene alteration counts for one cohort.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct AlterationCountByGene {
    /// Entrez gene ID.
    pub entrez_gene_id: u32,
    /// HUGO gene symbol.
    pub hugo_gene_symbol: String,
    /// Number of distinct cases with at least one matching alteration.
    pub number_of_altered_cases: u32,
    /// Total number of matching alteration events.
    pub total_count: u32,
    /// Number of cohort cases profiled for this gene; set by frequency
    /// enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_profiled_cases: Option<u32>,
    /// Fraction of profiled cases carrying an alteration; set by frequency
    /// enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alteration_frequency: Option<f64>,
}

/// Per-gene copy number alteration counts for one cohort, per CNA kind.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct CopyNumberCountByGene {
    /// Entrez gene ID.
    pub entrez_gene_id: u32,
    /// HUGO gene symbol.
    pub hugo_gene_symbol: String,
    /// The copy number alteration kind counted in this record.
    pub alteration: CnaEventType,
    /// Number of distinct cases with at least one matching alteration.
    pub number_of_altered_cases: u32,
    /// Number of cohort cases profiled for this gene; set by frequency
    /// enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_profiled_cases: Option<u32>,
    /// Fraction of profiled cases carrying an alteration; set by frequency
    /// enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alteration_frequency: Option<f64>,
}

/// Access to the fields shared by all per-gene count records.
///
/// Frequency enrichment is generic over this trait so that one denominator
/// algorithm serves mutation and copy number counts without cross-wiring the
/// two result shapes.
pub trait AlterationCounts {
    /// Entrez gene ID of the record.
    fn entrez_gene_id(&self) -> u32;
    /// Number of distinct altered cases.
    fn number_of_altered_cases(&self) -> u32;
    /// Record the number of profiled cases.
    fn set_number_of_profiled_cases(&mut self, count: u32);
    /// Record the derived alteration frequency.
    fn set_alteration_frequency(&mut self, frequency: Option<f64>);
}

impl AlterationCounts for AlterationCountByGene {
    fn entrez_gene_id(&self) -> u32 {
        self.entrez_gene_id
    }

    fn number_of_altered_cases(&self) -> u32 {
        self.number_of_altered_cases
    }

    fn set_number_of_profiled_cases(&mut self, count: u32) {
        self.number_of_profiled_cases = Some(count);
    }

    fn set_alteration_frequency(&mut self, frequency: Option<f64>) {
        self.alteration_frequency = frequency;
    }
}

impl AlterationCounts for CopyNumberCountByGene {
    fn entrez_gene_id(&self) -> u32 {
        self.entrez_gene_id
    }

    fn number_of_altered_cases(&self) -> u32 {
        self.number_of_altered_cases
    }

    fn set_number_of_profiled_cases(&mut self, count: u32) {
        self.number_of_profiled_cases = Some(count);
    }

    fn set_alteration_frequency(&mut self, frequency: Option<f64>) {
        self.alteration_frequency = frequency;
    }
}

/// Per-gene counts together with the cohort-wide profiled case count.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, derive_new::new)]
pub struct CohortCounts<T> {
    /// The per-gene count records.
    pub gene_counts: Vec<T>,
    /// Number of cohort cases profiled in the queried profiles, independent
    /// of any gene level filtering.
    pub total_profiled_cases: u64,
}

impl<T> Default for CohortCounts<T> {
    fn default() -> Self {
        Self {
            gene_counts: Vec::new(),
            total_profiled_cases: 0,
        }
    }
}

/// Gene coverage of one assay.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum PanelCoverage {
    /// Whole exome/genome assay, implicitly covering every gene.
    WholeExome,
    /// Targeted panel covering exactly the given Entrez gene IDs.
    GenePanel(HashSet<u32>),
}

/// Panel coverage of a single profiled sample.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, derive_new::new)]
pub struct CasePanelCoverage {
    /// Molecular profile the sample was assayed in.
    pub molecular_profile_id: String,
    /// Sample identifier.
    pub sample_id: String,
    /// Patient the sample belongs to.
    pub patient_id: String,
    /// Coverage of the assay.
    pub coverage: PanelCoverage,
}

/// Case identity to group counts and coverage by.
#[derive(
    Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Debug, Clone, Copy, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseGrouping {
    /// One case per sample.
    #[default]
    Sample,
    /// One case per patient; a patient aggregates all of its samples.
    Patient,
}

impl CaseGrouping {
    /// Return the grouping key of a coverage row.
    pub fn case_key<'a>(&self, coverage: &'a CasePanelCoverage) -> &'a str {
        match self {
            CaseGrouping::Sample => &coverage.sample_id,
            CaseGrouping::Patient => &coverage.patient_id,
        }
    }
}

/// Kind of counting operation to run.
#[derive(
    Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Debug, Clone, Copy, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CountKind {
    /// Generic counts with caller-supplied filters.
    #[default]
    Alteration,
    /// Mutation counts, excluding structural variant calls.
    Mutation,
    /// Structural variant / fusion counts.
    StructuralVariant,
    /// Copy number counts per CNA kind.
    Cna,
}

/// Query settings for one counting run.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct CaseQuery {
    /// Kind of counting operation.
    #[serde(default)]
    pub kind: CountKind,
    /// Case grouping for counting and denominators.
    #[serde(default)]
    pub grouping: CaseGrouping,
    /// The cohort to count in.
    pub cohort: Vec<ProfileCaseIdentifier>,
    /// Gene filter; an absent list matches all genes, an empty list none.
    /// Entries may be Entrez IDs, `ENSG` identifiers, or HUGO symbols.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genes: Option<Vec<String>>,
    /// Mutation subtype filter; an absent list matches all, an empty list
    /// none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_types: Option<Vec<MutationEventType>>,
    /// CNA subtype filter; an absent list matches all, an empty list none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cna_types: Option<Vec<CnaEventType>>,
    /// Call status restriction for the generic alteration operation.
    #[serde(default)]
    pub call_status: CallStatus,
    /// Whether to annotate counts with profiled-case denominators and
    /// frequencies.
    #[serde(default)]
    pub include_frequency: bool,
    /// Whether to keep genes without any panel coverage, assuming the full
    /// cohort as denominator.
    #[serde(default)]
    pub include_missing_alterations_from_gene_panel: bool,
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CnaEventType::Amp, 2)]
    #[case(CnaEventType::Gain, 1)]
    #[case(CnaEventType::Diploid, 0)]
    #[case(CnaEventType::Hetloss, -1)]
    #[case(CnaEventType::Homdel, -2)]
    fn cna_event_type_code_round_trip(#[case] cna_type: CnaEventType, #[case] code: i8) {
        assert_eq!(code, cna_type.code());
        assert_eq!(Some(cna_type), CnaEventType::from_code(code));
    }

    #[test]
    fn cna_event_type_from_unknown_code() {
        assert_eq!(None, CnaEventType::from_code(3));
    }

    #[rstest]
    #[case("MISSENSE_MUTATION", MutationEventType::MissenseMutation)]
    #[case("FRAME_SHIFT_DEL", MutationEventType::FrameShiftDel)]
    #[case("SILENT", MutationEventType::Silent)]
    fn mutation_event_type_from_str(
        #[case] s: &str,
        #[case] expected: MutationEventType,
    ) -> Result<(), anyhow::Error> {
        let actual: MutationEventType = s.parse()?;

        assert_eq!(expected, actual);

        Ok(())
    }

    #[test]
    fn case_grouping_key() {
        let coverage = CasePanelCoverage::new(
            String::from("study_mutations"),
            String::from("SAMPLE_01"),
            String::from("PATIENT_01"),
            PanelCoverage::WholeExome,
        );

        assert_eq!("SAMPLE_01", CaseGrouping::Sample.case_key(&coverage));
        assert_eq!("PATIENT_01", CaseGrouping::Patient.case_key(&coverage));
    }

    #[test]
    fn case_query_from_minimal_json() -> Result<(), anyhow::Error> {
        let query: CaseQuery = serde_json::from_str(
            r#"{
                "cohort": [
                    {"molecular_profile_id": "study_mutations", "case_id": "SAMPLE_01"}
                ]
            }"#,
        )?;

        assert_eq!(CountKind::Alteration, query.kind);
        assert_eq!(CaseGrouping::Sample, query.grouping);
        assert_eq!(CallStatus::Pass, query.call_status);
        assert!(query.genes.is_none());
        assert!(!query.include_frequency);

        Ok(())
    }
}
