//! Public counting operations over cohorts of samples or patients.

use std::collections::HashSet;

use crate::common::select::Select;

use super::enrichment;
use super::schema::{
    AlterationCountByGene, AlterationCounts, CallStatus, CaseGrouping, CnaEventType, CohortCounts,
    CopyNumberCountByGene, MutationEventType, ProfileCaseIdentifier,
};
use super::store::{AlterationStore, GenePanelResolver, StoreError};

/// Compute per-gene alteration counts and frequencies for cohorts.
///
/// Stateless apart from its collaborators; one instance can serve concurrent
/// requests. The filter constellation of each operation is fixed and spelled
/// out inline below; callers can only choose filters where an operation
/// exposes them.
#[derive(Debug, derive_new::new)]
pub struct AlterationCounter<'a, S, R> {
    /// The counting backend.
    store: &'a S,
    /// The panel coverage resolver.
    panels: &'a R,
}

impl<'a, S, R> AlterationCounter<'a, S, R>
where
    S: AlterationStore,
    R: GenePanelResolver,
{
    /// Generic per-gene alteration counts for a sample cohort.
    #[allow(clippy::too_many_arguments)]
    pub fn sample_alteration_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
    ) -> Result<CohortCounts<AlterationCountByGene>, StoreError> {
        self.counts_with_total(
            cohort,
            CaseGrouping::Sample,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            |cohort| {
                self.store
                    .sample_alteration_counts(cohort, genes, mutation_types, cna_types, call_status)
            },
        )
    }

    /// Generic per-gene alteration counts for a patient cohort.
    #[allow(clippy::too_many_arguments)]
    pub fn patient_alteration_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
        mutation_types: &Select<MutationEventType>,
        cna_types: &Select<CnaEventType>,
        call_status: CallStatus,
    ) -> Result<CohortCounts<AlterationCountByGene>, StoreError> {
        self.counts_with_total(
            cohort,
            CaseGrouping::Patient,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            |cohort| {
                self.store.patient_alteration_counts(
                    cohort,
                    genes,
                    mutation_types,
                    cna_types,
                    call_status,
                )
            },
        )
    }

    /// Mutation counts for a sample cohort; structural variant calls are
    /// excluded and no CNA component is counted.
    pub fn sample_mutation_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
        mutation_types: &Select<MutationEventType>,
    ) -> Result<CohortCounts<AlterationCountByGene>, StoreError> {
        self.sample_alteration_counts(
            cohort,
            genes,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            mutation_types,
            &Select::none(),
            CallStatus::Inactive,
        )
    }

    /// Mutation counts for a patient cohort; structural variant calls are
    /// excluded and no CNA component is counted.
    pub fn patient_mutation_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
        mutation_types: &Select<MutationEventType>,
    ) -> Result<CohortCounts<AlterationCountByGene>, StoreError> {
        self.patient_alteration_counts(
            cohort,
            genes,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            mutation_types,
            &Select::none(),
            CallStatus::Inactive,
        )
    }

    /// Structural variant / fusion counts for a sample cohort; only calls
    /// flagged as significant are counted and no CNA component is counted.
    pub fn sample_structural_variant_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
    ) -> Result<CohortCounts<AlterationCountByGene>, StoreError> {
        self.sample_alteration_counts(
            cohort,
            genes,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            &Select::all(),
            &Select::none(),
            CallStatus::Active,
        )
    }

    /// Structural variant / fusion counts for a patient cohort; only calls
    /// flagged as significant are counted and no CNA component is counted.
    pub fn patient_structural_variant_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
    ) -> Result<CohortCounts<AlterationCountByGene>, StoreError> {
        self.patient_alteration_counts(
            cohort,
            genes,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            &Select::all(),
            &Select::none(),
            CallStatus::Active,
        )
    }

    /// Copy number counts per gene and CNA kind for a sample cohort.
    pub fn sample_cna_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
        cna_types: &Select<CnaEventType>,
    ) -> Result<CohortCounts<CopyNumberCountByGene>, StoreError> {
        self.counts_with_total(
            cohort,
            CaseGrouping::Sample,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            |cohort| self.store.sample_cna_counts(cohort, genes, cna_types),
        )
    }

    /// Copy number counts per gene and CNA kind for a patient cohort.
    pub fn patient_cna_counts(
        &self,
        cohort: &[ProfileCaseIdentifier],
        genes: &Select<u32>,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
        cna_types: &Select<CnaEventType>,
    ) -> Result<CohortCounts<CopyNumberCountByGene>, StoreError> {
        self.counts_with_total(
            cohort,
            CaseGrouping::Patient,
            include_frequency,
            include_missing_alterations_from_gene_panel,
            |cohort| self.store.patient_cna_counts(cohort, genes, cna_types),
        )
    }

    /// Run `fetch` and assemble the result envelope.
    ///
    /// An empty cohort never reaches the store. The cohort-wide profiled case
    /// count is derived from the resolved panel coverage independently of any
    /// gene level filtering; per-gene denominators and frequencies are only
    /// annotated when `include_frequency` is given.
    fn counts_with_total<C, F>(
        &self,
        cohort: &[ProfileCaseIdentifier],
        grouping: CaseGrouping,
        include_frequency: bool,
        include_missing_alterations_from_gene_panel: bool,
        fetch: F,
    ) -> Result<CohortCounts<C>, StoreError>
    where
        C: AlterationCounts,
        F: FnOnce(&[ProfileCaseIdentifier]) -> Result<Vec<C>, StoreError>,
    {
        if cohort.is_empty() {
            return Ok(CohortCounts::default());
        }

        let mut gene_counts = fetch(cohort)?;

        let coverage = match grouping {
            CaseGrouping::Sample => self.panels.sample_panel_coverage(cohort)?,
            CaseGrouping::Patient => self.panels.patient_panel_coverage(cohort)?,
        };
        let total_profiled_cases = enrichment::distinct_profiled_cases(&coverage, grouping);

        if include_frequency {
            let cohort_size = cohort
                .iter()
                .map(|case| case.case_id.as_str())
                .collect::<HashSet<_>>()
                .len() as u32;
            enrichment::include_frequency(
                &coverage,
                &mut gene_counts,
                grouping,
                cohort_size,
                include_missing_alterations_from_gene_panel,
            );
        }

        Ok(CohortCounts::new(gene_counts, total_profiled_cases))
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use crate::common::select::Select;

    use super::super::schema::{
        AlterationCountByGene, CallStatus, CasePanelCoverage, CnaEventType, CopyNumberCountByGene,
        MutationEventType, PanelCoverage, ProfileCaseIdentifier,
    };
    use super::super::store::{AlterationStore, GenePanelResolver, StoreError};
    use super::AlterationCounter;

    /// Filter constellation recorded from one store invocation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct RecordedQuery {
        grouping: &'static str,
        mutation_types: Select<MutationEventType>,
        cna_types: Select<CnaEventType>,
        call_status: Option<CallStatus>,
    }

    /// Store double returning canned counts and recording its invocations.
    #[derive(Default)]
    struct RecordingStore {
        counts: Vec<AlterationCountByGene>,
        cna_counts: Vec<CopyNumberCountByGene>,
        fail_with_profile: Option<String>,
        queries: RefCell<Vec<RecordedQuery>>,
    }

    impl RecordingStore {
        fn check(&self) -> Result<(), StoreError> {
            if let Some(molecular_profile_id) = &self.fail_with_profile {
                Err(StoreError::ProfileNotFound {
                    molecular_profile_id: molecular_profile_id.clone(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl AlterationStore for RecordingStore {
        fn sample_alteration_counts(
            &self,
            _cohort: &[ProfileCaseIdentifier],
            _genes: &Select<u32>,
            mutation_types: &Select<MutationEventType>,
            cna_types: &Select<CnaEventType>,
            call_status: CallStatus,
        ) -> Result<Vec<AlterationCountByGene>, StoreError> {
            self.check()?;
            self.queries.borrow_mut().push(RecordedQuery {
                grouping: "sample",
                mutation_types: mutation_types.clone(),
                cna_types: cna_types.clone(),
                call_status: Some(call_status),
            });
            Ok(self.counts.clone())
        }

        fn patient_alteration_counts(
            &self,
            _cohort: &[ProfileCaseIdentifier],
            _genes: &Select<u32>,
            mutation_types: &Select<MutationEventType>,
            cna_types: &Select<CnaEventType>,
            call_status: CallStatus,
        ) -> Result<Vec<AlterationCountByGene>, StoreError> {
            self.check()?;
            self.queries.borrow_mut().push(RecordedQuery {
                grouping: "patient",
                mutation_types: mutation_types.clone(),
                cna_types: cna_types.clone(),
                call_status: Some(call_status),
            });
            Ok(self.counts.clone())
        }

        fn sample_cna_counts(
            &self,
            _cohort: &[ProfileCaseIdentifier],
            _genes: &Select<u32>,
            cna_types: &Select<CnaEventType>,
        ) -> Result<Vec<CopyNumberCountByGene>, StoreError> {
            self.check()?;
            self.queries.borrow_mut().push(RecordedQuery {
                grouping: "sample",
                mutation_types: Select::none(),
                cna_types: cna_types.clone(),
                call_status: None,
            });
            Ok(self.cna_counts.clone())
        }

        fn patient_cna_counts(
            &self,
            _cohort: &[ProfileCaseIdentifier],
            _genes: &Select<u32>,
            cna_types: &Select<CnaEventType>,
        ) -> Result<Vec<CopyNumberCountByGene>, StoreError> {
            self.check()?;
            self.queries.borrow_mut().push(RecordedQuery {
                grouping: "patient",
                mutation_types: Select::none(),
                cna_types: cna_types.clone(),
                call_status: None,
            });
            Ok(self.cna_counts.clone())
        }
    }

    /// Resolver double serving fixed coverage rows.
    #[derive(Default)]
    struct FixedResolver {
        coverage: Vec<CasePanelCoverage>,
    }

    impl GenePanelResolver for FixedResolver {
        fn sample_panel_coverage(
            &self,
            _cohort: &[ProfileCaseIdentifier],
        ) -> Result<Vec<CasePanelCoverage>, StoreError> {
            Ok(self.coverage.clone())
        }

        fn patient_panel_coverage(
            &self,
            _cohort: &[ProfileCaseIdentifier],
        ) -> Result<Vec<CasePanelCoverage>, StoreError> {
            Ok(self.coverage.clone())
        }
    }

    fn cohort() -> Vec<ProfileCaseIdentifier> {
        vec![ProfileCaseIdentifier::new(
            String::from("study_mutations"),
            String::from("SAMPLE_01"),
        )]
    }

    fn wes_coverage() -> Vec<CasePanelCoverage> {
        vec![CasePanelCoverage::new(
            String::from("study_mutations"),
            String::from("SAMPLE_01"),
            String::from("PATIENT_01"),
            PanelCoverage::WholeExome,
        )]
    }

    fn one_count() -> Vec<AlterationCountByGene> {
        vec![AlterationCountByGene {
            entrez_gene_id: 672,
            hugo_gene_symbol: String::from("BRCA1"),
            number_of_altered_cases: 1,
            total_count: 1,
            ..Default::default()
        }]
    }

    #[test]
    fn mutation_counts_use_fixed_filters() -> Result<(), StoreError> {
        let store = RecordingStore {
            counts: one_count(),
            ..Default::default()
        };
        let panels = FixedResolver {
            coverage: wes_coverage(),
        };
        let counter = AlterationCounter::new(&store, &panels);

        counter.sample_mutation_counts(
            &cohort(),
            &Select::all(),
            false,
            false,
            &Select::by_values(vec![MutationEventType::MissenseMutation]),
        )?;

        assert_eq!(
            vec![RecordedQuery {
                grouping: "sample",
                mutation_types: Select::by_values(vec![MutationEventType::MissenseMutation]),
                cna_types: Select::none(),
                call_status: Some(CallStatus::Inactive),
            }],
            store.queries.borrow().clone()
        );

        Ok(())
    }

    #[test]
    fn structural_variant_counts_use_fixed_filters() -> Result<(), StoreError> {
        let store = RecordingStore {
            counts: one_count(),
            ..Default::default()
        };
        let panels = FixedResolver {
            coverage: wes_coverage(),
        };
        let counter = AlterationCounter::new(&store, &panels);

        counter.patient_structural_variant_counts(&cohort(), &Select::all(), false, false)?;

        assert_eq!(
            vec![RecordedQuery {
                grouping: "patient",
                mutation_types: Select::all(),
                cna_types: Select::none(),
                call_status: Some(CallStatus::Active),
            }],
            store.queries.borrow().clone()
        );

        Ok(())
    }

    #[test]
    fn frequency_not_requested_leaves_rows_unannotated() -> Result<(), StoreError> {
        let store = RecordingStore {
            counts: one_count(),
            ..Default::default()
        };
        let panels = FixedResolver {
            coverage: wes_coverage(),
        };
        let counter = AlterationCounter::new(&store, &panels);

        let result = counter.sample_mutation_counts(
            &cohort(),
            &Select::all(),
            false,
            false,
            &Select::all(),
        )?;

        assert_eq!(1, result.gene_counts.len());
        assert_eq!(None, result.gene_counts[0].number_of_profiled_cases);
        assert_eq!(None, result.gene_counts[0].alteration_frequency);
        // The cohort-wide count is present regardless.
        assert_eq!(1, result.total_profiled_cases);

        Ok(())
    }

    #[test]
    fn frequency_requested_annotates_rows() -> Result<(), StoreError> {
        let store = RecordingStore {
            counts: one_count(),
            ..Default::default()
        };
        let panels = FixedResolver {
            coverage: wes_coverage(),
        };
        let counter = AlterationCounter::new(&store, &panels);

        let result = counter.sample_mutation_counts(
            &cohort(),
            &Select::all(),
            true,
            false,
            &Select::all(),
        )?;

        assert_eq!(Some(1), result.gene_counts[0].number_of_profiled_cases);
        assert!(float_cmp::approx_eq!(
            f64,
            1.0,
            result.gene_counts[0].alteration_frequency.unwrap(),
            ulps = 2
        ));
        assert_eq!(1, result.total_profiled_cases);

        Ok(())
    }

    #[test]
    fn empty_cohort_short_circuits() -> Result<(), StoreError> {
        let store = RecordingStore {
            counts: one_count(),
            ..Default::default()
        };
        let panels = FixedResolver {
            coverage: wes_coverage(),
        };
        let counter = AlterationCounter::new(&store, &panels);

        let result =
            counter.sample_cna_counts(&[], &Select::all(), true, false, &Select::all())?;

        assert!(result.gene_counts.is_empty());
        assert_eq!(0, result.total_profiled_cases);
        assert!(store.queries.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn profile_not_found_propagates() {
        let store = RecordingStore {
            fail_with_profile: Some(String::from("no_such_profile")),
            ..Default::default()
        };
        let panels = FixedResolver::default();
        let counter = AlterationCounter::new(&store, &panels);

        let result = counter.sample_structural_variant_counts(&cohort(), &Select::all(), true, false);

        assert!(matches!(
            result,
            Err(StoreError::ProfileNotFound { molecular_profile_id }) if molecular_profile_id == "no_such_profile"
        ));
    }

    #[test]
    fn repeated_queries_are_idempotent() -> Result<(), StoreError> {
        let store = RecordingStore {
            cna_counts: vec![CopyNumberCountByGene {
                entrez_gene_id: 672,
                hugo_gene_symbol: String::from("BRCA1"),
                alteration: CnaEventType::Amp,
                number_of_altered_cases: 1,
                ..Default::default()
            }],
            ..Default::default()
        };
        let panels = FixedResolver {
            coverage: wes_coverage(),
        };
        let counter = AlterationCounter::new(&store, &panels);

        let first =
            counter.sample_cna_counts(&cohort(), &Select::all(), true, false, &Select::all())?;
        let second =
            counter.sample_cna_counts(&cohort(), &Select::all(), true, false, &Select::all())?;

        assert_eq!(first, second);

        Ok(())
    }
}
