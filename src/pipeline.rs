// Bill processing pipeline
//
// Image intake → extraction → normalization → persistence, with partial
// success as a first-class outcome: one failing image never aborts the
// batch, one rejected candidate never blocks its neighbors.

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::error::TrackerError;
use crate::expense::{ExpenseRecord, ExpenseUpdate};
use crate::extraction::BillExtractor;
use crate::intake::RawImage;
use crate::normalize::{normalize_response, SkipNotice};
use crate::store::ExpenseStore;

/// What happened to a single image.
#[derive(Debug)]
pub enum ImageOutcome {
    /// The response parsed; some candidates may still have been skipped
    /// and some inserts may have failed.
    Processed {
        saved: Vec<ExpenseRecord>,
        skipped: Vec<SkipNotice>,
        store_failures: Vec<String>,
    },
    /// Extraction or structural parsing failed; zero records.
    Failed(TrackerError),
}

#[derive(Debug)]
pub struct ImageReport {
    pub label: String,
    pub outcome: ImageOutcome,
}

/// Batch result in upload order. Three-of-five images succeeding is an
/// expected, reportable state, not an error.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<ImageReport>,
}

impl BatchOutcome {
    pub fn saved_records(&self) -> Vec<&ExpenseRecord> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                ImageOutcome::Processed { saved, .. } => Some(saved.iter()),
                ImageOutcome::Failed(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn total_saved(&self) -> usize {
        self.saved_records().len()
    }

    pub fn failed_images(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, ImageOutcome::Failed(_)))
            .count()
    }
}

pub struct BillPipeline<'a> {
    extractor: &'a dyn BillExtractor,
    store: &'a dyn ExpenseStore,
}

impl<'a> BillPipeline<'a> {
    pub fn new(extractor: &'a dyn BillExtractor, store: &'a dyn ExpenseStore) -> Self {
        BillPipeline { extractor, store }
    }

    /// Process a batch of images for one person.
    ///
    /// Extraction calls run concurrently — images share no mutable state —
    /// but reports come back in upload order, and inserts happen in that
    /// order too so ids follow the bill sequence.
    ///
    /// `processing_date` is the date stamped on records whose bill carries
    /// no usable date.
    #[instrument(skip(self, images), fields(count = images.len(), person))]
    pub async fn process_images(
        &self,
        images: Vec<RawImage>,
        person: &str,
        processing_date: NaiveDate,
    ) -> BatchOutcome {
        let extractions = join_all(images.iter().map(|image| self.extractor.extract(image))).await;

        let mut outcome = BatchOutcome::default();
        for (image, extraction) in images.iter().zip(extractions) {
            let report = match extraction {
                Err(e) => {
                    warn!(image = %image.label, error = %e, "extraction failed");
                    ImageOutcome::Failed(e)
                }
                Ok(text) => match normalize_response(&text, processing_date, person) {
                    Err(e) => {
                        warn!(image = %image.label, error = %e, "response not parseable");
                        ImageOutcome::Failed(e)
                    }
                    Ok(bill) => {
                        let mut saved = Vec::new();
                        let mut store_failures = Vec::new();
                        for record in bill.records {
                            match self.store.insert(record).await {
                                Ok(persisted) => saved.push(persisted),
                                Err(e) => store_failures.push(e.to_string()),
                            }
                        }
                        info!(
                            image = %image.label,
                            saved = saved.len(),
                            skipped = bill.skipped.len(),
                            "image processed"
                        );
                        ImageOutcome::Processed {
                            saved,
                            skipped: bill.skipped,
                            store_failures,
                        }
                    }
                },
            };
            outcome.reports.push(ImageReport {
                label: image.label.clone(),
                outcome: report,
            });
        }
        outcome
    }

    /// Review/edit path: corrections pass the same coercion rules as
    /// initial extraction before being written back.
    pub async fn apply_update(
        &self,
        id: i64,
        update: &ExpenseUpdate,
    ) -> Result<ExpenseRecord, TrackerError> {
        update.validate()?;
        self.store.update(id, update).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::{Category, ExpenseFilter};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Extractor returning canned text per image label; no network.
    struct StubExtractor {
        responses: HashMap<String, Result<String, String>>,
    }

    impl StubExtractor {
        fn new(entries: &[(&str, Result<&str, &str>)]) -> Self {
            StubExtractor {
                responses: entries
                    .iter()
                    .copied()
                    .map(|(label, result)| {
                        (
                            label.to_string(),
                            result.map(str::to_string).map_err(str::to_string),
                        )
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl BillExtractor for StubExtractor {
        async fn extract(&self, image: &RawImage) -> Result<String, TrackerError> {
            match self.responses.get(&image.label) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(reason)) => Err(TrackerError::extraction(reason.clone())),
                None => panic!("no stubbed response for {}", image.label),
            }
        }
    }

    fn image(label: &str) -> RawImage {
        RawImage::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0], label).unwrap()
    }

    fn processing_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_milk_scenario() {
        let extractor = StubExtractor::new(&[(
            "bill1.jpg",
            Ok(r#"[{"item":"Milk","quantity":"1L","date":"2024-03-01","amount":"3.50","category":"Groceries"},
                   {"item":"","amount":"9.99"}]"#),
        )]);
        let store = MemoryStore::new();
        let pipeline = BillPipeline::new(&extractor, &store);

        let outcome = pipeline
            .process_images(vec![image("bill1.jpg")], "Harsha", processing_date())
            .await;

        // Exactly one persisted record: Milk.
        assert_eq!(outcome.total_saved(), 1);
        let listed = store.list(&ExpenseFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].item, "Milk");
        assert_eq!(listed[0].quantity, "1L");
        assert_eq!(listed[0].amount, 3.50);
        assert_eq!(listed[0].category, Category::Groceries);
        assert_eq!(listed[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(listed[0].person, "Harsha");

        // The empty-item candidate shows up as a skip notice, not a failure.
        match &outcome.reports[0].outcome {
            ImageOutcome::Processed { skipped, .. } => assert_eq!(skipped.len(), 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prose_response_yields_parse_failure_not_panic() {
        let extractor = StubExtractor::new(&[(
            "bill1.jpg",
            Ok("Sorry, this image shows a cat, not a receipt."),
        )]);
        let store = MemoryStore::new();
        let pipeline = BillPipeline::new(&extractor, &store);

        let outcome = pipeline
            .process_images(vec![image("bill1.jpg")], "Harsha", processing_date())
            .await;

        assert_eq!(outcome.total_saved(), 0);
        assert_eq!(outcome.failed_images(), 1);
        match &outcome.reports[0].outcome {
            ImageOutcome::Failed(e) => assert!(matches!(e, TrackerError::ParseFailure { .. })),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(store.list(&ExpenseFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_failing_image_does_not_block_the_batch() {
        let extractor = StubExtractor::new(&[
            ("a.jpg", Err("quota exceeded")),
            ("b.jpg", Ok(r#"{"items": [{"item": "Eggs", "amount": 4.0}]}"#)),
        ]);
        let store = MemoryStore::new();
        let pipeline = BillPipeline::new(&extractor, &store);

        let outcome = pipeline
            .process_images(vec![image("a.jpg"), image("b.jpg")], "Nishant", processing_date())
            .await;

        assert_eq!(outcome.failed_images(), 1);
        assert_eq!(outcome.total_saved(), 1);

        // Reports stay in upload order regardless of which image failed.
        assert_eq!(outcome.reports[0].label, "a.jpg");
        assert!(matches!(
            &outcome.reports[0].outcome,
            ImageOutcome::Failed(TrackerError::ExtractionFailure { .. })
        ));
        assert_eq!(outcome.reports[1].label, "b.jpg");
    }

    #[tokio::test]
    async fn test_missing_date_stamps_processing_date() {
        let extractor = StubExtractor::new(&[(
            "bill.jpg",
            Ok(r#"{"items": [{"item": "Soap", "amount": 2.0, "category": "Personal Care"}]}"#),
        )]);
        let store = MemoryStore::new();
        let pipeline = BillPipeline::new(&extractor, &store);

        pipeline
            .process_images(vec![image("bill.jpg")], "", processing_date())
            .await;

        let listed = store.list(&ExpenseFilter::default()).await.unwrap();
        assert_eq!(listed[0].date, processing_date());
        assert_eq!(listed[0].category, Category::PersonalCare);
        assert_eq!(listed[0].person, "");
    }

    #[tokio::test]
    async fn test_apply_update_revalidates_before_writing() {
        let extractor = StubExtractor::new(&[]);
        let store = MemoryStore::new();
        let saved = store
            .insert(crate::expense::NewExpense {
                item: "Milk".to_string(),
                quantity: "1L".to_string(),
                date: processing_date(),
                amount: 3.5,
                category: Category::Groceries,
                person: String::new(),
            })
            .await
            .unwrap();
        let pipeline = BillPipeline::new(&extractor, &store);

        let bad = pipeline
            .apply_update(saved.id, &ExpenseUpdate { item: Some("  ".into()), ..Default::default() })
            .await;
        assert!(matches!(bad, Err(TrackerError::RecordRejected { .. })));

        let good = pipeline
            .apply_update(saved.id, &ExpenseUpdate { amount: Some(4.0), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(good.amount, 4.0);
    }

    #[tokio::test]
    async fn test_update_stale_id_is_not_found() {
        let extractor = StubExtractor::new(&[]);
        let store = MemoryStore::new();
        let pipeline = BillPipeline::new(&extractor, &store);

        let result = pipeline
            .apply_update(404, &ExpenseUpdate { amount: Some(1.0), ..Default::default() })
            .await;
        assert!(result.unwrap_err().is_not_found());
    }
}
