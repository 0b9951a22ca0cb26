use crate::error::MatchError;
use crate::insertion::{delete_duplicates, insert_record};
use crate::loader::ImageSource;
use crate::merge::merge;
use crate::models::{Candidate, Record, SearchConfig, SearchOptions, SearchResult};
use crate::orientation::expand;
use crate::query::{retrieve, QueryBuilder};
use crate::rerank::rerank;
use crate::traits::{DocumentStore, SignatureGenerator};
use futures::future::try_join_all;
use image::GrayImage;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

/// Two-stage near-duplicate search: word overlap candidates from the store, then an exact
/// signature distance rerank, optionally repeated for every orientation of the query.
pub struct SignatureSearch<S, G>
where
    S: DocumentStore,
    G: SignatureGenerator,
{
    store: S,
    generator: G,
    config: SearchConfig,
    queries: QueryBuilder,
    http: Client,
}

impl<S, G> SignatureSearch<S, G>
where
    S: DocumentStore,
    G: SignatureGenerator,
{
    pub fn new(store: S, generator: G, config: SearchConfig) -> Result<Self, MatchError> {
        config.validate()?;
        if config.n != generator.signature_len() {
            return Err(MatchError::InvalidConfig(format!(
                "n {} does not match generator signature length {}",
                config.n,
                generator.signature_len()
            )));
        }

        Ok(Self {
            store,
            generator,
            queries: QueryBuilder::new(config.min_overlap),
            config,
            http: Client::new(),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn make_record(
        &self,
        path: impl Into<String>,
        image: &GrayImage,
        metadata: Option<Value>,
    ) -> Result<Record, MatchError> {
        let signature = self.generator.signature_of(image)?;
        let record = Record::new(path, signature.signature, signature.words, metadata);
        record.validate(self.config.n)?;
        Ok(record)
    }

    /// One retrieval + rerank pass for an already built record.
    pub async fn search_record(
        &self,
        record: &Record,
        pre_filter: Option<&Value>,
    ) -> Result<Vec<Candidate>, MatchError> {
        record.validate(self.config.n)?;
        let query = self.queries.build(&record.words, pre_filter);
        let candidates = retrieve(
            &self.store,
            &query,
            self.config.result_limit,
            self.config.timeout,
        )
        .await?;
        rerank(&record.signature, candidates, self.config.distance_cutoff)
    }

    pub async fn search_image(
        &self,
        source: &ImageSource,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, MatchError> {
        let image = source.load(&self.http).await?;
        self.search_pixels(&image, options).await
    }

    pub async fn search_pixels(
        &self,
        image: &GrayImage,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, MatchError> {
        let transforms = expand(image, options.all_orientations);
        let records = transforms
            .iter()
            .map(|transformed| {
                debug!(orientation = ?transformed.orientation, "building orientation pass");
                self.make_record(String::new(), &transformed.image, None)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let passes = records
            .iter()
            .map(|record| self.search_record(record, options.pre_filter.as_ref()));
        let batches = try_join_all(passes).await?;

        let results = merge(batches);
        info!(
            passes = records.len(),
            results = results.len(),
            "image search finished"
        );
        Ok(results)
    }

    /// Indexes an image under `path`; the pixels may come from a different source.
    pub async fn add_image(
        &self,
        path: &str,
        source: &ImageSource,
        metadata: Option<Value>,
    ) -> Result<String, MatchError> {
        let image = source.load(&self.http).await?;
        self.add_pixels(path, &image, metadata).await
    }

    pub async fn add_pixels(
        &self,
        path: &str,
        image: &GrayImage,
        metadata: Option<Value>,
    ) -> Result<String, MatchError> {
        let record = self.make_record(path, image, metadata)?;
        self.insert(&record).await
    }

    pub async fn insert(&self, record: &Record) -> Result<String, MatchError> {
        record.validate(self.config.n)?;
        insert_record(&self.store, record, self.config.refresh_after).await
    }

    pub async fn delete_duplicates(&self, path: &str) -> Result<usize, MatchError> {
        delete_duplicates(&self.store, path).await
    }
}
