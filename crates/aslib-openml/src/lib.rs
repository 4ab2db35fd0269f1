//! Fetch collaborators for the conversion engine: a blocking OpenML REST
//! client (paged evaluation listing, dataset qualities, flow and setup
//! resolution) and a local-CSV feature source.
//!
//! The OpenML JSON API frequently encodes numbers as strings and collapses
//! one-element lists into bare objects; the deserializers here accept both
//! shapes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use aslib_core::{
    AlgorithmId, ConfigurationId, ConfigurationRegistry, EvaluationRecord, FeatureSource,
    FetchError, SubjectId,
};

const DEFAULT_BASE_URL: &str = "https://www.openml.org/api/v1/json";
const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Blocking OpenML API client.
pub struct OpenMlClient {
    base_url: String,
    page_size: usize,
    http: reqwest::blocking::Client,
    flow_names: Mutex<BTreeMap<AlgorithmId, String>>,
}

/// Optional restrictions on the evaluation listing.
#[derive(Debug, Clone, Default)]
pub struct EvaluationFilter {
    pub setups: Vec<u64>,
    pub tasks: Vec<u64>,
    pub uploader: Option<u64>,
}

/// A study's task and setup id sets, used to filter evaluation listings.
#[derive(Debug, Clone)]
pub struct StudyFilter {
    pub tasks: Vec<u64>,
    pub setups: Vec<u64>,
}

/// Result of a full evaluation listing: the records themselves plus the
/// task-to-dataset mapping captured along the way (needed later to fetch
/// each subject's qualities).
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub records: Vec<EvaluationRecord>,
    pub task_data: BTreeMap<SubjectId, u64>,
}

impl Listing {
    /// Feature source backed by the OpenML qualities endpoint, resolving
    /// subjects through this listing's task-to-dataset mapping.
    pub fn feature_source<'a>(&'a self, client: &'a OpenMlClient) -> QualitiesSource<'a> {
        QualitiesSource {
            client,
            task_data: &self.task_data,
        }
    }
}

enum ApiError {
    /// The server's "no results" answer; ends paging cleanly.
    NoResults,
    Fetch(FetchError),
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NoResults => FetchError::Malformed("server returned no results".to_string()),
            ApiError::Fetch(e) => e,
        }
    }
}

impl OpenMlClient {
    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("aslib-openml/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            http,
            flow_names: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetches a study's task and setup id sets.
    pub fn get_study(&self, study_id: u64) -> Result<StudyFilter, FetchError> {
        let value = self
            .get_json(&format!("study/{}", study_id))
            .map_err(FetchError::from)?;
        let parsed: StudyResponse =
            serde_json::from_value(value).map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(StudyFilter {
            tasks: parsed.study.tasks.map(|t| t.task_id).unwrap_or_default(),
            setups: parsed.study.setups.map(|s| s.setup_id).unwrap_or_default(),
        })
    }

    /// Pages through the evaluation listing until a page shorter than the
    /// page size (or the server's "no results" answer) signals the end.
    pub fn list_evaluations(
        &self,
        measure: &str,
        filter: &EvaluationFilter,
    ) -> Result<Listing, FetchError> {
        let mut listing = Listing::default();
        let mut offset = 0usize;
        loop {
            let path = self.evaluation_path(measure, filter, offset);
            let page = match self.get_json(&path) {
                Ok(value) => value,
                Err(ApiError::NoResults) => break,
                Err(ApiError::Fetch(e)) => return Err(e),
            };
            let parsed: EvaluationListResponse =
                serde_json::from_value(page).map_err(|e| FetchError::Malformed(e.to_string()))?;
            let page_len = parsed.evaluations.evaluation.len();
            debug!(offset, page_len, "fetched evaluation page");
            for raw in parsed.evaluations.evaluation {
                let Some(value) = raw.value else {
                    warn!(task_id = raw.task_id, setup_id = raw.setup_id, "evaluation has no scalar value, skipping");
                    continue;
                };
                listing.task_data.insert(SubjectId(raw.task_id), raw.data_id);
                listing.records.push(EvaluationRecord {
                    subject: SubjectId(raw.task_id),
                    configuration: ConfigurationId(raw.setup_id),
                    algorithm: AlgorithmId(raw.flow_id),
                    value,
                });
            }
            if page_len < self.page_size {
                break;
            }
            offset += self.page_size;
        }
        Ok(listing)
    }

    fn evaluation_path(&self, measure: &str, filter: &EvaluationFilter, offset: usize) -> String {
        let mut path = format!(
            "evaluation/list/function/{}/limit/{}/offset/{}",
            measure, self.page_size, offset
        );
        if !filter.setups.is_empty() {
            path.push_str(&format!("/setup/{}", join_ids(&filter.setups)));
        }
        if !filter.tasks.is_empty() {
            path.push_str(&format!("/task/{}", join_ids(&filter.tasks)));
        }
        if let Some(uploader) = filter.uploader {
            path.push_str(&format!("/uploader/{}", uploader));
        }
        path
    }

    fn fetch_qualities(&self, data_id: u64) -> Result<BTreeMap<String, f64>, FetchError> {
        let value = self
            .get_json(&format!("data/qualities/{}", data_id))
            .map_err(FetchError::from)?;
        let parsed: QualitiesResponse =
            serde_json::from_value(value).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let mut qualities = BTreeMap::new();
        for quality in parsed.data_qualities.quality {
            match numeric_value(&quality.value) {
                Some(v) => {
                    qualities.insert(quality.name, v);
                }
                None => {
                    debug!(name = %quality.name, "skipping non-numeric quality");
                }
            }
        }
        Ok(qualities)
    }

    fn fetch_flow_name(&self, flow_id: AlgorithmId) -> Result<String, FetchError> {
        if let Some(name) = self
            .flow_names
            .lock()
            .map_err(|_| FetchError::Network("flow cache poisoned".to_string()))?
            .get(&flow_id)
        {
            return Ok(name.clone());
        }
        let value = self
            .get_json(&format!("flow/{}", flow_id))
            .map_err(FetchError::from)?;
        let parsed: FlowResponse =
            serde_json::from_value(value).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let name = parsed.flow.name;
        self.flow_names
            .lock()
            .map_err(|_| FetchError::Network("flow cache poisoned".to_string()))?
            .insert(flow_id, name.clone());
        Ok(name)
    }

    fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| ApiError::Fetch(FetchError::Network(e.to_string())))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ApiError::Fetch(FetchError::Network(e.to_string())))?;
        if !status.is_success() {
            if is_no_results(&body) {
                return Err(ApiError::NoResults);
            }
            return Err(ApiError::Fetch(FetchError::Network(format!(
                "{} returned {}: {}",
                url,
                status,
                body.trim()
            ))));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Fetch(FetchError::Malformed(e.to_string())))
    }
}

impl ConfigurationRegistry for OpenMlClient {
    fn resolve_name(
        &self,
        configuration: ConfigurationId,
        algorithm: AlgorithmId,
    ) -> Result<String, FetchError> {
        let flow_name = self.fetch_flow_name(algorithm)?;
        Ok(format!("{}_{}", configuration, flow_name))
    }

    fn resolve_hyperparameters(
        &self,
        configuration: ConfigurationId,
    ) -> Result<BTreeMap<String, String>, FetchError> {
        let value = self
            .get_json(&format!("setup/{}", configuration))
            .map_err(FetchError::from)?;
        let parsed: SetupResponse =
            serde_json::from_value(value).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let mut params = BTreeMap::new();
        for parameter in parsed.setup_parameters.parameter {
            let Some(name) = parameter.full_name.or(parameter.parameter_name) else {
                continue;
            };
            params.insert(name, plain_string(&parameter.value));
        }
        Ok(params)
    }
}

/// Feature source backed by OpenML dataset qualities. Each subject resolves
/// to its dataset through the listing's task-to-dataset mapping.
pub struct QualitiesSource<'a> {
    client: &'a OpenMlClient,
    task_data: &'a BTreeMap<SubjectId, u64>,
}

impl FeatureSource for QualitiesSource<'_> {
    fn fetch_features(&self, subject: SubjectId) -> Result<BTreeMap<String, f64>, FetchError> {
        let data_id = self.task_data.get(&subject).ok_or_else(|| {
            FetchError::Malformed(format!("no dataset recorded for subject {}", subject))
        })?;
        self.client.fetch_qualities(*data_id)
    }
}

/// Feature source reading instance features from a local CSV file: header
/// row `instance,<feature...>`, one row per subject. The whole file is
/// parsed at construction; lookups are in-memory.
pub struct CsvFeatureSource {
    vectors: BTreeMap<SubjectId, BTreeMap<String, f64>>,
}

impl CsvFeatureSource {
    pub fn from_path(path: &Path) -> Result<Self, FetchError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Network(format!("reading {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, FetchError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| FetchError::Malformed("empty feature CSV".to_string()))?;
        let feature_names: Vec<&str> = header.split(',').skip(1).map(str::trim).collect();
        let mut vectors = BTreeMap::new();
        for (line_no, line) in lines.enumerate() {
            let mut fields = line.split(',').map(str::trim);
            let instance = fields
                .next()
                .ok_or_else(|| FetchError::Malformed(format!("row {} is empty", line_no + 2)))?;
            let subject = SubjectId(instance.parse().map_err(|_| {
                FetchError::Malformed(format!(
                    "row {}: instance id '{}' is not an integer",
                    line_no + 2,
                    instance
                ))
            })?);
            let values: Vec<&str> = fields.collect();
            if values.len() != feature_names.len() {
                return Err(FetchError::Malformed(format!(
                    "row {}: expected {} feature values, found {}",
                    line_no + 2,
                    feature_names.len(),
                    values.len()
                )));
            }
            let mut vector = BTreeMap::new();
            for (name, raw) in feature_names.iter().zip(values) {
                let value: f64 = raw.parse().map_err(|_| {
                    FetchError::Malformed(format!(
                        "row {}: feature '{}' value '{}' is not numeric",
                        line_no + 2,
                        name,
                        raw
                    ))
                })?;
                vector.insert((*name).to_string(), value);
            }
            vectors.insert(subject, vector);
        }
        Ok(Self { vectors })
    }
}

impl FeatureSource for CsvFeatureSource {
    fn fetch_features(&self, subject: SubjectId) -> Result<BTreeMap<String, f64>, FetchError> {
        self.vectors.get(&subject).cloned().ok_or_else(|| {
            FetchError::Malformed(format!("subject {} not present in feature CSV", subject))
        })
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_no_results(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let code = value.pointer("/error/code");
    matches!(code, Some(Value::String(s)) if s == "500")
        || matches!(code, Some(Value::Number(n)) if n.as_u64() == Some(500))
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EvaluationListResponse {
    evaluations: EvaluationList,
}

#[derive(Deserialize)]
struct EvaluationList {
    #[serde(default, deserialize_with = "one_or_many")]
    evaluation: Vec<RawEvaluation>,
}

#[derive(Deserialize)]
struct RawEvaluation {
    #[serde(deserialize_with = "u64_lenient")]
    task_id: u64,
    #[serde(deserialize_with = "u64_lenient")]
    setup_id: u64,
    #[serde(deserialize_with = "u64_lenient")]
    flow_id: u64,
    #[serde(deserialize_with = "u64_lenient")]
    data_id: u64,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    value: Option<f64>,
}

#[derive(Deserialize)]
struct StudyResponse {
    study: RawStudy,
}

#[derive(Deserialize)]
struct RawStudy {
    #[serde(default)]
    tasks: Option<StudyTasks>,
    #[serde(default)]
    setups: Option<StudySetups>,
}

#[derive(Deserialize)]
struct StudyTasks {
    #[serde(default, deserialize_with = "u64_vec_lenient")]
    task_id: Vec<u64>,
}

#[derive(Deserialize)]
struct StudySetups {
    #[serde(default, deserialize_with = "u64_vec_lenient")]
    setup_id: Vec<u64>,
}

#[derive(Deserialize)]
struct QualitiesResponse {
    data_qualities: QualityList,
}

#[derive(Deserialize)]
struct QualityList {
    #[serde(default, deserialize_with = "one_or_many")]
    quality: Vec<RawQuality>,
}

#[derive(Deserialize)]
struct RawQuality {
    name: String,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct FlowResponse {
    flow: RawFlow,
}

#[derive(Deserialize)]
struct RawFlow {
    name: String,
}

#[derive(Deserialize)]
struct SetupResponse {
    setup_parameters: SetupParameters,
}

#[derive(Deserialize)]
struct SetupParameters {
    #[serde(default, deserialize_with = "one_or_many")]
    parameter: Vec<RawParameter>,
}

#[derive(Deserialize)]
struct RawParameter {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    parameter_name: Option<String>,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(u64),
    Str(String),
}

impl NumOrString {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            NumOrString::Num(n) => Ok(n),
            NumOrString::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("'{}' is not an integer id", s))),
        }
    }
}

fn u64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    NumOrString::deserialize(d)?.into_u64()
}

fn u64_vec_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u64>, D::Error> {
    let raw: Vec<NumOrString> = Deserialize::deserialize(d)?;
    raw.into_iter().map(NumOrString::into_u64).collect()
}

fn opt_f64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
        Null,
    }
    match Option::<Raw>::deserialize(d)? {
        None | Some(Raw::Null) => Ok(None),
        Some(Raw::Num(v)) => Ok(Some(v)),
        Some(Raw::Str(s)) => Ok(s.trim().parse().ok()),
    }
}

fn one_or_many<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }
    Ok(match OneOrMany::deserialize(d)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(v) => vec![v],
    })
}
