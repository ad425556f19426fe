use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::SequenceRecord;
use crate::error::PhyloError;

const TOOL_NAME: &str = "phylofetch";

/// Capability interface over the remote search+retrieve service so that the
/// orchestrator can run against a deterministic fake in tests.
pub trait SequenceDatabase: Send + Sync {
    /// Relevance-ranked record ids matching the query. An empty list is a
    /// valid answer, not an error.
    fn search(&self, query: &str) -> Result<Vec<String>, PhyloError>;

    /// Raw FASTA text for one record id.
    fn fetch(&self, id: &str) -> Result<String, PhyloError>;
}

impl<D: SequenceDatabase + ?Sized> SequenceDatabase for &D {
    fn search(&self, query: &str) -> Result<Vec<String>, PhyloError> {
        (**self).search(query)
    }

    fn fetch(&self, id: &str) -> Result<String, PhyloError> {
        (**self).fetch(id)
    }
}

/// Retrieves the best (first, relevance-ranked) record for a query, or `None`
/// on zero hits. All remaining hits are deliberately ignored; the service's
/// own relevance ordering is treated as opaque and authoritative. Any error
/// from either call surfaces with the query attached — absorbing it is the
/// orchestrator's policy decision, never this function's.
pub fn fetch_best_record<D: SequenceDatabase + ?Sized>(
    db: &D,
    query: &str,
) -> Result<Option<SequenceRecord>, PhyloError> {
    let ids = db.search(query).map_err(|err| PhyloError::Fetch {
        query: query.to_string(),
        message: err.to_string(),
    })?;
    let Some(record_id) = ids.into_iter().next() else {
        return Ok(None);
    };
    let fasta_text = db.fetch(&record_id).map_err(|err| PhyloError::Fetch {
        query: query.to_string(),
        message: err.to_string(),
    })?;
    Ok(Some(SequenceRecord {
        record_id,
        fasta_text,
    }))
}

#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    database: String,
    email: String,
    extra_params: Vec<(String, String)>,
}

impl EntrezHttpClient {
    pub fn new(email: &str, extra_params: Vec<(String, String)>) -> Result<Self, PhyloError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("{TOOL_NAME}/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PhyloError::EntrezHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PhyloError::EntrezHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            database: "nucleotide".to_string(),
            email: email.to_string(),
            extra_params,
        })
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PhyloError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Entrez request failed".to_string());
            return Err(PhyloError::EntrezStatus { status, message });
        }
        Ok(response)
    }
}

impl SequenceDatabase for EntrezHttpClient {
    fn search(&self, query: &str) -> Result<Vec<String>, PhyloError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let mut request = self.client.get(&url).query(&[
            ("db", self.database.as_str()),
            ("term", query),
            ("sort", "relevance"),
            ("retmode", "json"),
            ("tool", TOOL_NAME),
            ("email", self.email.as_str()),
        ]);
        for (key, value) in &self.extra_params {
            request = request.query(&[(key.as_str(), value.as_str())]);
        }

        let response = request
            .send()
            .map_err(|err| PhyloError::EntrezHttp(err.to_string()))?;
        let payload: Value = Self::check_status(response)?
            .json()
            .map_err(|err| PhyloError::EntrezParse(err.to_string()))?;
        parse_id_list(&payload)
    }

    fn fetch(&self, id: &str) -> Result<String, PhyloError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", self.database.as_str()),
                ("id", id),
                ("rettype", "fasta"),
                ("retmode", "text"),
                ("tool", TOOL_NAME),
                ("email", self.email.as_str()),
            ])
            .send()
            .map_err(|err| PhyloError::EntrezHttp(err.to_string()))?;
        Self::check_status(response)?
            .text()
            .map_err(|err| PhyloError::EntrezHttp(err.to_string()))
    }
}

pub fn parse_id_list(payload: &Value) -> Result<Vec<String>, PhyloError> {
    let ids = payload
        .pointer("/esearchresult/idlist")
        .and_then(Value::as_array)
        .ok_or_else(|| PhyloError::EntrezParse("esearchresult.idlist missing".to_string()))?;
    ids.iter()
        .map(|id| {
            id.as_str()
                .map(str::to_string)
                .ok_or_else(|| PhyloError::EntrezParse("non-string id in idlist".to_string()))
        })
        .collect()
}
