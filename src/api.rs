use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;

use crate::error::{PainelError, Result};
use crate::models::{parse_dre_document, AccountRow, DreQuery};
use crate::settings::Session;

pub const DRE_PATH: &str = "api/dre/por-nivel1-e-nivel2-e-nivel3";
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Blocking client for the dashboard backend. The session's token and
/// organization travel as default headers on every request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(api_url: &str, session: &Session) -> Result<Self> {
        let base_url = parse_base_url(api_url)?;
        let http = Client::builder()
            .default_headers(session_headers(session)?)
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn dre_url(&self, query: &DreQuery) -> Result<Url> {
        let mut url = self
            .base_url
            .join(DRE_PATH)
            .map_err(|e| PainelError::Settings(format!("invalid DRE URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("idorganizacao", &query.organization_id.to_string())
            .append_pair("modelo", query.modelo.as_str())
            .append_pair("ano", &query.year.to_string())
            .append_pair("tipo", &query.tipo);
        Ok(url)
    }

    pub fn fetch_dre(&self, query: &DreQuery) -> Result<Vec<AccountRow>> {
        let url = self.dre_url(query)?;
        tracing::debug!(%url, "requesting DRE");
        let body = self.http.get(url).send()?.error_for_status()?.text()?;
        let rows = parse_dre_document(&body)?;
        tracing::info!(rows = rows.len(), year = query.year, modelo = %query.modelo, "DRE loaded");
        Ok(rows)
    }
}

/// Base URL with a trailing slash so relative joins keep any path prefix.
fn parse_base_url(api_url: &str) -> Result<Url> {
    let trimmed = api_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| PainelError::Settings(format!("invalid API URL '{trimmed}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PainelError::Settings(format!(
            "unsupported scheme '{other}' in API URL"
        ))),
    }
}

fn session_headers(session: &Session) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = session.token.as_deref().filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| PainelError::Settings("token contains invalid characters".into()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    if let Some(id) = session.organization_id {
        headers.insert(ORGANIZATION_HEADER, HeaderValue::from(id));
    }
    Ok(headers)
}

// ---------------------------------------------------------------------------
// Request sequencing
// ---------------------------------------------------------------------------

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Hands out increasing tickets so that only the response to the most
/// recent request is applied; earlier responses arriving late are stale.
#[derive(Debug, Clone, Default)]
pub struct RequestSequence {
    latest: Arc<AtomicU64>,
}

impl RequestSequence {
    pub fn begin(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Modelo;

    fn session() -> Session {
        Session {
            token: Some("tok123".to_string()),
            organization_id: Some(42),
            ..Session::default()
        }
    }

    #[test]
    fn test_dre_url_carries_query() {
        let client = ApiClient::new("https://api.example.com", &session()).unwrap();
        let url = client
            .dre_url(&DreQuery::realizado(42, Modelo::Emissao, 2024))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/dre/por-nivel1-e-nivel2-e-nivel3?idorganizacao=42&modelo=EMISSAO&ano=2024&tipo=REALIZADO"
        );
    }

    #[test]
    fn test_base_url_path_prefix_is_kept() {
        let client = ApiClient::new("http://host:8080/backend", &Session::default()).unwrap();
        let url = client.dre_url(&DreQuery::realizado(1, Modelo::Cmv, 2025)).unwrap();
        assert!(url.as_str().starts_with("http://host:8080/backend/api/dre/"));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(ApiClient::new("not a url", &Session::default()).is_err());
        assert!(ApiClient::new("ftp://host", &Session::default()).is_err());
    }

    #[test]
    fn test_session_headers() {
        let headers = session_headers(&session()).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok123");
        assert_eq!(headers.get(ORGANIZATION_HEADER).unwrap(), "42");
        assert!(session_headers(&Session::default()).unwrap().is_empty());
    }

    #[test]
    fn test_only_latest_ticket_is_current() {
        let seq = RequestSequence::default();
        let first = seq.begin();
        assert!(seq.is_current(first));
        let second = seq.begin();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn test_sequence_shared_across_clones() {
        let seq = RequestSequence::default();
        let worker = seq.clone();
        let ticket = worker.begin();
        assert!(seq.is_current(ticket));
        seq.begin();
        assert!(!worker.is_current(ticket));
    }
}
