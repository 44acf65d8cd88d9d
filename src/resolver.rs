//! Identifier resolution against the NCBI E-utilities service
//!
//! The chain only moves forward, DOI -> PMID -> PMCID -> full-text XML,
//! entering at whichever identifier the caller supplied:
//!
//! - `esearch.fcgi?db=pubmed&term={doi}[doi]` maps a DOI to PMIDs
//! - `esearch.fcgi?dbfrom=pubmed&db=pmc&term={pmid}[pmid]` maps a PMID to PMC ids
//! - `efetch.fcgi?db=pmc&id={pmcid}&retmode=xml` returns the JATS document
//!
//! When a search returns several candidates the first one is used. Each
//! stage issues exactly one blocking request; any failure ends the chain.

use std::{fs, path::PathBuf, time::Duration};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::{
    article::ArticleXml,
    error::{ResolutionError, ResolutionStage},
    types::ArticleIdentifier,
    utils::{DecodeBytes, excerpt},
};

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Length of the payload preview attached to [ResolutionError::MalformedDocument]
const EXCERPT_LEN: usize = 120;

/// Settings for the resolution chain
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Base URL of the E-utilities service, without trailing `/`
    pub base_url: String,

    /// Timeout of the DOI and PMID searches
    pub search_timeout: Duration,

    /// Timeout of the full-text fetch, longer since the payload is large
    pub fetch_timeout: Duration,

    pub user_agent: String,

    /// If set, the raw full-text payload is written here before parsing
    pub debug_dump: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            search_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(30),
            user_agent: format!("pmc2epub/{}", env!("CARGO_PKG_VERSION")),
            debug_dump: None,
        }
    }
}

impl ResolverConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeouts(mut self, search: Duration, fetch: Duration) -> Self {
        self.search_timeout = search;
        self.fetch_timeout = fetch;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_debug_dump(mut self, path: Option<PathBuf>) -> Self {
        self.debug_dump = path;
        self
    }
}

/// The outbound HTTP seam of the resolver
///
/// `get` performs one blocking GET of `url` with the given query pairs and
/// returns the body. Timeouts, connection failures and non-2xx statuses are
/// reported as an `Err` with a readable message.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, &str)], timeout: Duration) -> Result<Vec<u8>, String>;
}

/// [Transport] backed by a blocking reqwest client
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, &str)], timeout: Duration) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| err.to_string())?;

        let body = response.bytes().map_err(|err| err.to_string())?;
        Ok(body.to_vec())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Resolves an [ArticleIdentifier] to its full-text [ArticleXml]
pub struct Resolver<T: Transport = HttpTransport> {
    transport: T,
    config: ResolverConfig,
}

impl Resolver<HttpTransport> {
    /// Create a resolver talking to E-utilities over HTTP
    pub fn new(config: ResolverConfig) -> Result<Self, ResolutionError> {
        let transport =
            HttpTransport::new(&config.user_agent).map_err(|err| ResolutionError::TransportError {
                stage: ResolutionStage::Setup,
                message: err.to_string(),
            })?;

        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Resolver<T> {
    pub fn with_transport(transport: T, config: ResolverConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Runs the resolution chain from the supplied identifier
    ///
    /// # Return
    /// - `Ok(ArticleXml)`: the parsed full-text document
    /// - `Err(ResolutionError)`: the first failing stage; input errors are
    ///   reported before any request is made
    pub fn resolve(&self, identifier: &ArticleIdentifier) -> Result<ArticleXml, ResolutionError> {
        identifier.ensure_not_blank()?;
        info!("Resolving {}", identifier);

        let pmcid = match identifier {
            ArticleIdentifier::Doi(doi) => {
                let pmid = self.pmid_for_doi(doi.trim())?;
                self.pmcid_for_pmid(&pmid)?
            }
            ArticleIdentifier::Pmid(pmid) => self.pmcid_for_pmid(pmid)?,
            ArticleIdentifier::Pmcid(pmcid) => pmcid.clone(),
        };

        let pmcid = normalize_pmcid(&pmcid)?;
        self.fetch_article(&pmcid)
    }

    /// Looks up the PMID of a DOI, taking the first match
    pub fn pmid_for_doi(&self, doi: &str) -> Result<String, ResolutionError> {
        let term = format!("{}[doi]", doi);
        let ids = self.search(
            ResolutionStage::DoiSearch,
            &[("db", "pubmed"), ("term", &term), ("retmode", "json")],
        )?;

        let Some(pmid) = ids.into_iter().next() else {
            return Err(ResolutionError::NotFound {
                reason: format!("no PMID for DOI {}", doi),
            });
        };

        info!("DOI {} converted to PMID {}", doi, pmid);
        Ok(pmid)
    }

    /// Looks up the PMC id of a PMID, taking the first match
    ///
    /// The PMID is validated before any request is made.
    pub fn pmcid_for_pmid(&self, pmid: &str) -> Result<String, ResolutionError> {
        let pmid = normalize_pmid(pmid)?;
        let term = format!("{}[pmid]", pmid);
        let ids = self.search(
            ResolutionStage::PmidSearch,
            &[
                ("dbfrom", "pubmed"),
                ("db", "pmc"),
                ("term", &term),
                ("retmode", "json"),
            ],
        )?;

        let Some(pmcid) = ids.into_iter().next() else {
            return Err(ResolutionError::NotFound {
                reason: format!("no PMCID for PMID {}", pmid),
            });
        };

        info!("PMID {} converted to PMCID PMC{}", pmid, pmcid);
        Ok(pmcid)
    }

    /// Fetches and parses the full-text XML of a PMC id
    ///
    /// Accepts the id with or without the `PMC` prefix.
    pub fn fetch_article(&self, pmcid: &str) -> Result<ArticleXml, ResolutionError> {
        let pmcid = normalize_pmcid(pmcid)?;
        let url = self.endpoint("efetch.fcgi");
        debug!("GET {} (PMC{})", url, pmcid);

        let body = self
            .transport
            .get(
                &url,
                &[("db", "pmc"), ("id", &pmcid), ("retmode", "xml")],
                self.config.fetch_timeout,
            )
            .map_err(|message| ResolutionError::TransportError {
                stage: ResolutionStage::Fetch,
                message,
            })?;

        if body.is_empty() {
            return Err(ResolutionError::EmptyResponse { pmcid });
        }

        if let Some(path) = &self.config.debug_dump {
            match fs::write(path, &body) {
                Ok(()) => debug!("raw response written to {}", path.display()),
                Err(err) => warn!("could not write debug dump to {}: {}", path.display(), err),
            }
        }

        let content = body.decode().map_err(|err| ResolutionError::MalformedDocument {
            pmcid: pmcid.clone(),
            reason: err.to_string(),
            excerpt: excerpt(&String::from_utf8_lossy(&body), EXCERPT_LEN),
        })?;

        let doc = ArticleXml::parse(&content).map_err(|err| ResolutionError::MalformedDocument {
            pmcid: pmcid.clone(),
            reason: err.to_string(),
            excerpt: excerpt(&content, EXCERPT_LEN),
        })?;

        // efetch answers unknown or embargoed ids with an <error> element
        if doc.article().is_none() {
            let root = doc.root();
            let error = if root.name == "error" {
                Some(root)
            } else {
                root.find_element_by_name("error")
            };

            if let Some(error) = error {
                return Err(ResolutionError::NotFound {
                    reason: format!("no full text for PMC{}: {}", pmcid, error.text()),
                });
            }
        }

        info!("Fetched full text of PMC{} ({} bytes)", pmcid, body.len());
        Ok(doc)
    }

    fn search(
        &self,
        stage: ResolutionStage,
        query: &[(&str, &str)],
    ) -> Result<Vec<String>, ResolutionError> {
        let url = self.endpoint("esearch.fcgi");
        debug!("GET {} {:?}", url, query);

        let body = self
            .transport
            .get(&url, query, self.config.search_timeout)
            .map_err(|message| ResolutionError::TransportError { stage, message })?;

        let response: SearchResponse =
            serde_json::from_slice(&body).map_err(|err| ResolutionError::TransportError {
                stage,
                message: format!("unreadable search response: {}", err),
            })?;

        Ok(response.esearchresult.idlist)
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), name)
    }
}

/// Resolves an identifier with the default configuration over HTTP
pub fn resolve(identifier: &ArticleIdentifier) -> Result<ArticleXml, ResolutionError> {
    Resolver::new(ResolverConfig::default())?.resolve(identifier)
}

/// Validates a PMID: surrounding whitespace is ignored, the rest must be digits
pub fn normalize_pmid(pmid: &str) -> Result<String, ResolutionError> {
    let trimmed = pmid.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ResolutionError::InvalidArgument {
            reason: format!("malformed PMID \"{}\"", pmid),
        });
    }

    Ok(trimmed.to_string())
}

/// Validates a PMCID and returns its numeric part
///
/// A leading `PMC` prefix is stripped case-insensitively, together with
/// surrounding whitespace: `"PMC9953331"`, `"pmc9953331"` and `"9953331"`
/// all yield `"9953331"`.
pub fn normalize_pmcid(pmcid: &str) -> Result<String, ResolutionError> {
    let trimmed = pmcid.trim();
    let numeric = match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("pmc") => trimmed[3..].trim(),
        _ => trimmed,
    };

    if numeric.is_empty() || !numeric.chars().all(|c| c.is_ascii_digit()) {
        return Err(ResolutionError::InvalidArgument {
            reason: format!("malformed PMCID \"{}\"", pmcid),
        });
    }

    Ok(numeric.to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::VecDeque,
        io::{Read, Write},
        net::TcpListener,
        thread,
        time::Duration,
    };

    use crate::{
        error::{ResolutionError, ResolutionStage},
        resolver::{
            HttpTransport, Resolver, ResolverConfig, Transport, normalize_pmcid, normalize_pmid,
        },
        types::ArticleIdentifier,
    };

    const ARTICLE: &str = r#"<pmc-articleset><article xml:lang="en"><front><article-meta>
        <article-id pub-id-type="doi">10.3390/biom13020339</article-id>
        <title-group><article-title>A Title</article-title></title-group>
    </article-meta></front></article></pmc-articleset>"#;

    struct Request {
        url: String,
        query: Vec<(String, String)>,
        timeout: Duration,
    }

    impl Request {
        fn param(&self, key: &str) -> Option<&str> {
            self.query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Replays queued responses and records every request
    #[derive(Default)]
    struct MockTransport {
        responses: RefCell<VecDeque<Result<Vec<u8>, String>>>,
        requests: RefCell<Vec<Request>>,
    }

    impl MockTransport {
        fn respond(self, response: Result<&str, &str>) -> Self {
            self.responses.borrow_mut().push_back(
                response
                    .map(|body| body.as_bytes().to_vec())
                    .map_err(str::to_string),
            );
            self
        }
    }

    impl MockTransport {
        fn respond_bytes(self, body: Vec<u8>) -> Self {
            self.responses.borrow_mut().push_back(Ok(body));
            self
        }
    }

    impl Transport for MockTransport {
        fn get(
            &self,
            url: &str,
            query: &[(&str, &str)],
            timeout: Duration,
        ) -> Result<Vec<u8>, String> {
            self.requests.borrow_mut().push(Request {
                url: url.to_string(),
                query: query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                timeout,
            });
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err("no response queued".to_string()))
        }
    }

    fn idlist(ids: &[&str]) -> String {
        let ids = ids
            .iter()
            .map(|id| format!("\"{}\"", id))
            .collect::<Vec<_>>()
            .join(",");
        format!(r#"{{"header":{{}},"esearchresult":{{"count":"1","idlist":[{}]}}}}"#, ids)
    }

    /// Serves a single HTTP response on a local port and returns its base URL
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        });

        format!("http://{}", addr)
    }

    fn resolver(transport: MockTransport) -> Resolver<MockTransport> {
        Resolver::with_transport(
            transport,
            ResolverConfig::default().with_base_url("https://eutils.test/entrez/eutils/"),
        )
    }

    #[test]
    fn test_normalize_pmid() {
        assert_eq!(normalize_pmid("36830707").unwrap(), "36830707");
        assert_eq!(normalize_pmid(" 36830707\n").unwrap(), "36830707");
        assert!(normalize_pmid("").is_err());
        assert!(normalize_pmid("3683a707").is_err());
    }

    #[test]
    fn test_normalize_pmcid() {
        assert_eq!(normalize_pmcid("PMC9953331").unwrap(), "9953331");
        assert_eq!(normalize_pmcid("9953331").unwrap(), "9953331");
        assert_eq!(normalize_pmcid("pmc9953331").unwrap(), "9953331");
        assert_eq!(normalize_pmcid("  PmC 9953331 ").unwrap(), "9953331");
        assert_eq!(
            normalize_pmcid("PMC").unwrap_err(),
            ResolutionError::InvalidArgument {
                reason: "malformed PMCID \"PMC\"".to_string()
            }
        );
        assert!(normalize_pmcid("PMC12x").is_err());
        assert!(normalize_pmcid("é").is_err());
    }

    /// Test that prefixed and bare PMCIDs reach the fetch with the same id
    #[test]
    fn test_pmcid_prefix_reaches_same_fetch() {
        for input in ["PMC9953331", "9953331"] {
            let resolver = resolver(MockTransport::default().respond(Ok(ARTICLE)));
            let doc = resolver.resolve(&ArticleIdentifier::Pmcid(input.to_string()));
            assert!(doc.is_ok());

            let requests = resolver.transport.requests.borrow();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].url, "https://eutils.test/entrez/eutils/efetch.fcgi");
            assert_eq!(requests[0].param("db"), Some("pmc"));
            assert_eq!(requests[0].param("id"), Some("9953331"));
            assert_eq!(requests[0].param("retmode"), Some("xml"));
        }
    }

    /// Test the whole DOI -> PMID -> PMCID -> fetch chain
    #[test]
    fn test_resolve_doi_chain() {
        let transport = MockTransport::default()
            .respond(Ok(idlist(&["36830707", "11111111"]).as_str()))
            .respond(Ok(idlist(&["9953331"]).as_str()))
            .respond(Ok(ARTICLE));
        let resolver = resolver(transport);

        let doc = resolver
            .resolve(&ArticleIdentifier::Doi("10.3390/biom13020339".to_string()))
            .unwrap();
        assert!(doc.article().is_some());

        let requests = resolver.transport.requests.borrow();
        assert_eq!(requests.len(), 3);

        assert!(requests[0].url.ends_with("/esearch.fcgi"));
        assert_eq!(requests[0].param("db"), Some("pubmed"));
        assert_eq!(requests[0].param("term"), Some("10.3390/biom13020339[doi]"));
        assert_eq!(requests[0].param("retmode"), Some("json"));

        assert_eq!(requests[1].param("dbfrom"), Some("pubmed"));
        assert_eq!(requests[1].param("db"), Some("pmc"));
        assert_eq!(requests[1].param("term"), Some("36830707[pmid]"));

        assert_eq!(requests[2].param("id"), Some("9953331"));
        assert!(requests[2].timeout > requests[0].timeout);
        assert_eq!(requests[0].timeout, requests[1].timeout);
    }

    #[test]
    fn test_resolve_blank_identifier_no_request() {
        let resolver = resolver(MockTransport::default());
        let result = resolver.resolve(&ArticleIdentifier::Pmcid("  ".to_string()));

        assert!(matches!(
            result,
            Err(ResolutionError::InvalidArgument { .. })
        ));
        assert!(resolver.transport.requests.borrow().is_empty());
    }

    /// Test that a DOI passed as PMID is rejected before any request
    #[test]
    fn test_resolve_malformed_pmid_no_request() {
        let resolver = resolver(MockTransport::default());
        let result = resolver.resolve(&ArticleIdentifier::Pmid("10.3390/biom13020339".to_string()));

        assert_eq!(
            result.unwrap_err(),
            ResolutionError::InvalidArgument {
                reason: "malformed PMID \"10.3390/biom13020339\"".to_string()
            }
        );
        assert!(resolver.transport.requests.borrow().is_empty());
    }

    #[test]
    fn test_resolve_malformed_pmcid_no_request() {
        let resolver = resolver(MockTransport::default());
        let result = resolver.resolve(&ArticleIdentifier::Pmcid("PMCabc".to_string()));

        assert!(matches!(
            result,
            Err(ResolutionError::InvalidArgument { .. })
        ));
        assert!(resolver.transport.requests.borrow().is_empty());
    }

    /// Test that an empty DOI search stops the chain before the PMID stage
    #[test]
    fn test_resolve_doi_not_found() {
        let resolver = resolver(MockTransport::default().respond(Ok(idlist(&[]).as_str())));
        let result = resolver.resolve(&ArticleIdentifier::Doi("jaja xd xd".to_string()));

        assert_eq!(
            result.unwrap_err(),
            ResolutionError::NotFound {
                reason: "no PMID for DOI jaja xd xd".to_string()
            }
        );
        assert_eq!(resolver.transport.requests.borrow().len(), 1);
    }

    #[test]
    fn test_resolve_pmid_not_found() {
        let resolver = resolver(MockTransport::default().respond(Ok(r#"{"esearchresult":{}}"#)));
        let result = resolver.resolve(&ArticleIdentifier::Pmid("36830707".to_string()));

        assert_eq!(
            result.unwrap_err(),
            ResolutionError::NotFound {
                reason: "no PMCID for PMID 36830707".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_transport_error_aborts() {
        let transport = MockTransport::default()
            .respond(Ok(idlist(&["36830707"]).as_str()))
            .respond(Err("HTTP status server error (503 Service Unavailable)"));
        let resolver = resolver(transport);

        let err = resolver
            .resolve(&ArticleIdentifier::Doi("10.3390/biom13020339".to_string()))
            .unwrap_err();
        assert_eq!(err.stage(), Some(ResolutionStage::PmidSearch));
        assert!(err.to_string().contains("503"));
        assert_eq!(resolver.transport.requests.borrow().len(), 2);
    }

    #[test]
    fn test_resolve_unreadable_search_response() {
        let resolver = resolver(MockTransport::default().respond(Ok("<html>busy</html>")));
        let err = resolver.pmid_for_doi("10.1/x").unwrap_err();

        assert_eq!(
            err,
            ResolutionError::TransportError {
                stage: ResolutionStage::DoiSearch,
                message: String::new(),
            }
        );
    }

    #[test]
    fn test_fetch_empty_response() {
        let resolver = resolver(MockTransport::default().respond(Ok("")));
        let result = resolver.fetch_article("PMC9953331");

        assert_eq!(
            result.unwrap_err(),
            ResolutionError::EmptyResponse {
                pmcid: "9953331".to_string()
            }
        );
    }

    #[test]
    fn test_fetch_malformed_document() {
        let resolver = resolver(
            MockTransport::default().respond(Ok("Internal   error\n<article><front>")),
        );
        let err = resolver.fetch_article("9953331").unwrap_err();

        match err {
            ResolutionError::MalformedDocument { pmcid, excerpt, .. } => {
                assert_eq!(pmcid, "9953331");
                assert!(excerpt.starts_with("Internal error <article>"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    /// Test that a body with invalid UTF-8 is rejected instead of decoded lossily
    #[test]
    fn test_fetch_invalid_utf8() {
        let mut body = b"<article><article-title>Bad ".to_vec();
        body.extend_from_slice(&[0xFF, 0xFE, 0xC3]);
        body.extend_from_slice(b"</article-title></article>");

        let resolver = resolver(MockTransport::default().respond_bytes(body));
        let err = resolver.fetch_article("1").unwrap_err();

        match err {
            ResolutionError::MalformedDocument { pmcid, excerpt, .. } => {
                assert_eq!(pmcid, "1");
                assert!(excerpt.starts_with("<article><article-title>Bad "));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_fetch_short_document() {
        let resolver = resolver(MockTransport::default().respond(Ok("<a>")));
        let err = resolver.fetch_article("1").unwrap_err();

        assert!(matches!(err, ResolutionError::MalformedDocument { .. }));
        assert!(!err.to_string().contains("empty"));
    }

    #[test]
    fn test_fetch_text_after_root() {
        let resolver = resolver(MockTransport::default().respond(Ok("<article/>junk after root")));
        let err = resolver.fetch_article("1").unwrap_err();

        assert!(matches!(err, ResolutionError::MalformedDocument { .. }));
    }

    #[test]
    fn test_http_transport_success() {
        let base_url = serve_once("HTTP/1.1 200 OK", r#"{"esearchresult":{"idlist":["36830707"]}}"#);
        let resolver =
            Resolver::new(ResolverConfig::default().with_base_url(base_url.as_str())).unwrap();

        assert_eq!(resolver.pmid_for_doi("10.3390/biom13020339").unwrap(), "36830707");
    }

    /// Test that a non-2xx status from the server is a transport error
    #[test]
    fn test_http_transport_error_status() {
        let base_url = serve_once("HTTP/1.1 503 Service Unavailable", "");
        let transport = HttpTransport::new("pmc2epub-test").unwrap();
        let result = transport.get(
            &format!("{}/esearch.fcgi", base_url),
            &[("db", "pubmed")],
            Duration::from_secs(5),
        );
        assert!(result.unwrap_err().contains("503"));

        let base_url = serve_once("HTTP/1.1 503 Service Unavailable", "");
        let resolver =
            Resolver::new(ResolverConfig::default().with_base_url(base_url.as_str())).unwrap();
        assert_eq!(
            resolver.pmid_for_doi("10.3390/biom13020339").unwrap_err(),
            ResolutionError::TransportError {
                stage: ResolutionStage::DoiSearch,
                message: String::new(),
            }
        );
    }

    #[test]
    fn test_http_transport_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new("pmc2epub-test").unwrap();
        let result = transport.get(&format!("http://{}/efetch.fcgi", addr), &[], Duration::from_secs(5));
        assert!(result.is_err());
    }

    #[test]
    fn test_fetch_error_payload() {
        let resolver = resolver(MockTransport::default().respond(Ok(
            "<pmc-articleset><error>The following PMCID is not available: 1</error></pmc-articleset>",
        )));
        let err = resolver.fetch_article("1").unwrap_err();

        assert_eq!(
            err,
            ResolutionError::NotFound {
                reason: "no full text for PMC1: The following PMCID is not available: 1".to_string()
            }
        );
    }

    #[test]
    fn test_fetch_debug_dump() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("debugging.xml");

        let resolver = Resolver::with_transport(
            MockTransport::default().respond(Ok(ARTICLE)),
            ResolverConfig::default().with_debug_dump(Some(dump.clone())),
        );
        assert!(resolver.fetch_article("9953331").is_ok());
        assert_eq!(std::fs::read_to_string(dump).unwrap(), ARTICLE);
    }
}
