//! Admission pipeline for inbound webhook calls.
//!
//! [`WebhookGate`] runs an ordered list of [`AdmissionStage`]s over an
//! [`InboundRequest`]. The first stage that fails decides the rejection;
//! later stages never run. Cheap header checks come first so that the
//! outbound metadata request is only made for well-formed GitHub calls.
//!
//! | Order | Stage | Rejects when |
//! |-------|-------|--------------|
//! | 1 | [`RequiredHeaders`] | event, delivery, signature header, JSON body or user agent is missing |
//! | 2 | [`UserAgentPrefix`] | user agent lacks the `GitHub-Hookshot/` prefix |
//! | 3 | [`OriginAllowlistStage`] | caller IP is outside the freshly fetched hook ranges |

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use deploy::{
    AdmissionError, DeliveryId, EventName, HookRangeSource, HookRanges, WebhookDelivery,
};
use tracing::{debug, error, instrument, warn};

/// User-agent prefix GitHub uses for webhook deliveries.
pub const GITHUB_USER_AGENT_PREFIX: &str = "GitHub-Hookshot/";

/// Unusual on purpose, so gate rejections are never confused with generic 4xx
/// handling further down the stack.
pub const DEFAULT_REJECT_STATUS: StatusCode = StatusCode::IM_A_TEAPOT;

/// Header names read by the gate.
pub mod header {
    pub const EVENT: &str = "X-GitHub-Event";
    pub const DELIVERY: &str = "X-GitHub-Delivery";
    pub const SIGNATURE: &str = "X-Hub-Signature";
    pub const SIGNATURE_256: &str = "X-Hub-Signature-256";
    pub const USER_AGENT: &str = "User-Agent";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const FORWARDED_FOR: &str = "X-Forwarded-For";
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// What the gate sees of one HTTP call.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    /// Address of the TCP peer.
    pub peer: Option<IpAddr>,
    pub body: Bytes,
}

impl InboundRequest {
    /// Returns a header value if present, valid UTF-8 and non-empty.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns `true` if the body is declared as JSON (`application/json` or
    /// an `application/*+json` type).
    pub fn is_json(&self) -> bool {
        let Some(content_type) = self.header(header::CONTENT_TYPE) else {
            return false;
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        essence == "application/json"
            || (essence.starts_with("application/") && essence.ends_with("+json"))
    }

    /// The caller's address: the first `X-Forwarded-For` entry when
    /// `trust_forwarded_for` is set and the header parses, the TCP peer
    /// otherwise.
    pub fn caller_ip(&self, trust_forwarded_for: bool) -> Option<IpAddr> {
        if trust_forwarded_for {
            let forwarded = self
                .header(header::FORWARDED_FOR)
                .and_then(|value| value.split(',').next())
                .and_then(|first| first.trim().parse::<IpAddr>().ok());
            if forwarded.is_some() {
                return forwarded;
            }
        }
        self.peer
    }

    /// Builds the delivery handed to the deploy handler.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::MissingHeader`] if a required header is unusable.
    /// Cannot happen after [`RequiredHeaders`] has passed.
    pub fn to_delivery(&self) -> Result<WebhookDelivery, AdmissionError> {
        let missing = |header| AdmissionError::MissingHeader { header };
        let event = self
            .header(header::EVENT)
            .and_then(EventName::new)
            .ok_or_else(|| missing(header::EVENT))?;
        let delivery_id = self
            .header(header::DELIVERY)
            .and_then(DeliveryId::new)
            .ok_or_else(|| missing(header::DELIVERY))?;
        let signature = self
            .header(header::SIGNATURE)
            .ok_or_else(|| missing(header::SIGNATURE))?
            .to_string();
        Ok(WebhookDelivery {
            event,
            delivery_id,
            signature,
            signature_256: self.header(header::SIGNATURE_256).map(str::to_string),
            body: self.body.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// One admission check.
#[async_trait]
pub trait AdmissionStage: Send + Sync {
    /// Short name used in log records.
    fn name(&self) -> &'static str;

    async fn check(&self, request: &InboundRequest) -> Result<(), AdmissionError>;
}

/// Requires the GitHub delivery headers and a JSON body.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredHeaders;

#[async_trait]
impl AdmissionStage for RequiredHeaders {
    fn name(&self) -> &'static str {
        "required_headers"
    }

    async fn check(&self, request: &InboundRequest) -> Result<(), AdmissionError> {
        for name in [header::EVENT, header::DELIVERY, header::SIGNATURE] {
            if request.header(name).is_none() {
                return Err(AdmissionError::MissingHeader { header: name });
            }
        }
        if !request.is_json() {
            return Err(AdmissionError::NotJson);
        }
        if request.header(header::USER_AGENT).is_none() {
            return Err(AdmissionError::MissingHeader {
                header: header::USER_AGENT,
            });
        }
        Ok(())
    }
}

/// Requires a vendor prefix on the `User-Agent`.
#[derive(Debug, Clone)]
pub struct UserAgentPrefix {
    prefix: String,
}

impl UserAgentPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UserAgentPrefix {
    fn default() -> Self {
        Self::new(GITHUB_USER_AGENT_PREFIX)
    }
}

#[async_trait]
impl AdmissionStage for UserAgentPrefix {
    fn name(&self) -> &'static str {
        "user_agent"
    }

    async fn check(&self, request: &InboundRequest) -> Result<(), AdmissionError> {
        let user_agent = request.header(header::USER_AGENT).unwrap_or_default();
        if user_agent.starts_with(&self.prefix) {
            Ok(())
        } else {
            Err(AdmissionError::UntrustedUserAgent {
                user_agent: user_agent.to_string(),
                expected_prefix: self.prefix.clone(),
            })
        }
    }
}

/// Requires the caller to be inside the provider's published hook ranges,
/// fetched anew for every call.
pub struct OriginAllowlistStage {
    source: Arc<dyn HookRangeSource>,
    trust_forwarded_for: bool,
}

impl OriginAllowlistStage {
    pub fn new(source: Arc<dyn HookRangeSource>, trust_forwarded_for: bool) -> Self {
        Self {
            source,
            trust_forwarded_for,
        }
    }
}

#[async_trait]
impl AdmissionStage for OriginAllowlistStage {
    fn name(&self) -> &'static str {
        "origin"
    }

    async fn check(&self, request: &InboundRequest) -> Result<(), AdmissionError> {
        let ip = request
            .caller_ip(self.trust_forwarded_for)
            .ok_or(AdmissionError::UnknownOrigin)?;
        let ranges = HookRanges::parse(&self.source.hook_ranges().await?)?;
        debug!(ip = %ip, ranges = ranges.len(), "matching caller against hook ranges");
        if ranges.contains(ip) {
            Ok(())
        } else {
            Err(AdmissionError::UntrustedOrigin { ip })
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// The gate's decision for one call.
#[derive(Debug)]
pub enum Admission {
    /// Not a POST: acknowledge without validating anything.
    Passthrough,
    /// Every stage passed.
    Admitted,
    /// A stage failed; answer with `status` and stop.
    Rejected {
        status: StatusCode,
        cause: AdmissionError,
    },
}

/// Tunables for the standard GitHub pipeline.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub reject_status: StatusCode,
    pub user_agent_prefix: String,
    pub trust_forwarded_for: bool,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            reject_status: DEFAULT_REJECT_STATUS,
            user_agent_prefix: GITHUB_USER_AGENT_PREFIX.to_string(),
            trust_forwarded_for: false,
        }
    }
}

/// Ordered admission pipeline.
pub struct WebhookGate {
    stages: Vec<Box<dyn AdmissionStage>>,
    reject_status: StatusCode,
}

impl WebhookGate {
    /// An empty pipeline that admits every POST.
    pub fn new(reject_status: StatusCode) -> Self {
        Self {
            stages: Vec::new(),
            reject_status,
        }
    }

    /// Headers, user agent, then origin.
    pub fn github(source: Arc<dyn HookRangeSource>, settings: GateSettings) -> Self {
        Self::new(settings.reject_status)
            .with_stage(RequiredHeaders)
            .with_stage(UserAgentPrefix::new(settings.user_agent_prefix))
            .with_stage(OriginAllowlistStage::new(
                source,
                settings.trust_forwarded_for,
            ))
    }

    /// Appends a stage; stages run in insertion order.
    pub fn with_stage(mut self, stage: impl AdmissionStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn reject_status(&self) -> StatusCode {
        self.reject_status
    }

    /// Decides whether `request` reaches the deploy handler.
    #[instrument(skip_all, fields(method = %request.method, delivery_id = request.header(header::DELIVERY).unwrap_or("-")))]
    pub async fn admit(&self, request: &InboundRequest) -> Admission {
        if request.method != Method::POST {
            return Admission::Passthrough;
        }
        for stage in &self.stages {
            if let Err(cause) = stage.check(request).await {
                log_rejection(stage.name(), &cause);
                return Admission::Rejected {
                    status: self.reject_status,
                    cause,
                };
            }
        }
        Admission::Admitted
    }
}

fn log_rejection(stage: &'static str, cause: &AdmissionError) {
    match cause {
        AdmissionError::UntrustedOrigin { ip } => {
            warn!(stage, ip = %ip, "{cause}");
        }
        cause if cause.is_configuration_error() => {
            error!(stage, error = %cause, "admission aborted: hook range metadata unusable");
        }
        cause => {
            error!(stage, "{cause}");
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn request(headers: &[(&'static str, &str)]) -> InboundRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        InboundRequest {
            method: Method::POST,
            headers: map,
            peer: Some("10.1.2.3".parse().unwrap()),
            body: Bytes::from_static(b"{}"),
        }
    }

    #[test]
    fn json_content_types() {
        for ct in [
            "application/json",
            "application/json; charset=utf-8",
            "Application/JSON",
            "application/vnd.github+json",
        ] {
            assert!(request(&[("content-type", ct)]).is_json(), "{ct}");
        }
        for ct in ["application/x-www-form-urlencoded", "text/json", "text/plain"] {
            assert!(!request(&[("content-type", ct)]).is_json(), "{ct}");
        }
        assert!(!request(&[]).is_json());
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_skips_blank_values() {
        let req = request(&[("x-github-event", "push"), ("x-github-delivery", "  ")]);
        assert_eq!(req.header(header::EVENT), Some("push"));
        assert_eq!(req.header(header::DELIVERY), None);
    }

    #[test]
    fn caller_ip_uses_forwarded_for_only_when_trusted() {
        let req = request(&[("x-forwarded-for", "192.30.252.7, 10.0.0.1")]);
        assert_eq!(req.caller_ip(false), Some("10.1.2.3".parse().unwrap()));
        assert_eq!(req.caller_ip(true), Some("192.30.252.7".parse().unwrap()));

        let garbage = request(&[("x-forwarded-for", "unknown")]);
        assert_eq!(garbage.caller_ip(true), Some("10.1.2.3".parse().unwrap()));
    }

    #[test]
    fn delivery_carries_both_signatures() {
        let req = request(&[
            ("x-github-event", "push"),
            ("x-github-delivery", "d-1"),
            ("x-hub-signature", "sha1=aa"),
            ("x-hub-signature-256", "sha256=bb"),
        ]);
        let delivery = req.to_delivery().unwrap();
        assert!(delivery.event.is_push());
        assert_eq!(delivery.delivery_id.as_str(), "d-1");
        assert_eq!(delivery.signature, "sha1=aa");
        assert_eq!(delivery.signature_256.as_deref(), Some("sha256=bb"));
        assert_eq!(delivery.body, b"{}");
    }

    #[tokio::test]
    async fn required_headers_are_checked_in_order() {
        let stage = RequiredHeaders;
        let err = stage.check(&request(&[])).await.unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::MissingHeader {
                header: header::EVENT
            }
        ));

        let err = stage
            .check(&request(&[
                ("x-github-event", "push"),
                ("x-github-delivery", "d"),
                ("x-hub-signature", "sha1=aa"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NotJson));

        let err = stage
            .check(&request(&[
                ("x-github-event", "push"),
                ("x-github-delivery", "d"),
                ("x-hub-signature", "sha1=aa"),
                ("content-type", "application/json"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::MissingHeader {
                header: header::USER_AGENT
            }
        ));
    }

    #[tokio::test]
    async fn user_agent_prefix_is_case_sensitive() {
        let stage = UserAgentPrefix::default();
        assert!(stage
            .check(&request(&[("user-agent", "GitHub-Hookshot/044aadd")]))
            .await
            .is_ok());
        assert!(stage
            .check(&request(&[("user-agent", "github-hookshot/044aadd")]))
            .await
            .is_err());
        assert!(stage
            .check(&request(&[("user-agent", "curl/8.0")]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn non_post_passes_through_without_stages() {
        struct Panics;
        #[async_trait]
        impl AdmissionStage for Panics {
            fn name(&self) -> &'static str {
                "panics"
            }
            async fn check(&self, _: &InboundRequest) -> Result<(), AdmissionError> {
                panic!("stage must not run for GET");
            }
        }

        let gate = WebhookGate::new(DEFAULT_REJECT_STATUS).with_stage(Panics);
        let mut req = request(&[]);
        req.method = Method::GET;
        assert!(matches!(gate.admit(&req).await, Admission::Passthrough));
    }
}
