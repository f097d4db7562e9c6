//! Webhook receiver for the deploy hook.
//!
//! Two pieces:
//!
//! - [`WebhookGate`]: an ordered admission pipeline (required headers, user
//!   agent prefix, origin allowlist) that decides whether an inbound call
//!   reaches the deploy handler at all.
//! - [`server`]: the axum router exposing `/deploy`. Non-POST calls get a
//!   plain `OK`; rejected calls get the sentinel status with an empty body;
//!   admitted calls are handed to a [`deploy::WebhookHandler`] and answered
//!   with `{"msg": "..."}`.
//!
//! ## Request Flow
//!
//! | Step | Outcome on failure |
//! |------|--------------------|
//! | Method is POST | `200 OK`, nothing validated |
//! | Gate stages | sentinel status (418 by default), empty body |
//! | Deploy handler | `200` with the failure message in `msg` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP framing, headers and peer addresses live here.
//! Signature checks and deploy rules stay in the handler behind
//! [`deploy::WebhookHandler`].

pub mod gate;
pub mod server;

pub use gate::{
    Admission, AdmissionStage, GateSettings, InboundRequest, OriginAllowlistStage,
    RequiredHeaders, UserAgentPrefix, WebhookGate, DEFAULT_REJECT_STATUS,
    GITHUB_USER_AGENT_PREFIX,
};
pub use server::{router, serve, AppState, ListenerError, DEPLOY_PATH, MAX_DELIVERY_BYTES};
