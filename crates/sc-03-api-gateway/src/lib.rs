//! # SC-03 API Gateway
//!
//! HTTP and WebSocket surface of the enhancement server.
//!
//! ## Architecture
//!
//! - `domain/`: `GatewayConfig`, error taxonomy and the JSON error envelope
//! - `session`: signed-cookie sessions holding auth state and filter config
//! - `dispatch/`: bounded job queue, worker pool, live channel registry
//! - `ws/`: the `/updates` WebSocket that receives pushed results
//! - `routes`: axum handlers and router assembly
//! - `service`: `ApiGatewayService`, which owns all shared state
//!
//! ## Request Flow
//!
//! ```text
//! POST /auth-challenge → POST /authenticate → POST /config
//!        GET /updates?session_id=X  (WebSocket, stays open)
//! POST /image/enhance {file, session_id=X} → 202
//!        worker: pipeline.run → push {message, image, duration, errors} to X
//! ```
//!
//! ## Invariants
//!
//! - Submission never blocks; a full queue answers 503.
//! - The configuration is copied into the job at submission time.
//! - A result goes only to the channel registered under the job's session id.
//! - Registry and session locks are never held across an await.
//!
//! ## Usage
//!
//! ```ignore
//! use sc_03_api_gateway::{ApiGatewayService, GatewayConfig};
//!
//! let service = ApiGatewayService::new(config)?;
//! service.start(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod dispatch;
pub mod domain;
pub mod routes;
pub mod service;
pub mod session;
pub mod ws;

pub use dispatch::{
    DeliveryMiss, DispatchError, DispatchStatsSnapshot, Dispatcher, Job, LiveChannelRegistry,
    ResultMessage,
};
pub use domain::{ApiError, ConfigError, ConfigurationError, ErrorBody, GatewayConfig, GatewayError};
pub use routes::{build_router, AppState};
pub use service::ApiGatewayService;
pub use session::{Session, SessionKey, SessionStore, SESSION_COOKIE};
