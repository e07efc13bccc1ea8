//! Request and Response models for the admin API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies. Field
//! names follow the operator dashboard's camelCase convention.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{FlushRequest, InvalidateRequest, InvalidateTarget, KeysQuery};
pub use responses::{
    FlushResponse, HealthResponse, InvalidateResponse, KeysResponse, PaginationInfo,
    StatsResponse, TierRates,
};
