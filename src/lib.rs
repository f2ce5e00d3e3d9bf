//! Marketo Lead Enrichment API Library
//!
//! This library provides the core functionality for the Marketo lead
//! enrichment webhook: payload normalization, OpenAI company enrichment with
//! a per-company cache, bucket standardization, and the Marketo REST client.
//!
//! # Modules
//!
//! - `buckets`: Revenue and company-size bucket standardization.
//! - `config`: Configuration management.
//! - `enrichment`: OpenAI company enrichment and result cache.
//! - `errors`: Error handling types.
//! - `handlers`: Router assembly and utility endpoints.
//! - `marketo_client`: Marketo REST client (token lifecycle, lead upsert).
//! - `webhook_handler`: Marketo webhook handler.
//! - `webhook_models`: Webhook payload models.

// Re-export primary modules for shared use in tests
pub mod buckets;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod marketo_client;
pub mod webhook_handler;
pub mod webhook_models;
