//! Cache value type.
//!
//! Values carried by `GET`/`PUT` are arbitrary client-supplied JSON. Rather
//! than inventing a parallel tagged enum, this models the value as the JSON
//! value it already is -- `serde_json::Value` is already the tagged
//! `{null | bool | number | string | array | object}` variant the data model
//! calls for, and axum's JSON extractor/responder work with it without any
//! conversion at the boundary.
pub type CacheValue = serde_json::Value;
