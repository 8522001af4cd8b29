//! Response envelope
//!
//! Every success body carries `status: "sucesso"` and a timestamp, with the
//! operation's payload flattened alongside (errors produce the `erro`
//! envelope in `crate::error`).

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct Reply<T: Serialize> {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: T,
}

pub fn ok<T: Serialize>(body: T) -> Json<Reply<T>> {
    Json(Reply { status: "sucesso", timestamp: Utc::now(), body })
}
