//! `api`: issue one raw call and dump whatever comes back.

use std::io::Write;

use anyhow::Result;
use serde_json::Value;

use crate::api::{ApiClient, ApiResponse};
use crate::display::{display, show_props};
use crate::session::EndpointKind;
use crate::transport::{Method, Transport};
use crate::ui::Prompter;

pub fn run<T: Transport, P: Prompter>(
    api: &ApiClient<T, P>,
    method: Method,
    path: &str,
    body: Option<&Value>,
    kind: EndpointKind,
    props: Option<&str>,
    out: &mut impl Write,
) -> Result<i32> {
    let response = api.call(method, path, body, kind);
    match &response {
        ApiResponse::Value(value) => match props {
            Some(search) => show_props(value, "response", Some(search), out)?,
            None => display(value, out)?,
        },
        ApiResponse::Empty => {}
        ApiResponse::Error { code, .. } => {
            let record = response
                .error_record()
                .unwrap_or_else(|| serde_json::json!({ "error": code }));
            display(&record, out)?;
            return Ok(1);
        }
        // already reported through the log
        ApiResponse::NotFound | ApiResponse::NotConnected | ApiResponse::Unreachable(_) => {
            return Ok(1)
        }
    }
    Ok(0)
}
