//! Request and response types

use bytes::Bytes;
use corvid_core::FileUpload;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::HttpError;
use crate::route::RouteKey;

const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Body of a REST call
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// `payload_json` plus one `files[i]` part per file
    Multipart { payload: Value, files: Vec<FileUpload> },
}

impl RequestBody {
    /// Build a fresh multipart form; forms are consumed on send
    pub fn to_form(payload: &Value, files: &[FileUpload]) -> Result<Form, HttpError> {
        let mut form = Form::new().text("payload_json", payload.to_string());
        for (i, file) in files.iter().enumerate() {
            let content_type = file
                .content_type
                .as_deref()
                .unwrap_or(DEFAULT_FILE_CONTENT_TYPE);
            let part = Part::bytes(file.data.clone())
                .file_name(file.filename.clone())
                .mime_str(content_type)
                .map_err(|e| HttpError::InvalidRequest(format!("{}: {e}", file.filename)))?;
            form = form.part(format!("files[{i}]"), part);
        }
        Ok(form)
    }
}

/// One REST call
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path below the versioned base URL, starting with `/`
    pub path: String,
    pub route: RouteKey,
    pub body: Option<RequestBody>,
    /// `X-Audit-Log-Reason`
    pub reason: Option<String>,
    /// Cancel the call (rate-limit waits included) after this long
    pub deadline: Option<Duration>,
    pub authenticated: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let route = RouteKey::new(&method, &path);
        Self {
            method,
            path,
            route,
            body: None,
            reason: None,
            deadline: None,
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// JSON body, switching to multipart when files are attached
    pub fn with_files(mut self, payload: Value, files: Vec<FileUpload>) -> Self {
        self.body = Some(if files.is_empty() {
            RequestBody::Json(payload)
        } else {
            RequestBody::Multipart { payload, files }
        });
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Send without the `Authorization` header
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// Raw response of a successful call
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
