//! `multipart/form-data` encoding for callback responses with files
//!
//! The body carries a `payload_json` part followed by one `files[i]` part per
//! upload, in upload order.

use bytes::{BufMut, Bytes, BytesMut};
use corvid_core::FileUpload;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    body: Bytes,
}

impl MultipartBody {
    pub fn encode(payload: &Value, files: &[FileUpload]) -> Result<Self, serde_json::Error> {
        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self::encode_with_boundary(boundary, payload, files)
    }

    fn encode_with_boundary(
        boundary: String,
        payload: &Value,
        files: &[FileUpload],
    ) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(payload)?;
        let mut buf = BytesMut::with_capacity(
            json.len() + files.iter().map(|f| f.data.len() + 128).sum::<usize>() + 128,
        );

        put_part_header(&mut buf, &boundary, "payload_json", None, "application/json");
        buf.put_slice(&json);
        buf.put_slice(b"\r\n");

        for (i, file) in files.iter().enumerate() {
            let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
            put_part_header(
                &mut buf,
                &boundary,
                &format!("files[{i}]"),
                Some(&file.filename),
                content_type,
            );
            buf.put_slice(&file.data);
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(format!("--{boundary}--\r\n").as_bytes());

        Ok(Self {
            boundary,
            body: buf.freeze(),
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the `Content-Type` header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

fn put_part_header(
    buf: &mut BytesMut,
    boundary: &str,
    name: &str,
    filename: Option<&str>,
    content_type: &str,
) {
    buf.put_slice(format!("--{boundary}\r\n").as_bytes());
    match filename {
        Some(filename) => buf.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\n",
                escape_quoted(filename)
            )
            .as_bytes(),
        ),
        None => buf.put_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
        ),
    }
    buf.put_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
