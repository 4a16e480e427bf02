//! Request bodies that can be rebuilt for every attempt.
//!
//! A `reqwest::multipart::Form` is consumed when it is sent, so the gateway
//! keeps a description of the body and materializes a fresh form per attempt.
//! The retry after a token refresh therefore sends exactly what the first
//! attempt sent.

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::error::Error;

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartBody),
}

/// One file attached to a multipart body, held in memory.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Text fields and file parts of a multipart body, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    text: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl MultipartBody {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.text.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Builds a new form from the description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] when a file part carries an invalid MIME type.
    pub fn to_form(&self) -> Result<Form, Error> {
        let mut form = Form::new();

        for (name, value) in &self.text {
            form = form.text(name.clone(), value.clone());
        }

        for file in &self.files {
            let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            if let Some(mime) = &file.mime {
                part = part.mime_str(mime).map_err(|err| {
                    Error::Serialization(format!("invalid MIME type {mime}: {err}"))
                })?;
            }
            form = form.part(file.field.clone(), part);
        }

        Ok(form)
    }
}
