//! Admin form parsing and validation.
//!
//! Everything here runs before a repository is touched; a form that fails
//! its checks never reaches storage.

use std::collections::HashMap;

use axum::extract::Multipart;
use time::{macros::format_description, PrimitiveDateTime};

use crate::{
    model::{EventPatch, NewEvent, NewNotice, NoticeCategory, NoticePatch},
    store::{attachment_path, BlobStore},
    AppResult, PortalError,
};

pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A submitted multipart form: text fields plus an optional `file`.
#[derive(Default)]
pub struct RawForm {
    fields: HashMap<String, String>,
    file: Option<Upload>,
}

impl RawForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<RawForm> {
        let mut form = RawForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "file" {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                // browsers send an empty part when no file was picked
                if !filename.is_empty() && !bytes.is_empty() {
                    form.file = Some(Upload { filename, bytes: bytes.to_vec() });
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }
        Ok(form)
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn with_file(mut self, filename: &str, bytes: &[u8]) -> Self {
        self.file = Some(Upload { filename: filename.to_owned(), bytes: bytes.to_vec() });
        self
    }

    fn text(&self, name: &'static str, min: usize, message: &str) -> Result<String, PortalError> {
        let value = self.fields.get(name).map(|v| v.trim()).unwrap_or_default();
        if value.chars().count() < min {
            return Err(PortalError::validation(name, message));
        }
        Ok(value.to_owned())
    }

    /// Stores the upload, if any, and returns its URL.
    async fn store_file(&self, blobs: &BlobStore, collection: &str) -> Result<Option<String>, PortalError> {
        let Some(upload) = &self.file else {
            return Ok(None);
        };
        let path = attachment_path(collection, &upload.filename, crate::model::now());
        Ok(Some(blobs.put(&path, &upload.bytes).await?))
    }
}

#[derive(Debug)]
pub struct NoticeForm {
    pub title: String,
    pub description: String,
    pub category: NoticeCategory,
}

impl NoticeForm {
    pub fn validate(form: &RawForm) -> Result<NoticeForm, PortalError> {
        Ok(NoticeForm {
            title: form.text("title", 5, "Title must be at least 5 characters.")?,
            description: form.text("description", 10, "Description is required.")?,
            category: form.fields.get("category").map(String::as_str).unwrap_or_default().parse()?,
        })
    }

    pub async fn into_new(self, form: &RawForm, blobs: &BlobStore) -> Result<NewNotice, PortalError> {
        Ok(NewNotice {
            title: self.title,
            description: self.description,
            category: self.category,
            file_url: form.store_file(blobs, "notices").await?,
        })
    }

    /// A missing upload keeps the current attachment.
    pub async fn into_patch(self, form: &RawForm, blobs: &BlobStore) -> Result<NoticePatch, PortalError> {
        Ok(NoticePatch {
            title: Some(self.title),
            description: Some(self.description),
            category: Some(self.category),
            file_url: form.store_file(blobs, "notices").await?,
        })
    }
}

#[derive(Debug)]
pub struct EventForm {
    pub name: String,
    pub description: String,
    pub venue: String,
    pub organizer: String,
    pub date: time::OffsetDateTime,
}

impl EventForm {
    pub fn validate(form: &RawForm) -> Result<EventForm, PortalError> {
        let name = form.text("name", 5, "Event name must be at least 5 characters.")?;
        let description = form.text("description", 10, "Description is required.")?;
        let venue = form.text("venue", 3, "Venue is required.")?;
        let organizer = form.text("organizer", 3, "Organizer is required.")?;
        let date = parse_date(form.fields.get("date").map(String::as_str).unwrap_or_default())?;
        Ok(EventForm { name, description, venue, organizer, date })
    }

    pub async fn into_new(self, form: &RawForm, blobs: &BlobStore) -> Result<NewEvent, PortalError> {
        Ok(NewEvent {
            name: self.name,
            description: self.description,
            date: self.date,
            venue: self.venue,
            organizer: self.organizer,
            file_url: form.store_file(blobs, "events").await?,
        })
    }

    pub async fn into_patch(self, form: &RawForm, blobs: &BlobStore) -> Result<EventPatch, PortalError> {
        Ok(EventPatch {
            name: Some(self.name),
            description: Some(self.description),
            date: Some(self.date),
            venue: Some(self.venue),
            organizer: Some(self.organizer),
            file_url: form.store_file(blobs, "events").await?,
        })
    }
}

/// `YYYY-MM-DDTHH:MM` as sent by `datetime-local` inputs, read as UTC.
pub fn parse_date(raw: &str) -> Result<time::OffsetDateTime, PortalError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PortalError::validation("date", "A date for the event is required."));
    }
    PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| PortalError::validation("date", "Date must look like 2025-03-14T09:30."))
}
