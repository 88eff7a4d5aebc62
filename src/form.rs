use std::collections::HashMap;

use axum::extract::Multipart;

use crate::AppResult;

/// A multipart form with text fields and at most one `photo` file.
#[derive(Debug, Default)]
pub(crate) struct PhotoForm {
    fields: HashMap<String, String>,
    pub(crate) photo: Option<Vec<u8>>,
}

impl PhotoForm {
    pub(crate) async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = PhotoForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "photo" {
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.photo = Some(bytes.to_vec());
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }
        Ok(form)
    }

    pub(crate) fn text(&mut self, name: &str) -> String {
        self.fields.remove(name).unwrap_or_default()
    }
}
