use bytes::Bytes;
use mime::Mime;
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;

/// A parsed file section: a part whose headers carry a `filename`.
#[derive(Debug, Clone)]
pub struct FileField {
    /// Field name from the section headers.
    pub name: String,
    /// File name from the section headers.
    pub file_name: String,
    /// Content type of the part; `text/plain` when the section did not
    /// declare one.
    pub content_type: Mime,
    /// Content disposition of the part; `form-data` when the section did
    /// not declare one.
    pub content_disposition: String,
    /// The raw body bytes.
    pub data: Bytes,
}

/// A parsed parameter section: a part without a `filename`.
#[derive(Debug, Clone)]
pub struct TextField {
    /// Field name from the section headers.
    pub name: String,
    /// The body, decoded with the configured encoding.
    pub value: String,
}

impl TextField {
    /// Deserializes the field value as JSON.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature to be enabled.
    #[cfg(feature = "json")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json")))]
    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_str(&self.value).map_err(crate::Error::DecodeJson)
    }
}

/// All parts parsed out of one multipart body, in wire order.
///
/// Duplicate parameter names are retained, not merged: [`field`] returns
/// the first occurrence, [`fields_named`] every one of them.
///
/// [`field`]: FormData::field
/// [`fields_named`]: FormData::fields_named
#[derive(Debug, Default)]
pub struct FormData {
    /// File parts, in the order they appeared.
    pub files: Vec<FileField>,
    /// Parameter parts, in the order they appeared.
    pub fields: Vec<TextField>,
}

impl FormData {
    /// Returns the first parameter named `name`.
    pub fn field(&self, name: &str) -> Option<&TextField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns every parameter named `name`, in wire order.
    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TextField> {
        self.fields.iter().filter(move |field| field.name == name)
    }

    /// Returns the first file part whose field name is `name`.
    pub fn file(&self, name: &str) -> Option<&FileField> {
        self.files.iter().find(|file| file.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(name: &str, value: &str) -> TextField {
        TextField {
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }

    #[test]
    fn test_duplicate_names_are_retained() {
        let form = FormData {
            files: Vec::new(),
            fields: vec![text("tag", "one"), text("other", "x"), text("tag", "two")],
        };

        assert_eq!(form.field("tag").map(|f| f.value.as_str()), Some("one"));
        let all: Vec<&str> = form.fields_named("tag").map(|f| f.value.as_str()).collect();
        assert_eq!(all, vec!["one", "two"]);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_field_decoding() {
        let field = text("config", r#"{"answer": 42}"#);
        let value: serde_json::Value = field.json().unwrap();
        assert_eq!(value["answer"], 42);
    }
}
