use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;

use crate::catalog::is_dot_segment;
use crate::error::CatalogError;

#[derive(Debug, Deserialize)]
struct JsonListing {
    files: Vec<JsonFile>,
}

#[derive(Debug, Deserialize)]
struct JsonFile {
    name: String,
}

pub fn parse_listing(body: &str) -> Result<Vec<String>, CatalogError> {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('{') {
        parse_json_listing(trimmed)
    } else {
        parse_xml_listing(trimmed)
    }
}

pub fn parse_json_listing(body: &str) -> Result<Vec<String>, CatalogError> {
    let listing: JsonListing = serde_json::from_str(body)
        .map_err(|err| CatalogError::Decode(format!("JSON listing: {err}")))?;
    listing
        .files
        .into_iter()
        .map(|file| checked_name(file.name))
        .collect()
}

pub fn parse_xml_listing(body: &str) -> Result<Vec<String>, CatalogError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut names = Vec::new();
    let mut saw_root = false;
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"files" => saw_root = true,
                b"file" if saw_root => names.push(file_name_attr(e)?),
                _ => {}
            },
            Ok(_) => {}
            Err(err) => {
                return Err(CatalogError::Decode(format!(
                    "XML listing at byte {}: {err}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if !saw_root {
        return Err(CatalogError::Decode(
            "XML listing: missing <files> root element".to_string(),
        ));
    }
    Ok(names)
}

fn file_name_attr(element: &BytesStart<'_>) -> Result<String, CatalogError> {
    for attr in element.attributes() {
        let attr =
            attr.map_err(|err| CatalogError::Decode(format!("XML listing attribute: {err}")))?;
        if attr.key.as_ref() == b"name" {
            let value = attr
                .unescape_value()
                .map_err(|err| CatalogError::Decode(format!("XML listing name: {err}")))?;
            return checked_name(value.into_owned());
        }
    }
    Err(CatalogError::Decode(
        "XML listing: <file> element without a name attribute".to_string(),
    ))
}

fn checked_name(name: String) -> Result<String, CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::Decode(
            "listing entry with an empty file name".to_string(),
        ));
    }
    if name.split('/').any(is_dot_segment) {
        return Err(CatalogError::Decode(format!(
            "listing entry {name} points outside its collection"
        )));
    }
    Ok(name)
}
