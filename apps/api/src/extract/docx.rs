use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use zip::ZipArchive;

use super::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Collects the text runs of a DOCX body, one line per paragraph.
pub(super) fn extract_docx(content: &[u8]) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(content))
        .map_err(|e| ExtractError::Docx(format!("not a DOCX archive: {e}")))?;

    let mut document = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractError::Docx(format!("missing {DOCUMENT_PART}: {e}")))?;

    let mut xml = String::new();
    document
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(format!("failed to read {DOCUMENT_PART}: {e}")))?;

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut output = String::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_node = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => output.push('\t'),
                b"w:br" | b"w:cr" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_node {
                    let value = e
                        .unescape()
                        .map_err(|err| ExtractError::Docx(err.to_string()))?;
                    output.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = false,
                b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ExtractError::Docx(format!(
                    "failed to parse {DOCUMENT_PART}: {err}"
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(output)
}
