// ABOUTME: Package-level navigation of a .pptx: reading parts, slide order and slide size.
// ABOUTME: Slide order follows presentation.xml's slide id list, resolved through its relationships.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use deckfix_core::DocumentError;
use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use crate::scan::{attribute, local_name};
use crate::slide::xml_error;

pub(crate) const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";
const SLIDE_REL_TYPE_SUFFIX: &str = "/slide";

/// What presentation.xml says about the deck as a whole.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PresentationInfo {
    /// Relationship ids of the slides, in presentation order.
    pub slide_ids: Vec<String>,
    pub size: Option<(i64, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// Read a part of the archive as UTF-8 text.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    part: &str,
) -> Result<String, DocumentError> {
    let mut file = archive.by_name(part).map_err(|_| DocumentError::MissingPart {
        path: path.to_path_buf(),
        part: part.to_string(),
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content).map_err(|e| DocumentError::Package {
        path: path.to_path_buf(),
        message: format!("failed to read '{}': {}", part, e),
    })?;

    Ok(content)
}

pub(crate) fn parse_presentation(xml: &str) -> Result<PresentationInfo, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut info = PresentationInfo::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"sldId" => {
                    // The relationship id is the namespaced `r:id`, not the numeric `id`.
                    let rel = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() != b"id" && local_name(a.key.as_ref()) == b"id")
                        .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                    if let Some(rel) = rel {
                        info.slide_ids.push(rel);
                    }
                }
                b"sldSz" => {
                    let cx = attribute(e, b"cx").and_then(|v| v.parse().ok());
                    let cy = attribute(e, b"cy").and_then(|v| v.parse().ok());
                    if let (Some(cx), Some(cy)) = (cx, cy) {
                        info.size = Some((cx, cy));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(PRESENTATION_PART, e)),
            _ => {}
        }
    }

    Ok(info)
}

pub(crate) fn parse_relationships(xml: &str, part: &str) -> Result<Vec<Relationship>, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"Relationship" => {
                rels.push(Relationship {
                    id: attribute(e, b"Id").unwrap_or_default(),
                    rel_type: attribute(e, b"Type").unwrap_or_default(),
                    target: attribute(e, b"Target").unwrap_or_default(),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    Ok(rels)
}

/// Resolve a relationship target of presentation.xml to a package part name.
pub(crate) fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = vec!["ppt"];
    for piece in target.split('/') {
        match piece {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            piece => parts.push(piece),
        }
    }
    parts.join("/")
}

/// Slide part names in presentation order, plus the slide size.
///
/// Slides listed in presentation.xml come first, in list order. Any slide
/// relationship the list does not mention is appended by slide number.
pub(crate) fn slide_parts<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
) -> Result<(Vec<String>, Option<(i64, i64)>), DocumentError> {
    let info = parse_presentation(&read_part(archive, path, PRESENTATION_PART)?)?;
    let rels_xml = read_part(archive, path, PRESENTATION_RELS_PART)?;
    let rels = parse_relationships(&rels_xml, PRESENTATION_RELS_PART)?;
    Ok((order_slides(&info, &rels), info.size))
}

pub(crate) fn order_slides(info: &PresentationInfo, rels: &[Relationship]) -> Vec<String> {
    let slide_rels: HashMap<&str, &Relationship> = rels
        .iter()
        .filter(|r| r.rel_type.ends_with(SLIDE_REL_TYPE_SUFFIX))
        .map(|r| (r.id.as_str(), r))
        .collect();

    let mut ordered: Vec<String> = info
        .slide_ids
        .iter()
        .filter_map(|id| slide_rels.get(id.as_str()))
        .map(|r| resolve_target(&r.target))
        .collect();

    let mut unlisted: Vec<(Option<usize>, String)> = rels
        .iter()
        .filter(|r| r.rel_type.ends_with(SLIDE_REL_TYPE_SUFFIX) && !info.slide_ids.contains(&r.id))
        .map(|r| (extract_slide_number(&r.target), resolve_target(&r.target)))
        .collect();
    unlisted.sort_by(|a, b| match (a.0, b.0) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });
    ordered.extend(unlisted.into_iter().map(|(_, part)| part));

    ordered
}

/// Extract a slide number from a name like "slides/slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml");
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.chars().rev().collect::<String>().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESENTATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>
  <p:sldIdLst><p:sldId id="257" r:id="rId3"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst>
  <p:sldSz cx="9144000" cy="6858000" type="screen4x3"/>
</p:presentation>"#;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/>
  <Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="/ppt/slides/slide10.xml"/>
</Relationships>"#;

    #[test]
    fn presentation_lists_slides_and_size() {
        let info = parse_presentation(PRESENTATION).unwrap();
        assert_eq!(info.slide_ids, vec!["rId3", "rId2"]);
        assert_eq!(info.size, Some((9144000, 6858000)));
    }

    #[test]
    fn slide_order_follows_the_id_list_not_part_names() {
        let info = parse_presentation(PRESENTATION).unwrap();
        let rels = parse_relationships(RELS, PRESENTATION_RELS_PART).unwrap();

        assert_eq!(
            order_slides(&info, &rels),
            vec!["ppt/slides/slide2.xml", "ppt/slides/slide1.xml", "ppt/slides/slide10.xml"]
        );
    }

    #[test]
    fn resolves_relative_and_absolute_targets() {
        assert_eq!(resolve_target("slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_target("/ppt/slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_target("../ppt/slides/./slide2.xml"), "ppt/slides/slide2.xml");
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("slides/slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }
}
