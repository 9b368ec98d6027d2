use crate::page_range::{PageNumber, PageRange};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A document with a catalog and an empty page tree.
pub fn new_empty_document(version: &str) -> Document {
    let mut doc = Document::with_version(version);
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn page_count(doc: &Document) -> u32 {
    doc.get_pages().len() as u32
}

pub fn page_id(doc: &Document, page: PageNumber) -> Option<ObjectId> {
    doc.get_pages().get(&page.get()).copied()
}

fn pages_root(doc: &Document) -> lopdf::Result<ObjectId> {
    doc.catalog()?.get(b"Pages")?.as_reference()
}

/// Copy the pages named by `ranges` from `source` to the end of `target`.
///
/// Every object reachable from a copied page is copied once and renumbered.
/// References to pages that are not part of the copy, and to the source page
/// tree, become `null`.
pub fn copy_pages(
    source: &Document,
    target: &mut Document,
    ranges: &[PageRange],
) -> lopdf::Result<u32> {
    let source_pages = source.get_pages();
    let wanted: Vec<ObjectId> = ranges
        .iter()
        .flat_map(|r| r.pages())
        .filter_map(|p| source_pages.get(&p.get()).copied())
        .collect();

    let mut copier = ObjectCopier {
        source,
        mapped: HashMap::new(),
        excluded: HashSet::new(),
    };

    // Seed page ids first so links between copied pages resolve.
    for &id in &wanted {
        copier.mapped.insert(id, target.new_object_id());
    }
    let wanted_set: HashSet<ObjectId> = wanted.iter().copied().collect();
    for &id in source_pages.values() {
        if !wanted_set.contains(&id) {
            copier.excluded.insert(id);
        }
        let mut parent = source.get_dictionary(id)?.get(b"Parent").and_then(Object::as_reference).ok();
        while let Some(node) = parent {
            if !copier.excluded.insert(node) {
                break;
            }
            parent = source
                .get_dictionary(node)
                .and_then(|d| d.get(b"Parent"))
                .and_then(Object::as_reference)
                .ok();
        }
    }

    let root = pages_root(target)?;
    let mut kids = Vec::with_capacity(wanted.len());
    for &id in &wanted {
        let mut page = copier.copy_dictionary(&inherited_page(source, id)?, target);
        page.set("Parent", root);
        let new_id = copier.mapped[&id];
        target.objects.insert(new_id, Object::Dictionary(page));
        kids.push(Object::Reference(new_id));
    }

    let copied = kids.len() as u32;
    let pages = target.get_dictionary_mut(root)?;
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    match pages.get_mut(b"Kids") {
        Ok(Object::Array(existing)) => existing.extend(kids),
        _ => pages.set("Kids", Object::Array(kids)),
    }
    pages.set("Count", count + copied as i64);

    debug!(
        ranges = %ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
        pages = copied,
        objects = copier.mapped.len(),
        "copied pages"
    );
    Ok(copied)
}

/// The page dictionary with inherited attributes filled in and `Parent` removed.
fn inherited_page(doc: &Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut parent = page.remove(b"Parent").and_then(|p| p.as_reference().ok());

    while let Some(node_id) = parent {
        let node = doc.get_dictionary(node_id)?;
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(page)
}

struct ObjectCopier<'a> {
    source: &'a Document,
    mapped: HashMap<ObjectId, ObjectId>,
    excluded: HashSet<ObjectId>,
}

impl ObjectCopier<'_> {
    fn copy_reference(&mut self, id: ObjectId, target: &mut Document) -> Object {
        if self.excluded.contains(&id) {
            return Object::Null;
        }
        if let Some(new_id) = self.mapped.get(&id) {
            return Object::Reference(*new_id);
        }

        let new_id = target.new_object_id();
        self.mapped.insert(id, new_id);
        // A dangling reference is equivalent to null.
        let copied = match self.source.get_object(id) {
            Ok(obj) => self.copy_object(obj, target),
            Err(_) => Object::Null,
        };
        target.objects.insert(new_id, copied);
        Object::Reference(new_id)
    }

    fn copy_object(&mut self, obj: &Object, target: &mut Document) -> Object {
        match obj {
            Object::Reference(id) => self.copy_reference(*id, target),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_object(item, target))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(dict, target)),
            Object::Stream(stream) => {
                let mut stream = stream.clone();
                stream.dict = self.copy_dictionary(&stream.dict, target);
                Object::Stream(stream)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, dict: &Dictionary, target: &mut Document) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            copy.set(key.clone(), self.copy_object(value, target));
        }
        copy
    }
}

/// Get metadata from the document info dictionary
pub fn info(doc: &Document) -> PdfInfo {
    let mut info = PdfInfo {
        page_count: page_count(doc),
        ..Default::default()
    };

    if let Ok(Object::Reference(info_ref)) = doc.trailer.get(b"Info") {
        if let Ok(Object::Dictionary(dict)) = doc.get_object(*info_ref) {
            info.title = get_string_from_dict(dict, b"Title");
            info.author = get_string_from_dict(dict, b"Author");
            info.creator = get_string_from_dict(dict, b"Creator");
            info.producer = get_string_from_dict(dict, b"Producer");
            info.subject = get_string_from_dict(dict, b"Subject");
        }
    }

    info
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub subject: Option<String>,
    pub page_count: u32,
}

pub fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(|obj| match obj {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        _ => None,
    })
}

pub fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let u16_chars: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        String::from_utf16(&u16_chars).ok()
    } else {
        // Latin-1 / PDFDocEncoding (simplified)
        Some(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Text string object: literal for ASCII, UTF-16BE with BOM otherwise.
pub fn encode_pdf_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_range::merge_contiguous;
    use crate::pdf::fixtures;

    fn page_text(doc: &Document, number: u32) -> String {
        let id = doc.get_pages()[&number];
        String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
    }

    #[test]
    fn test_copy_pages_in_range_order() {
        let source = fixtures::document(6);
        let mut target = new_empty_document("1.7");

        let copied = copy_pages(&source, &mut target, &merge_contiguous([2, 3, 5])).unwrap();
        assert_eq!(copied, 3);
        assert_eq!(page_count(&target), 3);
        assert!(page_text(&target, 1).contains("Page 2"));
        assert!(page_text(&target, 2).contains("Page 3"));
        assert!(page_text(&target, 3).contains("Page 5"));
    }

    #[test]
    fn test_copy_materialises_inherited_attributes() {
        let source = fixtures::document(2);
        let mut target = new_empty_document("1.7");
        copy_pages(&source, &mut target, &merge_contiguous([2])).unwrap();

        let page = target.get_dictionary(target.get_pages()[&1]).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
        assert_eq!(
            page.get(b"Parent").unwrap().as_reference().unwrap(),
            pages_root(&target).unwrap()
        );
    }

    #[test]
    fn test_copy_survives_save_and_reload() {
        let source = fixtures::document(4);
        let mut target = new_empty_document("1.7");
        copy_pages(&source, &mut target, &merge_contiguous([1, 4])).unwrap();

        let mut bytes = Vec::new();
        target.save_to(&mut bytes).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(page_count(&reloaded), 2);
        assert!(page_text(&reloaded, 2).contains("Page 4"));
    }

    #[test]
    fn test_string_round_trip() {
        let ascii = encode_pdf_string("Note");
        let unicode = encode_pdf_string("Größe ✓");
        for (obj, expected) in [(ascii, "Note"), (unicode, "Größe ✓")] {
            match obj {
                Object::String(bytes, _) => {
                    assert_eq!(decode_pdf_string(&bytes).as_deref(), Some(expected))
                }
                other => panic!("unexpected object {:?}", other),
            }
        }
    }
}
