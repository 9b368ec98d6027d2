//! Text-note and highlight annotations on a session's working copy.
//!
//! Every change goes through a stamp of the working copy: the modified
//! document is written next to it and then moved over it, so a failed
//! operation leaves the working copy untouched. Appearance streams are
//! rebuilt from scratch whenever an annotation changes and the previous
//! ones are deleted.

use crate::error::{PdfError, Result};
use crate::page_range::PageNumber;
use crate::pdf::appearance::{build_appearance, Color, Rect, HIGHLIGHT_OPACITY};
use crate::pdf::document::{encode_pdf_string, get_string_from_dict};
use crate::pdf::session::{page_id_checked, DocumentSession};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    TextNote { title: Option<String>, text: String },
    Highlight,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub page: PageNumber,
    /// For text notes: anchor point plus bubble size.
    pub rect: Rect,
    /// `#RRGGBB`; anything else means no custom appearance.
    pub color: String,
    #[serde(flatten)]
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn text_note(
        page: PageNumber,
        x: f32,
        y: f32,
        bubble_size: f32,
        color: &str,
        title: Option<&str>,
        text: &str,
    ) -> Self {
        Annotation {
            page,
            rect: Rect::new(x, y, bubble_size, bubble_size),
            color: color.to_string(),
            kind: AnnotationKind::TextNote {
                title: title.map(str::to_string),
                text: text.to_string(),
            },
        }
    }

    pub fn highlight(page: PageNumber, rect: Rect, color: &str) -> Self {
        Annotation {
            page,
            rect,
            color: color.to_string(),
            kind: AnnotationKind::Highlight,
        }
    }

    fn apply(&mut self, edit: &AnnotationEdit) {
        if let Some(rect) = edit.rect {
            self.rect = rect;
        }
        if let Some(color) = &edit.color {
            self.color = color.clone();
        }
        if let AnnotationKind::TextNote { title, text } = &mut self.kind {
            if let Some(new_title) = &edit.title {
                *title = Some(new_title.clone());
            }
            if let Some(new_text) = &edit.text {
                *text = new_text.clone();
            }
            // Bubbles stay square.
            self.rect.height = self.rect.width;
        }
    }
}

/// Reference to an annotation dictionary attached to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AnnotationHandle {
    pub page: PageNumber,
    pub id: ObjectId,
}

/// Fields to change; `None` keeps the current value. Title and text only
/// apply to text notes.
#[derive(Debug, Clone, Default)]
pub struct AnnotationEdit {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rect: Option<Rect>,
    pub color: Option<String>,
}

pub struct AnnotationEditor<'s> {
    session: &'s DocumentSession,
}

impl<'s> AnnotationEditor<'s> {
    pub fn new(session: &'s DocumentSession) -> Self {
        AnnotationEditor { session }
    }

    /// Attach `annotation` to its page. Returns the working copy and a
    /// handle for later edits.
    pub fn add(&self, annotation: &Annotation) -> Result<(PathBuf, AnnotationHandle)> {
        let page = annotation.page;
        let (path, id) = self.stamp(|doc, wc| {
            let page_id = page_id_checked(doc, page)?;

            let mut dict = Dictionary::new();
            write_fields(&mut dict, annotation, page_id);
            let id = doc.add_object(Object::Dictionary(dict));
            set_appearance(doc, id, annotation).map_err(|e| PdfError::access(wc, e))?;
            annots_mut(doc, page_id)
                .map_err(|e| PdfError::access(wc, e))?
                .push(Object::Reference(id));
            Ok(id)
        })?;

        debug!(page = page.get(), id = ?id, "added annotation");
        Ok((path, AnnotationHandle { page, id }))
    }

    /// Change an annotation and regenerate its appearance.
    pub fn edit(&self, handle: &AnnotationHandle, edit: &AnnotationEdit) -> Result<PathBuf> {
        let (path, ()) = self.stamp(|doc, wc| {
            let page_id = page_id_checked(doc, handle.page)?;
            let mut annotation = find_attached(doc, page_id, handle)?;
            annotation.apply(edit);

            let dict = doc
                .get_dictionary_mut(handle.id)
                .map_err(|e| PdfError::access(wc, e))?;
            write_fields(dict, &annotation, page_id);
            set_appearance(doc, handle.id, &annotation).map_err(|e| PdfError::access(wc, e))?;
            Ok(())
        })?;

        debug!(page = handle.page.get(), id = ?handle.id, "edited annotation");
        Ok(path)
    }

    /// Detach an annotation, and its popup if it has one, from its page and
    /// delete them.
    pub fn remove(&self, handle: &AnnotationHandle) -> Result<PathBuf> {
        let (path, ()) = self.stamp(|doc, wc| {
            let page_id = page_id_checked(doc, handle.page)?;
            if !annotation_refs(doc, page_id).contains(&handle.id) {
                return Err(not_found(handle));
            }

            let popup = doc
                .get_dictionary(handle.id)
                .and_then(|d| d.get(b"Popup"))
                .and_then(Object::as_reference)
                .ok();
            let detached: Vec<ObjectId> = std::iter::once(handle.id).chain(popup).collect();

            annots_mut(doc, page_id)
                .map_err(|e| PdfError::access(wc, e))?
                .retain(|o| o.as_reference().map_or(true, |id| !detached.contains(&id)));
            for &id in &detached {
                remove_appearance(doc, id);
            }
            for id in &detached {
                doc.objects.remove(id);
            }
            Ok(())
        })?;

        debug!(page = handle.page.get(), id = ?handle.id, "removed annotation");
        Ok(path)
    }

    /// Text notes and highlights on `page`, or on every page.
    pub fn list(&self, page: Option<PageNumber>) -> Result<Vec<(AnnotationHandle, Annotation)>> {
        let reader = self.session.open_for_reading()?;
        let doc = reader.document();

        let pages: Vec<(PageNumber, ObjectId)> = match page {
            Some(p) => vec![(p, reader.page_id(p)?)],
            None => doc
                .get_pages()
                .into_iter()
                .filter_map(|(n, id)| PageNumber::new(n).map(|p| (p, id)))
                .collect(),
        };

        let mut found = Vec::new();
        for (number, page_id) in pages {
            for id in annotation_refs(doc, page_id) {
                if let Some(annotation) = decode(doc, number, id) {
                    found.push((AnnotationHandle { page: number, id }, annotation));
                }
            }
        }
        Ok(found)
    }

    /// Run `f` against a stamp of the working copy and commit the result.
    fn stamp<T>(
        &self,
        f: impl FnOnce(&mut Document, &Path) -> Result<T>,
    ) -> Result<(PathBuf, T)> {
        let working_copy = self.session.working_copy();
        let mut stamp = self
            .session
            .open_for_stamping(working_copy.with_extension("stamp.pdf"))?;
        let value = f(stamp.document_mut(), working_copy)?;
        let stamped = stamp.close()?;
        self.session.replace_working_copy(&stamped)?;
        Ok((working_copy.to_path_buf(), value))
    }
}

fn not_found(handle: &AnnotationHandle) -> PdfError {
    PdfError::NotFound {
        page: handle.page.get(),
        id: handle.id,
    }
}

fn find_attached(doc: &Document, page_id: ObjectId, handle: &AnnotationHandle) -> Result<Annotation> {
    if !annotation_refs(doc, page_id).contains(&handle.id) {
        return Err(not_found(handle));
    }
    decode(doc, handle.page, handle.id).ok_or_else(|| not_found(handle))
}

fn write_fields(dict: &mut Dictionary, annotation: &Annotation, page_id: ObjectId) {
    dict.set("Type", Object::Name(b"Annot".to_vec()));
    dict.set("Rect", annotation.rect.to_object());
    dict.set("P", Object::Reference(page_id));
    // Print
    dict.set("F", 4);

    match Color::parse(&annotation.color) {
        Some(color) => dict.set("C", color.to_object()),
        None => {
            dict.remove(b"C");
        }
    }

    match &annotation.kind {
        AnnotationKind::TextNote { title, text } => {
            dict.set("Subtype", Object::Name(b"Text".to_vec()));
            dict.set("Name", Object::Name(b"Comment".to_vec()));
            dict.set("Open", false);
            dict.set("Contents", encode_pdf_string(text));
            match title {
                Some(title) => dict.set("T", encode_pdf_string(title)),
                None => {
                    dict.remove(b"T");
                }
            }
        }
        AnnotationKind::Highlight => {
            dict.set("Subtype", Object::Name(b"Highlight".to_vec()));
            dict.set("QuadPoints", annotation.rect.quad_points());
            dict.set("CA", Object::Real(HIGHLIGHT_OPACITY));
        }
    }
}

/// Replace the annotation's appearance. Returns whether one was generated.
fn set_appearance(
    doc: &mut Document,
    annot_id: ObjectId,
    annotation: &Annotation,
) -> lopdf::Result<bool> {
    remove_appearance(doc, annot_id);

    let Some(stream) = build_appearance(annotation) else {
        warn!(color = %annotation.color, "unparseable color, annotation has no custom appearance");
        return Ok(false);
    };
    let ap_id = doc.add_object(stream);
    doc.get_dictionary_mut(annot_id)?
        .set("AP", dictionary! { "N" => ap_id });
    Ok(true)
}

/// Drop `/AP` and delete the appearance objects it referenced.
fn remove_appearance(doc: &mut Document, annot_id: ObjectId) {
    let Ok(dict) = doc.get_dictionary_mut(annot_id) else {
        return;
    };
    let Some(ap) = dict.remove(b"AP") else {
        return;
    };

    let mut stale = Vec::new();
    appearance_objects(doc, &ap, &mut stale);
    for id in unshared(doc, &stale) {
        doc.objects.remove(&id);
    }
}

/// The `candidates` that no object outside the set refers to, directly or
/// through another shared candidate.
fn unshared(doc: &Document, candidates: &[ObjectId]) -> Vec<ObjectId> {
    let candidate_set: HashSet<ObjectId> = candidates.iter().copied().collect();

    let mut shared = HashSet::new();
    for (id, obj) in &doc.objects {
        if !candidate_set.contains(id) {
            references(obj, &mut shared);
        }
    }
    shared.retain(|id| candidate_set.contains(id));

    let mut pending: Vec<ObjectId> = shared.iter().copied().collect();
    while let Some(id) = pending.pop() {
        let mut inner = HashSet::new();
        if let Ok(obj) = doc.get_object(id) {
            references(obj, &mut inner);
        }
        for r in inner {
            if candidate_set.contains(&r) && shared.insert(r) {
                pending.push(r);
            }
        }
    }

    candidates
        .iter()
        .copied()
        .filter(|id| !shared.contains(id))
        .collect()
}

fn references(obj: &Object, out: &mut HashSet<ObjectId>) {
    match obj {
        Object::Reference(id) => {
            out.insert(*id);
        }
        Object::Array(items) => items.iter().for_each(|o| references(o, out)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, o)| references(o, out)),
        Object::Stream(stream) => stream.dict.iter().for_each(|(_, o)| references(o, out)),
        _ => {}
    }
}

fn appearance_objects(doc: &Document, obj: &Object, out: &mut Vec<ObjectId>) {
    match obj {
        Object::Reference(id) => {
            if out.contains(id) {
                return;
            }
            out.push(*id);
            // Appearance sub-dictionaries map states to streams.
            if let Ok(Object::Dictionary(states)) = doc.get_object(*id) {
                for (_, state) in states.iter() {
                    appearance_objects(doc, state, out);
                }
            }
        }
        Object::Dictionary(states) => {
            for (_, state) in states.iter() {
                appearance_objects(doc, state, out);
            }
        }
        _ => {}
    }
}

/// Indirect annotations listed in the page's `/Annots`.
fn annotation_refs(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let annots = match page.get(b"Annots") {
        Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_array),
        Ok(obj) => obj.as_array(),
        Err(e) => Err(e),
    };
    annots
        .map(|items| items.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default()
}

/// The page's `/Annots` array, created if missing.
fn annots_mut(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<&mut Vec<Object>> {
    let indirect = doc
        .get_dictionary(page_id)?
        .get(b"Annots")
        .and_then(Object::as_reference)
        .ok();
    if let Some(id) = indirect {
        return doc.get_object_mut(id)?.as_array_mut();
    }

    let page = doc.get_dictionary_mut(page_id)?;
    if !matches!(page.get(b"Annots"), Ok(Object::Array(_))) {
        page.set("Annots", Object::Array(Vec::new()));
    }
    page.get_mut(b"Annots")?.as_array_mut()
}

fn decode(doc: &Document, page: PageNumber, id: ObjectId) -> Option<Annotation> {
    let dict = doc.get_dictionary(id).ok()?;
    let kind = match dict.get(b"Subtype").ok()?.as_name().ok()? {
        b"Text" => AnnotationKind::TextNote {
            title: get_string_from_dict(dict, b"T"),
            text: get_string_from_dict(dict, b"Contents").unwrap_or_default(),
        },
        b"Highlight" => AnnotationKind::Highlight,
        _ => return None,
    };
    let rect = Rect::from_object(dict.get(b"Rect").ok()?)?;
    let color = dict
        .get(b"C")
        .and_then(Object::as_array)
        .ok()
        .and_then(|c| Color::from_components(c))
        .map(Color::to_hex)
        .unwrap_or_default();

    Some(Annotation {
        page,
        rect,
        color,
        kind,
    })
}
