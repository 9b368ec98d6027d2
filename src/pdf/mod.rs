pub mod annotation;
pub mod appearance;
pub mod document;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod session;
pub mod split;

pub use annotation::{Annotation, AnnotationEdit, AnnotationEditor, AnnotationHandle};
pub use appearance::Rect;
pub use session::DocumentSession;
