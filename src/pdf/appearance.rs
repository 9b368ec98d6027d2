use crate::pdf::annotation::{Annotation, AnnotationKind};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub const HIGHLIGHT_OPACITY: f32 = 0.5;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})$").expect("valid regex")
});

/// Circle approximation constant for cubic Bézier corners.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Parse `#RRGGBB`. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = HEX_COLOR.captures(s.trim())?;
        let channel = |i: usize| u8::from_str_radix(&caps[i], 16).ok().map(|v| v as f32 / 255.0);
        Some(Color {
            r: channel(1)?,
            g: channel(2)?,
            b: channel(3)?,
        })
    }

    /// Read an RGB `/C` array.
    pub fn from_components(components: &[Object]) -> Option<Self> {
        match components {
            [r, g, b] => Some(Color {
                r: number(r)?,
                g: number(g)?,
                b: number(b)?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02X}{:02X}{:02X}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.r),
            Object::Real(self.g),
            Object::Real(self.b),
        ])
    }

    fn darker(self) -> Self {
        Color {
            r: self.r * 0.6,
            g: self.g * 0.6,
            b: self.b * 0.6,
        }
    }

    fn operands(self) -> Vec<Object> {
        vec![
            Object::Real(self.r),
            Object::Real(self.g),
            Object::Real(self.b),
        ]
    }
}

/// Rectangle in PDF user space, lower-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// `[llx lly urx ury]`
    pub fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.x),
            Object::Real(self.y),
            Object::Real(self.x + self.width),
            Object::Real(self.y + self.height),
        ])
    }

    /// Read a `/Rect` array, normalising the corner order.
    pub fn from_object(obj: &Object) -> Option<Self> {
        let arr = obj.as_array().ok()?;
        if arr.len() != 4 {
            return None;
        }
        let (x1, y1, x2, y2) = (
            number(&arr[0])?,
            number(&arr[1])?,
            number(&arr[2])?,
            number(&arr[3])?,
        );
        Some(Rect {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        })
    }

    /// Corners in QuadPoints order: top-left, top-right, bottom-left, bottom-right.
    pub fn quad_points(self) -> Object {
        let (left, right) = (self.x, self.x + self.width);
        let (bottom, top) = (self.y, self.y + self.height);
        Object::Array(
            [left, top, right, top, left, bottom, right, bottom]
                .into_iter()
                .map(Object::Real)
                .collect(),
        )
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn op(operator: &str, operands: &[f32]) -> Operation {
    Operation::new(
        operator,
        operands.iter().map(|&v| Object::Real(v)).collect(),
    )
}

/// Build the normal appearance of `annotation` as a form XObject.
///
/// Returns `None` when the color does not parse; the annotation is then
/// shown with the viewer's default icon.
pub fn build_appearance(annotation: &Annotation) -> Option<Stream> {
    let color = Color::parse(&annotation.color)?;
    let rect = annotation.rect;

    let (operations, resources, width, height) = match annotation.kind {
        AnnotationKind::Highlight => (
            highlight_operations(rect.width, rect.height, color),
            dictionary! {
                "ExtGState" => dictionary! {
                    "GS0" => dictionary! {
                        "Type" => "ExtGState",
                        "CA" => HIGHLIGHT_OPACITY,
                        "ca" => HIGHLIGHT_OPACITY,
                        "BM" => "Multiply",
                    },
                },
            },
            rect.width,
            rect.height,
        ),
        AnnotationKind::TextNote { .. } => (
            bubble_operations(rect.width, color),
            Dictionary::new(),
            rect.width,
            rect.width,
        ),
    };

    let content = Content { operations }.encode().ok()?;
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => 1,
        "BBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(width),
            Object::Real(height),
        ],
        "Resources" => resources,
    };
    Some(Stream::new(dict, content))
}

/// Semi-transparent fill over the whole box.
fn highlight_operations(width: f32, height: f32, color: Color) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(b"GS0".to_vec())]),
        Operation::new("rg", color.operands()),
        op("re", &[0.0, 0.0, width, height]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Speech bubble with a tail and three text lines, filling a `size` square.
fn bubble_operations(size: f32, color: Color) -> Vec<Operation> {
    let s = size;
    let margin = s * 0.05;
    let (x0, y0, x1, y1) = (margin, s * 0.3, s - margin, s - margin);
    let r = s * 0.15;
    let k = r * KAPPA;
    let (tail_left, tail_right) = (s * 0.25, s * 0.45);
    let tail_tip = (s * 0.2, margin);

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", color.operands()),
        Operation::new("RG", color.darker().operands()),
        op("w", &[s * 0.04]),
        op("m", &[x0 + r, y1]),
        op("l", &[x1 - r, y1]),
        op("c", &[x1 - r + k, y1, x1, y1 - r + k, x1, y1 - r]),
        op("l", &[x1, y0 + r]),
        op("c", &[x1, y0 + r - k, x1 - r + k, y0, x1 - r, y0]),
        op("l", &[tail_right, y0]),
        op("l", &[tail_tip.0, tail_tip.1]),
        op("l", &[tail_left, y0]),
        op("l", &[x0 + r, y0]),
        op("c", &[x0 + r - k, y0, x0, y0 + r - k, x0, y0 + r]),
        op("l", &[x0, y1 - r]),
        op("c", &[x0, y1 - r + k, x0 + r - k, y1, x0 + r, y1]),
        Operation::new("h", vec![]),
        Operation::new("B", vec![]),
    ];

    let body = y1 - y0;
    let inset = s * 0.15;
    for (i, fraction) in [0.75, 0.5, 0.25].into_iter().enumerate() {
        let y = y0 + body * fraction;
        let end = if i == 2 { x1 - 2.0 * inset } else { x1 - inset };
        ops.push(op("m", &[x0 + inset, y]));
        ops.push(op("l", &[end, y]));
    }
    ops.push(Operation::new("S", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_range::PageNumber;

    fn page() -> PageNumber {
        PageNumber::new(1).unwrap()
    }

    fn bbox(stream: &Stream) -> Vec<f32> {
        stream
            .dict
            .get(b"BBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| number(o).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(
            Color::parse("#FF0000"),
            Some(Color {
                r: 1.0,
                g: 0.0,
                b: 0.0
            })
        );
        assert_eq!(Color::parse(" #00ff00 ").map(Color::to_hex), Some("#00FF00".into()));
        assert_eq!(Color::parse("FF0000"), None);
        assert_eq!(Color::parse("#FFF"), None);
        assert_eq!(Color::parse("#GG0000"), None);
        assert_eq!(Color::parse("yellow"), None);
    }

    #[test]
    fn test_color_components_round_trip() {
        let color = Color::parse("#3366CC").unwrap();
        let Object::Array(components) = color.to_object() else {
            panic!("expected array");
        };
        assert_eq!(Color::from_components(&components).unwrap().to_hex(), "#3366CC");
    }

    #[test]
    fn test_rect_from_unordered_corners() {
        let obj = Object::Array(vec![200.into(), 50.into(), 100.into(), 10.into()]);
        assert_eq!(Rect::from_object(&obj), Some(Rect::new(100.0, 10.0, 100.0, 40.0)));
    }

    #[test]
    fn test_highlight_appearance_matches_rect() {
        let annotation = Annotation::highlight(page(), Rect::new(50.0, 600.0, 300.0, 20.0), "#FFFF00");
        let stream = build_appearance(&annotation).unwrap();
        assert_eq!(bbox(&stream), vec![0.0, 0.0, 300.0, 20.0]);

        let gs = stream
            .dict
            .get(b"Resources")
            .and_then(|r| r.as_dict())
            .and_then(|r| r.get(b"ExtGState"))
            .and_then(|g| g.as_dict())
            .and_then(|g| g.get(b"GS0"))
            .and_then(|g| g.as_dict())
            .unwrap();
        assert_eq!(number(gs.get(b"ca").unwrap()), Some(HIGHLIGHT_OPACITY));

        let content = String::from_utf8_lossy(&stream.content).into_owned();
        assert!(content.contains("re"));
        assert!(content.contains("/GS0 gs"));
    }

    #[test]
    fn test_note_appearance_is_square() {
        let annotation = Annotation::text_note(page(), 10.0, 20.0, 24.0, "#FFCC00", None, "hi");
        let stream = build_appearance(&annotation).unwrap();
        assert_eq!(bbox(&stream), vec![0.0, 0.0, 24.0, 24.0]);
        let content = String::from_utf8_lossy(&stream.content).into_owned();
        assert!(content.contains(" c"));
        assert!(content.contains("B"));
    }

    #[test]
    fn test_bad_color_has_no_appearance() {
        let note = Annotation::text_note(page(), 0.0, 0.0, 24.0, "not-a-color", None, "hi");
        let highlight = Annotation::highlight(page(), Rect::new(0.0, 0.0, 10.0, 10.0), "#12");
        assert!(build_appearance(&note).is_none());
        assert!(build_appearance(&highlight).is_none());
    }
}
