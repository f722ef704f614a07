//! The placemark assembler: a SAX-style state machine that consumes element
//! enter/text/exit events and produces finished [`Placemark`](crate::geometry::Placemark)
//! values.
//!
//! Grounded on `meridian-io`'s `KmlReader::parse_kml` (an `in_placemark` flag
//! plus a handful of `current_*` fields driven off a quick-xml event loop),
//! generalized here into a proper geometry stack and context path so nested
//! `MultiGeometry`/`Polygon` structures and `ExtendedData` fold correctly
//! instead of being special-cased one level deep.

use std::collections::VecDeque;

use tracing::warn;

use crate::context::ContextStack;
use crate::coords::{parse_line, parse_point};
use crate::error::{KmlStreamError, Result};
use crate::geometry::{BoundaryKind, Geometry, Placemark};
use crate::handlers::{classify_enter, classify_exit, find_text_rule, CoordShape, EnterRule, ExitRule, TextRule};

/// Whether the assembler has seen a `<kml>` start tag it hasn't yet matched
/// with a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Before the first `<kml>`, or after its matching close.
    OutKml,
    /// Inside `<kml>...</kml>`.
    Kml,
}

/// Consumes SAX-style events and assembles completed placemarks.
///
/// One `AssemblerState` is driven by exactly one parse run. `emit` accumulates
/// placemarks that are fully finished (closed and order-restored) but not yet
/// handed to a consumer; the batcher in [`crate::batch`] drains it.
#[derive(Debug)]
pub struct AssemblerState {
    status: DocumentStatus,
    ctx: ContextStack,
    geom_stack: Vec<Geometry>,
    /// `geom_stack.len()` recorded at the enter of each `Point`, `LineString`,
    /// or `LinearRing` (the three elements whose exit assumes a `coordinates`
    /// child pushed something, but whose child may have failed to parse and
    /// pushed nothing). Compared against the current depth on exit to tell
    /// "nothing to fold" apart from a real fold.
    geom_depth_stack: Vec<usize>,
    placemark: Option<Placemark>,
    text_buffer: String,
    /// Completed placemarks awaiting delivery, in document order.
    pub emit: VecDeque<Placemark>,
}

impl Default for AssemblerState {
    fn default() -> Self {
        Self::new()
    }
}

impl AssemblerState {
    /// Creates an assembler ready to consume the start of a document.
    pub fn new() -> Self {
        Self {
            status: DocumentStatus::OutKml,
            ctx: ContextStack::new(),
            geom_stack: Vec::new(),
            geom_depth_stack: Vec::new(),
            placemark: None,
            text_buffer: String::new(),
            emit: VecDeque::new(),
        }
    }

    /// An element start tag, with its attributes in document order.
    pub fn on_start_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> Result<()> {
        self.text_buffer.clear();

        if self.placemark.is_none() {
            match classify_enter(name) {
                EnterRule::BeginPlacemark => {
                    self.ctx.reset();
                    self.placemark = Some(Placemark::new());
                    return Ok(());
                }
                EnterRule::EnterKml => {
                    self.status = DocumentStatus::Kml;
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }

        // Inside a placemark: Placemark cannot nest.
        if name == "Placemark" {
            return Err(KmlStreamError::NestedPlacemark);
        }

        match classify_enter(name) {
            EnterRule::BeginMultiGeometry => {
                self.ctx.push(name, attrs);
                self.geom_stack.push(Geometry::empty_multi());
            }
            EnterRule::BeginPolygon => {
                self.ctx.push(name, attrs);
                self.geom_stack.push(Geometry::empty_polygon());
            }
            _ => {
                if matches!(name, "Point" | "LineString" | "LinearRing") {
                    self.geom_depth_stack.push(self.geom_stack.len());
                }
                self.ctx.push(name, attrs);
            }
        }
        Ok(())
    }

    /// A run of character data. May be called more than once for a single
    /// element's text content (chunk boundaries); the buffer accumulates and
    /// is only consumed on the owning element's `on_end_element`.
    pub fn on_characters(&mut self, text: &str) {
        self.text_buffer.push_str(text);
    }

    /// An element end tag.
    pub fn on_end_element(&mut self, name: &str) -> Result<()> {
        if self.placemark.is_none() {
            if name == "kml" {
                self.status = DocumentStatus::OutKml;
            }
            return Ok(());
        }

        if name == "Placemark" {
            let mut pm = self.placemark.take().expect("checked is_none above");
            pm.finalize_order();
            self.emit.push_back(pm);
            self.ctx.reset();
            return Ok(());
        }

        // Consume any accumulated text for the element now closing, before
        // popping it off the context stack (the text rule needs the closing
        // element, and its parents, still visible).
        if let Some(rule) = find_text_rule(&self.ctx) {
            self.apply_text_rule(rule);
        }
        self.text_buffer.clear();

        match classify_exit(name) {
            ExitRule::CloseCoordinates => {
                self.ctx.pop();
            }
            ExitRule::CloseGeometry => {
                self.ctx.pop();
                if name == "Polygon" {
                    // Always present: pushed unconditionally at its own enter.
                    self.fold_completed_geometry()?;
                } else {
                    // Point / LineString: only present if coordinates parsed.
                    let recorded = self
                        .geom_depth_stack
                        .pop()
                        .expect("depth recorded at the matching Point/LineString enter");
                    if self.geom_stack.len() > recorded {
                        self.fold_completed_geometry()?;
                    }
                }
            }
            ExitRule::CloseLinearRing => {
                let recorded = self
                    .geom_depth_stack
                    .pop()
                    .expect("depth recorded at the matching LinearRing enter");
                if self.geom_stack.len() > recorded {
                    self.fold_linear_ring()?;
                }
                self.ctx.pop();
            }
            ExitRule::CloseMultiGeometry => {
                self.ctx.pop();
                // Always present: pushed unconditionally at its own enter.
                self.fold_completed_geometry()?;
            }
            ExitRule::ExitKml | ExitRule::ClosePlacemark => {
                // Unreachable inside a placemark for ExitKml (kml cannot open
                // inside a Placemark); ClosePlacemark handled above.
                self.ctx.pop();
            }
            ExitRule::PopOnly => {
                self.ctx.pop();
            }
        }
        Ok(())
    }

    /// Signals end of input. Fatal if a `<kml>` open was never matched with a
    /// close, or a `Placemark` was left open.
    pub fn on_end_document(&mut self) -> Result<()> {
        if self.status == DocumentStatus::Kml || self.placemark.is_some() {
            return Err(KmlStreamError::UnexpectedEndOfDocument);
        }
        Ok(())
    }

    fn apply_text_rule(&mut self, rule: TextRule) {
        let text = self.text_buffer.as_str();
        let placemark = self
            .placemark
            .as_mut()
            .expect("text rules only apply while a placemark is open");

        match rule {
            TextRule::Attribute(key) => placemark.put_attribute(key, text.trim()),
            TextRule::SimpleData => {
                if let Some(key) = attr_value(self.ctx.current_attrs(), "name") {
                    placemark.put_attribute(key, text.trim());
                }
            }
            TextRule::ExtendedDataValue => {
                if let Some(key) = attr_value(self.ctx.parent_attrs(), "name") {
                    placemark.put_attribute(key, text.trim());
                }
            }
            TextRule::Coordinates(CoordShape::Point) => match parse_point(text) {
                Ok(p) => self.geom_stack.push(Geometry::Point(p)),
                Err(e) => warn!(error = %e, "dropping malformed point coordinates"),
            },
            TextRule::Coordinates(CoordShape::Line) => match parse_line(text) {
                Ok(l) => self.geom_stack.push(Geometry::Line(l)),
                Err(e) => warn!(error = %e, "dropping malformed line coordinates"),
            },
        }
    }

    /// Folds a `LinearRing` just parsed off the top of the geometry stack
    /// into the `Polygon` beneath it, as an outer boundary or a hole
    /// depending on the ring's own parent element.
    fn fold_linear_ring(&mut self) -> Result<()> {
        let kind = match self.ctx.parent_name() {
            Some("outerBoundaryIs") => BoundaryKind::Outer,
            _ => BoundaryKind::Inner,
        };
        let line = match self.geom_stack.pop() {
            Some(Geometry::Line(l)) => l,
            Some(other) => {
                self.geom_stack.push(other);
                return Err(KmlStreamError::UnexpectedFold {
                    path: "LinearRing".to_string(),
                });
            }
            None => {
                return Err(KmlStreamError::UnexpectedFold {
                    path: "LinearRing".to_string(),
                })
            }
        };

        match self.geom_stack.last_mut() {
            Some(Geometry::Polygon {
                outer_boundary,
                inner_boundaries,
            }) => {
                match kind {
                    BoundaryKind::Outer => *outer_boundary = Some(line),
                    BoundaryKind::Inner => inner_boundaries.push(line),
                }
                Ok(())
            }
            _ => Err(KmlStreamError::UnexpectedFold {
                path: "LinearRing".to_string(),
            }),
        }
    }

    /// Pops the just-closed geometry off the stack and folds it into
    /// whatever sits below it: another geometry's slot, or the placemark
    /// itself if the stack is now empty.
    fn fold_completed_geometry(&mut self) -> Result<()> {
        let completed = self
            .geom_stack
            .pop()
            .ok_or_else(|| KmlStreamError::UnexpectedFold {
                path: "geometry".to_string(),
            })?;

        match self.geom_stack.last_mut() {
            Some(Geometry::MultiGeometry(children)) => {
                children.push(completed);
                Ok(())
            }
            Some(_) => Err(KmlStreamError::UnexpectedFold {
                path: "geometry".to_string(),
            }),
            None => {
                let placemark = self
                    .placemark
                    .as_mut()
                    .expect("geometry folding only happens while a placemark is open");
                placemark.attach_geometry(completed);
                Ok(())
            }
        }
    }
}

fn attr_value<'a>(attrs: Option<&'a [(String, String)]>, key: &str) -> Option<&'a str> {
    attrs?.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_kml(a: &mut AssemblerState) {
        a.on_start_element("kml", vec![]).unwrap();
    }

    #[test]
    fn assembles_single_point_placemark() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        a.on_start_element("name", vec![]).unwrap();
        a.on_characters("Spot");
        a.on_end_element("name").unwrap();
        a.on_start_element("Point", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("1,2,3");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("Point").unwrap();
        a.on_end_element("Placemark").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();

        assert_eq!(a.emit.len(), 1);
        let pm = &a.emit[0];
        assert_eq!(pm.attrs.get("name"), Some(&"Spot".to_string()));
        assert_eq!(pm.geoms.len(), 1);
        assert!(matches!(pm.geoms[0], Geometry::Point(_)));
    }

    #[test]
    fn assembles_polygon_with_hole_in_document_order() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        a.on_start_element("Polygon", vec![]).unwrap();
        a.on_start_element("outerBoundaryIs", vec![]).unwrap();
        a.on_start_element("LinearRing", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("0,0 10,0 10,10 0,10 0,0");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("LinearRing").unwrap();
        a.on_end_element("outerBoundaryIs").unwrap();
        a.on_start_element("innerBoundaryIs", vec![]).unwrap();
        a.on_start_element("LinearRing", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("2,2 4,2 4,4 2,4 2,2");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("LinearRing").unwrap();
        a.on_end_element("innerBoundaryIs").unwrap();
        a.on_end_element("Polygon").unwrap();
        a.on_end_element("Placemark").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();

        let pm = &a.emit[0];
        match &pm.geoms[0] {
            Geometry::Polygon {
                outer_boundary,
                inner_boundaries,
            } => {
                assert_eq!(outer_boundary.as_ref().unwrap().points.len(), 5);
                assert_eq!(inner_boundaries.len(), 1);
                assert_eq!(inner_boundaries[0].points.len(), 5);
            }
            other => panic!("expected Polygon, got {other:?}"),
        }
    }

    #[test]
    fn assembles_nested_multigeometry() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        a.on_start_element("MultiGeometry", vec![]).unwrap();
        a.on_start_element("Point", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("1,1");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("Point").unwrap();
        a.on_start_element("MultiGeometry", vec![]).unwrap();
        a.on_start_element("Point", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("2,2");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("Point").unwrap();
        a.on_end_element("MultiGeometry").unwrap();
        a.on_end_element("MultiGeometry").unwrap();
        a.on_end_element("Placemark").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();

        let pm = &a.emit[0];
        match &pm.geoms[0] {
            Geometry::MultiGeometry(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Geometry::Point(_)));
                assert!(matches!(children[1], Geometry::MultiGeometry(_)));
            }
            other => panic!("expected MultiGeometry, got {other:?}"),
        }
    }

    #[test]
    fn extended_data_simple_and_typed_forms_both_land_as_attributes() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        a.on_start_element("ExtendedData", vec![]).unwrap();
        a.on_start_element("SchemaData", vec![]).unwrap();
        a.on_start_element(
            "SimpleData",
            vec![("name".to_string(), "kind".to_string())],
        )
        .unwrap();
        a.on_characters("volcano");
        a.on_end_element("SimpleData").unwrap();
        a.on_end_element("SchemaData").unwrap();
        a.on_start_element("Data", vec![("name".to_string(), "elevation".to_string())])
            .unwrap();
        a.on_start_element("value", vec![]).unwrap();
        a.on_characters("5895");
        a.on_end_element("value").unwrap();
        a.on_end_element("Data").unwrap();
        a.on_end_element("ExtendedData").unwrap();
        a.on_end_element("Placemark").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();

        let pm = &a.emit[0];
        assert_eq!(pm.attrs.get("kind"), Some(&"volcano".to_string()));
        assert_eq!(pm.attrs.get("elevation"), Some(&"5895".to_string()));
    }

    #[test]
    fn malformed_point_is_dropped_not_fatal() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        a.on_start_element("Point", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("not,a,,point,");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("Point").unwrap();
        a.on_end_element("Placemark").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();

        let pm = &a.emit[0];
        assert!(pm.geoms.is_empty());
    }

    #[test]
    fn malformed_linestring_is_dropped_not_fatal() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        a.on_start_element("LineString", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("nope nope");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("LineString").unwrap();
        a.on_end_element("Placemark").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();

        let pm = &a.emit[0];
        assert!(pm.geoms.is_empty());
    }

    #[test]
    fn malformed_outer_boundary_leaves_polygon_without_crashing() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        a.on_start_element("Polygon", vec![]).unwrap();
        a.on_start_element("outerBoundaryIs", vec![]).unwrap();
        a.on_start_element("LinearRing", vec![]).unwrap();
        a.on_start_element("coordinates", vec![]).unwrap();
        a.on_characters("garbage");
        a.on_end_element("coordinates").unwrap();
        a.on_end_element("LinearRing").unwrap();
        a.on_end_element("outerBoundaryIs").unwrap();
        a.on_end_element("Polygon").unwrap();
        a.on_end_element("Placemark").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();

        let pm = &a.emit[0];
        match &pm.geoms[0] {
            Geometry::Polygon { outer_boundary, .. } => assert!(outer_boundary.is_none()),
            other => panic!("expected Polygon, got {other:?}"),
        }
    }

    #[test]
    fn nested_placemark_is_fatal() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Placemark", vec![]).unwrap();
        let err = a.on_start_element("Placemark", vec![]).unwrap_err();
        assert!(matches!(err, KmlStreamError::NestedPlacemark));
    }

    #[test]
    fn unclosed_kml_is_fatal_at_end_of_document() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        let err = a.on_end_document().unwrap_err();
        assert!(matches!(err, KmlStreamError::UnexpectedEndOfDocument));
    }

    #[test]
    fn text_outside_any_placemark_is_ignored() {
        let mut a = AssemblerState::new();
        open_kml(&mut a);
        a.on_start_element("Document", vec![]).unwrap();
        a.on_start_element("name", vec![]).unwrap();
        a.on_characters("Document Title");
        a.on_end_element("name").unwrap();
        a.on_end_element("Document").unwrap();
        a.on_end_element("kml").unwrap();
        a.on_end_document().unwrap();
        assert!(a.emit.is_empty());
    }
}
