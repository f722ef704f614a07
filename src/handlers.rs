//! Path-dispatched handler tables.
//!
//! Three small, statically-defined tables drive the assembler: one for
//! element enter, one for element exit, and one for text content. Enter and
//! exit are keyed by the element's own name — the grammar this crate
//! recognizes never needs more than one level of context to decide what an
//! enter or exit does, because the *folding* decision (which parent a
//! completed geometry lands in) is read off the live geometry stack, not off
//! the element path. Text handling is the exception: telling a `coordinates`
//! child of `Point` apart from one under `LineString` or `LinearRing`, and a
//! `SimpleData`/`value` element apart from arbitrary character data, genuinely
//! needs multi-level suffix patterns, so `TEXT_TABLE` is matched with
//! [`crate::context::ContextStack::match_suffix`] against patterns ordered
//! innermost-element-first.
//!
//! Patterns are intentionally not "anchored all the way to the document
//! root" the way a prefix match would be: `match_suffix` only inspects the
//! first `pattern.len()` entries from the head of the stack, so
//! `["coordinates", "Point"]` matches equally whether or not that `Point` sits
//! inside a `MultiGeometry`, a `Folder`, or directly under `Placemark`.

use crate::context::ContextStack;

/// What an element-enter should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterRule {
    /// `Placemark`: reset context, start a fresh placemark (guarded by the
    /// assembler on `placemark.is_none()`; violated on nested Placemarks).
    BeginPlacemark,
    /// `kml`: flip the document status gate to `Kml`.
    EnterKml,
    /// `MultiGeometry`: push an empty multigeometry frame.
    BeginMultiGeometry,
    /// `Polygon`: push an empty polygon frame.
    BeginPolygon,
    /// Any other element while inside a placemark: push context only.
    PushOnly,
}

/// Classifies an element-enter by its own name. Single-name patterns are
/// sufficient here: the distilled grammar never needs ancestor context to
/// decide what entering `Placemark`, `kml`, `MultiGeometry`, or `Polygon`
/// does.
pub fn classify_enter(name: &str) -> EnterRule {
    match name {
        "Placemark" => EnterRule::BeginPlacemark,
        "kml" => EnterRule::EnterKml,
        "MultiGeometry" => EnterRule::BeginMultiGeometry,
        "Polygon" => EnterRule::BeginPolygon,
        _ => EnterRule::PushOnly,
    }
}

/// What an element-exit should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRule {
    /// `Point`/`LineString`/`Polygon`: pop the geometry stack and fold the
    /// popped value into whatever now sits below it (or into the placemark).
    CloseGeometry,
    /// `coordinates`: consume the accumulated text (handled via
    /// [`TEXT_TABLE`]) and push the parsed value onto the geometry stack.
    CloseCoordinates,
    /// `LinearRing`: pop the just-closed line and fold it into the polygon
    /// below as an outer or inner boundary, per its own parent element.
    CloseLinearRing,
    /// `MultiGeometry`: pop, reverse children into document order, fold
    /// upward.
    CloseMultiGeometry,
    /// `Placemark`: finalize and move the placemark into the emit queue.
    ClosePlacemark,
    /// `kml`: flip the document status gate back to `OutKml`.
    ExitKml,
    /// Any other element while inside a placemark: pop context only.
    PopOnly,
}

/// Classifies an element-exit by its own name.
pub fn classify_exit(name: &str) -> ExitRule {
    match name {
        "Point" | "LineString" | "Polygon" => ExitRule::CloseGeometry,
        "coordinates" => ExitRule::CloseCoordinates,
        "LinearRing" => ExitRule::CloseLinearRing,
        "MultiGeometry" => ExitRule::CloseMultiGeometry,
        "Placemark" => ExitRule::ClosePlacemark,
        "kml" => ExitRule::ExitKml,
        _ => ExitRule::PopOnly,
    }
}

/// The shape of value a `coordinates` text fragment should be parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordShape {
    /// Parsed with [`crate::coords::parse_point`].
    Point,
    /// Parsed with [`crate::coords::parse_line`].
    Line,
}

/// What a text fragment, once its owning element closes, should do with the
/// accumulated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRule {
    /// `ExtendedData/SchemaData/SimpleData`: key from the element's own
    /// `name` attribute.
    SimpleData,
    /// `ExtendedData/Data/value`: key from the parent `Data` element's
    /// `name` attribute.
    ExtendedDataValue,
    /// A `coordinates` element; parsed per `CoordShape`.
    Coordinates(CoordShape),
    /// `name`, `description`, `TimeSpan/begin`, `TimeSpan/end`: a fixed
    /// attribute key.
    Attribute(&'static str),
}

/// Patterns are innermost-element-first, matching [`ContextStack::match_suffix`]'s
/// convention, and listed longest-first so the first match found in a linear
/// scan is the most specific one. No two patterns here are ambiguous for a
/// well-formed document (they diverge on their second token), so the ordering
/// is for documentation/discipline rather than to break real ties.
const TEXT_TABLE: &[(&[&str], TextRule)] = &[
    (
        &["coordinates", "LinearRing", "outerBoundaryIs", "Polygon"],
        TextRule::Coordinates(CoordShape::Line),
    ),
    (
        &["coordinates", "LinearRing", "innerBoundaryIs", "Polygon"],
        TextRule::Coordinates(CoordShape::Line),
    ),
    (
        &["SimpleData", "SchemaData", "ExtendedData"],
        TextRule::SimpleData,
    ),
    (&["value", "Data", "ExtendedData"], TextRule::ExtendedDataValue),
    (&["coordinates", "Point"], TextRule::Coordinates(CoordShape::Point)),
    (
        &["coordinates", "LineString"],
        TextRule::Coordinates(CoordShape::Line),
    ),
    (&["begin", "TimeSpan"], TextRule::Attribute("timespan_begin")),
    (&["end", "TimeSpan"], TextRule::Attribute("timespan_end")),
    (&["name"], TextRule::Attribute("name")),
    (&["description"], TextRule::Attribute("description")),
];

/// Finds the most specific text rule matching the current context path.
pub fn find_text_rule(ctx: &ContextStack) -> Option<TextRule> {
    TEXT_TABLE
        .iter()
        .find(|(pattern, _)| ctx.match_suffix(pattern))
        .map(|(_, rule)| *rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_rules_classify_known_elements() {
        assert_eq!(classify_enter("Placemark"), EnterRule::BeginPlacemark);
        assert_eq!(classify_enter("kml"), EnterRule::EnterKml);
        assert_eq!(classify_enter("MultiGeometry"), EnterRule::BeginMultiGeometry);
        assert_eq!(classify_enter("Polygon"), EnterRule::BeginPolygon);
        assert_eq!(classify_enter("Folder"), EnterRule::PushOnly);
    }

    #[test]
    fn exit_rules_classify_known_elements() {
        assert_eq!(classify_exit("Point"), ExitRule::CloseGeometry);
        assert_eq!(classify_exit("coordinates"), ExitRule::CloseCoordinates);
        assert_eq!(classify_exit("LinearRing"), ExitRule::CloseLinearRing);
        assert_eq!(classify_exit("MultiGeometry"), ExitRule::CloseMultiGeometry);
        assert_eq!(classify_exit("Placemark"), ExitRule::ClosePlacemark);
        assert_eq!(classify_exit("kml"), ExitRule::ExitKml);
        assert_eq!(classify_exit("Folder"), ExitRule::PopOnly);
    }

    #[test]
    fn text_rule_distinguishes_coordinate_parents() {
        let mut ctx = ContextStack::new();
        ctx.push("Point", vec![]);
        ctx.push("coordinates", vec![]);
        assert_eq!(
            find_text_rule(&ctx),
            Some(TextRule::Coordinates(CoordShape::Point))
        );

        let mut ctx = ContextStack::new();
        ctx.push("LineString", vec![]);
        ctx.push("coordinates", vec![]);
        assert_eq!(
            find_text_rule(&ctx),
            Some(TextRule::Coordinates(CoordShape::Line))
        );
    }

    #[test]
    fn text_rule_matches_regardless_of_multigeometry_wrapping() {
        let mut ctx = ContextStack::new();
        ctx.push("MultiGeometry", vec![]);
        ctx.push("Point", vec![]);
        ctx.push("coordinates", vec![]);
        assert_eq!(
            find_text_rule(&ctx),
            Some(TextRule::Coordinates(CoordShape::Point))
        );
    }

    #[test]
    fn text_rule_for_simple_data_requires_full_ancestor_chain() {
        let mut ctx = ContextStack::new();
        ctx.push("ExtendedData", vec![]);
        ctx.push("SchemaData", vec![]);
        ctx.push("SimpleData", vec![("name".to_string(), "kind".to_string())]);
        assert_eq!(find_text_rule(&ctx), Some(TextRule::SimpleData));
    }

    #[test]
    fn text_rule_none_for_unrecognized_path() {
        let mut ctx = ContextStack::new();
        ctx.push("Folder", vec![]);
        assert_eq!(find_text_rule(&ctx), None);
    }
}
