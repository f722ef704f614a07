//! The open-element context stack.
//!
//! Tracks the path of currently-open elements (name plus attributes) and a
//! parallel names-only mirror used for fast suffix matching against the
//! handler table.

/// One level of the open-element path: the element name and its attributes,
/// in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFrame {
    /// The element's local name.
    pub name: String,
    /// The element's attributes, in document order.
    pub attrs: Vec<(String, String)>,
}

/// The context stack: `path`/`stack` from the distilled spec, kept as one
/// type since they are always pushed and popped together.
#[derive(Debug, Default)]
pub struct ContextStack {
    path: Vec<PathFrame>,
    stack: Vec<String>,
}

impl ContextStack {
    /// Creates an empty context stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a newly-opened element.
    pub fn push(&mut self, name: impl Into<String>, attrs: Vec<(String, String)>) {
        let name = name.into();
        self.stack.push(name.clone());
        self.path.push(PathFrame { name, attrs });
    }

    /// Pops the innermost open element. Only valid to call once an
    /// `on_exit` handler has matched an extant open element; an empty-stack
    /// pop here would indicate a dispatcher bug, not a document error.
    pub fn pop(&mut self) -> Option<PathFrame> {
        debug_assert!(!self.stack.is_empty(), "pop on empty context stack");
        self.stack.pop();
        self.path.pop()
    }

    /// The attributes of the innermost open element, if any.
    pub fn current_attrs(&self) -> Option<&[(String, String)]> {
        self.path.last().map(|f| f.attrs.as_slice())
    }

    /// The attributes of the element one level above the innermost one, if
    /// any (used by the `ExtendedData/Data/value` text handler, which reads
    /// `name` off the parent `Data` element).
    pub fn parent_attrs(&self) -> Option<&[(String, String)]> {
        let len = self.path.len();
        if len < 2 {
            return None;
        }
        Some(self.path[len - 2].attrs.as_slice())
    }

    /// The innermost open element's name, if any.
    pub fn current_name(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    /// The name of the element one level above the innermost one, if any
    /// (used on `LinearRing` exit to tell an outer boundary from a hole, and
    /// on `coordinates` exit to tell a `Point` from a `LineString`/`LinearRing`).
    pub fn parent_name(&self) -> Option<&str> {
        let len = self.stack.len();
        if len < 2 {
            return None;
        }
        Some(self.stack[len - 2].as_str())
    }

    /// Clears both stacks. Called on `Placemark` enter: the element itself
    /// is not pushed, and no ancestor context survives inside it.
    pub fn reset(&mut self) {
        self.path.clear();
        self.stack.clear();
    }

    /// True when no element is currently open.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Matches `pattern` (innermost element first) against the head of the
    /// stack. An anchored suffix match: only the first `pattern.len()`
    /// entries (from the head) are compared; no requirement on what, if
    /// anything, lies further up.
    pub fn match_suffix(&self, pattern: &[&str]) -> bool {
        if pattern.len() > self.stack.len() {
            return false;
        }
        pattern
            .iter()
            .zip(self.stack.iter().rev())
            .all(|(want, have)| want == have)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trips() {
        let mut ctx = ContextStack::new();
        ctx.push("Polygon", vec![]);
        ctx.push("outerBoundaryIs", vec![]);
        assert_eq!(ctx.current_name(), Some("outerBoundaryIs"));
        ctx.pop();
        assert_eq!(ctx.current_name(), Some("Polygon"));
    }

    #[test]
    fn match_suffix_is_anchored_at_head() {
        let mut ctx = ContextStack::new();
        ctx.push("MultiGeometry", vec![]);
        ctx.push("Point", vec![]);
        ctx.push("coordinates", vec![]);
        assert!(ctx.match_suffix(&["coordinates", "Point", "MultiGeometry"]));
        assert!(ctx.match_suffix(&["coordinates", "Point"]));
        assert!(!ctx.match_suffix(&["coordinates", "LineString"]));
    }

    #[test]
    fn match_suffix_requires_no_ancestors_beyond_pattern() {
        let mut ctx = ContextStack::new();
        ctx.push("Folder", vec![]);
        ctx.push("Point", vec![]);
        ctx.push("coordinates", vec![]);
        assert!(ctx.match_suffix(&["coordinates", "Point"]));
    }

    #[test]
    fn parent_attrs_reads_one_level_up() {
        let mut ctx = ContextStack::new();
        ctx.push("Data", vec![("name".to_string(), "kind".to_string())]);
        ctx.push("value", vec![]);
        assert_eq!(
            ctx.parent_attrs(),
            Some(&[("name".to_string(), "kind".to_string())][..])
        );
    }

    #[test]
    fn parent_name_reads_one_level_up() {
        let mut ctx = ContextStack::new();
        ctx.push("LineString", vec![]);
        ctx.push("coordinates", vec![]);
        assert_eq!(ctx.parent_name(), Some("LineString"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut ctx = ContextStack::new();
        ctx.push("Folder", vec![]);
        ctx.reset();
        assert!(ctx.is_empty());
        assert!(ctx.current_name().is_none());
    }
}
