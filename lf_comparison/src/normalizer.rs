use crate::models::ElementKey;
use crate::schema::SourceColumns;

/// How a raw identifier cell becomes a join key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRule {
    /// Keep as is, only trimmed.
    Verbatim,
    /// Trim, replace inner whitespace with `_`, keep the first `n` characters.
    Prefix(usize),
    /// Terminal number: trimmed, integral floats rendered without the fraction.
    Terminal,
    /// Boundary-node code embedded in a composite identifier.
    BoundaryNode,
}

const BOUNDARY_MARKER: char = 'X';
const BOUNDARY_OFFSET: usize = 9;
const BOUNDARY_WIDTH: usize = 8;

impl KeyRule {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            KeyRule::Verbatim => raw.trim().to_string(),
            KeyRule::Prefix(width) => truncate(&collapse_whitespace(raw), *width),
            KeyRule::Terminal => terminal_tag(raw),
            KeyRule::BoundaryNode => boundary_node_id(raw),
        }
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn truncate(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

fn terminal_tag(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => format!("{}", v as i64),
        _ => trimmed.to_string(),
    }
}

/// Extract the 8-character boundary-node code.
///
/// `X…` identifiers keep their first 8 characters. Composite identifiers with
/// the marker at offset 9 (`GABCDE11 XAB_XX11 1`) yield the 8 characters from
/// that offset. Anything else, including identifiers too short to hold the
/// offset, is returned unchanged.
pub fn boundary_node_id(raw: &str) -> String {
    let id = collapse_whitespace(raw);
    if id.starts_with(BOUNDARY_MARKER) {
        return truncate(&id, BOUNDARY_WIDTH);
    }

    let chars: Vec<char> = id.chars().collect();
    if chars.len() > BOUNDARY_OFFSET && chars[BOUNDARY_OFFSET] == BOUNDARY_MARKER {
        return chars[BOUNDARY_OFFSET..]
            .iter()
            .take(BOUNDARY_WIDTH)
            .collect();
    }

    id
}

/// Canonical key for one row of a source report.
pub fn element_key(columns: &SourceColumns, raw_id: &str, raw_side: Option<&str>) -> ElementKey {
    let id = columns.id_rule.apply(raw_id);
    let side = match (columns.side_columns, raw_side) {
        (Some(_), Some(raw)) => Some(columns.side_rule.apply(raw)),
        (Some(_), None) => Some(String::new()),
        (None, _) => None,
    };
    ElementKey::new(id, side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ElementCategory;
    use crate::schema::CategorySchema;

    #[test]
    fn test_prefix_rule() {
        assert_eq!(KeyRule::Prefix(8).apply("GABCDE11_extra"), "GABCDE11");
        assert_eq!(
            KeyRule::Prefix(19).apply(" GABCDE11 GFGHIJ11 1 trailing"),
            "GABCDE11_GFGHIJ11_1"
        );
        assert_eq!(KeyRule::Prefix(8).apply("SHORT"), "SHORT");
    }

    #[test]
    fn test_terminal_rule() {
        assert_eq!(KeyRule::Terminal.apply("1.0"), "1");
        assert_eq!(KeyRule::Terminal.apply(" 2 "), "2");
        assert_eq!(KeyRule::Terminal.apply("ONE"), "ONE");
    }

    #[test]
    fn test_boundary_node_rule() {
        assert_eq!(boundary_node_id("XAB_XX11_extra"), "XAB_XX11");
        assert_eq!(boundary_node_id("GABCDE11 XAB_XX11 1"), "XAB_XX11");
        assert_eq!(boundary_node_id("GABCDE11_XAB_XX11_1"), "XAB_XX11");
        // too short to hold the offset
        assert_eq!(boundary_node_id("GABC"), "GABC");
        assert_eq!(boundary_node_id("GABCDE11_Y"), "GABCDE11_Y");
    }

    #[test]
    fn test_element_key_per_category() {
        let lines = CategorySchema::for_category(ElementCategory::Lines);
        let key = element_key(&lines.reference, "GABCDE11 GFGHIJ11 1 (mrid)", Some("2.0"));
        assert_eq!(key.id, "GABCDE11_GFGHIJ11_1");
        assert_eq!(key.side.as_deref(), Some("2"));

        let nodes = CategorySchema::for_category(ElementCategory::Nodes);
        let key = element_key(&nodes.candidate, "GABCDE11_0", None);
        assert_eq!(key.id, "GABCDE11");
        assert_eq!(key.side, None);
    }
}
