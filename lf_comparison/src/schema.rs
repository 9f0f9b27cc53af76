//! Per-category column layout of both load-flow reports and of the output sheet.

use crate::models::{ElementCategory, Quantity};
use crate::normalizer::KeyRule;

/// Where one source keeps a category's data and how its key columns are canonicalized.
#[derive(Debug, Clone, Copy)]
pub struct SourceColumns {
    pub sheet: &'static str,
    /// Accepted names for the identifier column, in order of preference.
    pub id_columns: &'static [&'static str],
    pub id_rule: KeyRule,
    /// Secondary key column (terminal number or bus), if the category has one.
    pub side_columns: Option<&'static [&'static str]>,
    pub side_rule: KeyRule,
    pub quantity_columns: &'static [(Quantity, &'static [&'static str])],
}

#[derive(Debug, Clone, Copy)]
pub struct CategorySchema {
    pub category: ElementCategory,
    /// Output headers for the key columns: (group label, data label).
    pub id_header: (&'static str, &'static str),
    pub side_header: Option<(&'static str, &'static str)>,
    pub quantities: &'static [Quantity],
    pub reference: SourceColumns,
    pub candidate: SourceColumns,
}

const BRANCH_QUANTITIES: &[Quantity] = &[Quantity::Current, Quantity::ActivePower, Quantity::ReactivePower];
const NODE_QUANTITIES: &[Quantity] = &[Quantity::VoltageMagnitude, Quantity::VoltageAngle];

const BRANCH_COLUMNS: &[(Quantity, &[&str])] = &[
    (Quantity::Current, &["I"]),
    (Quantity::ActivePower, &["P"]),
    (Quantity::ReactivePower, &["Q"]),
];

const LINES: CategorySchema = CategorySchema {
    category: ElementCategory::Lines,
    id_header: ("ID", "id"),
    side_header: Some(("SIDE", "side")),
    quantities: BRANCH_QUANTITIES,
    reference: SourceColumns {
        sheet: "Line",
        id_columns: &["Name (mrid)"],
        id_rule: KeyRule::Prefix(19),
        side_columns: Some(&["Terminal number"]),
        side_rule: KeyRule::Terminal,
        quantity_columns: BRANCH_COLUMNS,
    },
    candidate: SourceColumns {
        sheet: "Line",
        id_columns: &["id"],
        id_rule: KeyRule::Prefix(19),
        side_columns: Some(&["side", "side_x"]),
        side_rule: KeyRule::Terminal,
        quantity_columns: BRANCH_COLUMNS,
    },
};

const X_LINES: CategorySchema = CategorySchema {
    category: ElementCategory::XLines,
    id_header: ("ID", "id"),
    side_header: Some(("BUS", "Bus")),
    quantities: BRANCH_QUANTITIES,
    reference: SourceColumns {
        sheet: "Line",
        id_columns: &["Name (mrid)"],
        id_rule: KeyRule::Prefix(19),
        side_columns: Some(&["Bus"]),
        side_rule: KeyRule::Prefix(8),
        quantity_columns: BRANCH_COLUMNS,
    },
    candidate: SourceColumns {
        sheet: "X-Nodes",
        id_columns: &["id"],
        id_rule: KeyRule::Prefix(19),
        side_columns: Some(&["BUS", "Bus"]),
        side_rule: KeyRule::Prefix(8),
        quantity_columns: BRANCH_COLUMNS,
    },
};

const NODES: CategorySchema = CategorySchema {
    category: ElementCategory::Nodes,
    id_header: ("ID", "Bus"),
    side_header: None,
    quantities: NODE_QUANTITIES,
    reference: SourceColumns {
        sheet: "Bus",
        id_columns: &["Name (mrid)"],
        id_rule: KeyRule::Prefix(8),
        side_columns: None,
        side_rule: KeyRule::Verbatim,
        quantity_columns: &[
            (Quantity::VoltageMagnitude, &["U"]),
            (Quantity::VoltageAngle, &["theta"]),
        ],
    },
    candidate: SourceColumns {
        sheet: "Bus",
        id_columns: &["BUS", "Bus"],
        id_rule: KeyRule::Prefix(8),
        side_columns: None,
        side_rule: KeyRule::Verbatim,
        quantity_columns: &[
            (Quantity::VoltageMagnitude, &["U", "v_mag"]),
            (Quantity::VoltageAngle, &["theta", "v_angle"]),
        ],
    },
};

const X_NODES: CategorySchema = CategorySchema {
    category: ElementCategory::XNodes,
    id_header: ("ID", "id"),
    side_header: None,
    quantities: NODE_QUANTITIES,
    reference: SourceColumns {
        sheet: "Bus",
        id_columns: &["Name (mrid)"],
        id_rule: KeyRule::Prefix(8),
        side_columns: None,
        side_rule: KeyRule::Verbatim,
        quantity_columns: &[
            (Quantity::VoltageMagnitude, &["U"]),
            (Quantity::VoltageAngle, &["theta"]),
        ],
    },
    candidate: SourceColumns {
        sheet: "X-Nodes",
        id_columns: &["id"],
        id_rule: KeyRule::BoundaryNode,
        side_columns: None,
        side_rule: KeyRule::Verbatim,
        quantity_columns: &[
            (Quantity::VoltageMagnitude, &["U", "boundary_v_mag"]),
            (Quantity::VoltageAngle, &["theta", "boundary_v_angle"]),
        ],
    },
};

impl CategorySchema {
    pub fn for_category(category: ElementCategory) -> &'static CategorySchema {
        match category {
            ElementCategory::Lines => &LINES,
            ElementCategory::XLines => &X_LINES,
            ElementCategory::Nodes => &NODES,
            ElementCategory::XNodes => &X_NODES,
        }
    }

    /// Synthetic row written above the data header, labeling each column group.
    pub fn group_header(&self, reference_label: &str, candidate_label: &str) -> Vec<String> {
        let n = self.quantities.len();
        let mut row = vec![self.id_header.0.to_string()];
        if let Some((group, _)) = self.side_header {
            row.push(group.to_string());
        }
        row.extend(std::iter::repeat(reference_label.to_string()).take(n));
        row.extend(std::iter::repeat(candidate_label.to_string()).take(n));
        row.extend(std::iter::repeat("ABSOLUTE DIFFERENCES".to_string()).take(n));
        row.extend(std::iter::repeat("PERCENTAGE DIFFERENCES".to_string()).take(n));
        row.push("TIMESTAMP".to_string());
        row
    }

    pub fn data_header(&self) -> Vec<String> {
        let mut row = vec![self.id_header.1.to_string()];
        if let Some((_, label)) = self.side_header {
            row.push(label.to_string());
        }
        for _source in 0..2 {
            row.extend(self.quantities.iter().map(|q| q.label().to_string()));
        }
        row.extend(self.quantities.iter().map(|q| format!("{}_diff_abs", q.label())));
        row.extend(self.quantities.iter().map(|q| format!("{}_diff_pct", q.label())));
        row.push("Timestamp".to_string());
        row
    }
}
