use crate::error::{MissingColumnSnafu, NonNumericSnafu, OverflowSnafu, ReshapeError};
use crate::loader::Table;
use crate::types::{EntityTotals, EntityWinner, VoteRecord, WinnerSummary};
use crate::util::{canonical_label, normalize_name};
use log::warn;
use std::collections::HashMap;

/// Which axis the row labels of a wide table run along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// One row per candidate, one column per entity (department table).
    RowsAreCandidates,
    /// One row per entity, one column per candidate (locality and
    /// presidential tables).
    RowsAreEntities,
}

#[derive(Debug, Clone)]
pub struct WideLayout<'a> {
    pub id_columns: &'a [String],
    /// The id column whose values label each row.
    pub key_column: &'a str,
    pub orientation: Orientation,
    /// Restrict the melt to these value columns, in this order.
    pub value_columns: Option<&'a [String]>,
}

/// Output of a melt: the records plus every (entity, candidate) pair that
/// appeared more than once and was summed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reshaped {
    pub records: Vec<VoteRecord>,
    pub repeated: Vec<(String, String)>,
}

/// Melt a wide table into one record per (entity, candidate) pair.
///
/// Records come out column-major: for each value column, for each row.
/// Repeated pairs are summed into the first occurrence. Fails with
/// `Overflow` when a pair, an entity or a candidate would exceed `u64`.
pub fn reshape_wide_to_long(table: &Table, layout: &WideLayout) -> Result<Reshaped, ReshapeError> {
    let key_idx = table
        .column_index(layout.key_column)
        .ok_or_else(|| MissingColumnSnafu { column: layout.key_column }.build())?;
    for id in layout.id_columns {
        if table.column_index(id).is_none() {
            return MissingColumnSnafu { column: id.as_str() }.fail();
        }
    }

    let value_idx: Vec<usize> = match layout.value_columns {
        Some(cols) => cols
            .iter()
            .map(|c| {
                table
                    .column_index(c)
                    .ok_or_else(|| MissingColumnSnafu { column: c.as_str() }.build())
            })
            .collect::<Result<_, _>>()?,
        None => (0..table.headers.len())
            .filter(|i| {
                *i != key_idx
                    && !layout
                        .id_columns
                        .iter()
                        .any(|id| id.trim() == table.headers[*i].trim())
            })
            .collect(),
    };

    let mut records: Vec<VoteRecord> = Vec::new();
    let mut repeated: Vec<(String, String)> = Vec::new();
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    let mut entity_sums: HashMap<String, u64> = HashMap::new();
    let mut candidate_sums: HashMap<String, u64> = HashMap::new();
    for col in value_idx {
        let header = canonical_label(&table.headers[col]);
        for row in &table.rows {
            let key = canonical_label(&row[key_idx].as_text());
            let (entity, candidate) = match layout.orientation {
                Orientation::RowsAreCandidates => (header.clone(), key),
                Orientation::RowsAreEntities => (key, header.clone()),
            };
            let votes = match row[col].as_count() {
                Some(v) => v,
                None => {
                    return NonNumericSnafu {
                        entity,
                        candidate,
                        value: row[col].as_text(),
                    }
                    .fail()
                }
            };
            for (sums, name) in [(&mut entity_sums, &entity), (&mut candidate_sums, &candidate)] {
                let sum = sums.entry(name.clone()).or_insert(0);
                *sum = sum
                    .checked_add(votes)
                    .ok_or_else(|| OverflowSnafu { entity: entity.as_str() }.build())?;
            }
            match seen.get(&(entity.clone(), candidate.clone())) {
                Some(&idx) => {
                    warn!(
                        "{}: repeated entry for {} / {}, summing",
                        table.path.display(),
                        entity,
                        candidate
                    );
                    // Bounded by the entity sum checked above.
                    records[idx].votes += votes;
                    if !repeated.iter().any(|(e, c)| *e == entity && *c == candidate) {
                        repeated.push((entity, candidate));
                    }
                }
                None => {
                    seen.insert((entity.clone(), candidate.clone()), records.len());
                    records.push(VoteRecord {
                        entity_name: entity,
                        candidate,
                        votes,
                    });
                }
            }
        }
    }
    Ok(Reshaped { records, repeated })
}

/// Per-entity totals in first-seen order, with lookup by exact and by
/// normalized name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalsTable {
    entries: Vec<EntityTotals>,
    by_name: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
    collisions: Vec<(String, String)>,
}

impl TotalsTable {
    pub fn entries(&self) -> &[EntityTotals] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, entity_name: &str) -> Option<&EntityTotals> {
        self.by_name.get(entity_name).map(|i| &self.entries[*i])
    }

    /// Lookup through `normalize_name`, as used by the geo join.
    pub fn get_normalized(&self, raw_name: &str) -> Option<&EntityTotals> {
        self.by_key
            .get(&normalize_name(raw_name))
            .map(|i| &self.entries[*i])
    }

    /// `(kept, shadowed)` entity names that normalize to the same join key.
    pub fn key_collisions(&self) -> &[(String, String)] {
        &self.collisions
    }

    pub fn total_values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.total_votes as f64).collect()
    }
}

/// Group records by entity in a single pass. Sums saturate at `u64::MAX`;
/// records from `reshape_wide_to_long` never reach it.
pub fn aggregate_totals(records: &[VoteRecord]) -> TotalsTable {
    #[derive(Default)]
    struct Acc {
        name: String,
        total: u64,
        per_candidate: Vec<(String, u64)>,
        cand_idx: HashMap<String, usize>,
    }

    let mut accs: Vec<Acc> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for r in records {
        let idx = *by_name.entry(r.entity_name.clone()).or_insert_with(|| {
            accs.push(Acc {
                name: r.entity_name.clone(),
                ..Acc::default()
            });
            accs.len() - 1
        });
        let acc = &mut accs[idx];
        acc.total = acc.total.saturating_add(r.votes);
        match acc.cand_idx.get(&r.candidate) {
            Some(&ci) => {
                let slot = &mut acc.per_candidate[ci].1;
                *slot = slot.saturating_add(r.votes);
            }
            None => {
                acc.cand_idx.insert(r.candidate.clone(), acc.per_candidate.len());
                acc.per_candidate.push((r.candidate.clone(), r.votes));
            }
        }
    }

    let entries: Vec<EntityTotals> = accs
        .into_iter()
        .map(|a| EntityTotals {
            entity_name: a.name,
            total_votes: a.total,
            per_candidate: a.per_candidate,
        })
        .collect();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut collisions: Vec<(String, String)> = Vec::new();
    for (i, e) in entries.iter().enumerate() {
        let key = normalize_name(&e.entity_name);
        if let Some(&kept) = by_key.get(&key) {
            warn!(
                "entities {:?} and {:?} share the join key {:?}; keeping the first",
                entries[kept].entity_name, e.entity_name, key
            );
            collisions.push((entries[kept].entity_name.clone(), e.entity_name.clone()));
            continue;
        }
        by_key.insert(key, i);
    }
    TotalsTable {
        entries,
        by_name,
        by_key,
        collisions,
    }
}

/// Every candidate holding a positive maximum is a winner; a zero maximum
/// means nobody won.
pub fn find_entity_winner(totals: &EntityTotals) -> EntityWinner {
    let max = totals.per_candidate.iter().map(|(_, v)| *v).max().unwrap_or(0);
    if max == 0 {
        return EntityWinner::NoWinner;
    }
    let mut at_max: Vec<String> = totals
        .per_candidate
        .iter()
        .filter(|(_, v)| *v == max)
        .map(|(c, _)| c.clone())
        .collect();
    if at_max.len() == 1 {
        EntityWinner::Single {
            candidate: at_max.remove(0),
            votes: max,
        }
    } else {
        EntityWinner::Tied {
            candidates: at_max,
            votes: max,
        }
    }
}

/// Sum per candidate across all entities, first-seen order.
pub fn candidate_totals(records: &[VoteRecord]) -> Vec<(String, u64)> {
    let mut out: Vec<(String, u64)> = Vec::new();
    let mut idx: HashMap<&str, usize> = HashMap::new();
    for r in records {
        match idx.get(r.candidate.as_str()) {
            Some(&i) => out[i].1 = out[i].1.saturating_add(r.votes),
            None => {
                idx.insert(r.candidate.as_str(), out.len());
                out.push((r.candidate.clone(), r.votes));
            }
        }
    }
    out
}

pub fn winner_summary(target: &str, totals: &TotalsTable) -> WinnerSummary {
    let mut won = Vec::new();
    let mut lost = Vec::new();
    for e in totals.entries() {
        if find_entity_winner(e).includes(target) {
            won.push(e.entity_name.clone());
        } else {
            lost.push(e.entity_name.clone());
        }
    }
    WinnerSummary {
        target_candidate: target.to_string(),
        won,
        lost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Cell;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        Table {
            path: PathBuf::from("test.csv"),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn c(v: u64) -> Cell {
        Cell::Count(v)
    }

    fn department_table() -> Table {
        table(
            &["Candidato", "norte", "sur"],
            vec![
                vec![t("X"), c(5), c(20)],
                vec![t("Y"), c(15), c(0)],
                vec![t("Z"), c(0), c(0)],
            ],
        )
    }

    fn candidate_layout(ids: &[String]) -> WideLayout<'_> {
        WideLayout {
            id_columns: ids,
            key_column: "Candidato",
            orientation: Orientation::RowsAreCandidates,
            value_columns: None,
        }
    }

    #[test]
    fn reshape_departments_capitalizes_headers() {
        let ids = vec!["Candidato".to_string()];
        let recs = reshape_wide_to_long(&department_table(), &candidate_layout(&ids))
            .unwrap()
            .records;
        assert_eq!(recs.len(), 6);
        assert_eq!(recs[0], VoteRecord::new("Norte", "X", 5));
        assert_eq!(recs[1], VoteRecord::new("Norte", "Y", 15));
        assert_eq!(recs[3], VoteRecord::new("Sur", "X", 20));
    }

    #[test]
    fn scenario_norte_sur_totals_and_winners() {
        let ids = vec!["Candidato".to_string()];
        let recs = reshape_wide_to_long(&department_table(), &candidate_layout(&ids))
            .unwrap()
            .records;
        let totals = aggregate_totals(&recs);
        assert_eq!(totals.len(), 2);
        let norte = totals.get("Norte").unwrap();
        let sur = totals.get("Sur").unwrap();
        assert_eq!(norte.total_votes, 20);
        assert_eq!(sur.total_votes, 20);
        assert_eq!(
            find_entity_winner(norte),
            EntityWinner::Single {
                candidate: "Y".to_string(),
                votes: 15
            }
        );
        assert_eq!(
            find_entity_winner(sur),
            EntityWinner::Single {
                candidate: "X".to_string(),
                votes: 20
            }
        );
    }

    #[test]
    fn reshape_localities_with_extra_id_column() {
        let ids = vec!["Localidad".to_string(), "Departamento".to_string()];
        let tbl = table(
            &["Localidad", "Departamento", "Ana", "Beto"],
            vec![
                vec![t("Andacollo"), t("Minas"), c(10), c(0)],
                vec![t("Huinganco"), t("Minas"), c(3), c(4)],
            ],
        );
        let layout = WideLayout {
            id_columns: &ids,
            key_column: "Localidad",
            orientation: Orientation::RowsAreEntities,
            value_columns: None,
        };
        let recs = reshape_wide_to_long(&tbl, &layout).unwrap().records;
        assert_eq!(
            recs,
            vec![
                VoteRecord::new("Andacollo", "Ana", 10),
                VoteRecord::new("Huinganco", "Ana", 3),
                VoteRecord::new("Andacollo", "Beto", 0),
                VoteRecord::new("Huinganco", "Beto", 4),
            ]
        );
    }

    #[test]
    fn value_column_whitelist_restricts_and_orders() {
        let ids = vec!["Departamento".to_string()];
        let only = vec!["Milei".to_string(), "Massa".to_string()];
        let tbl = table(
            &["Departamento", "Massa", "Blanco", "Milei"],
            vec![vec![t("Minas"), c(1), c(99), c(2)]],
        );
        let layout = WideLayout {
            id_columns: &ids,
            key_column: "Departamento",
            orientation: Orientation::RowsAreEntities,
            value_columns: Some(&only),
        };
        let recs = reshape_wide_to_long(&tbl, &layout).unwrap().records;
        assert_eq!(
            recs,
            vec![
                VoteRecord::new("Minas", "Milei", 2),
                VoteRecord::new("Minas", "Massa", 1),
            ]
        );
    }

    #[test]
    fn missing_key_column_is_reported() {
        let ids = vec!["Candidato".to_string()];
        let tbl = table(&["Nombre", "Minas"], vec![vec![t("X"), c(1)]]);
        let err = reshape_wide_to_long(&tbl, &candidate_layout(&ids)).unwrap_err();
        assert!(matches!(err, ReshapeError::MissingColumn { ref column } if column == "Candidato"));
    }

    #[test]
    fn text_in_vote_column_is_non_numeric() {
        let ids = vec!["Candidato".to_string()];
        let tbl = table(&["Candidato", "Minas"], vec![vec![t("X"), t("n/a")]]);
        let err = reshape_wide_to_long(&tbl, &candidate_layout(&ids)).unwrap_err();
        assert!(matches!(err, ReshapeError::NonNumeric { .. }));
    }

    #[test]
    fn repeated_pairs_are_merged() {
        let ids = vec!["Candidato".to_string()];
        let tbl = table(
            &["Candidato", "minas", "Minas"],
            vec![vec![t("X"), c(1), c(2)], vec![t("x"), c(3), c(4)]],
        );
        let out = reshape_wide_to_long(&tbl, &candidate_layout(&ids)).unwrap();
        assert_eq!(out.records, vec![VoteRecord::new("Minas", "X", 10)]);
        assert_eq!(out.repeated, vec![("Minas".to_string(), "X".to_string())]);
    }

    #[test]
    fn vote_sums_past_u64_are_rejected() {
        let ids = vec!["Candidato".to_string()];
        let tbl = table(
            &["Candidato", "Minas"],
            vec![vec![t("A"), c(u64::MAX)], vec![t("B"), c(1)]],
        );
        let err = reshape_wide_to_long(&tbl, &candidate_layout(&ids)).unwrap_err();
        assert!(matches!(err, ReshapeError::Overflow { ref entity } if entity == "Minas"));
    }

    #[test]
    fn aggregate_saturates_instead_of_panicking() {
        let recs = vec![
            VoteRecord::new("Minas", "A", u64::MAX),
            VoteRecord::new("Minas", "B", 1),
            VoteRecord::new("Chos Malal", "A", 1),
        ];
        let totals = aggregate_totals(&recs);
        assert_eq!(totals.get("Minas").unwrap().total_votes, u64::MAX);
        assert_eq!(candidate_totals(&recs)[0], ("A".to_string(), u64::MAX));
    }

    #[test]
    fn shared_join_keys_are_listed() {
        let totals = aggregate_totals(&[
            VoteRecord::new("Loncopué", "A", 3),
            VoteRecord::new("LONCOPUE", "A", 1),
        ]);
        assert_eq!(
            totals.key_collisions(),
            &[("Loncopué".to_string(), "LONCOPUE".to_string())]
        );
        assert_eq!(totals.get_normalized("loncopue").unwrap().total_votes, 3);
    }

    #[test]
    fn exact_tie_is_shared_by_all_leaders() {
        let e = EntityTotals {
            entity_name: "Chorriaca".to_string(),
            total_votes: 20,
            per_candidate: vec![
                ("A".to_string(), 10),
                ("B".to_string(), 10),
                ("C".to_string(), 0),
            ],
        };
        let w = find_entity_winner(&e);
        assert_eq!(
            w,
            EntityWinner::Tied {
                candidates: vec!["A".to_string(), "B".to_string()],
                votes: 10
            }
        );
        assert!(w.includes("A"));
        assert!(w.includes("B"));
        assert!(!w.includes("C"));
        assert_eq!(w.label(), "A / B (10)");
    }

    #[test]
    fn all_zero_entity_has_no_winner() {
        let e = EntityTotals {
            entity_name: "Naunauco".to_string(),
            total_votes: 0,
            per_candidate: vec![("A".to_string(), 0), ("B".to_string(), 0)],
        };
        assert_eq!(find_entity_winner(&e), EntityWinner::NoWinner);
        assert_eq!(find_entity_winner(&EntityTotals::zero("x")), EntityWinner::NoWinner);
    }

    #[test]
    fn summary_applies_tie_and_zero_rules() {
        let recs = vec![
            VoteRecord::new("Tie", "A", 10),
            VoteRecord::new("Tie", "B", 10),
            VoteRecord::new("Zero", "A", 0),
            VoteRecord::new("Zero", "B", 0),
            VoteRecord::new("Lead", "A", 7),
            VoteRecord::new("Lead", "B", 2),
            VoteRecord::new("Trail", "A", 1),
            VoteRecord::new("Trail", "B", 9),
        ];
        let totals = aggregate_totals(&recs);
        let a = winner_summary("A", &totals);
        assert_eq!(a.won, vec!["Tie", "Lead"]);
        assert_eq!(a.lost, vec!["Zero", "Trail"]);
        let b = winner_summary("B", &totals);
        assert_eq!(b.won, vec!["Tie", "Trail"]);
        let nobody = winner_summary("C", &totals);
        assert!(nobody.won.is_empty());
        assert_eq!(nobody.lost.len(), 4);
    }

    #[test]
    fn candidate_totals_keep_first_seen_order() {
        let recs = vec![
            VoteRecord::new("Norte", "Y", 15),
            VoteRecord::new("Norte", "X", 5),
            VoteRecord::new("Sur", "X", 20),
        ];
        assert_eq!(
            candidate_totals(&recs),
            vec![("Y".to_string(), 15), ("X".to_string(), 25)]
        );
    }

    #[test]
    fn normalized_lookup_ignores_case_and_accents() {
        let totals = aggregate_totals(&[VoteRecord::new("Loncopué", "A", 3)]);
        assert_eq!(totals.get_normalized(" LONCOPUE").unwrap().total_votes, 3);
        assert!(totals.get("Loncopue").is_none());
    }

    proptest! {
        #[test]
        fn reshape_then_aggregate_preserves_column_sums(
            grid in prop::collection::vec(prop::collection::vec(0u64..100_000, 4), 1..6)
        ) {
            let headers = ["Candidato", "a", "b", "c", "d"];
            let rows: Vec<Vec<Cell>> = grid
                .iter()
                .enumerate()
                .map(|(i, vals)| {
                    let mut row = vec![Cell::Text(format!("Cand{}", i))];
                    row.extend(vals.iter().map(|v| Cell::Count(*v)));
                    row
                })
                .collect();
            let tbl = table(&headers, rows);
            let ids = vec!["Candidato".to_string()];
            let recs = reshape_wide_to_long(&tbl, &candidate_layout(&ids))
                .unwrap()
                .records;
            let totals = aggregate_totals(&recs);
            for (col, name) in ["A", "B", "C", "D"].iter().enumerate() {
                let expected: u64 = grid.iter().map(|r| r[col]).sum();
                let e = totals.get(name).unwrap();
                prop_assert_eq!(e.total_votes, expected);
                prop_assert_eq!(e.per_candidate.iter().map(|(_, v)| *v).sum::<u64>(), expected);
            }
        }
    }
}
