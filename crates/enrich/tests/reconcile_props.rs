use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

use semtab_enrich::{apply_reconciliation, parse_reconciliation_response, ServiceRegistry};
use semtab_model::aggregate::recompute_table;
use semtab_model::{Cell, Column, TableMeta, TableModel};

fn table(rows: usize) -> TableModel {
    let mut t = TableModel::new(TableMeta::default());
    t.upsert_column("City", Column::new("City"));
    for i in 0..rows {
        let row = format!("r{i}");
        t.push_row(row.as_str()).unwrap();
        t.set_cell(&row, "City", Cell::labeled(format!("city {i}"))).unwrap();
    }
    t.drain_journal();
    t
}

/// Column item plus one item per row; `None` rows are left out of the response.
fn response(rows: &[Option<Vec<(f64, bool)>>]) -> Value {
    let mut items = vec![json!({
        "id": "City",
        "metadata": [{"id": "geo:0", "name": "city", "score": 0, "match": true}]
    })];
    for (i, candidates) in rows.iter().enumerate() {
        let Some(candidates) = candidates else { continue };
        let metadata: Vec<Value> = candidates
            .iter()
            .enumerate()
            .map(|(j, (score, matched))| {
                json!({"id": format!("geo:{i}{j}"), "name": format!("c{j}"), "score": score, "match": matched})
            })
            .collect();
        items.push(json!({"id": format!("r{i}$City"), "metadata": metadata}));
    }
    Value::Array(items)
}

fn rows() -> impl Strategy<Value = Vec<Option<Vec<(f64, bool)>>>> {
    prop::collection::vec(
        prop::option::of(prop::collection::vec((0.0f64..=1.0, any::<bool>()), 0..4)),
        1..12,
    )
}

proptest! {
    #[test]
    fn summary_matches_cells_after_reconcile(rows in rows()) {
        let mut t = table(rows.len());
        let reconciler = ServiceRegistry::builtin().reconciler("geonames").unwrap();
        let parsed = parse_reconciliation_response(&response(&rows)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let out = apply_reconciliation(&mut t, "City", &parsed, &reconciler, now).unwrap();

        let annotated = t.cells().filter(|c| c.is_annotated()).count();
        let expected = rows.iter().filter(|r| matches!(r, Some(c) if !c.is_empty())).count();
        prop_assert_eq!(annotated, expected);
        prop_assert_eq!(out.annotated_cells, expected);
        prop_assert_eq!(t.summary(), &recompute_table(&t));
        prop_assert!(t.summary().min_meta_score <= t.summary().max_meta_score);

        let column = t.get_column("City").unwrap();
        prop_assert_eq!(column.context["geo"].reconciliated, expected);
        prop_assert_eq!(column.context["geo"].total, rows.len());
        match &column.annotation_meta {
            Some(meta) => {
                prop_assert!(expected > 0);
                let all_match = t.cells().filter(|c| c.is_annotated()).all(|c| {
                    c.annotation_meta.as_ref().map(|m| m.match_info.value).unwrap_or(true)
                });
                prop_assert_eq!(meta.match_info.value, all_match);
                prop_assert!(meta.lowest_score <= meta.highest_score);
            }
            None => prop_assert_eq!(expected, 0),
        }
    }
}
