use linq_core::{
    Error, Output, OutputShape, Query, Record, Strategy, Table, Value, avg, col, collect, count,
    count_rows, field, linq, lit, max, min, record, sum,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn sample_table() -> Table {
    Table::new(
        ["id", "v"],
        vec![
            record! { "id" => 1, "v" => 10 },
            record! { "id" => 2, "v" => 20 },
            record! { "id" => 1, "v" => 5 },
        ],
    )
    .unwrap()
}

fn users() -> Table {
    Table::from_json(
        r#"[
            {"uid": 1, "name": "ada", "age": 36},
            {"uid": 2, "name": "bob", "age": 17},
            {"uid": 3, "name": "cy", "age": 52}
        ]"#,
    )
    .unwrap()
}

fn orders() -> Table {
    Table::from_json(
        r#"[
            {"oid": 10, "owner": 1, "amount": 30},
            {"oid": 11, "owner": 3, "amount": 12},
            {"oid": 12, "owner": 1, "amount": 8},
            {"oid": 13, "owner": 9, "amount": 99}
        ]"#,
    )
    .unwrap()
}

fn ints(rows: &[Record], name: &str) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get(name).and_then(Value::as_i64))
        .collect()
}

// ============================================================================
// AGGREGATION
// ============================================================================

#[test]
fn test_where_then_whole_table_sum() {
    init_tracing();
    let t = sample_table();
    let rows = linq()
        .from(&t)
        .filter(col("id").equals(1))
        .select([("total", sum(col("v")))])
        .to_records()
        .unwrap();
    assert_eq!(rows, vec![record! { "total" => 15 }]);
}

#[test]
fn test_group_by_sum_per_group() {
    init_tracing();
    let t = sample_table();
    let rows = linq()
        .from(&t)
        .group_by(col("id"))
        .select([("total", sum(col("v")))])
        .to_records()
        .unwrap();
    assert_eq!(rows, vec![record! { "total" => 15 }, record! { "total" => 20 }]);
}

#[test]
fn test_group_by_with_key_and_several_aggregators() {
    let t = sample_table();
    let rows = linq()
        .from(&t)
        .group_by(col("id"))
        .select([
            ("id", col("id")),
            ("n", count_rows()),
            ("lo", min(col("v"))),
            ("hi", max(col("v"))),
            ("mean", avg(col("v"))),
            ("all", collect(col("v"))),
        ])
        .to_records()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            record! {
                "id" => 1, "n" => 2, "lo" => 5, "hi" => 10, "mean" => 7.5,
                "all" => vec![Value::Int(10), Value::Int(5)],
            },
            record! {
                "id" => 2, "n" => 1, "lo" => 20, "hi" => 20, "mean" => 20.0,
                "all" => vec![Value::Int(20)],
            },
        ]
    );
}

#[test]
fn test_every_group_boundary_is_found() {
    let t = Table::new(
        ["k", "v"],
        vec![
            record! { "k" => "c", "v" => 1 },
            record! { "k" => "a", "v" => 2 },
            record! { "k" => "b", "v" => 3 },
            record! { "k" => "a", "v" => 4 },
            record! { "k" => "c", "v" => 5 },
            record! { "k" => "d", "v" => 6 },
            record! { "k" => "b", "v" => 7 },
            record! { "k" => "b", "v" => 8 },
        ],
    )
    .unwrap();
    let rows = linq()
        .from(&t)
        .group_by(col("k"))
        .select([("k", col("k")), ("total", sum(col("v"))), ("n", count(col("v")))])
        .to_records()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            record! { "k" => "a", "total" => 6, "n" => 2 },
            record! { "k" => "b", "total" => 18, "n" => 3 },
            record! { "k" => "c", "total" => 6, "n" => 2 },
            record! { "k" => "d", "total" => 6, "n" => 1 },
        ]
    );
}

#[test]
fn test_aggregates_over_empty_input() {
    let t = sample_table();
    let rows = linq()
        .from(&t)
        .filter(col("v").gt(100))
        .select([
            ("total", sum(col("v"))),
            ("n", count_rows()),
            ("all", collect(col("v"))),
            ("id", col("id")),
        ])
        .to_records()
        .unwrap();
    assert_eq!(
        rows,
        vec![record! {
            "total" => Value::Null,
            "n" => 0,
            "all" => Vec::<Value>::new(),
            "id" => Value::Null,
        }]
    );

    let grouped = linq()
        .from(&t)
        .filter(col("v").gt(100))
        .group_by(col("id"))
        .select([("total", sum(col("v")))])
        .to_records()
        .unwrap();
    assert!(grouped.is_empty());
}

#[test]
fn test_sum_overflow_is_an_error() {
    let t = Table::new(
        ["v"],
        vec![record! { "v" => i64::MAX }, record! { "v" => 1 }],
    )
    .unwrap();
    let result = linq().from(&t).select([("total", sum(col("v")))]).to_records();
    assert_eq!(result.unwrap_err(), Error::Overflow);
}

// ============================================================================
// PROJECTION, FILTER, ORDER
// ============================================================================

#[test]
fn test_projection_identity() {
    let t = sample_table();
    let rows = linq().from(&t).to_records().unwrap();
    assert_eq!(rows, t.rows());
}

#[test]
fn test_alias_keeps_binding() {
    let t = sample_table();
    let rows = linq().from(t.alias("t")).to_records().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], record! { "t" => record! { "id" => 1, "v" => 10 } });

    let projected = linq()
        .from(t.alias("t"))
        .select([("v", field("t", "v"))])
        .to_records()
        .unwrap();
    assert_eq!(ints(&projected, "v"), vec![10, 20, 5]);
}

#[test]
fn test_filter_keeps_matching_rows_in_order() {
    let t = sample_table();
    let rows = linq()
        .from(&t)
        .filter(col("v").ge(10))
        .select([("v", col("v")), ("double", col("v") * 2)])
        .to_records()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            record! { "v" => 10, "double" => 20 },
            record! { "v" => 20, "double" => 40 },
        ]
    );
}

#[test]
fn test_null_condition_drops_row() {
    let t = Table::new(
        ["id", "v"],
        vec![record! { "id" => 1, "v" => Value::Null }, record! { "id" => 2, "v" => 3 }],
    )
    .unwrap();
    let rows = linq().from(&t).filter(col("v").gt(0)).to_records().unwrap();
    assert_eq!(ints(&rows, "id"), vec![2]);

    let negated = linq().from(&t).filter(!col("v").gt(0)).to_records().unwrap();
    assert!(negated.is_empty());
}

#[test]
fn test_order_by_is_stable() {
    let t = Table::new(
        ["name", "rank"],
        vec![
            record! { "name" => "a", "rank" => 2 },
            record! { "name" => "b", "rank" => 1 },
            record! { "name" => "c", "rank" => 2 },
            record! { "name" => "d", "rank" => 1 },
            record! { "name" => "e", "rank" => 0 },
        ],
    )
    .unwrap();
    let rows = linq().from(&t).order_by(col("rank")).to_records().unwrap();
    let names: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.get("name").and_then(Value::as_str))
        .collect();
    assert_eq!(names, vec!["e", "b", "d", "a", "c"]);

    // the source table keeps its order
    assert_eq!(t.get(0).and_then(|row| row.get("name")), Some(&Value::from("a")));
}

#[test]
fn test_order_by_descending_via_negation() {
    let t = sample_table();
    let rows = linq()
        .from(&t)
        .order_by(-col("v"))
        .select([("v", col("v"))])
        .to_records()
        .unwrap();
    assert_eq!(ints(&rows, "v"), vec![20, 10, 5]);
}

// ============================================================================
// JOIN
// ============================================================================

#[test]
fn test_cross_join_cardinality() {
    let a = sample_table();
    let b = users();
    let rows = linq().from(&a).inner_join(&b).to_records().unwrap();
    assert_eq!(rows.len(), a.len() * b.len());
    assert_eq!(
        rows[1],
        record! {
            "_1" => record! { "id" => 1, "v" => 10 },
            "_2" => record! { "uid" => 2, "name" => "bob", "age" => 17 },
        }
    );
}

#[test]
fn test_inner_join_on_condition() {
    init_tracing();
    let u = users();
    let o = orders();
    let rows = linq()
        .from(u.alias("u"))
        .inner_join(o.alias("o").on(field("u", "uid").equals(field("o", "owner"))))
        .filter(field("o", "amount").gt(10))
        .select([("name", col("name")), ("amount", col("amount"))])
        .to_records()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            record! { "name" => "ada", "amount" => 30 },
            record! { "name" => "cy", "amount" => 12 },
        ]
    );
}

#[test]
fn test_join_group_aggregate() {
    let u = users();
    let o = orders();
    let rows = linq()
        .from(u.alias("u"))
        .inner_join(o.alias("o").on(field("u", "uid").equals(field("o", "owner"))))
        .group_by(field("u", "name"))
        .select([("name", field("u", "name")), ("spent", sum(field("o", "amount")))])
        .to_records()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            record! { "name" => "ada", "spent" => 38 },
            record! { "name" => "cy", "spent" => 12 },
        ]
    );
}

// ============================================================================
// GROUPED OUTPUT
// ============================================================================

#[test]
fn test_group_without_aggregate_emits_groups() {
    let t = sample_table();
    let query = linq().from(&t).group_by(col("id"));
    assert!(query.shape().unwrap().is_group());
    assert_eq!(query.to_records().unwrap_err(), Error::GroupedOutput);

    let groups = query.to_vec().unwrap();
    assert_eq!(
        groups,
        vec![
            Output::Group(vec![
                record! { "id" => 1, "v" => 10 },
                record! { "id" => 1, "v" => 5 },
            ]),
            Output::Group(vec![record! { "id" => 2, "v" => 20 }]),
        ]
    );
}

#[test]
fn test_order_by_is_kept_within_groups() {
    let t = Table::new(
        ["k", "v"],
        vec![
            record! { "k" => 2, "v" => 9 },
            record! { "k" => 1, "v" => 3 },
            record! { "k" => 2, "v" => 1 },
            record! { "k" => 1, "v" => 2 },
        ],
    )
    .unwrap();

    let groups = linq()
        .from(&t)
        .order_by(col("v"))
        .group_by(col("k"))
        .select([("v", col("v"))])
        .to_vec()
        .unwrap();
    assert_eq!(
        groups,
        vec![
            Output::Group(vec![record! { "v" => 2 }, record! { "v" => 3 }]),
            Output::Group(vec![record! { "v" => 1 }, record! { "v" => 9 }]),
        ]
    );

    let firsts = linq()
        .from(&t)
        .order_by(col("v"))
        .group_by(col("k"))
        .select([("k", col("k")), ("first", collect(col("v")))])
        .to_records()
        .unwrap();
    assert_eq!(
        firsts,
        vec![
            record! { "k" => 1, "first" => vec![Value::Int(2), Value::Int(3)] },
            record! { "k" => 2, "first" => vec![Value::Int(1), Value::Int(9)] },
        ]
    );
}

#[test]
fn test_mixed_numeric_keys_group_once_per_value() {
    let base = 1i64 << 53;
    let rows = (0..200)
        .map(|i| {
            let k = if i % 13 == 0 {
                Value::Float(base as f64)
            } else {
                Value::Int(base - 4 + (i % 11))
            };
            record! { "k" => k }
        })
        .collect();
    let t = Table::new(["k"], rows).unwrap();

    let counts = linq()
        .from(&t)
        .group_by(col("k"))
        .select([("k", col("k")), ("n", count_rows())])
        .to_records()
        .unwrap();
    assert_eq!(counts.len(), 11);
    let total: i64 = ints(&counts, "n").iter().sum();
    assert_eq!(total, 200);
}

#[test]
fn test_pipe_streams_every_item() {
    let t = sample_table();
    let mut seen = Vec::new();
    linq()
        .from(&t)
        .select([("v", col("v"))])
        .pipe(|item| {
            if let Some(row) = item.as_row() {
                seen.push(row.clone());
            }
        })
        .unwrap();
    assert_eq!(ints(&seen, "v"), vec![10, 20, 5]);
}

// ============================================================================
// SHAPE AND PLAN
// ============================================================================

#[test]
fn test_shape_is_known_before_execution() {
    let empty = Table::new(["id", "v"], Vec::new()).unwrap();
    let shape = linq()
        .from(&empty)
        .select([("id", col("id")), ("w", col("v") + 1)])
        .shape()
        .unwrap();
    assert_eq!(shape.record().field_names(), vec!["id", "w"]);
    assert!(matches!(shape, OutputShape::Row(_)));

    let joined = linq().from(&empty).inner_join(users().alias("u")).shape();
    assert_eq!(
        joined.unwrap().to_string(),
        "row {_1: {id, v}, u: {uid, name, age}}"
    );
}

#[test]
fn test_strategy_selection() {
    fn strategy(query: Query<'_>) -> Strategy {
        query.plan().unwrap().strategy()
    }

    let t = sample_table();
    assert_eq!(strategy(linq().from(&t)), Strategy::SimpleScan);
    assert_eq!(strategy(linq().from(&t).order_by(col("v"))), Strategy::Materialize);
    assert_eq!(
        strategy(linq().from(&t).select([("n", count_rows())])),
        Strategy::Aggregate
    );
    assert_eq!(strategy(linq().from(&t).group_by(col("id"))), Strategy::Group);
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_errors_are_raised_before_any_row_is_read() {
    let t = sample_table();
    assert_eq!(linq().select([("x", lit(1))]).to_vec().unwrap_err(), Error::MissingSource);
    assert_eq!(
        linq().from(&t).select([("x", col("missing"))]).to_vec().unwrap_err(),
        Error::UnknownField("missing".to_string())
    );
    assert!(matches!(
        linq().from(&t).group_by(sum(col("v"))).to_vec(),
        Err(Error::InvalidAggregate(_))
    ));
    assert_eq!(
        linq().from(&t).inner_join(&t).filter(col("v").gt(1)).to_vec().unwrap_err(),
        Error::AmbiguousField("v".to_string())
    );
}

#[test]
fn test_type_errors_surface_during_execution() {
    let t = Table::new(
        ["v"],
        vec![record! { "v" => 1 }, record! { "v" => "two" }],
    )
    .unwrap();
    let result = linq().from(&t).select([("w", col("v") * 2)]).to_records();
    assert!(matches!(result, Err(Error::TypeMismatch { .. })));

    let zero = linq().from(&t).filter(col("v").equals(1)).select([("w", col("v") / 0)]);
    assert_eq!(zero.to_records().unwrap_err(), Error::DivisionByZero);
}
