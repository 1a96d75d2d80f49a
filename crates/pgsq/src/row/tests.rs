use super::*;
use crate::cursor::{SqlValue, Target, VecCursor};
use crate::expr::CustomExpr;
use crate::field::{BooleanField, NumberField, StringField, TableInfo};

fn run<T>(rows: Vec<Vec<SqlValue>>, mapper: impl Fn(&mut Row<'_>) -> T) -> SqResult<Vec<T>> {
    let shape = discover(&mapper)?;
    let mut cursor = VecCursor::new(rows);
    bind_rows(&mut cursor, shape, &mapper)
}

fn fields() -> (NumberField, StringField) {
    let t = TableInfo::new("users");
    (NumberField::new("id", &t), StringField::new("name", &t))
}

#[test]
fn discovery_records_fields_in_order() {
    let (id, name) = fields();
    let shape = discover(|row| (row.int64(&id), row.null_string(&name))).unwrap();
    assert_eq!(shape.len(), 2);
    let sql: Vec<_> = shape.fields().iter().map(Fragment::sql).collect();
    assert_eq!(sql, vec!["users.id", "users.name"]);
    assert_eq!(shape.slots(), &[Slot::Int64(None), Slot::Text(None)]);
}

#[test]
fn discovery_returns_zero_values() {
    let (id, name) = fields();
    let mut row = Row::discovery();
    assert!(row.is_discovery());
    assert_eq!(row.int64(&id), 0);
    assert_eq!(row.string(&name), "");
    assert!(!row.string_valid(&name));
    assert!(row.error().is_none());
}

#[test]
fn extraction_reads_each_row() {
    let (id, name) = fields();
    let rows = vec![
        vec![SqlValue::from(1_i64), SqlValue::from("aaa")],
        vec![SqlValue::from(2_i64), SqlValue::Null],
    ];
    let out = run(rows, |row| (row.int64(&id), row.null_string(&name))).unwrap();
    assert_eq!(out, vec![(1, Some("aaa".to_string())), (2, None)]);
}

#[test]
fn empty_result_maps_to_empty_vec() {
    let (id, _) = fields();
    let out = run(Vec::new(), |row| row.int64(&id)).unwrap();
    assert!(out.is_empty());
}

#[test]
fn valid_accessors_report_nulls() {
    let (id, name) = fields();
    let rows = vec![vec![SqlValue::Null, SqlValue::from("x")]];
    let out = run(rows, |row| (row.int64_valid(&id), row.string_valid(&name))).unwrap();
    assert_eq!(out, vec![(false, true)]);
}

#[test]
fn float_slot_widens_integers() {
    let (id, _) = fields();
    let out = run(vec![vec![SqlValue::from(3_i64)]], |row| row.float64(&id)).unwrap();
    assert_eq!(out, vec![3.0]);
}

#[test]
fn predicates_read_as_bool() {
    let t = TableInfo::new("users");
    let active = BooleanField::new("active", &t);
    let many = CustomExpr::new("count(*) > ?").arg(1_i64);

    let shape = discover(|row| (row.bool(&active), row.bool(&many))).unwrap();
    assert_eq!(shape.fields()[1].sql(), "count(*) > ?");
    assert_eq!(shape.fields()[1].args().len(), 1);

    let rows = vec![vec![SqlValue::from(true), SqlValue::Null]];
    let out = run(rows, |row| (row.bool(&active), row.bool_valid(&many))).unwrap();
    assert_eq!(out, vec![(true, false)]);
}

#[test]
fn fewer_reads_than_discovered_is_binding_error() {
    let (id, name) = fields();
    let rows = vec![
        vec![SqlValue::from(1_i64), SqlValue::from("a")],
        vec![SqlValue::from(2_i64), SqlValue::from("b")],
    ];
    let err = run(rows, |row| {
        let id = row.int64(&id);
        if !row.is_discovery() && id == 2 {
            return id;
        }
        let _ = row.string(&name);
        id
    })
    .unwrap_err();

    let SqError::Binding { location, message } = err else {
        panic!("expected binding error, got {err:?}");
    };
    assert!(location.contains("tests.rs"));
    assert_eq!(message, "row mapper read 1 fields but 2 were discovered");
}

#[test]
fn shape_drift_is_binding_error_at_caller() {
    let (id, name) = fields();
    let rows = vec![vec![SqlValue::from(1_i64)]];
    let err = run(rows, |row| {
        if row.is_discovery() {
            row.int64(&id)
        } else {
            row.string(&name).len() as i64
        }
    })
    .unwrap_err();

    let SqError::Binding { location, message } = err else {
        panic!("expected binding error, got {err:?}");
    };
    assert!(location.contains("tests.rs"));
    assert_eq!(message, "accessor #1 reads text but discovery reserved int64");
}

#[test]
fn reading_past_discovery_is_binding_error() {
    let (id, name) = fields();
    let rows = vec![vec![SqlValue::from(1_i64)]];
    let err = run(rows, |row| {
        let id = row.int64(&id);
        if !row.is_discovery() {
            let _ = row.string(&name);
        }
        id
    })
    .unwrap_err();
    assert!(
        matches!(err, SqError::Binding { ref message, .. } if message.contains("reads past the 1 discovered fields"))
    );
}

#[test]
fn value_mismatch_is_scan_error() {
    let (id, _) = fields();
    let err = run(vec![vec![SqlValue::from("x")]], |row| row.int64(&id)).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, SqError::Scan { ref message, .. } if message.contains("into int64")));
}

#[test]
fn column_count_mismatch_is_scan_error() {
    let (id, name) = fields();
    let rows = vec![vec![SqlValue::from(1_i64)]];
    let err = run(rows, |row| (row.int64(&id), row.string(&name))).unwrap_err();
    assert!(matches!(
        err,
        SqError::Scan { ref message, .. }
            if message == "expected 1 destination arguments in scan, not 2"
    ));
}

#[test]
fn scan_into_fills_caller_destination() {
    let (id, name) = fields();
    let rows = vec![
        vec![SqlValue::from(1_i64), SqlValue::from("aaa")],
        vec![SqlValue::from(2_i64), SqlValue::Null],
    ];
    let out = run(rows, |row| {
        let id = row.int64(&id);
        let mut name_out = None::<String>;
        row.scan_into(&mut Target::new(&mut name_out), &name);
        (id, name_out)
    })
    .unwrap();
    assert_eq!(out, vec![(1, Some("aaa".to_string())), (2, None)]);
}

#[test]
fn scan_into_leaves_neighbouring_columns_intact() {
    let (id, name) = fields();
    let email = StringField::new("email", &TableInfo::new("users"));
    let rows = vec![
        vec![SqlValue::from(1_i64), SqlValue::from("B"), SqlValue::from("C")],
        vec![SqlValue::from(2_i64), SqlValue::Null, SqlValue::from("D")],
    ];
    let out = run(rows, |row| {
        let id = row.int64(&id);
        let mut name_out = None::<String>;
        row.scan_into(&mut Target::new(&mut name_out), &name);
        let email = row.string(&email);
        (id, name_out, email)
    })
    .unwrap();
    assert_eq!(
        out,
        vec![
            (1, Some("B".to_string()), "C".to_string()),
            (2, None, "D".to_string()),
        ]
    );
}

#[test]
fn scan_array_reads_elements() {
    let t = TableInfo::new("posts");
    let tags = ArrayField::new("tags", &t);
    let rows = vec![
        vec![SqlValue::Array(vec![SqlValue::from("a"), SqlValue::from("b")])],
        vec![SqlValue::Null],
    ];
    let out = run(rows, |row| {
        let mut out: Vec<String> = Vec::new();
        row.scan_array(&mut out, &tags);
        out
    })
    .unwrap();
    assert_eq!(out, vec![vec!["a".to_string(), "b".to_string()], Vec::new()]);
}

#[test]
fn array_with_null_element_is_scan_error() {
    let t = TableInfo::new("posts");
    let scores = ArrayField::new("scores", &t);
    let rows = vec![vec![SqlValue::Array(vec![SqlValue::Int32(1), SqlValue::Null])]];
    let err = run(rows, |row| {
        let mut out: Vec<i32> = Vec::new();
        row.scan_array(&mut out, &scores);
        out
    })
    .unwrap_err();
    assert!(matches!(err, SqError::Scan { ref message, .. } if message.contains("null array element")));
}
