use super::Query;
use crate::config::RenderConfig;
use crate::error::{SqError, SqResult};
use crate::expr::{CustomExpr, Named, Raw, SqlExpr};
use crate::field::{Field, JsonField, NumberField, StringField, TableInfo, TimeField};
use crate::param::{Args, ParamIndex};
use crate::placeholder::Dialect;
use crate::predicate::{Compare, Exists, InQuery, Predicate};
use crate::query::insert::insert_into;
use crate::query::select::{SelectQuery, select_from};
use crate::query::update::update;
use crate::query::values::{Column, RowValue, values};

struct Users {
    table: TableInfo,
    id: NumberField,
    name: StringField,
    email: StringField,
}

fn users() -> Users {
    let table = TableInfo::new("users");
    Users {
        id: NumberField::new("id", &table),
        name: StringField::new("name", &table),
        email: StringField::new("email", &table),
        table,
    }
}

/// Panics while rendering.
struct Boom;

impl SqlExpr for Boom {
    fn append_sql(&self, _: &mut String, _: &mut Args, _: &mut ParamIndex) -> SqResult<()> {
        panic!("boom")
    }
}

// ==================== VALUES ====================

#[test]
fn values_translate_at_top_level() {
    let (sql, args) = values()
        .values(("aaa", "aaa@example.com"))
        .values(("bbb", "bbb@example.com"))
        .to_sql()
        .unwrap();
    assert_eq!(sql, "VALUES ($1, $2), ($3, $4)");
    assert_eq!(
        args.debug_values(),
        vec![
            "\"aaa\"",
            "\"aaa@example.com\"",
            "\"bbb\"",
            "\"bbb@example.com\""
        ]
    );
}

#[test]
fn nested_values_stay_neutral() {
    let (sql, args) = values()
        .values(("aaa", "aaa@example.com"))
        .values(("bbb", "bbb@example.com"))
        .nest_this()
        .to_sql()
        .unwrap();
    assert_eq!(sql, "VALUES (?, ?), (?, ?)");
    assert_eq!(args.len(), 4);
}

#[test]
fn values_follow_configured_dialect() {
    let q = values().values([1_i32, 2]);
    let mysql = q.clone().config(RenderConfig::new().with_dialect(Dialect::MySql));
    assert_eq!(mysql.to_sql().unwrap().0, "VALUES (?, ?)");

    let mssql = q.config(RenderConfig::new().with_dialect(Dialect::SqlServer));
    assert_eq!(mssql.to_sql().unwrap().0, "VALUES (@p1, @p2)");
}

#[test]
fn empty_values_is_composition_error() {
    let err = values().to_sql().unwrap_err();
    assert!(matches!(err, SqError::Composition(_)));
}

#[test]
fn ragged_rows_are_rejected() {
    let err = values()
        .values((1_i32, 2_i32))
        .values(RowValue::new().value(3_i32))
        .to_sql()
        .unwrap_err();
    assert!(matches!(
        err,
        SqError::RowArity {
            row: 1,
            expected: 2,
            got: 1
        }
    ));
}

#[test]
fn row_values_embed_expressions() {
    let (sql, args) = values()
        .values(RowValue::new().value("a").expr(Raw::default_value()))
        .to_sql()
        .unwrap();
    assert_eq!(sql, "VALUES ($1, DEFAULT)");
    assert_eq!(args.len(), 1);
}

#[test]
fn mapper_replaces_explicit_rows() {
    let u = users();
    let (name, email) = (u.name.clone(), u.email.clone());
    let (sql, args) = values()
        .values((1_i32, 2_i32))
        .valuesx(move |col: &mut Column| {
            col.set_string(&name, "aaa");
            col.set_string(&email, "aaa@example.com");
            col.set_string(&name, "bbb");
            col.set_string(&email, "bbb@example.com");
            Ok(())
        })
        .to_sql()
        .unwrap();
    assert_eq!(sql, "VALUES ($1, $2), ($3, $4)");
    assert_eq!(args.debug_values()[2], "\"bbb\"");
}

#[test]
fn mapper_error_is_returned() {
    let err = values()
        .valuesx(|_: &mut Column| Err(SqError::composition("no rows today")))
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, SqError::Composition(ref m) if m == "no rows today"));
}

#[test]
fn mapper_panic_becomes_error() {
    let err = values()
        .valuesx(|_: &mut Column| -> SqResult<()> { panic!("mapper exploded") })
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, SqError::Panicked(ref m) if m == "mapper exploded"));
}

#[test]
fn incomplete_mapped_row_is_arity_error() {
    let u = users();
    let (name, email) = (u.name.clone(), u.email.clone());
    let err = values()
        .valuesx(move |col: &mut Column| {
            col.set_string(&name, "aaa");
            col.set_string(&email, "aaa@example.com");
            col.set_string(&name, "bbb");
            Ok(())
        })
        .to_sql()
        .unwrap_err();
    assert!(matches!(
        err,
        SqError::RowArity {
            row: 1,
            expected: 2,
            got: 1
        }
    ));
}

#[test]
fn out_of_order_column_is_composition_error() {
    let u = users();
    let (name, email) = (u.name.clone(), u.email.clone());
    let err = values()
        .valuesx(move |col: &mut Column| {
            col.set_string(&name, "aaa");
            col.set_string(&email, "aaa@example.com");
            col.set_string(&name, "bbb");
            col.set_string(&name, "ccc");
            Ok(())
        })
        .to_sql()
        .unwrap_err();
    assert!(err.is_composition());
}

#[test]
fn rendering_is_repeatable() {
    let q = values().values(("a", 1_i32));
    let first = q.to_sql().unwrap();
    let second = q.to_sql().unwrap();
    assert_eq!(first.0, second.0);
    assert_eq!(first.1.debug_values(), second.1.debug_values());
}

// ==================== SELECT ====================

#[test]
fn select_with_clauses() {
    let u = users();
    let (sql, args) = select_from(&u.table)
        .select(u.name.clone())
        .select(u.email.clone())
        .where_(u.id.gt(1_i64))
        .order_by(u.id.desc())
        .limit(10)
        .offset(5)
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT users.name, users.email FROM users WHERE users.id > $1 \
         ORDER BY users.id DESC LIMIT $2 OFFSET $3"
    );
    assert_eq!(args.debug_values(), vec!["1", "10", "5"]);
}

#[test]
fn select_without_fields_selects_one() {
    let u = users();
    let (sql, _) = select_from(&u.table).distinct().to_sql().unwrap();
    assert_eq!(sql, "SELECT DISTINCT 1 FROM users");
}

#[test]
fn join_uses_aliases_and_conditions_are_anded() {
    let users = TableInfo::new("users").as_alias("u");
    let orders = TableInfo::new("orders").as_alias("o");
    let u_id = NumberField::new("id", &users);
    let u_name = StringField::new("name", &users).as_alias("user_name");
    let o_user = NumberField::new("user_id", &orders);
    let o_total = NumberField::new("total", &orders);

    let (sql, args) = select_from(&users)
        .select(u_name)
        .left_join(&orders, o_user.eq_field(&u_id))
        .where_(o_total.ge(100_i64))
        .where_(o_total.le(500_i64))
        .group_by(u_id.clone())
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT u.name AS user_name FROM users AS u LEFT JOIN orders AS o ON o.user_id = u.id \
         WHERE o.total >= $1 AND o.total <= $2 GROUP BY u.id"
    );
    assert_eq!(args.len(), 2);
}

#[test]
fn nested_query_is_numbered_once() {
    let users = TableInfo::new("users").as_alias("u");
    let orders = TableInfo::new("orders").as_alias("o");
    let u_id = NumberField::new("id", &users);
    let u_name = StringField::new("name", &users);
    let o_user = NumberField::new("user_id", &orders);
    let o_total = NumberField::new("total", &orders);

    let inner = select_from(&orders)
        .where_(o_user.eq_field(&u_id).and(o_total.gt(100_i64)))
        .nest_this();
    let (sql, args) = select_from(&users)
        .select(u_name.clone())
        .where_(u_name.eq("a"))
        .where_(Exists::new(inner))
        .where_(u_id.gt(7_i64))
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT u.name FROM users AS u WHERE u.name = $1 AND EXISTS (SELECT 1 FROM orders AS o \
         WHERE (o.user_id = u.id AND o.total > $2)) AND u.id > $3"
    );
    assert_eq!(args.debug_values(), vec!["\"a\"", "100", "7"]);
}

#[test]
fn in_subquery_renders_inner_select() {
    let u = users();
    let banned = TableInfo::new("banned");
    let banned_user = NumberField::new("user_id", &banned);
    let (sql, _) = select_from(&u.table)
        .select(u.id.clone())
        .where_(InQuery::new(
            u.id.clone(),
            select_from(&banned).select(banned_user),
        ))
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT users.id FROM users WHERE users.id IN (SELECT banned.user_id FROM banned)"
    );
}

#[test]
fn named_params_repeat_their_value() {
    let u = users();
    let (sql, args) = select_from(&u.table)
        .where_(Compare::new(u.id.clone(), ">=", Named::bind("lo", 10_i64)))
        .where_(Compare::new(u.id.clone(), "<>", Named::reference("lo")))
        .to_sql()
        .unwrap();
    assert_eq!(sql, "SELECT 1 FROM users WHERE users.id >= $1 AND users.id <> $2");
    assert_eq!(args.debug_values(), vec!["10", "10"]);
}

#[test]
fn escaped_question_mark_survives_translation() {
    let u = users();
    let data = JsonField::new("data", &u.table);
    let (sql, args) = select_from(&u.table)
        .where_(data.has_key("k"))
        .to_sql()
        .unwrap();
    assert_eq!(sql, "SELECT 1 FROM users WHERE users.data ? $1");
    assert_eq!(args.len(), 1);
}

#[test]
fn jsonb_key_operator_cannot_render_for_mysql() {
    let u = users();
    let data = JsonField::new("data", &u.table);
    let q = select_from(&u.table).where_(data.has_key("k"));

    for dialect in [Dialect::MySql, Dialect::Sqlite] {
        let err = q
            .clone()
            .config(RenderConfig::new().with_dialect(dialect))
            .to_sql()
            .unwrap_err();
        assert!(err.is_composition());
        assert!(err.to_string().contains("literal ?"));
    }

    let plain = select_from(&u.table)
        .where_(u.id.eq(1_i64))
        .config(RenderConfig::new().with_dialect(Dialect::MySql));
    let (sql, args) = plain.to_sql().unwrap();
    assert_eq!(sql.matches('?').count(), args.len());
}

#[test]
fn placeholder_count_mismatch_is_rejected() {
    let q = SelectQuery::new().select(Raw::new("?"));
    assert!(matches!(q.to_sql(), Err(SqError::Composition(_))));

    let (sql, args) = q.nest_this().to_sql().unwrap();
    assert_eq!(sql, "SELECT ?");
    assert!(args.is_empty());
}

#[test]
fn panic_in_node_becomes_error() {
    let err = SelectQuery::new().select(Boom).to_sql().unwrap_err();
    assert!(matches!(err, SqError::Panicked(ref m) if m == "boom"));
}

#[test]
fn row_mapper_supplies_select_list() {
    let u = users();
    let q = select_from(&u.table)
        .where_(u.name.like("a%"))
        .selectx(|row| (row.int64(&u.id), row.string(&u.email)));
    let (sql, args) = q.to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT users.id, users.email FROM users WHERE users.name LIKE $1"
    );
    assert_eq!(args.debug_values(), vec!["\"a%\""]);
    assert_eq!(q.query_type(), "select");
}

#[test]
fn name_bound_in_select_list_is_visible_to_where() {
    let u = users();
    let plus_lo = CustomExpr::new("? + ?")
        .expr(u.id.clone())
        .expr(Named::bind("lo", 5_i64));
    let q = select_from(&u.table)
        .where_(Compare::new(u.id.clone(), ">", Named::reference("lo")))
        .selectx(|row| row.int64(&plus_lo));

    let (sql, args) = q.to_sql().unwrap();
    assert_eq!(sql, "SELECT users.id + $1 FROM users WHERE users.id > $2");
    assert_eq!(args.debug_values(), vec!["5", "5"]);
}

// ==================== INSERT ====================

#[test]
fn insert_with_rows_and_returning() {
    let u = users();
    let (sql, args) = insert_into(&u.table)
        .column(&u.name)
        .column(&u.email)
        .values(("aaa", "aaa@example.com"))
        .values(("bbb", "bbb@example.com"))
        .returning(u.id.clone())
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO users (name, email) VALUES ($1, $2), ($3, $4) RETURNING users.id"
    );
    assert_eq!(args.len(), 4);
}

#[test]
fn insert_without_rows_uses_defaults() {
    let u = users();
    let (sql, args) = insert_into(&u.table).to_sql().unwrap();
    assert_eq!(sql, "INSERT INTO users DEFAULT VALUES");
    assert!(args.is_empty());

    let err = insert_into(&u.table).column(&u.name).to_sql().unwrap_err();
    assert!(matches!(err, SqError::Composition(_)));
}

#[test]
fn insert_column_count_must_match_rows() {
    let u = users();
    let err = insert_into(&u.table)
        .column(&u.name)
        .column(&u.email)
        .values(("only one",))
        .to_sql()
        .unwrap_err();
    assert!(matches!(
        err,
        SqError::RowArity {
            expected: 2,
            got: 1,
            ..
        }
    ));
}

#[test]
fn insert_from_select() {
    let u = users();
    let archive = TableInfo::new("archive");
    let a_name = StringField::new("name", &archive);
    let (sql, args) = insert_into(&archive)
        .column(&a_name)
        .select(
            select_from(&u.table)
                .select(u.name.clone())
                .where_(u.id.lt(5_i64)),
        )
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO archive (name) SELECT users.name FROM users WHERE users.id < $1"
    );
    assert_eq!(args.debug_values(), vec!["5"]);
}

#[test]
fn insert_columns_from_mapper() {
    let u = users();
    let (name, email) = (u.name.clone(), u.email.clone());
    let (sql, _) = insert_into(&u.table)
        .valuesx(move |col: &mut Column| {
            for (n, e) in [("a", "a@x"), ("b", "b@x"), ("c", "c@x")] {
                col.set_string(&name, n);
                col.set_string(&email, e);
            }
            Ok(())
        })
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO users (name, email) VALUES ($1, $2), ($3, $4), ($5, $6)"
    );
}

// ==================== UPDATE ====================

#[test]
fn update_with_where() {
    let u = users();
    let (sql, args) = update(&u.table)
        .set(u.name.set("x"))
        .where_(u.id.eq(1_i64))
        .returning(u.email.clone())
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE users SET name = $1 WHERE users.id = $2 RETURNING users.email"
    );
    assert_eq!(args.debug_values(), vec!["\"x\"", "1"]);
}

#[test]
fn update_without_where_matches_nothing() {
    let u = users();
    let (sql, _) = update(&u.table).set(u.name.set("x")).to_sql().unwrap();
    assert_eq!(sql, "UPDATE users SET name = $1 WHERE 1 = 0");

    let (sql, _) = update(&u.table)
        .set(u.name.set("x"))
        .allow_all()
        .to_sql()
        .unwrap();
    assert_eq!(sql, "UPDATE users SET name = $1");
}

#[test]
fn update_requires_assignments() {
    let u = users();
    let err = update(&u.table).where_(u.id.eq(1_i64)).to_sql().unwrap_err();
    assert!(matches!(err, SqError::Composition(_)));
}

#[test]
fn update_assignments_from_mapper() {
    let u = users();
    let updated = TimeField::new("updated_at", &u.table);
    let email = u.email.clone();
    let (sql, args) = update(&u.table)
        .set(u.name.set("x"))
        .setx(move |col: &mut Column| {
            col.set_string(&email, "x@example.com");
            col.set_expr(&updated, Raw::new("now()"));
            Ok(())
        })
        .where_(u.id.eq(2_i64))
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE users SET name = $1, email = $2, updated_at = now() WHERE users.id = $3"
    );
    assert_eq!(args.len(), 3);
}
