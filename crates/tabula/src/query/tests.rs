//! Builder rendering tests.

use super::*;
use crate::dialect::Dialect;
use crate::error::OrmError;
use crate::expr::{Expression, Operand};
use crate::value::{Params, Value, params};
use pretty_assertions::assert_eq;

#[test]
fn test_select_where_limit() {
    let qb = select("id,name", "users").where_clause([("id", 5)]).limit(1);
    assert_eq!(
        qb.build().unwrap(),
        "SELECT id,name\nFROM users\nWHERE id = :where_id\nLIMIT 1"
    );
    assert_eq!(
        qb.to_sql().unwrap(),
        "SELECT id,name\nFROM users\nWHERE id = 5\nLIMIT 1"
    );
}

#[test]
fn test_builder_is_immutable() {
    let base = select("*", "users");
    let filtered = base.where_clause([("id", 1)]);
    let ordered = filtered.order_by("name");

    assert_eq!(base.build().unwrap(), "SELECT *\nFROM users");
    assert_eq!(filtered.build().unwrap(), "SELECT *\nFROM users\nWHERE id = :where_id");
    assert_eq!(
        ordered.build().unwrap(),
        "SELECT *\nFROM users\nWHERE id = :where_id\nORDER BY name"
    );
    assert!(base.params().is_empty());
}

#[test]
fn test_where_composition() {
    let qb = select("*", "t")
        .where_clause([("a", 1)])
        .or_where([("b", 2)])
        .and_where("c > 0");
    assert_eq!(
        qb.clause(Clause::Where),
        Some("((a = :where_a) OR (b = :where_b)) AND (c > 0)")
    );
}

#[test]
fn test_or_where_requires_where() {
    let err = select("*", "t").or_where([("a", 1)]).build().unwrap_err();
    assert!(err.is_build());
    assert!(err.to_string().contains("or_where"));
}

#[test]
fn test_null_criteria_renders_is_null() {
    let qb = select("*", "t").where_clause([("deleted_at", Value::Null)]);
    assert_eq!(qb.clause(Clause::Where), Some("deleted_at IS NULL"));
    assert!(qb.params().is_empty());
}

#[test]
fn test_repeated_columns_get_distinct_params() {
    let qb = select("*", "t")
        .where_clause([("id", 1)])
        .or_where([("id", 2)]);
    assert_eq!(
        qb.clause(Clause::Where),
        Some("(id = :where_id) OR (id = :where_id_2)")
    );
    assert_eq!(qb.params()["where_id_2"], Value::Int(2));
}

#[test]
fn test_empty_criteria_is_noop() {
    let qb = select("*", "t").where_clause(Params::new());
    assert_eq!(qb.build().unwrap(), "SELECT *\nFROM t");
}

#[test]
fn test_insert_set() {
    let qb = insert("users").set([("name", "Ann"), ("email", "ann@example.com")]);
    assert_eq!(
        qb.build().unwrap(),
        "INSERT INTO users (name, email)\nVALUES (:name, :email)"
    );
}

#[test]
fn test_insert_expression_is_verbatim() {
    let qb = insert("users").set(vec![
        ("name", Operand::from("Ann")),
        ("created_at", Expression::current_timestamp().into()),
    ]);
    assert_eq!(
        qb.to_sql().unwrap(),
        "INSERT INTO users (name, created_at)\nVALUES ('Ann', CURRENT_TIMESTAMP)"
    );
}

#[test]
fn test_insert_requires_values() {
    assert!(insert("users").build().unwrap_err().is_build());
}

#[test]
fn test_update_set_where() {
    let qb = update("users")
        .set([("name", "Bob")])
        .where_clause([("id", 5)]);
    assert_eq!(
        qb.build().unwrap(),
        "UPDATE users\nSET name = :set_name\nWHERE id = :where_id"
    );
}

#[test]
fn test_update_requires_set() {
    let err = update("users").where_clause([("id", 1)]).build().unwrap_err();
    assert!(err.is_build());
}

#[test]
fn test_limit_rules() {
    assert!(update("t").set([("a", 1)]).limit_offset(1, 5).build().is_err());
    assert!(select("*", "t").limit(1).limit(2).build().is_err());
    assert_eq!(
        delete("users").where_clause([("id", 1)]).limit(1).build().unwrap(),
        "DELETE FROM users\nWHERE id = :where_id\nLIMIT 1"
    );
    assert_eq!(
        select("*", "t").limit_offset(10, 20).clause(Clause::Limit),
        Some("10 OFFSET 20")
    );
}

#[test]
fn test_clause_kind_checks() {
    assert!(insert("t").join("u", "u.id = t.u_id", JoinType::Inner).error().is_some());
    assert!(delete("t").join("u", "u.id = t.u_id", JoinType::Inner).error().is_some());
    assert!(select("*", "t").using("u").error().is_some());
    assert!(update("t").values_many(&[params([("a", 1)])]).error().is_some());

    let ok = delete("t")
        .using("u")
        .inner_join("v", "v.id = u.v_id")
        .where_clause("t.u_id = u.id");
    assert_eq!(
        ok.build().unwrap(),
        "DELETE FROM t\nUSING u\nINNER JOIN v ON v.id = u.v_id\nWHERE t.u_id = u.id"
    );
}

#[test]
fn test_first_error_wins() {
    let qb = select("*", "t").or_where("a = 1").limit(1).limit(2);
    assert!(qb.error().unwrap().contains("or_where"));
}

#[test]
fn test_select_join() {
    let qb = select("u.id, t.name", "users u").join("tags t", "t.user_id = u.id", JoinType::Left);
    assert_eq!(
        qb.build().unwrap(),
        "SELECT u.id, t.name\nFROM users u\nLEFT JOIN tags t ON t.user_id = u.id"
    );
}

#[test]
fn test_group_by_having() {
    let qb = select("role, COUNT(*) AS n", "users")
        .group_by("role")
        .having("COUNT(*) > :min")
        .bind(params([("min", 1)]));
    assert_eq!(
        qb.build().unwrap(),
        "SELECT role, COUNT(*) AS n\nFROM users\nGROUP BY role\nHAVING COUNT(*) > :min"
    );
    assert!(qb.to_sql().unwrap().ends_with("HAVING COUNT(*) > 1"));

    assert!(select("*", "users").having("COUNT(*) > 1").build().is_err());
}

#[test]
fn test_mysql_upsert() {
    let qb = insert("users")
        .set(params([("id", Value::from(1)), ("name", Value::from("Ann"))]))
        .on_duplicate_key_update([("name", Expression::new("VALUES(name)"))]);
    assert_eq!(
        qb.build().unwrap(),
        "INSERT INTO users (id, name)\nVALUES (:id, :name)\nON DUPLICATE KEY UPDATE name = VALUES(name)"
    );
}

#[test]
fn test_postgres_upsert_needs_conflict_target() {
    let base = insert("users")
        .with_dialect(Dialect::Postgres)
        .set([("id", 1)])
        .on_duplicate_key_update([("id", 1)]);
    assert!(base.build().unwrap_err().is_build());

    let qb = base.on_conflict(&["id"]);
    assert_eq!(
        qb.build().unwrap(),
        "INSERT INTO users (id)\nVALUES (:id)\nON CONFLICT (id) DO UPDATE SET id = :upd_id"
    );
}

#[test]
fn test_returning_follows_the_write() {
    let qb = insert("users")
        .with_dialect(Dialect::Postgres)
        .set([("name", "Ann")])
        .on_duplicate_key_update([("name", "Ann")])
        .on_conflict(&["name"])
        .returning("id");
    assert_eq!(
        qb.build().unwrap(),
        "INSERT INTO users (name)\nVALUES (:name)\nON CONFLICT (name) DO UPDATE SET name = :upd_name\nRETURNING id"
    );

    let qb = delete("users")
        .with_dialect(Dialect::Sqlite)
        .where_clause([("id", 1)])
        .returning("id, name");
    assert_eq!(
        qb.build().unwrap(),
        "DELETE FROM users\nWHERE id = :where_id\nRETURNING id, name"
    );
}

#[test]
fn test_returning_rules() {
    assert!(select("*", "users").returning("id").build().unwrap_err().is_build());
    assert!(update("users").set([("a", 1)]).returning(" ").build().unwrap_err().is_build());

    let err = insert("users").set([("a", 1)]).returning("id").build().unwrap_err();
    assert!(matches!(err, OrmError::Unsupported(_)));
}

#[test]
fn test_values_many() {
    let rows = [params([("a", 1), ("b", 2)]), params([("b", 4), ("a", 3)])];
    let qb = insert("t").values_many(&rows);
    assert_eq!(
        qb.build().unwrap(),
        "INSERT INTO t (a, b)\nVALUES (:a_0, :b_0), (:a_1, :b_1)"
    );
    assert_eq!(qb.params()["a_1"], Value::Int(3));

    let mismatched = [params([("a", 1)]), params([("b", 2)])];
    assert!(insert("t").values_many(&mismatched).build().is_err());
}

#[test]
fn test_to_sql_escapes_literals() {
    let qb = select("*", "users").where_clause([("name", "O'Brien")]);
    assert_eq!(
        qb.to_sql().unwrap(),
        "SELECT *\nFROM users\nWHERE name = 'O''Brien'"
    );
}

#[test]
fn test_raw_query() {
    let qb = raw("SELECT * FROM t WHERE id = :id", params([("id", 3)]));
    assert_eq!(qb.to_sql().unwrap(), "SELECT * FROM t WHERE id = 3");

    let unbound = raw("SELECT * FROM t WHERE id = :id", Params::new());
    assert!(unbound.statement().unwrap_err().is_build());
}

#[test]
fn test_statement_keeps_referenced_params_only() {
    let qb = select("*", "t")
        .where_clause("id = :id")
        .bind(params([("id", 1), ("unused", 2)]));
    let (_, bound) = qb.statement().unwrap();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound["id"], Value::Int(1));
}

#[test]
fn test_replace_and_distinct() {
    let qb = select("name", "{$prefix}users")
        .distinct()
        .replace(PREFIX_TOKEN, "app_");
    assert_eq!(qb.build().unwrap(), "SELECT DISTINCT name\nFROM app_users");
}

#[test]
fn test_prefix_defaults_to_empty_for_connection() {
    let qb = select("*", "{$prefix}users").for_connection(Dialect::MySql, None);
    assert_eq!(qb.build().unwrap(), "SELECT *\nFROM users");
}

#[test]
fn test_conflicting_expression_params() {
    let qb = select("*", "t")
        .where_clause(Expression::with_params("a = :x", params([("x", 1)])))
        .and_where(Expression::with_params("b = :x", params([("x", 2)])));
    assert!(qb.build().unwrap_err().to_string().contains(":x"));
}

#[test]
fn test_no_cache_flag() {
    let qb = select("*", "t");
    assert!(qb.is_cacheable());
    assert!(!qb.no_cache().is_cacheable());
    assert!(qb.is_cacheable());
}
