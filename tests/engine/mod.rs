//! Library-level tests: compile SQL and run the resulting programs

use std::sync::Arc;
use std::thread;

use sqbc::intern::intern;
use sqbc::table::{Table, Value};
use sqbc::vm::Scalar;
use sqbc::{BytecodeCompiler, Database, Program, SqbcError, VmEngine};

fn people_database() -> Database {
    let mut table = Table::new(
        "people",
        vec!["id".to_string(), "name".to_string(), "age".to_string()],
        None,
    );
    for (id, name, age) in [(1, "Alice", Some(32)), (2, "Bob", None), (3, "Charlie", Some(35))] {
        table
            .add_row(vec![
                Value::Integer(id),
                Value::String(name.to_string()),
                age.map(Value::Integer).unwrap_or(Value::Null),
            ])
            .unwrap();
    }
    table.infer_column_types();

    let mut db = Database::new();
    db.add_table("people".to_string(), table).unwrap();
    db
}

fn compile_one(db: &Database, sql: &str) -> Program {
    let mut programs = BytecodeCompiler::with_schema(db).compile_sql(sql).unwrap();
    assert_eq!(programs.len(), 1);
    programs.remove(0)
}

fn run(db: &Database, program: Program) -> Vec<Vec<Value>> {
    let mut engine = VmEngine::new(Arc::new(program), db);
    engine.run().unwrap();
    engine.result_rows()
}

#[test]
fn test_filter_and_project() {
    let db = people_database();
    let program = compile_one(
        &db,
        "SELECT name, age * 2 AS doubled FROM people WHERE age IS NOT NULL",
    );
    assert_eq!(program.column_names(), &["name", "doubled"]);
    assert_eq!(
        run(&db, program),
        vec![
            vec![Value::String("Alice".to_string()), Value::Integer(64)],
            vec![Value::String("Charlie".to_string()), Value::Integer(70)],
        ]
    );
}

#[test]
fn test_three_valued_where() {
    let db = people_database();
    // Bob's NULL age makes both predicates NULL, so he never qualifies
    let rows = run(&db, compile_one(&db, "SELECT id FROM people WHERE age < 33 OR NOT age < 33"));
    assert_eq!(rows, vec![vec![Value::Integer(1)], vec![Value::Integer(3)]]);

    let rows = run(&db, compile_one(&db, "SELECT id FROM people WHERE age IS NULL"));
    assert_eq!(rows, vec![vec![Value::Integer(2)]]);
}

#[test]
fn test_rowid_and_case() {
    let db = people_database();
    let rows = run(
        &db,
        compile_one(
            &db,
            "SELECT rowid, CASE WHEN age > 33 THEN 'senior' WHEN age IS NULL THEN 'unknown' ELSE 'junior' END FROM people",
        ),
    );
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1), Value::String("junior".to_string())],
            vec![Value::Integer(2), Value::String("unknown".to_string())],
            vec![Value::Integer(3), Value::String("senior".to_string())],
        ]
    );
}

#[test]
fn test_registered_schema_without_source() {
    let db = people_database();
    let mut compiler = BytecodeCompiler::new();
    compiler.register_table(
        "people",
        vec![
            ("id".to_string(), "INTEGER".to_string()),
            ("name".to_string(), "TEXT".to_string()),
            ("age".to_string(), "INTEGER".to_string()),
        ],
    );
    let mut programs = compiler.compile_sql("SELECT lower(name) FROM people WHERE id = 3").unwrap();
    let rows = run(&db, programs.remove(0));
    assert_eq!(rows, vec![vec![Value::String("charlie".to_string())]]);
}

#[test]
fn test_multiple_statements_compile_separately() {
    let db = people_database();
    let programs = BytecodeCompiler::with_schema(&db)
        .compile_sql("SELECT 1; SELECT name FROM people WHERE id = 2")
        .unwrap();
    assert_eq!(programs.len(), 2);
    let results: Vec<_> = programs.into_iter().map(|p| run(&db, p)).collect();
    assert_eq!(results[0], vec![vec![Value::Integer(1)]]);
    assert_eq!(results[1], vec![vec![Value::String("Bob".to_string())]]);
}

#[test]
fn test_unsupported_statements_are_flagged() {
    let db = people_database();
    let compiler = BytecodeCompiler::with_schema(&db);
    for sql in [
        "SELECT name FROM people ORDER BY name",
        "SELECT count(*) FROM people",
        "SELECT a.name FROM people a JOIN people b ON a.id = b.id",
        "SELECT name FROM people WHERE id IN (SELECT id FROM people)",
        "INSERT INTO people VALUES (4, 'Dana', 28)",
        "DELETE FROM people",
    ] {
        let err = compiler.compile_sql(sql).unwrap_err();
        assert!(err.is_unsupported(), "{sql}: {err}");
    }
}

#[test]
fn test_rerun_is_idempotent() {
    let db = people_database();
    let program = Arc::new(compile_one(&db, "SELECT name FROM people"));
    let mut engine = VmEngine::new(Arc::clone(&program), &db);
    engine.run().unwrap();
    let first = engine.result_rows();
    engine.run().unwrap();
    assert_eq!(engine.result_rows(), first);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_shared_program_runs_concurrently() {
    let db = people_database();
    let program = Arc::new(compile_one(&db, "SELECT id, upper(name) FROM people WHERE id > 1"));

    let results: Vec<Vec<Vec<Value>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let program = Arc::clone(&program);
                let db = &db;
                scope.spawn(move || {
                    let mut engine = VmEngine::new(program, db);
                    engine.run().unwrap();
                    engine.result_rows()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for rows in results {
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(2), Value::String("BOB".to_string())],
                vec![Value::Integer(3), Value::String("CHARLIE".to_string())],
            ]
        );
    }
}

#[test]
fn test_string_literals_are_interned() {
    let db = people_database();
    let first = compile_one(&db, "SELECT 'shared-literal'");
    let second = compile_one(&db, "SELECT 'shared-literal' || name FROM people");

    let find = |program: &Program| -> Arc<str> {
        program
            .constants()
            .iter()
            .find_map(|c| match c {
                Scalar::Text(s) if &**s == "shared-literal" => Some(Arc::clone(s)),
                _ => None,
            })
            .unwrap()
    };
    let a = find(&first);
    let b = find(&second);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &intern("shared-literal")));
}

#[test]
fn test_run_errors_surface() {
    let db = people_database();
    let program = compile_one(&db, "SELECT name FROM people");
    let empty = Database::new();
    let mut engine = VmEngine::new(Arc::new(program), &empty);
    assert!(matches!(engine.run(), Err(SqbcError::TableNotFound(name)) if name == "people"));
}
