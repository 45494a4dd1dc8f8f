//! End-to-end tests for the sqbc binary

use crate::helpers::{create_custom_file, create_temp_dir, run_test_case, run_test_case_with_file, SqbcTestCase};

#[test]
fn test_select_star() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT * FROM people".to_string(),
        expected_stdout: vec![
            "id,name,age".to_string(),
            "1,Alice,32".to_string(),
            "2,Bob,NULL".to_string(),
            "3,Charlie,35".to_string(),
        ],
        ..Default::default()
    })
}

#[test]
fn test_filtered_select_skips_null() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT name FROM people WHERE age > 30".to_string(),
        expected_stdout: vec!["name".to_string(), "Alice".to_string(), "Charlie".to_string()],
        unexpected_stdout: vec!["Bob".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_projection_alias_and_arithmetic() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT name, age + 1 AS next_age FROM people WHERE id = 1".to_string(),
        expected_stdout: vec!["name,next_age".to_string(), "Alice,33".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_scalar_functions() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT upper(name), length(name), coalesce(age, 0) FROM people WHERE id >= 2"
            .to_string(),
        expected_stdout: vec!["BOB,3,0".to_string(), "CHARLIE,7,35".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_table_alias() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT p.name FROM people AS p WHERE p.id = 3".to_string(),
        expected_stdout: vec!["Charlie".to_string()],
        unexpected_stdout: vec!["Alice".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_constant_select() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT 1 + 1 AS two, 'x' || 'y' AS xy".to_string(),
        expected_stdout: vec!["two,xy".to_string(), "2,xy".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_multiple_statements_run_in_order() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT 6 * 7 AS answer".to_string(),
        args: vec!["-s".to_string(), "SELECT name FROM people WHERE id = 2".to_string()],
        expected_stdout: vec!["answer".to_string(), "42".to_string(), "Bob".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_explain_prints_listing() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT name FROM people".to_string(),
        args: vec!["--explain".to_string()],
        expected_stdout: vec![
            "OpenCursor".to_string(),
            "Rewind".to_string(),
            "Column".to_string(),
            "ResultRow".to_string(),
            "Next".to_string(),
            "Halt".to_string(),
            "'people'".to_string(),
            "Alice".to_string(),
        ],
        ..Default::default()
    })
}

#[test]
fn test_unsupported_clause_fails() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT name FROM people ORDER BY name".to_string(),
        should_succeed: false,
        expected_stderr: vec![
            "Failed to compile SQL".to_string(),
            "Unsupported SQL feature: ORDER BY".to_string(),
        ],
        ..Default::default()
    })
}

#[test]
fn test_unknown_table_fails() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT * FROM missing".to_string(),
        should_succeed: false,
        expected_stderr: vec!["Table 'missing' not found".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_unknown_column_fails() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT salary FROM people".to_string(),
        should_succeed: false,
        expected_stderr: vec!["Column 'salary' not found".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_sql_parse_error() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELEC name FROM people".to_string(),
        should_succeed: false,
        expected_stderr: vec!["SQL parsing error".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_explicit_table_name() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT name FROM staff WHERE id = 1".to_string(),
        table_name: Some("staff".to_string()),
        expected_stdout: vec!["Alice".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_custom_field_separator() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_temp_dir()?;
    let file = create_custom_file(temp_dir.path(), "accounts.txt", "login:uid\nroot:0\ndaemon:1\n")?;
    run_test_case_with_file(
        SqbcTestCase {
            sql: "SELECT login FROM accounts WHERE uid = 0".to_string(),
            args: vec!["-F".to_string(), ":".to_string()],
            expected_stdout: vec!["login".to_string(), "root".to_string()],
            unexpected_stdout: vec!["daemon".to_string()],
            ..Default::default()
        },
        file,
    )
}

#[test]
fn test_tab_separated_by_default_for_non_csv() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_temp_dir()?;
    let file = create_custom_file(temp_dir.path(), "items.tsv", "sku\tprice\nA1\t2.5\nB2\t4\n")?;
    run_test_case_with_file(
        SqbcTestCase {
            sql: "SELECT sku, price * 2 AS doubled FROM items".to_string(),
            expected_stdout: vec!["sku,doubled".to_string(), "A1,5".to_string(), "B2,8".to_string()],
            ..Default::default()
        },
        file,
    )
}

#[test]
fn test_verbose_logs_to_stderr() -> Result<(), Box<dyn std::error::Error>> {
    run_test_case(SqbcTestCase {
        sql: "SELECT id FROM people".to_string(),
        verbose: true,
        expected_stdout: vec!["id".to_string()],
        expected_stderr: vec!["loaded table".to_string()],
        ..Default::default()
    })
}

#[test]
fn test_missing_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_temp_dir()?;
    run_test_case_with_file(
        SqbcTestCase {
            sql: "SELECT 1".to_string(),
            should_succeed: false,
            expected_stderr: vec!["Failed to load file".to_string()],
            ..Default::default()
        },
        temp_dir.path().join("nope.csv"),
    )
}
