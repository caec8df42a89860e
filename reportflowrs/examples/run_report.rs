use reportflow::{
    database::{DatabaseRegistry, StaticConnection},
    query::CompileContext,
    runner::{run_chart, run_report},
    schema::Database,
    sql_ast::Page,
    Validator,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn canned_rows() -> Vec<Map<String, Value>> {
    let rows = [
        json!({"column1": 1, "column2": "2024-05-02 09:15:00", "column3": "Alice", "column4": 120.5, "column6": 11}),
        json!({"column1": 2, "column2": "2024-05-02 16:40:00", "column3": "Bob", "column4": 80.0, "column6": 12}),
        json!({"column1": 3, "column2": "2024-05-05 11:05:00", "column3": "Carla", "column4": 230.0, "column6": 13}),
    ];
    rows.into_iter()
        .filter_map(|row| match row {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let connection = StaticConnection::new(
        &["column1", "column2", "column3", "column4", "column6"],
        canned_rows(),
    );
    let mut databases = DatabaseRegistry::new();
    databases.insert(
        Database {
            name: "warehouse".to_string(),
            is_sql_server: true,
            allow_paging: true,
            connection_string: None,
        },
        Arc::new(connection),
    );

    let registry =
        reportflow::load_and_validate("reportflowrs/examples/metadata", &Validator::new(false))?;

    let ctx = CompileContext::default();
    let run = run_report(&registry, &databases, 100, &Page::new(0, 25), &ctx).await?;
    println!("total: {:?}", run.total);
    for row in &run.rows {
        println!("{row:?}");
    }

    for range in run_chart(&registry, &databases, 300, &ctx).await? {
        match range.error {
            Some(err) => println!("range {} failed: {err}", range.range_id),
            None => {
                println!("range {}:", range.range_id);
                for point in range.points {
                    println!("  {} = {}", point.x, point.y);
                }
            }
        }
    }
    Ok(())
}
