use std::{env, path::PathBuf};

use reportflow::{
    dialect::{Dialect, MySqlDialect, SqlServerDialect},
    query::{CompileContext, SqlBuilder},
    Validator,
};

fn usage() {
    eprintln!("Usage: print_chart_sql <metadata_dir> <chart_id> [sqlserver|mysql]");
    eprintln!(
        "Example: cargo run --example print_chart_sql -- reportflowrs/examples/metadata 300 mysql"
    );
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let metadata_dir = PathBuf::from(args.remove(0));
    let chart_id: i64 = args.remove(0).parse()?;
    let dialect: Box<dyn Dialect> = match args.first().map(String::as_str) {
        Some("mysql") => Box::new(MySqlDialect),
        _ => Box::new(SqlServerDialect::default()),
    };

    let registry = reportflow::load_and_validate(&metadata_dir, &Validator::new(true))?;
    let chart = registry
        .get_chart(chart_id)
        .ok_or_else(|| anyhow::anyhow!("unknown chart {chart_id}"))?;

    let ctx = CompileContext::default();
    for range in &chart.ranges {
        let compiled = SqlBuilder::build_chart_range(&registry, range, &ctx, dialect.as_ref())?;
        println!("-- range {}", range.id);
        println!("{}", compiled.sql);
        for param in &compiled.params {
            println!("--   {} = {}", param.placeholder(), param.value.to_literal());
        }
        println!();
    }
    Ok(())
}
