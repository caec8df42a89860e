use std::{env, path::PathBuf};

use reportflow::{
    dialect::{Dialect, MySqlDialect, SqlServerDialect},
    query::{CompileContext, SqlBuilder},
    sql_ast::Page,
    Validator,
};

fn usage() {
    eprintln!("Usage: print_sql <metadata_dir> <report_id> [sqlserver|legacy|mysql] [start rows]");
    eprintln!("Example: cargo run --example print_sql -- reportflowrs/examples/metadata 100 sqlserver 0 25");
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let metadata_dir = PathBuf::from(args.remove(0));
    let report_id: i64 = args.remove(0).parse()?;
    let dialect_name = if args.is_empty() {
        "sqlserver".to_string()
    } else {
        args.remove(0)
    };
    let page = if args.len() >= 2 {
        Page::new(args.remove(0).parse()?, args.remove(0).parse()?)
    } else {
        Page::all()
    };

    let dialect: Box<dyn Dialect> = match dialect_name.as_str() {
        "mysql" => Box::new(MySqlDialect),
        "legacy" => Box::new(SqlServerDialect {
            allow_paging: false,
        }),
        _ => Box::new(SqlServerDialect::default()),
    };

    let registry = reportflow::load_and_validate(&metadata_dir, &Validator::new(true))?;
    let ctx = CompileContext::default();
    let compiled =
        SqlBuilder::build_with_dialect(&registry, report_id, &page, &ctx, dialect.as_ref())?;

    println!("-- sql");
    println!("{}", compiled.sql);
    if let Some(count) = &compiled.count_sql {
        println!();
        println!("-- count");
        println!("{count}");
    }
    if !compiled.params.is_empty() {
        println!();
        println!("-- params");
        for param in &compiled.params {
            println!("{} = {}", param.placeholder(), param.value.to_literal());
        }
        println!();
        println!("-- prepared");
        println!("{}", compiled.prepared_sql());
    }
    Ok(())
}
