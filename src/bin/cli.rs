//! metacrud - CLI Client

use std::env;
use std::io::{self, Write};

use anyhow::{bail, Context};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use metacrud::{
    ColumnOrder, DbTable, Engine, EngineConfig, PoolConfig, QueryData, RowId, SelectQuery,
    SqlitePool,
};

/// Print welcome banner
fn print_banner(path: &str) {
    println!(
        r#"
 metacrud - metadata-driven CRUD over {}
 Type '.help' for help, '.quit' to exit
"#,
        path
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help                               Show this help message
  .quit                               Exit
  .tables                             List all tables
  .schema [table]                     Show table schema
  .select <table> [offset] [count]    Show rows
  .get <table> <id | col=val ...>     Show one row by primary key
  .insert <table> col=val ...         Insert a row
  .update <table> <id> col=val ...    Update a row by primary key
  .update <table> k=v ... set col=val ...
                                      Update a row by composite key
  .delete <table> <id>                Delete a row by primary key
  .refresh                            Reload the schema catalog
  .json                               Toggle JSON output
  .clear                              Clear screen

Values are parsed according to the column's declared type.
"#
    );
}

/// Format query results as a table
fn format_results(data: &QueryData) -> String {
    let columns = data.columns();
    if columns.is_empty() && data.is_empty() {
        return String::new();
    }

    // Calculate column widths
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in data {
        for (i, value) in row.values().iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }
    }

    let mut output = String::new();

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    // Header
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    // Rows
    for row in data {
        let row_str: String = row
            .values()
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", v.to_string(), width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }

    if !data.is_empty() {
        output.push_str(&separator);
    }

    output.push_str(&format!("{} row(s) returned\n", data.len()));
    output
}

/// Split `col=val` arguments
fn parse_pairs<'a>(args: &[&'a str]) -> anyhow::Result<Vec<(&'a str, &'a str)>> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .with_context(|| format!("expected col=val, got '{}'", arg))
        })
        .collect()
}

/// Turn command-line key arguments into a row id using the key's types
fn parse_id(table: &DbTable, args: &[&str]) -> anyhow::Result<RowId> {
    match args {
        [] => bail!("missing row id"),
        [id] if !id.contains('=') => {
            let key = table.primary_key();
            if key.len() != 1 {
                bail!(
                    "table '{}' has a {}-column key, use col=val pairs",
                    table.name(),
                    key.len()
                );
            }
            Ok(RowId::Scalar(table.coerce(&key[0], id)?))
        }
        pairs => Ok(RowId::Composite(table.coerce_all(parse_pairs(pairs)?)?)),
    }
}

/// Split `.update` arguments into key and values at a `set` token, or after
/// the first argument when there is none
fn split_update_args<'a, 'b>(args: &'b [&'a str]) -> (&'b [&'a str], &'b [&'a str]) {
    match args.iter().position(|a| a.eq_ignore_ascii_case("set")) {
        Some(i) => (&args[..i], &args[i + 1..]),
        None => args.split_at(args.len().min(1)),
    }
}

struct Session {
    engine: Engine<SqlitePool>,
    json: bool,
}

impl Session {
    fn table(&self, name: Option<&&str>) -> anyhow::Result<std::sync::Arc<DbTable>> {
        let name = name.context("missing table name")?;
        self.engine
            .table_def(name)?
            .with_context(|| format!("table '{}' not found", name))
    }

    fn show(&self, data: &QueryData) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(data)?);
        } else {
            print!("{}", format_results(data));
        }
        Ok(())
    }

    /// Handle one dot command; returns false when the session should end
    fn handle(&mut self, line: &str) -> anyhow::Result<bool> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.first().copied() {
            Some(".help") => print_help(),
            Some(".quit") | Some(".exit") => return Ok(false),
            Some(".tables") => {
                let tables = self.engine.table_names()?;
                if tables.is_empty() {
                    println!("No tables found.");
                } else {
                    println!("Tables:");
                    for table in tables {
                        println!("  {}", table);
                    }
                }
            }
            Some(".schema") => {
                let tables = match parts.get(1) {
                    Some(_) => vec![self.table(parts.get(1))?],
                    None => self.engine.catalog()?.tables().cloned().collect(),
                };
                for table in tables {
                    if self.json {
                        println!("{}", serde_json::to_string_pretty(&*table)?);
                    } else {
                        println!("{}", table);
                    }
                }
            }
            Some(".select") => {
                let table = self.table(parts.get(1))?;
                let offset = match parts.get(2) {
                    Some(n) => n.parse().context("offset must be a number")?,
                    None => 0,
                };
                let count = match parts.get(3) {
                    Some(n) => n.parse().context("count must be a number")?,
                    None => 0,
                };
                let mut query = SelectQuery::new().offset(offset).count(count);
                for key in table.primary_key() {
                    query = query.order_by(ColumnOrder::asc(key.clone()));
                }
                let data = self.engine.select(table.name(), &query)?;
                self.show(&data)?;
            }
            Some(".get") => {
                let table = self.table(parts.get(1))?;
                let id = parse_id(&table, &parts[2..])?;
                match self.engine.select_by_id(table.name(), id)? {
                    Some(row) if self.json => println!("{}", serde_json::to_string_pretty(&row)?),
                    Some(row) => {
                        for (column, value) in row.iter() {
                            println!("  {} = {}", column, value);
                        }
                    }
                    None => println!("No row found."),
                }
            }
            Some(".insert") => {
                let table = self.table(parts.get(1))?;
                let values = table.coerce_all(parse_pairs(&parts[2..])?)?;
                let inserted = self.engine.insert(table.name(), values)?;
                println!("{} row(s) affected", inserted);
            }
            Some(".update") => {
                let table = self.table(parts.get(1))?;
                let (id_args, value_args) = split_update_args(&parts[2..]);
                let id = parse_id(&table, id_args)?;
                let values = table.coerce_all(parse_pairs(value_args)?)?;
                let updated = self.engine.update(table.name(), id, values)?;
                println!("{} row(s) affected", updated);
            }
            Some(".delete") => {
                let table = self.table(parts.get(1))?;
                let id = parse_id(&table, &parts[2..])?;
                let deleted = self.engine.delete(table.name(), id)?;
                println!("{} row(s) affected", deleted);
            }
            Some(".refresh") => {
                let catalog = self.engine.refresh_catalog()?;
                println!("{} table(s) loaded", catalog.len());
            }
            Some(".json") => {
                self.json = !self.json;
                println!("JSON output {}", if self.json { "on" } else { "off" });
            }
            Some(".clear") => {
                // ANSI clear screen
                print!("\x1B[2J\x1B[1;1H");
                io::stdout().flush()?;
            }
            Some(cmd) => {
                eprintln!("Unknown command: {}", cmd);
                eprintln!("Type '.help' for available commands.");
            }
            None => {}
        }
        Ok(true)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut path = None;
    let mut config = EngineConfig::new();

    // Simple argument parsing
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--schema" | "-s" => {
                i += 1;
                let schema = args.get(i).context("--schema needs a value")?;
                config = config.schema(schema.clone());
            }
            "--validate" => config = config.validate_identifiers(true),
            other => path = Some(other.to_string()),
        }
        i += 1;
    }
    let path = path.unwrap_or_else(|| "metacrud.db".to_string());

    let pool = SqlitePool::open(PoolConfig::new(path.clone()))
        .with_context(|| format!("cannot open database '{}'", path))?;
    let mut session = Session {
        engine: Engine::with_config(pool, config)?,
        json: false,
    };

    print_banner(&path);
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline("metacrud> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                if !line.starts_with('.') {
                    eprintln!("Commands start with '.'; type '.help' for help.");
                    continue;
                }
                match session.handle(line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("Goodbye!");
    Ok(())
}
