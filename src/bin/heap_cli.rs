//! Simple CLI for working with heap files.
//!
//! Usage:
//!   heap_cli <dir> create <name>
//!   heap_cli <dir> destroy <name>
//!   heap_cli <dir> insert <name> <text>...
//!   heap_cli <dir> insert-int <name> <int>...
//!   heap_cli <dir> scan <name> [int|float|string <offset> <op> <value>]
//!   heap_cli <dir> count <name>
//!   heap_cli <dir> stats <name>

use heap_storage::{Config, Database, Datatype, Operator, ScanFilter};
use std::env;
use std::process::exit;

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("ERROR: {}", message);
    exit(1);
}

fn parse_filter(args: &[String]) -> heap_storage::Result<ScanFilter> {
    let datatype: Datatype = args[0].parse()?;
    let offset: usize = args[1]
        .parse()
        .map_err(|_| heap_storage::StorageError::bad_scan("offset must be a non-negative integer"))?;
    let op: Operator = args[2].parse()?;
    let value = &args[3];

    match datatype {
        Datatype::Integer => value
            .parse::<i32>()
            .map(|v| ScanFilter::integer(offset, v, op))
            .map_err(|_| heap_storage::StorageError::bad_scan("value is not an integer")),
        Datatype::Float => value
            .parse::<f32>()
            .map(|v| ScanFilter::float(offset, v, op))
            .map_err(|_| heap_storage::StorageError::bad_scan("value is not a float")),
        Datatype::String => ScanFilter::string(offset, value.len(), value.as_bytes(), op),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!("Usage: heap_cli <dir> <command> <name> [args...]");
        eprintln!("Commands:");
        eprintln!("  create <name>                 - Create an empty heap file");
        eprintln!("  destroy <name>                - Remove a heap file");
        eprintln!("  insert <name> <text>...       - Insert text records");
        eprintln!("  insert-int <name> <int>...    - Insert 4-byte integer records");
        eprintln!("  scan <name> [type off op val] - Print records, optionally filtered");
        eprintln!("  count <name>                  - Print the record count");
        eprintln!("  stats <name>                  - Print file statistics as JSON");
        exit(1);
    }

    let dir = &args[1];
    let command = &args[2];
    let name = &args[3];

    let db = match Database::open(Config::new(dir)) {
        Ok(db) => db,
        Err(e) => fail(format!("Failed to open database: {}", e)),
    };

    match command.as_str() {
        "create" => match db.create_heap_file(name) {
            Ok(()) => println!("OK"),
            Err(e) => fail(e),
        },

        "destroy" => match db.destroy_heap_file(name) {
            Ok(()) => println!("OK"),
            Err(e) => fail(e),
        },

        "insert" | "insert-int" => {
            let records: Vec<Vec<u8>> = if command == "insert" {
                args[4..].iter().map(|s| s.as_bytes().to_vec()).collect()
            } else {
                args[4..]
                    .iter()
                    .map(|s| match s.parse::<i32>() {
                        Ok(v) => v.to_le_bytes().to_vec(),
                        Err(_) => fail(format!("Invalid integer {}", s)),
                    })
                    .collect()
            };

            let mut insert = db.open_insert(name).unwrap_or_else(|e| fail(e));
            for record in &records {
                match insert.insert_record(record) {
                    Ok(rid) => println!("{}", rid),
                    Err(e) => fail(e),
                }
            }
            if let Err(e) = insert.close() {
                fail(e);
            }
        }

        "scan" => {
            let filter = match args.len() {
                4 => None,
                8 => Some(parse_filter(&args[4..8]).unwrap_or_else(|e| fail(e))),
                _ => fail("Usage: heap_cli <dir> scan <name> [int|float|string <offset> <op> <value>]"),
            };

            let mut scan = db.open_scan(name).unwrap_or_else(|e| fail(e));
            scan.set_filter(filter);

            let mut count = 0;
            loop {
                match scan.scan_next() {
                    Ok(Some(rid)) => {
                        let record = scan.get_record().unwrap_or_else(|e| fail(e));
                        println!("{} -> {}", rid, String::from_utf8_lossy(&record));
                        count += 1;
                    }
                    Ok(None) => break,
                    Err(e) => fail(e),
                }
            }
            println!("COUNT: {}", count);
            if let Err(e) = scan.close() {
                fail(e);
            }
        }

        "count" => {
            let file = db.open_heap_file(name).unwrap_or_else(|e| fail(e));
            println!("{}", file.record_count().unwrap_or_else(|e| fail(e)));
        }

        "stats" => {
            let file = db.open_heap_file(name).unwrap_or_else(|e| fail(e));
            let stats = file.stats().unwrap_or_else(|e| fail(e));
            match serde_json::to_string_pretty(&stats) {
                Ok(json) => println!("{}", json),
                Err(e) => fail(e),
            }
        }

        _ => fail(format!("Unknown command: {}", command)),
    }

    // Ensure data is persisted
    if let Err(e) = db.flush() {
        eprintln!("Warning: Failed to flush: {}", e);
    }
}
