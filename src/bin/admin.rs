use std::collections::VecDeque;
use std::io::Read;

use futures::TryStreamExt;

use audit_provenance::crypto::{canonicalize_json, digest, digest_serializable};
use audit_provenance::domain::{ProvenanceBundle, RecordId};
use audit_provenance::ledger::{LedgerClient, SqliteLedger};
use audit_provenance::store::normalize_fetched;

fn print_help() {
    eprintln!(
        "\
provenance-admin

USAGE:
  provenance-admin <command> [options]

COMMANDS:
  migrate                         Apply SQLite ledger migrations
  list-entries                    Print every ledger entry as NDJSON
  digest                          Print the canonical form and digest of a JSON document
  check-blob                      Recompute a stored blob's digest against its ledger entry

COMMON OPTIONS:
  --database-url <sqlite_url>     (defaults to env LEDGER_DATABASE_URL)

digest OPTIONS:
  --file <path>                   (optional) JSON file (default: stdin)

check-blob OPTIONS:
  --record-id <id>                (required)
  --blob <path>                   (required) Blob as fetched from storage
"
    );
}

fn require_database_url(database_url: Option<String>) -> anyhow::Result<String> {
    database_url
        .or_else(|| std::env::var("LEDGER_DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("LEDGER_DATABASE_URL is required (or pass --database-url)"))
}

fn take_value(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

async fn open_ledger(database_url: Option<String>) -> anyhow::Result<SqliteLedger> {
    let database_url = require_database_url(database_url)?;
    let ledger = SqliteLedger::connect(&database_url).await?;
    ledger.initialize().await?;
    Ok(ledger)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    let mut database_url: Option<String> = None;
    let mut file: Option<String> = None;
    let mut record_id: Option<String> = None;
    let mut blob: Option<String> = None;

    while let Some(arg) = args.pop_front() {
        match arg.as_str() {
            "--database-url" => database_url = Some(take_value(&mut args, "--database-url")?),
            "--file" => file = Some(take_value(&mut args, "--file")?),
            "--record-id" => record_id = Some(take_value(&mut args, "--record-id")?),
            "--blob" => blob = Some(take_value(&mut args, "--blob")?),
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    match command.as_str() {
        "migrate" => {
            open_ledger(database_url).await?;
            println!("ok: migrations applied");
            Ok(())
        }
        "list-entries" => {
            let ledger = open_ledger(database_url).await?;
            let client = LedgerClient::new(std::sync::Arc::new(ledger));
            let mut entries = client.list_all();
            let mut count = 0u64;
            while let Some(entry) = entries.try_next().await? {
                println!("{}", serde_json::to_string(&entry)?);
                count += 1;
            }
            eprintln!("ok: {count} entries");
            Ok(())
        }
        "digest" => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let value: serde_json::Value = serde_json::from_str(&text)?;
            println!("{}", canonicalize_json(&value)?);
            println!("{}", digest(&value)?);
            Ok(())
        }
        "check-blob" => {
            let record_id = RecordId::new(
                record_id.ok_or_else(|| anyhow::anyhow!("--record-id is required"))?,
            );
            let blob_path = blob.ok_or_else(|| anyhow::anyhow!("--blob is required"))?;

            let ledger = open_ledger(database_url).await?;
            let client = LedgerClient::new(std::sync::Arc::new(ledger));
            let entry = client
                .find(&record_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no ledger entry for {record_id}"))?;

            let ciphertext = normalize_fetched(&std::fs::read(&blob_path)?)?;
            let actual = digest_serializable(&ProvenanceBundle::for_entry(&ciphertext, &entry))?;

            println!("anchored: {}", entry.digest);
            println!("fetched:  {actual}");
            if actual == entry.digest {
                println!("ok: blob matches ledger entry");
                Ok(())
            } else {
                anyhow::bail!("digest mismatch for {record_id}")
            }
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
