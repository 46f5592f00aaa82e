#![cfg(feature = "sqlite")]

use chrono::NaiveDate;
use sql_depot::prelude::*;
use sql_depot::query::{cols, desc, eq, in_list, is_null, table};
use tempfile::TempDir;

const SCHEMA: &str = "CREATE TABLE messages (id TEXT PRIMARY KEY, text TEXT NOT NULL)";

async fn open_depot() -> Result<(Depot, TempDir), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("messages.db");
    let depot = Depot::sqlite_builder(path.to_string_lossy()).build().await?;
    let (session, _ctx) = depot.begin(&Context::background()).await?;
    session.exec(SCHEMA, &[]).await?;
    session.commit().await?;
    Ok((depot, dir))
}

fn message(id: &str, text: &str) -> Values {
    Values::new().with("id", id).with("text", text)
}

#[tokio::test]
async fn insert_then_read_back_in_new_session() -> Result<(), Box<dyn std::error::Error>> {
    let (depot, _dir) = open_depot().await?;

    let (session, _ctx) = depot.begin(&Context::background()).await?;
    assert_eq!(
        session
            .insert_one(&table("messages"), &message("1", "hello, world"))
            .await?,
        1
    );
    session.commit().await?;

    let (session, _ctx) = depot.begin(&Context::background()).await?;
    let row = session
        .query_one(
            &cols(["id", "text"]),
            &table("messages"),
            &[eq("id", "1").into()],
        )
        .await?;
    assert_eq!(row.get_string("text").as_deref(), Some("hello, world"));
    assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "text"]);
    session.commit().await?;
    Ok(())
}

#[tokio::test]
async fn messages_scenario_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let (depot, _dir) = open_depot().await?;
    let messages = table("messages");

    let (session, _ctx) = depot.begin(&Context::background()).await?;
    session.insert_one(&messages, &message("1", "hello, world")).await?;
    session.insert_one(&messages, &message("2", "hello, again")).await?;
    session.commit().await?;

    let (session, _ctx) = depot.begin(&Context::background()).await?;
    assert_eq!(session.query_count(&messages, &[]).await?, 2);

    let first = session
        .query_one(&cols(["id", "text"]), &messages, &[eq("id", "1").into()])
        .await?;
    assert_eq!(first.get_string("text").as_deref(), Some("hello, world"));

    session.insert_one(&messages, &message("3", "third")).await?;
    let newest_first = session
        .query_many(&cols(["id", "text"]), &messages, &[desc("id").into()])
        .await?;
    let ids: Vec<String> = newest_first.iter().filter_map(|r| r.get_string("id")).collect();
    assert_eq!(ids, ["3", "2", "1"]);

    let updated = session
        .update_many(
            &messages,
            &Values::new().with("text", "third, edited"),
            &[eq("id", "3").into()],
        )
        .await?;
    assert_eq!(updated, 1);
    let third = session
        .query_one(&cols(["text"]), &messages, &[eq("id", "3").into()])
        .await?;
    assert_eq!(third.get_string("text").as_deref(), Some("third, edited"));

    let deleted = session
        .delete_many(&messages, &[in_list("id", ["2", "3"]).into()])
        .await?;
    assert_eq!(deleted, 2);
    session.commit().await?;

    let (session, _ctx) = depot.begin(&Context::background()).await?;
    let left = session
        .query_many(&cols(["id", "text"]), &messages, &[])
        .await?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].get_string("id").as_deref(), Some("1"));
    assert_eq!(left[0].get_string("text").as_deref(), Some("hello, world"));
    session.commit().await?;
    Ok(())
}

#[tokio::test]
async fn missing_row_is_no_result_but_many_is_empty() -> Result<(), Box<dyn std::error::Error>> {
    let (depot, _dir) = open_depot().await?;
    let (session, _ctx) = depot.begin(&Context::background()).await?;

    let err = session
        .query_one(&cols(["id"]), &table("messages"), &[eq("id", "nope").into()])
        .await
        .unwrap_err();
    assert!(err.is_no_result());

    let rows = session
        .query_many(&cols(["id"]), &table("messages"), &[eq("id", "nope").into()])
        .await?;
    assert!(rows.is_empty());

    // A miss does not poison the session.
    assert!(!session.is_poisoned());
    session.commit().await?;
    Ok(())
}

#[tokio::test]
async fn writes_are_visible_inside_their_own_session() -> Result<(), Box<dyn std::error::Error>> {
    let (depot, _dir) = open_depot().await?;
    let (session, _ctx) = depot.begin(&Context::background()).await?;

    for (id, text) in [("1", "a"), ("2", "b"), ("3", "c")] {
        session.insert_one(&table("messages"), &message(id, text)).await?;
    }
    assert_eq!(session.query_count(&table("messages"), &[]).await?, 3);

    let rows = session
        .query_many(&cols(["id", "text"]), &table("messages"), &[desc("id").into()])
        .await?;
    let ids: Vec<String> = rows.iter().filter_map(|r| r.get_string("id")).collect();
    assert_eq!(ids, ["3", "2", "1"]);

    let updated = session
        .update_many(
            &table("messages"),
            &Values::new().with("text", "edited"),
            &[in_list("id", ["1", "2"]).into()],
        )
        .await?;
    assert_eq!(updated, 2);
    assert_eq!(
        session
            .query_count(&table("messages"), &[eq("text", "edited").into()])
            .await?,
        2
    );

    let deleted = session
        .delete_many(&table("messages"), &[eq("id", "3").into()])
        .await?;
    assert_eq!(deleted, 1);
    session.rollback().await?;

    let (session, _ctx) = depot.begin(&Context::background()).await?;
    assert_eq!(session.query_count(&table("messages"), &[]).await?, 0);
    session.commit().await?;
    Ok(())
}

#[tokio::test]
async fn empty_in_list_matches_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let (depot, _dir) = open_depot().await?;
    let (session, _ctx) = depot.begin(&Context::background()).await?;
    session.insert_one(&table("messages"), &message("1", "a")).await?;

    let rows = session
        .query_many(
            &cols(["id"]),
            &table("messages"),
            &[in_list("id", Vec::<String>::new()).into()],
        )
        .await?;
    assert!(rows.is_empty());
    session.commit().await?;
    Ok(())
}

#[tokio::test]
async fn null_blob_and_timestamp_read_back_as_zero_values() -> Result<(), Box<dyn std::error::Error>>
{
    let (depot, _dir) = open_depot().await?;
    let (session, _ctx) = depot.begin(&Context::background()).await?;
    session
        .exec(
            "CREATE TABLE attachments (id INTEGER PRIMARY KEY, body BLOB, seen_at TIMESTAMP, flag BOOLEAN)",
            &[],
        )
        .await?;

    let seen = NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_micro_opt(10, 30, 0, 250))
        .ok_or("bad date")?;
    session
        .insert_one(
            &table("attachments"),
            &Values::new()
                .with("id", 1)
                .with("body", vec![0xde_u8, 0xad])
                .with("seen_at", seen)
                .with("flag", true),
        )
        .await?;
    session
        .insert_one(
            &table("attachments"),
            &Values::new()
                .with("id", 2)
                .with("body", Value::Null)
                .with("seen_at", Value::Null)
                .with("flag", Value::Null),
        )
        .await?;

    let full = session
        .query_one(
            &cols(["body", "seen_at", "flag"]),
            &table("attachments"),
            &[eq("id", 1).into()],
        )
        .await?;
    assert_eq!(full.get_bytes("body"), Some(&[0xde_u8, 0xad][..]));
    assert_eq!(full.get_time("seen_at"), Some(seen));
    assert_eq!(full.get_bool("flag"), Some(true));

    let empty = session
        .query_one(
            &cols(["body", "seen_at"]),
            &table("attachments"),
            &[is_null("body").into()],
        )
        .await?;
    assert_eq!(empty.get_bytes("body"), Some(&[][..]));
    assert_eq!(empty.get_time("seen_at"), Some(chrono::NaiveDateTime::default()));
    assert!(empty.is_null("seen_at"));
    session.commit().await?;
    Ok(())
}

#[tokio::test]
async fn statement_failures_carry_the_sql() -> Result<(), Box<dyn std::error::Error>> {
    let (depot, _dir) = open_depot().await?;
    let (session, _ctx) = depot.begin(&Context::background()).await?;

    session.insert_one(&table("messages"), &message("1", "a")).await?;
    let err = session
        .insert_one(&table("messages"), &message("1", "dup"))
        .await
        .unwrap_err();
    match &err {
        SqlDepotError::Statement { sql, .. } => {
            assert_eq!(sql, "insert into messages (id, text) values (?, ?)");
        }
        other => panic!("expected statement error, got {other:?}"),
    }
    session.rollback().await?;
    Ok(())
}

#[tokio::test]
async fn open_by_database_type() -> Result<(), Box<dyn std::error::Error>> {
    let depot = Depot::open(
        DatabaseType::Sqlite,
        ":memory:",
        Options::new().with_log_sql(true),
    )
    .await?;
    assert_eq!(depot.database_type(), DatabaseType::Sqlite);
    assert_eq!(depot.dialect().name(), "default");

    let (session, _ctx) = depot.begin(&Context::background()).await?;
    session.exec(SCHEMA, &[]).await?;
    session.insert_one(&table("messages"), &message("1", "a")).await?;
    assert_eq!(session.query_count(&table("messages"), &[]).await?, 1);
    session.commit().await?;

    depot.close().await;
    let err = depot.begin(&Context::background()).await.unwrap_err();
    assert!(matches!(err, SqlDepotError::ConnectionError(_)));
    Ok(())
}
