//! Repository contract suite, run against every backend
//!
//! Memory, SQLite and RocksDB run on every `cargo test`. The server backends
//! are ignored unless asked for with `--ignored` and their URL variables:
//! `AGENTLEDGER_TEST_POSTGRES_URL`, `AGENTLEDGER_TEST_MYSQL_URL` and
//! `AGENTLEDGER_TEST_MONGODB_URI`. Cases only rely on keys they create
//! themselves, so a shared server database can be reused between runs.

mod cases;
mod setup;

macro_rules! for_each_case {
    ($generate:ident ! ($setup:path)) => {
        $generate!($setup;
            default_project_is_singleton,
            concurrent_project_find_or_create,
            concurrent_session_find_or_create,
            event_uuid_is_unique_per_session,
            event_create_advances_session,
            session_listing_tie_break,
            pagination_is_complete,
            sort_field_selects_order,
            unreadable_cursor_starts_over,
            timestamps_keep_nanoseconds,
            narrow_updates_report_missing_rows,
            project_delete_rules,
            favorites_are_idempotent,
            plan_document_query,
            plan_document_updates_and_events,
            users_by_email,
            api_keys,
            web_session_expiry,
            password_upsert_keeps_created_at,
            oauth_connections,
            composite_keys_stay_distinct
        );
    };
}

macro_rules! local_backend {
    ($setup:path; $($case:ident),*) => {
        $(
            #[tokio::test]
            async fn $case() {
                let fixture = $setup().await;
                crate::cases::$case(&fixture.repos).await;
            }
        )*
    };
}

macro_rules! server_backend {
    ($setup:path; $($case:ident),*) => {
        $(
            #[tokio::test]
            #[ignore = "needs a database server"]
            async fn $case() {
                let fixture = $setup().await;
                crate::cases::$case(&fixture.repos).await;
            }
        )*
    };
}

mod memory {
    for_each_case!(local_backend!(crate::setup::memory));
}

mod sqlite {
    for_each_case!(local_backend!(crate::setup::sqlite));
}

#[cfg(feature = "widecolumn")]
mod rocksdb {
    for_each_case!(local_backend!(crate::setup::rocksdb));
}

mod postgres {
    for_each_case!(server_backend!(crate::setup::postgres));
}

mod mysql {
    for_each_case!(server_backend!(crate::setup::mysql));
}

#[cfg(feature = "document")]
mod mongodb {
    for_each_case!(server_backend!(crate::setup::mongodb));
}
