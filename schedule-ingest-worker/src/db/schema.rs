//! Diesel table definitions for the `schedule_ingest` schema.
//!
//! Column sets mirror the database contract in the spec exactly; nothing
//! here is enforced at the Rust level (uniqueness, foreign keys, the state
//! enum) — those are database-side constraints assumed to exist already.
//! `DB_SCHEMA` lets a deployment point these same compiled table names at a
//! differently-named schema by setting the connection's `search_path`
//! (see [`crate::db::pool::SearchPathCustomizer`]) rather than by
//! recompiling against a different schema literal.

diesel::table! {
    use diesel::sql_types::*;

    schedule_ingest.capture_session (id) {
        id -> Uuid,
        user_id -> Text,
        state -> Text,
        created_at -> Timestamptz,
        error -> Nullable<Text>,
        locked_at -> Nullable<Timestamptz>,
        locked_by -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    schedule_ingest.capture_image (id) {
        id -> Uuid,
        session_id -> Uuid,
        sequence -> Int4,
        r2_key -> Text,
        telegram_message_id -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    schedule_ingest.day_schedule (user_id, schedule_date) {
        user_id -> Text,
        schedule_date -> Date,
        current_version -> Int4,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    schedule_ingest.schedule_version (id) {
        id -> Uuid,
        user_id -> Text,
        schedule_date -> Date,
        version -> Int4,
        session_id -> Uuid,
        payload -> Jsonb,
        payload_hash -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    schedule_ingest.day_snapshot (user_id, schedule_date) {
        user_id -> Text,
        schedule_date -> Date,
        snapshot_payload -> Jsonb,
        source_session_id -> Uuid,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    schedule_ingest.schedule_event (event_id) {
        event_id -> Uuid,
        user_id -> Text,
        schedule_date -> Date,
        event_type -> Text,
        location_fingerprint -> Text,
        customer_fingerprint -> Text,
        old_value -> Nullable<Jsonb>,
        new_value -> Nullable<Jsonb>,
        old_value_hash -> Text,
        new_value_hash -> Text,
        detected_at -> Timestamptz,
        source_session_id -> Uuid,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    schedule_ingest.schedule_notification (notification_id) {
        notification_id -> Text,
        user_id -> Text,
        schedule_date -> Date,
        source_session_id -> Uuid,
        status -> Text,
        notification_type -> Text,
        message -> Text,
        event_ids -> Jsonb,
        created_at -> Timestamptz,
        sent_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    capture_session,
    capture_image,
    day_schedule,
    schedule_version,
    day_snapshot,
    schedule_event,
    schedule_notification,
);
