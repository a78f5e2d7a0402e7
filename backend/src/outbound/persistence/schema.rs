//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Registered accounts. Emails are stored canonicalised but are not
    /// unique; login picks the oldest active row for an address.
    users (id) {
        id -> Uuid,
        email -> Varchar,
        display_name -> Varchar,
        /// One of `admin`, `learner`, `tutor`, `manager`, `user`.
        role -> Varchar,
        /// Argon2id PHC string.
        password_hash -> Text,
        active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Courses and products offered on the platform.
    auth_subject (id) {
        id -> Int4,
        slug -> Varchar,
        name -> Varchar,
        active -> Bool,
        sort_order -> Int4,
    }
}

diesel::table! {
    /// One row per (user, subject), driven by the enrollment state machine.
    user_enrollment (id) {
        id -> Int8,
        user_id -> Uuid,
        subject_id -> Int4,
        status -> Varchar,
        payment_pending -> Bool,
        quote_country -> Nullable<Varchar>,
        quote_currency -> Nullable<Varchar>,
        quote_amount_cents -> Nullable<Int8>,
        price_version -> Nullable<Varchar>,
        quote_locked_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Base prices per subject, optionally scoped to a role and date window.
    auth_pricing (id) {
        id -> Int4,
        subject_id -> Int4,
        role -> Nullable<Varchar>,
        plan -> Varchar,
        currency -> Varchar,
        amount_cents -> Int8,
        active -> Bool,
        active_from -> Nullable<Timestamptz>,
        active_to -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Per-country overrides, either in local currency or as a ZAR anchor.
    subject_country_price (subject_id, country_code) {
        subject_id -> Int4,
        country_code -> Varchar,
        local_amount_cents -> Nullable<Int8>,
        zar_amount_cents -> Nullable<Int8>,
        active -> Bool,
    }
}

diesel::table! {
    /// Country to currency reference data with ZAR exchange rates.
    ref_country_currency (alpha2) {
        alpha2 -> Varchar,
        currency -> Varchar,
        name -> Varchar,
        /// Units of local currency per ZAR, in parts per million.
        fx_rate_ppm -> Int8,
        active -> Bool,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Audit log of every checkout attempt and gateway callback.
    auth_payment_log (id) {
        id -> Int8,
        user_id -> Nullable<Uuid>,
        subject_id -> Nullable<Int4>,
        amount_cents -> Int8,
        currency -> Varchar,
        status -> Varchar,
        provider -> Varchar,
        external_ref -> Varchar,
        purpose -> Varchar,
        meta -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Stripe Checkout sessions keyed by session id.
    stripe_payment (id) {
        id -> Int8,
        session_id -> Varchar,
        user_id -> Nullable<Uuid>,
        payment_intent_id -> Nullable<Varchar>,
        customer_id -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        amount_total_cents -> Nullable<Int8>,
        currency -> Nullable<Varchar>,
        status -> Varchar,
        purpose -> Nullable<Varchar>,
        receipt_url -> Nullable<Text>,
        paid_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Scoring table: phase weights per question and answer.
    lca_question_phase_map (question_id, answer_type) {
        question_id -> Int4,
        answer_type -> Varchar,
        phase_1 -> Int4,
        phase_2 -> Int4,
        phase_3 -> Int4,
        phase_4 -> Int4,
    }
}

diesel::table! {
    lca_run (id) {
        id -> Int8,
        user_id -> Uuid,
        subject -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        finished_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Latest answer per question in a run.
    lca_response (id) {
        id -> Int8,
        run_id -> Int8,
        question_id -> Int4,
        answer -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Weights applied for each answered question.
    lca_scorecard (run_id, question_id) {
        run_id -> Int8,
        question_id -> Int4,
        phase_1 -> Int4,
        phase_2 -> Int4,
        phase_3 -> Int4,
        phase_4 -> Int4,
    }
}

diesel::table! {
    /// Running totals per run; maxima are fixed on finalisation.
    lca_result (run_id) {
        run_id -> Int8,
        user_id -> Uuid,
        phase_1 -> Int4,
        phase_2 -> Int4,
        phase_3 -> Int4,
        phase_4 -> Int4,
        total -> Int4,
        phase_1_max -> Nullable<Int4>,
        phase_2_max -> Nullable<Int4>,
        phase_3_max -> Nullable<Int4>,
        phase_4_max -> Nullable<Int4>,
        max_total -> Nullable<Int4>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    lca_phase_item (id) {
        id -> Int4,
        phase -> Int2,
        ordinal -> Int4,
        body -> Text,
        active -> Bool,
    }
}

diesel::table! {
    lca_progress_item (id) {
        id -> Int4,
        phase -> Int2,
        band -> Varchar,
        tone -> Varchar,
        ordinal -> Int4,
        body -> Text,
        active -> Bool,
    }
}

diesel::table! {
    lca_overall_item (id) {
        id -> Int4,
        band -> Varchar,
        /// `summary` or `bullet`.
        kind -> Varchar,
        label -> Nullable<Varchar>,
        body -> Text,
        key_need -> Nullable<Text>,
        ordinal -> Int4,
        active -> Bool,
    }
}

diesel::table! {
    /// One row per tracked page view. Client addresses are stored hashed.
    visit_log (id) {
        id -> Int8,
        ts -> Timestamptz,
        path -> Varchar,
        user_id -> Nullable<Uuid>,
        ip_hash -> Varchar,
        user_agent -> Nullable<Varchar>,
    }
}

diesel::table! {
    fee_learner (id) {
        id -> Int4,
        full_name -> Varchar,
        class_name -> Varchar,
    }
}

diesel::table! {
    /// One account per learner and school year.
    fee_account (id) {
        id -> Int4,
        learner_id -> Int4,
        school_year -> Int4,
        annual_fee_cents -> Int8,
    }
}

diesel::table! {
    fee_payment (id) {
        id -> Int4,
        account_id -> Int4,
        paid_cents -> Int8,
        paid_on -> Date,
        method -> Nullable<Varchar>,
        reference -> Nullable<Varchar>,
    }
}

diesel::joinable!(user_enrollment -> users (user_id));
diesel::joinable!(user_enrollment -> auth_subject (subject_id));
diesel::joinable!(auth_pricing -> auth_subject (subject_id));
diesel::joinable!(subject_country_price -> auth_subject (subject_id));
diesel::joinable!(lca_response -> lca_run (run_id));
diesel::joinable!(lca_scorecard -> lca_run (run_id));
diesel::joinable!(lca_result -> lca_run (run_id));
diesel::joinable!(fee_account -> fee_learner (learner_id));
diesel::joinable!(fee_payment -> fee_account (account_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    auth_subject,
    user_enrollment,
    auth_pricing,
    subject_country_price,
    ref_country_currency,
    auth_payment_log,
    stripe_payment,
    lca_question_phase_map,
    lca_run,
    lca_response,
    lca_scorecard,
    lca_result,
    lca_phase_item,
    lca_progress_item,
    lca_overall_item,
    visit_log,
    fee_learner,
    fee_account,
    fee_payment,
);
