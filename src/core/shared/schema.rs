diesel::table! {
    users (id) {
        id -> Int4,
        username -> Text,
        password_hash -> Text,
        email -> Text,
        full_name -> Text,
        phone -> Nullable<Text>,
        role -> Text,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    csps (id) {
        id -> Int4,
        user_id -> Int4,
        address -> Text,
        city -> Text,
        state -> Text,
        pincode -> Text,
        aadhaar_number -> Text,
        pan_number -> Nullable<Text>,
        education -> Nullable<Text>,
        photo_url -> Nullable<Text>,
        location -> Jsonb,
        score -> Int4,
        status -> Text,
        working_capital -> Float8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    transactions (id) {
        id -> Int4,
        csp_id -> Int4,
        #[sql_name = "type"]
        kind -> Text,
        amount -> Float8,
        status -> Text,
        customer_phone -> Nullable<Text>,
        customer_name -> Nullable<Text>,
        location -> Nullable<Jsonb>,
        risk_score -> Int4,
        flagged -> Bool,
        flag_reason -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    audits (id) {
        id -> Int4,
        csp_id -> Int4,
        auditor_id -> Int4,
        scheduled_date -> Timestamptz,
        completed_date -> Nullable<Timestamptz>,
        status -> Text,
        notes -> Nullable<Text>,
        photos -> Nullable<Jsonb>,
        videos -> Nullable<Jsonb>,
        location -> Nullable<Jsonb>,
        rating -> Nullable<Int4>,
        issues -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    alerts (id) {
        id -> Int4,
        csp_id -> Nullable<Int4>,
        transaction_id -> Nullable<Int4>,
        #[sql_name = "type"]
        kind -> Text,
        severity -> Text,
        message -> Text,
        status -> Text,
        assigned_to -> Nullable<Int4>,
        resolved_by -> Nullable<Int4>,
        resolved_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    applications (id) {
        id -> Int4,
        first_name -> Text,
        last_name -> Text,
        email -> Text,
        phone -> Text,
        aadhaar_number -> Text,
        address -> Text,
        education -> Text,
        photo_url -> Nullable<Text>,
        status -> Text,
        notes -> Nullable<Text>,
        reviewed_by -> Nullable<Int4>,
        reviewed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    activity_logs (id) {
        id -> Int4,
        user_id -> Nullable<Int4>,
        action -> Text,
        details -> Nullable<Jsonb>,
        ip_address -> Nullable<Text>,
        user_agent -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Int4,
        user_id -> Nullable<Int4>,
        title -> Text,
        message -> Text,
        #[sql_name = "type"]
        kind -> Text,
        status -> Text,
        created_at -> Timestamptz,
        read_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(csps -> users (user_id));
diesel::joinable!(transactions -> csps (csp_id));
diesel::joinable!(audits -> csps (csp_id));
diesel::joinable!(audits -> users (auditor_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    csps,
    transactions,
    audits,
    alerts,
    applications,
    activity_logs,
    notifications,
);
