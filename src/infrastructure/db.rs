use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    run_migrations(&db).await?;

    Ok(db)
}

/// Schema as plain idempotent SQL. Each statement only creates what is
/// missing, so running it against an existing database is a no-op.
const SCHEMA: &[&str] = &[
    // Accounts
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phone_number TEXT UNIQUE,
        email TEXT UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        age INTEGER,
        telegram_id INTEGER UNIQUE,
        role TEXT NOT NULL DEFAULT 'STUDENT',
        is_staff BOOLEAN NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        phone_verified BOOLEAN NOT NULL DEFAULT 0,
        email_verified BOOLEAN NOT NULL DEFAULT 0,
        date_joined TEXT NOT NULL,
        last_login TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
    r#"
    CREATE TABLE IF NOT EXISTS phone_verifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phone_number TEXT NOT NULL,
        otp_code TEXT NOT NULL,
        purpose TEXT NOT NULL,
        is_verified BOOLEAN NOT NULL DEFAULT 0,
        is_deleted BOOLEAN NOT NULL DEFAULT 0,
        expires_at TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_phone_verifications_lookup ON phone_verifications(phone_number, purpose, is_verified)",
    r#"
    CREATE TABLE IF NOT EXISTS social_auths (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        provider TEXT NOT NULL,
        provider_user_id TEXT NOT NULL,
        access_token TEXT NOT NULL DEFAULT '',
        refresh_token TEXT NOT NULL DEFAULT '',
        token_expires_at TEXT,
        extra_data TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(provider, provider_user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_social_auths_user ON social_auths(user_id, provider)",
    r#"
    CREATE TABLE IF NOT EXISTS author_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        bio TEXT NOT NULL DEFAULT '',
        expertise TEXT NOT NULL DEFAULT '',
        website TEXT NOT NULL DEFAULT '',
        linkedin_url TEXT NOT NULL DEFAULT '',
        telegram_username TEXT NOT NULL DEFAULT '',
        youtube_url TEXT NOT NULL DEFAULT '',
        is_verified BOOLEAN NOT NULL DEFAULT 0,
        verified_at TEXT,
        total_students INTEGER NOT NULL DEFAULT 0,
        total_courses INTEGER NOT NULL DEFAULT 0,
        average_rating REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS author_balances (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        author_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        available_balance INTEGER NOT NULL DEFAULT 0,
        pending_balance INTEGER NOT NULL DEFAULT 0,
        lifetime_earnings INTEGER NOT NULL DEFAULT 0,
        total_withdrawn INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS author_payouts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        amount INTEGER NOT NULL CHECK (amount >= 1),
        method TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        payment_details TEXT NOT NULL DEFAULT '{}',
        processed_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        processed_at TEXT,
        transaction_id TEXT NOT NULL DEFAULT '',
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_author_payouts_status ON author_payouts(author_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS student_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        bio TEXT NOT NULL DEFAULT '',
        enrolled_courses_count INTEGER NOT NULL DEFAULT 0,
        completed_courses_count INTEGER NOT NULL DEFAULT 0,
        total_watch_seconds INTEGER NOT NULL DEFAULT 0,
        certificates_earned INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    // Catalog
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        parent_id INTEGER REFERENCES categories(id) ON DELETE CASCADE,
        icon TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        short_description TEXT NOT NULL DEFAULT '',
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        thumbnail TEXT,
        trailer_url TEXT NOT NULL DEFAULT '',
        price INTEGER NOT NULL DEFAULT 0 CHECK (price >= 0),
        status TEXT NOT NULL DEFAULT 'DRAFT',
        level TEXT NOT NULL DEFAULT 'BEGINNER',
        language TEXT NOT NULL DEFAULT 'uz',
        requirements TEXT NOT NULL DEFAULT '',
        what_you_will_learn TEXT NOT NULL DEFAULT '',
        enrollment_count INTEGER NOT NULL DEFAULT 0,
        average_rating REAL NOT NULL DEFAULT 0,
        review_count INTEGER NOT NULL DEFAULT 0,
        total_duration_minutes INTEGER NOT NULL DEFAULT 0,
        published_at TEXT,
        is_deleted BOOLEAN NOT NULL DEFAULT 0,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_courses_status ON courses(status, is_deleted)",
    "CREATE INDEX IF NOT EXISTS idx_courses_author ON courses(author_id)",
    r#"
    CREATE TABLE IF NOT EXISTS course_categories (
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        PRIMARY KEY (course_id, category_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS course_modules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 1,
        is_deleted BOOLEAN NOT NULL DEFAULT 0,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lessons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        module_id INTEGER NOT NULL REFERENCES course_modules(id) ON DELETE CASCADE,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        video_url TEXT NOT NULL DEFAULT '',
        duration_minutes INTEGER NOT NULL DEFAULT 1 CHECK (duration_minutes >= 1),
        text_content TEXT NOT NULL DEFAULT '',
        is_preview BOOLEAN NOT NULL DEFAULT 0,
        sort_order INTEGER NOT NULL DEFAULT 1,
        is_deleted BOOLEAN NOT NULL DEFAULT 0,
        deleted_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(module_id, sort_order)",
    r#"
    CREATE TABLE IF NOT EXISTS homework_assignments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        lesson_id INTEGER NOT NULL UNIQUE REFERENCES lessons(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS homework_submissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        assignment_id INTEGER NOT NULL REFERENCES homework_assignments(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        grade REAL,
        feedback TEXT NOT NULL DEFAULT '',
        graded_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (assignment_id, student_id)
    )
    "#,
    // Learning
    r#"
    CREATE TABLE IF NOT EXISTS course_enrollments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        price_paid INTEGER NOT NULL DEFAULT 0,
        progress_percentage REAL NOT NULL DEFAULT 0,
        completed BOOLEAN NOT NULL DEFAULT 0,
        completed_at TEXT,
        certificate_issued BOOLEAN NOT NULL DEFAULT 0,
        last_accessed TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (course_id, student_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lesson_progress (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        enrollment_id INTEGER NOT NULL REFERENCES course_enrollments(id) ON DELETE CASCADE,
        lesson_id INTEGER NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
        completed BOOLEAN NOT NULL DEFAULT 0,
        watch_percentage REAL NOT NULL DEFAULT 0,
        last_position_seconds INTEGER NOT NULL DEFAULT 0,
        watch_time_seconds INTEGER NOT NULL DEFAULT 0,
        completed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (enrollment_id, lesson_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS watch_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        lesson_id INTEGER NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        watch_duration_seconds INTEGER NOT NULL DEFAULT 0,
        percentage_watched REAL NOT NULL DEFAULT 0,
        session_id TEXT NOT NULL DEFAULT '',
        device_type TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS certificates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        enrollment_id INTEGER NOT NULL UNIQUE REFERENCES course_enrollments(id) ON DELETE CASCADE,
        certificate_id TEXT NOT NULL UNIQUE,
        verification_url TEXT NOT NULL,
        issued_at TEXT NOT NULL,
        UNIQUE (student_id, course_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS course_reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        comment TEXT NOT NULL DEFAULT '',
        is_verified_purchase BOOLEAN NOT NULL DEFAULT 0,
        helpful_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (course_id, student_id)
    )
    "#,
    // Payments
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id TEXT NOT NULL UNIQUE,
        transaction_type TEXT NOT NULL,
        payer_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        payee_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        amount INTEGER NOT NULL CHECK (amount >= 1),
        currency TEXT NOT NULL DEFAULT 'UZS',
        gateway TEXT,
        gateway_transaction_id TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'PENDING',
        course_id INTEGER REFERENCES courses(id) ON DELETE SET NULL,
        enrollment_id INTEGER REFERENCES course_enrollments(id) ON DELETE SET NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        error_message TEXT NOT NULL DEFAULT '',
        completed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status, transaction_type)",
    r#"
    CREATE TABLE IF NOT EXISTS payment_gateway_configs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        gateway TEXT NOT NULL UNIQUE,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        merchant_id TEXT NOT NULL DEFAULT '',
        secret_key TEXT NOT NULL DEFAULT '',
        api_url TEXT NOT NULL DEFAULT '',
        config TEXT NOT NULL DEFAULT '{}',
        commission_percentage REAL NOT NULL DEFAULT 2,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS platform_commissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_id INTEGER REFERENCES courses(id) ON DELETE CASCADE,
        category_id INTEGER REFERENCES categories(id) ON DELETE CASCADE,
        commission_percentage REAL NOT NULL DEFAULT 30,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        effective_from TEXT NOT NULL,
        effective_until TEXT,
        notes TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refund_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        enrollment_id INTEGER REFERENCES course_enrollments(id) ON DELETE SET NULL,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        original_transaction_id INTEGER REFERENCES transactions(id) ON DELETE SET NULL,
        amount INTEGER NOT NULL,
        reason TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        reviewed_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        reviewed_at TEXT,
        admin_notes TEXT NOT NULL DEFAULT '',
        refund_transaction_id INTEGER REFERENCES transactions(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    // Moderation
    r#"
    CREATE TABLE IF NOT EXISTS course_moderations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        status TEXT NOT NULL DEFAULT 'PENDING',
        reviewer_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        review_notes TEXT NOT NULL DEFAULT '',
        rejection_reason TEXT NOT NULL DEFAULT '',
        changes_requested TEXT NOT NULL DEFAULT '',
        reviewed_at TEXT,
        quality_score INTEGER,
        content_complete BOOLEAN NOT NULL DEFAULT 0,
        video_quality_ok BOOLEAN NOT NULL DEFAULT 0,
        description_adequate BOOLEAN NOT NULL DEFAULT 0,
        pricing_appropriate BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_moderations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        action TEXT NOT NULL,
        reason TEXT NOT NULL,
        details TEXT NOT NULL,
        moderator_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        is_permanent BOOLEAN NOT NULL DEFAULT 0,
        expires_at TEXT,
        ip_address TEXT,
        evidence_urls TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_moderations_user ON user_moderations(user_id, action)",
    r#"
    CREATE TABLE IF NOT EXISTS moderation_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        admin_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        action_type TEXT NOT NULL,
        description TEXT NOT NULL,
        affected_user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        affected_course_id INTEGER REFERENCES courses(id) ON DELETE SET NULL,
        ip_address TEXT,
        user_agent TEXT NOT NULL DEFAULT '',
        additional_data TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_moderation_logs_action ON moderation_logs(action_type, created_at)",
];

pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in SCHEMA {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    tracing::debug!("Schema up to date ({} statements)", SCHEMA.len());
    Ok(())
}
