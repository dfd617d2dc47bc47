use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::{debug, info};

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Table definitions, in creation order (children after `employees`).
pub const SCHEMA: &[(&str, &str)] = &[
    (
        "employees",
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            employee_code VARCHAR(32) NOT NULL UNIQUE,
            first_name VARCHAR(100) NOT NULL,
            last_name VARCHAR(100) NOT NULL,
            email VARCHAR(190) NOT NULL UNIQUE,
            phone VARCHAR(40) NULL,
            department VARCHAR(100) NOT NULL,
            position VARCHAR(100) NOT NULL,
            grade VARCHAR(20) NULL,
            employment_type VARCHAR(20) NOT NULL DEFAULT 'full_time',
            salary DOUBLE NOT NULL DEFAULT 0,
            performance_rating DOUBLE NULL,
            overtime_hours DOUBLE NOT NULL DEFAULT 0,
            date_of_birth DATE NULL,
            hire_date DATE NOT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'active',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (employment_type IN ('full_time', 'part_time', 'contract', 'intern')),
            CHECK (status IN ('active', 'on_leave', 'resigned', 'terminated')),
            INDEX idx_employees_department (department)
        )
        "#,
    ),
    (
        "salary_records",
        r#"
        CREATE TABLE IF NOT EXISTS salary_records (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            employee_id BIGINT UNSIGNED NOT NULL,
            pay_period DATE NOT NULL,
            basic_salary DOUBLE NOT NULL,
            allowances DOUBLE NOT NULL DEFAULT 0,
            deductions DOUBLE NOT NULL DEFAULT 0,
            net_salary DOUBLE NOT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'pending',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (status IN ('pending', 'paid')),
            FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "bonus_records",
        r#"
        CREATE TABLE IF NOT EXISTS bonus_records (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            employee_id BIGINT UNSIGNED NOT NULL,
            bonus_type VARCHAR(20) NOT NULL,
            amount DOUBLE NOT NULL,
            bonus_date DATE NOT NULL,
            reason TEXT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'pending',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (status IN ('pending', 'approved', 'paid')),
            FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "training_data",
        r#"
        CREATE TABLE IF NOT EXISTS training_data (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            employee_id BIGINT UNSIGNED NOT NULL,
            predicted_risk DOUBLE NOT NULL,
            actual_outcome VARCHAR(20) NOT NULL,
            features TEXT NOT NULL,
            notes TEXT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (actual_outcome IN ('stayed', 'left')),
            FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "allowance_matrix",
        r#"
        CREATE TABLE IF NOT EXISTS allowance_matrix (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            grade VARCHAR(20) NOT NULL,
            department VARCHAR(100) NOT NULL,
            allowance_type VARCHAR(20) NOT NULL,
            amount DOUBLE NOT NULL,
            frequency VARCHAR(20) NOT NULL DEFAULT 'monthly',
            effective_date DATE NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (frequency IN ('monthly', 'quarterly', 'annual', 'one_time'))
        )
        "#,
    ),
    (
        "bonus_structures",
        r#"
        CREATE TABLE IF NOT EXISTS bonus_structures (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            bonus_type VARCHAR(20) NOT NULL,
            calculation_method VARCHAR(20) NOT NULL,
            value DOUBLE NOT NULL,
            min_performance_rating DOUBLE NULL,
            description TEXT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (calculation_method IN ('fixed', 'percentage'))
        )
        "#,
    ),
    (
        "salary_movements",
        r#"
        CREATE TABLE IF NOT EXISTS salary_movements (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            employee_id BIGINT UNSIGNED NOT NULL,
            movement_type VARCHAR(20) NOT NULL,
            previous_salary DOUBLE NOT NULL,
            new_salary DOUBLE NOT NULL,
            effective_date DATE NOT NULL,
            reason TEXT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'pending',
            decided_at TIMESTAMP NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (status IN ('pending', 'approved', 'rejected')),
            FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE
        )
        "#,
    ),
];

pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for (table, ddl) in SCHEMA {
        debug!(table, "Ensuring table");
        sqlx::query(ddl).execute(pool).await?;
    }
    info!(tables = SCHEMA.len(), "Schema ready");
    Ok(())
}
