use billing_ops::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const VARS: &[&str] = &[
    "BILLING_PROFILE",
    "BILLING_LOG_LEVEL",
    "BILLING_STRIPE_SECRET_KEY",
    "BILLING_MAIL_API_KEY",
    "BILLING_MIGRATION_EMAIL_DELAY_MS",
    "BILLING_CONSOLIDATION_BATCH_SIZE",
    "BILLING_CONSOLIDATION_RETENTION_DAYS",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

fn loader_for(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let cfg = loader_for(&temp_dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.consolidation.retention_days, 60);
    assert_eq!(cfg.consolidation.batch_size, 50);
    assert_eq!(cfg.price_migration.email_delay_ms, 100);
    assert!(cfg.stripe_secret_key.is_none());
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "BILLING_CONSOLIDATION_BATCH_SIZE=10\n");
    write_env_file(&temp_dir, ".env.test", "BILLING_CONSOLIDATION_BATCH_SIZE=20\n");
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "BILLING_CONSOLIDATION_BATCH_SIZE=30\n",
    );
    // Profile is selected by .env.local before profile files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "BILLING_PROFILE=test\nBILLING_CONSOLIDATION_BATCH_SIZE=15\n",
    );

    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.consolidation.batch_size, 30);
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "BILLING_MIGRATION_EMAIL_DELAY_MS=250\n");
    unsafe {
        env::set_var("BILLING_MIGRATION_EMAIL_DELAY_MS", "0");
    }

    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with env override");
    assert_eq!(cfg.price_migration.email_delay_ms, 0);
    clear_env();
}

#[test]
fn unparsable_number_is_rejected() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("BILLING_CONSOLIDATION_RETENTION_DAYS", "sixty");
    }

    let err = loader_for(&temp_dir)
        .load()
        .expect_err("garbage retention should fail");
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            key: "CONSOLIDATION_RETENTION_DAYS",
            ..
        }
    ));
    clear_env();
}

#[test]
fn production_profile_requires_stripe_key() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "BILLING_PROFILE=production\n");

    let err = loader_for(&temp_dir)
        .load()
        .expect_err("production without Stripe key should fail");
    assert!(err.to_string().contains("BILLING_STRIPE_SECRET_KEY"));

    unsafe {
        env::set_var("BILLING_STRIPE_SECRET_KEY", "sk_live_test");
        env::set_var("BILLING_MAIL_API_KEY", "re_test");
    }
    let cfg = loader_for(&temp_dir)
        .load()
        .expect("production with credentials loads");
    assert_eq!(cfg.profile, "production");
    clear_env();
}
