use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::env;

/// データベース接続をセットアップします。
/// `DATABASE_URL` が未設定の場合はインメモリSQLiteを使用します。
pub async fn set_up_db() -> Result<DatabaseConnection, DbErr> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_owned());

    let mut options = ConnectOptions::new(db_url.clone());
    if db_url.starts_with("sqlite::memory:") {
        // インメモリDBはプールの接続ごとに別の実体になるため1本に固定する
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;

    Ok(db)
}
