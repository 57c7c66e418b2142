use sea_orm::*;

use crate::entities::{prelude::*, storage};
use crate::errors::AppError;

/// 外部キーバリューストレージへのアクセスを集約するサービス。
/// `get(key) -> 値 | なし` と `set(key, value)` の2操作のみを公開します。
pub struct StorageService;

impl StorageService {
    /// キーに保存された値を取得する。未保存なら `None`。
    pub async fn get(db: &DatabaseConnection, key: &str) -> Result<Option<String>, AppError> {
        let found = Storage::find_by_id(key)
            .one(db)
            .await
            .map_err(AppError::Database)?;

        Ok(found.map(|model| model.value))
    }

    /// キーに値を保存する。既存の値は置き換える。
    pub async fn set(db: &DatabaseConnection, key: &str, value: String) -> Result<(), AppError> {
        match Storage::find_by_id(key)
            .one(db)
            .await
            .map_err(AppError::Database)?
        {
            Some(existing) => {
                let mut active: storage::ActiveModel = existing.into();
                active.value = Set(value);
                active.update(db).await.map_err(AppError::Database)?;
            }
            None => {
                let active = storage::ActiveModel {
                    key: Set(key.to_owned()),
                    value: Set(value),
                };
                active.insert(db).await.map_err(AppError::Database)?;
            }
        }

        Ok(())
    }
}
